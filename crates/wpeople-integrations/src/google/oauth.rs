use async_trait::async_trait;
use wpeople_core::config::GoogleConfig;
use wpeople_core::error::{Result, WPeopleError};
use wpeople_core::types::{ClientCredentials, TokenRecord};

/// Scope requested for Google Contacts access.
const SCOPES: &str = "https://www.googleapis.com/auth/contacts";

/// Turns an authorization code into a token document.
#[async_trait]
pub trait AuthCodeExchange: Send + Sync {
    async fn exchange(&self, code: &str) -> Result<TokenRecord>;
}

/// OAuth client for a Google "web application" credential pair.
pub struct GoogleAuth {
    credentials: ClientCredentials,
    redirect_url: String,
    auth_endpoint: reqwest::Url,
    token_url: String,
    http: reqwest::Client,
}

impl GoogleAuth {
    pub fn new(credentials: ClientCredentials, config: &GoogleConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| WPeopleError::Config(format!("failed to build http client: {e}")))?;
        let auth_endpoint = reqwest::Url::parse(&config.auth_url).map_err(|e| {
            WPeopleError::Config(format!("invalid auth url {}: {e}", config.auth_url))
        })?;

        Ok(Self {
            credentials,
            redirect_url: config.redirect_url.clone(),
            auth_endpoint,
            token_url: config.token_url.clone(),
            http,
        })
    }

    /// Generate the OAuth authorization URL for the user to visit. `state`
    /// comes back on the callback and must match what was issued.
    pub fn auth_url(&self, state: &str) -> String {
        let mut url = self.auth_endpoint.clone();
        url.query_pairs_mut()
            .append_pair("client_id", &self.credentials.client_id)
            .append_pair("redirect_uri", &self.redirect_url)
            .append_pair("response_type", "code")
            .append_pair("scope", SCOPES)
            .append_pair("access_type", "offline")
            .append_pair("include_granted_scopes", "true")
            .append_pair("prompt", "consent")
            .append_pair("state", state);
        url.to_string()
    }

    /// Exchange a refresh token for a fresh token document. The result is
    /// not persisted; hand it to `CredentialStore::store_token`.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenRecord> {
        let params = [
            ("refresh_token", refresh_token),
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("grant_type", "refresh_token"),
        ];

        let mut record = self.request_token(&params, "refresh").await?;
        // Google omits the refresh token on refresh responses.
        if record.refresh_token.is_none() {
            record.refresh_token = Some(refresh_token.to_string());
        }
        Ok(record)
    }

    async fn request_token(&self, params: &[(&str, &str)], what: &str) -> Result<TokenRecord> {
        tracing::debug!(url = %self.token_url, grant = what, "requesting google token");
        let resp = self
            .http
            .post(&self.token_url)
            .form(params)
            .send()
            .await
            .map_err(|e| WPeopleError::Request(format!("google token {what} failed: {e}")))?;

        let status = resp.status().as_u16();
        let text = resp
            .text()
            .await
            .map_err(|e| WPeopleError::Request(format!("google token read failed: {e}")))?;

        if status != 200 {
            return Err(WPeopleError::Http { status, body: text });
        }

        let json: serde_json::Value = serde_json::from_str(&text)
            .map_err(|e| WPeopleError::Decode(format!("google token parse failed: {e}")))?;

        if !json["access_token"].is_string() {
            return Err(WPeopleError::TokenInvalid);
        }

        serde_json::from_value(json)
            .map_err(|e| WPeopleError::Decode(format!("google token parse failed: {e}")))
    }
}

#[async_trait]
impl AuthCodeExchange for GoogleAuth {
    /// Exchange an authorization code for access + refresh tokens.
    async fn exchange(&self, code: &str) -> Result<TokenRecord> {
        let params = [
            ("code", code),
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("redirect_uri", self.redirect_url.as_str()),
            ("grant_type", "authorization_code"),
        ];
        self.request_token(&params, "exchange").await
    }
}
