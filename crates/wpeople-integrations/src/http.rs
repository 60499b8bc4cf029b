use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use wpeople_core::error::{ErrorKind, Result, WPeopleError};
use wpeople_core::types::{AuthorizationState, NewContact};

use crate::context::Context;
use crate::settings::OAuthState;

#[derive(serde::Deserialize)]
pub struct OAuthCallback {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

/// JSON error body with a status derived from the error kind.
pub struct ApiError(WPeopleError);

type ApiResult<T> = std::result::Result<T, ApiError>;

impl From<WPeopleError> for ApiError {
    fn from(e: WPeopleError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match (&self.0, self.0.kind()) {
            (WPeopleError::Unauthorized, _) => StatusCode::UNAUTHORIZED,
            (_, ErrorKind::Configuration) => StatusCode::BAD_REQUEST,
            (_, ErrorKind::RequestFailed) => StatusCode::BAD_GATEWAY,
            (_, ErrorKind::Decoding) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = json!({
            "error": self.0.to_string(),
            "kind": self.0.kind().as_str(),
        });
        (status, Json(body)).into_response()
    }
}

async fn oauth_callback(
    State(ctx): State<Arc<Context>>,
    Query(params): Query<OAuthCallback>,
) -> Html<String> {
    if let Some(error) = params.error {
        return Html(format!(
            "<h1>Authorization failed</h1><p>{}</p>",
            html_escape(&error)
        ));
    }

    let code = match params.code {
        Some(c) => c,
        None => {
            return Html("<h1>Error</h1><p>No authorization code received.</p>".to_string())
        }
    };

    match exchange(&ctx, &code, params.state.as_deref()).await {
        Ok(location) => Html(format!(
            "<h1>Connected!</h1><p>Google Contacts authorized. <a href=\"{}\">Back to settings</a></p>",
            html_escape(&location)
        )),
        Err(e) => Html(format!(
            "<h1>Error</h1><p>Failed to connect: {}</p>",
            html_escape(&e.to_string())
        )),
    }
}

async fn exchange(ctx: &Context, code: &str, state: Option<&str>) -> Result<String> {
    OAuthState::consume(ctx.settings().as_ref(), state).await?;
    let auth = ctx.google_auth().await?;
    let redirect = ctx
        .credentials()
        .await?
        .exchange_authorization_code(&auth, code)
        .await?;
    Ok(redirect.location)
}

fn html_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

async fn oauth_status(
    State(ctx): State<Arc<Context>>,
    headers: HeaderMap,
) -> ApiResult<Json<serde_json::Value>> {
    authorize(&ctx, &headers).await?;
    let credentials = ctx.credentials().await?;
    let state = credentials.authorization_state().await;

    // "Authorized as <email>" needs a live token; a rejected one just leaves it out.
    let email = if state == AuthorizationState::Authorized {
        match ctx.contacts().await?.token_info(None).await {
            Ok(info) => info.email,
            Err(e) => {
                tracing::debug!(error = %e, "token info unavailable");
                None
            }
        }
    } else {
        None
    };

    Ok(Json(json!({ "state": state, "email": email })))
}

async fn oauth_remove(
    State(ctx): State<Arc<Context>>,
    headers: HeaderMap,
) -> ApiResult<Json<serde_json::Value>> {
    authorize(&ctx, &headers).await?;
    let redirect = ctx.credentials().await?.remove_authorization().await?;
    Ok(Json(json!({ "location": redirect.location })))
}

async fn authorize(ctx: &Context, headers: &HeaderMap) -> Result<()> {
    let presented = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    ctx.admin().verify_bearer(presented).await
}

async fn list_contacts(
    State(ctx): State<Arc<Context>>,
    headers: HeaderMap,
) -> ApiResult<Json<serde_json::Value>> {
    authorize(&ctx, &headers).await?;
    let page = ctx.contacts().await?.list_connections(None).await?;
    Ok(Json(json!(page)))
}

async fn create_contact(
    State(ctx): State<Arc<Context>>,
    headers: HeaderMap,
    body: std::result::Result<Json<NewContact>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<serde_json::Value>)> {
    authorize(&ctx, &headers).await?;
    let Json(contact) = body.map_err(|e| WPeopleError::InvalidRequest(e.body_text()))?;
    if contact.name.trim().is_empty() {
        return Err(WPeopleError::MissingArgument("name").into());
    }
    let person = ctx.contacts().await?.create_contact(&contact).await?;
    Ok((StatusCode::CREATED, Json(json!(person))))
}

pub fn router(ctx: Arc<Context>) -> Router {
    Router::new()
        .route("/oauth/callback", get(oauth_callback))
        .route("/oauth/status", get(oauth_status))
        .route("/oauth/remove", post(oauth_remove))
        .route("/contacts", get(list_contacts).post(create_contact))
        .with_state(ctx)
}

/// Serve the router on an already-bound listener until the process exits.
pub async fn serve(listener: tokio::net::TcpListener, ctx: Arc<Context>) -> Result<()> {
    axum::serve(listener, router(ctx))
        .await
        .map_err(|e| WPeopleError::Request(format!("http server error: {e}")))
}

/// Start the OAuth callback and contacts HTTP server.
pub async fn start_server(port: u16, ctx: Arc<Context>) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .map_err(|e| WPeopleError::Config(format!("failed to bind port {port}: {e}")))?;

    tracing::info!(port, "listening");
    serve(listener, ctx).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_escape() {
        assert_eq!(
            html_escape(r#"<script>alert("x" & 'y')</script>"#),
            "&lt;script&gt;alert(&quot;x&quot; &amp; &#39;y&#39;)&lt;/script&gt;"
        );
        assert_eq!(html_escape("access_denied"), "access_denied");
    }
}
