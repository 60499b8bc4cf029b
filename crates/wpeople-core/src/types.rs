use serde::{Deserialize, Serialize};

/// Random 32-character hex identifier.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// OAuth client id/secret pair of a Google "web application" client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: String,
}

/// On-disk shape of `client_secret_<id>.json`, the same layout Google's
/// console download uses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialsFile {
    pub web: ClientCredentials,
}

/// Access token document as returned by the token endpoint.
/// Provider fields other than the two tokens are kept verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl TokenRecord {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
            extra: serde_json::Map::new(),
        }
    }

    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactGroup {
    pub resource_name: String,
    pub name: String,
    pub member_count: Option<u64>,
}

/// Where the user should be sent after a settings action completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Redirect {
    pub location: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationState {
    Unconfigured,
    CredentialsStored,
    Authorized,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub city: Option<String>,
    pub country: Option<String>,
    pub country_code: Option<String>,
}

/// Any part may be unknown; Google accepts birthdays without a year.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Birthday {
    pub year: Option<i32>,
    pub month: Option<u32>,
    pub day: Option<u32>,
}

/// Input for creating a contact.
///
/// `urls`, `events` and `user_defined` are free-form People API entries. An
/// array is sent as-is, a single object is sent as a one-element array, and
/// any other JSON value is sent as `[null]`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewContact {
    pub name: String,
    pub phone: String,
    pub email: String,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub address: Option<Address>,
    #[serde(default)]
    pub birthday: Option<Birthday>,
    #[serde(default)]
    pub urls: Option<serde_json::Value>,
    #[serde(default)]
    pub events: Option<serde_json::Value>,
    #[serde(default)]
    pub user_defined: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
    pub resource_name: String,
    pub etag: Option<String>,
    pub names: Vec<String>,
    pub phone_numbers: Vec<String>,
    pub email_addresses: Vec<String>,
    pub photos: Vec<String>,
    /// Full provider document.
    pub raw: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionsPage {
    pub connections: Vec<Person>,
    /// Provider cursor, returned untouched and never followed.
    pub next_page_token: Option<String>,
    pub total_items: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenInfo {
    pub email: Option<String>,
    pub audience: Option<String>,
    pub scope: Option<String>,
    pub expires_in: Option<i64>,
    pub raw: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_id_is_unique_hex() {
        let a = new_id();
        let b = new_id();
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn test_token_record_keeps_provider_fields() {
        let json = r#"{"access_token":"ya29.x","refresh_token":"1//r","expires_in":3599,"scope":"contacts","token_type":"Bearer","created":1700000000}"#;
        let record: TokenRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.access_token, "ya29.x");
        assert_eq!(record.refresh_token.as_deref(), Some("1//r"));
        assert_eq!(record.extra["expires_in"], 3599);

        let back = serde_json::to_value(&record).unwrap();
        assert_eq!(back["token_type"], "Bearer");
        assert_eq!(back["created"], 1700000000);
    }

    #[test]
    fn test_token_record_requires_access_token() {
        let result: Result<TokenRecord, _> = serde_json::from_str(r#"{"refresh_token":"r"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_credentials_file_layout() {
        let file = CredentialsFile {
            web: ClientCredentials {
                client_id: "id".to_string(),
                client_secret: "secret".to_string(),
            },
        };
        let value = serde_json::to_value(&file).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"web": {"client_id": "id", "client_secret": "secret"}})
        );
    }
}
