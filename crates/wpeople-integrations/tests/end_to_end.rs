use std::sync::Arc;

use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};
use wpeople_core::config::Config;
use wpeople_core::error::ErrorKind;
use wpeople_core::types::AuthorizationState;
use wpeople_integrations::context::Context;
use wpeople_integrations::settings::MemorySettingsStore;
use wpeople_integrations::SettingsStore;

fn config_for(server: &MockServer, dir: &tempfile::TempDir) -> Config {
    let mut config = Config::default();
    config.storage.dir = dir.path().to_string_lossy().to_string();
    config.google.people_api_url = server.uri();
    config.google.oauth_api_url = server.uri();
    config.google.token_url = format!("{}/token", server.uri());
    config.google.redirect_url = "https://example.com/wp-admin/options-general.php?page=wpeopleapi-setting".to_string();
    config.google.timeout_secs = 5;
    config
}

#[tokio::test]
async fn authorize_list_and_deauthorize() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("client_id=cid"))
        .and(body_string_contains("code=auth-code"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "ya29.e2e",
            "refresh_token": "1//e2e",
            "expires_in": 3599,
            "scope": "https://www.googleapis.com/auth/contacts",
            "token_type": "Bearer"
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1/people/me/connections"))
        .and(header("authorization", "Bearer ya29.e2e"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "connections": [{"resourceName": "people/c1", "names": [{"displayName": "Budi"}]}],
            "totalItems": 1
        })))
        .expect(1)
        .mount(&server)
        .await;

    let settings: Arc<dyn SettingsStore> = Arc::new(MemorySettingsStore::new());
    let ctx = Context::new(config_for(&server, &dir), settings.clone());

    let credentials = ctx.credentials().await.unwrap();
    assert_eq!(
        credentials.authorization_state().await,
        AuthorizationState::Unconfigured
    );

    let redirect = credentials
        .store_client_credentials("cid", "csecret")
        .await
        .unwrap();
    assert_eq!(redirect.location, ctx.config().google.redirect_url);
    assert!(credentials.has_valid_credentials_file().await);

    let auth = ctx.google_auth().await.unwrap();
    credentials
        .exchange_authorization_code(&auth, "auth-code")
        .await
        .unwrap();
    assert_eq!(
        credentials.authorization_state().await,
        AuthorizationState::Authorized
    );

    let page = ctx.contacts().await.unwrap().list_connections(None).await.unwrap();
    assert_eq!(page.connections[0].resource_name, "people/c1");

    credentials.remove_authorization().await.unwrap();
    assert!(!credentials.has_valid_credentials_file().await);

    let err = credentials.get_token().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert_eq!(settings.get("instance_prefix").await.unwrap(), None);
}

#[tokio::test]
async fn new_binding_after_deauthorize_uses_fresh_files() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let ctx = Context::new(
        config_for(&server, &dir),
        Arc::new(MemorySettingsStore::new()),
    );

    let first = ctx.credentials().await.unwrap();
    first.store_client_credentials("cid", "csecret").await.unwrap();
    first
        .store_token(&wpeople_core::types::TokenRecord::new("t"))
        .await
        .unwrap();
    first.remove_authorization().await.unwrap();

    let second = ctx.credentials().await.unwrap();
    assert_ne!(second.instance(), first.instance());
    assert_eq!(
        second.authorization_state().await,
        AuthorizationState::Unconfigured
    );
}
