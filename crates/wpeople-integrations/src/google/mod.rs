pub mod contacts;
pub mod credentials;
pub mod oauth;

pub use contacts::ContactsClient;
pub use credentials::CredentialStore;
pub use oauth::{AuthCodeExchange, GoogleAuth};
