//! Boletos Rust Client
//!
//! A Rust client library for the boletos REST backend, with bearer token
//! injection, single-flight token refresh, transparent replay of requests that
//! failed with 401, and a durable credential store.

pub mod api_client;
pub mod auth_state;
pub mod config;
pub mod credential_store;
pub mod error;
pub mod session;
pub mod transport;
pub mod types;

#[cfg(test)]
mod test_support;

pub use api_client::ApiClient;
pub use auth_state::{AuthSnapshot, AuthState};
pub use config::ClientConfig;
pub use credential_store::{CredentialKeys, CredentialStore, FileCredentialStore, MemoryCredentialStore};
pub use error::{ClientError, RefreshError, Result};
pub use session::{RequestAttempt, SessionCoordinator};
pub use transport::{FormPart, HttpRequest, HttpResponse, Method, RequestBody, ReqwestTransport, Transport};
pub use types::{
    Boleto, BoletoFilter, BoletoStatus, BoletoUpdate, Category, CategoryInput, MarkPaid, NewBoleto,
    ScanResult, Session, User,
};
