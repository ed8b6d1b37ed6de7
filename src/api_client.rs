//! Typed operations against the boletos backend
//!
//! Every resource call goes through [`SessionCoordinator::send`] and so benefits
//! from transparent token refresh. Login and logout talk to the transport directly.

use crate::auth_state::AuthState;
use crate::config::{
    ClientConfig, BOLETOS_PATH, CATEGORIES_PATH, LOGIN_PATH, LOGOUT_PATH,
};
use crate::credential_store::CredentialStore;
use crate::error::{ClientError, Result};
use crate::session::SessionCoordinator;
use crate::transport::{FormPart, HttpRequest, HttpResponse, ReqwestTransport, Transport};
use crate::types::*;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Turn a non-2xx response into `ClientError::Api`
///
/// Uses the envelope `message` when the backend sent one.
fn check_response(response: &HttpResponse) -> Result<()> {
    if response.is_success() {
        return Ok(());
    }
    let message = response
        .json::<ErrorEnvelope>()
        .ok()
        .and_then(|e| e.message)
        .unwrap_or_else(|| response.text());
    Err(ClientError::Api {
        status: response.status.as_u16(),
        message,
    })
}

fn decode<T: DeserializeOwned>(response: &HttpResponse) -> Result<T> {
    check_response(response)?;
    let envelope: ApiEnvelope<T> = response
        .json()
        .map_err(|e| ClientError::InvalidResponse(format!("unexpected response body: {e}")))?;
    Ok(envelope.data)
}

/// Client for the boletos REST API
pub struct ApiClient<T: Transport = ReqwestTransport> {
    session: SessionCoordinator<T>,
}

impl ApiClient<ReqwestTransport> {
    /// Create a client using reqwest with the configured timeout
    pub fn new(config: ClientConfig, store: Arc<dyn CredentialStore>) -> Result<Self> {
        let transport = ReqwestTransport::new(config.request_timeout)?;
        Ok(Self::with_transport(config, transport, store))
    }
}

impl<T: Transport> ApiClient<T> {
    pub fn with_transport(config: ClientConfig, transport: T, store: Arc<dyn CredentialStore>) -> Self {
        let session = SessionCoordinator::new(
            config,
            Arc::new(transport),
            store,
            Arc::new(AuthState::new()),
        );
        Self { session }
    }

    pub fn auth_state(&self) -> &Arc<AuthState> {
        self.session.auth_state()
    }

    pub fn session(&self) -> &SessionCoordinator<T> {
        &self.session
    }

    /// Load the persisted session, if any (call once at startup)
    pub fn restore_session(&self) -> Result<Option<User>> {
        self.session.restore()
    }

    /// Send an arbitrary request with bearer injection and transparent refresh
    pub async fn request(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.session.send(request).await
    }

    fn url(&self, path: &str) -> String {
        self.session.config().url(path)
    }

    /// Authenticate and persist the resulting session
    ///
    /// Invalid credentials come back as `ClientError::Api` with status 401; they
    /// never trigger a token refresh.
    pub async fn login(&self, email: &str, password: &str) -> Result<User> {
        let config = self.session.config();
        let request = HttpRequest::post(self.url(LOGIN_PATH))
            .with_header("X-Device-Info", config.device_info.as_str())
            .with_json(&LoginRequest { email, password })?;

        let response = self.session.transport().send(request).await?;
        let login: LoginResponse = decode(&response)?;

        let session = Session {
            access_token: login.access_token,
            refresh_token: Some(login.refresh_token),
            user: login.user,
        };
        self.session.establish(&session)?;

        info!(user_id = %session.user.id, "Logged in");
        Ok(session.user)
    }

    /// Notify the backend (best effort) and clear the local session unconditionally
    pub async fn logout(&self) {
        match self.session.stored_refresh_token() {
            Ok(Some(refresh_token)) => {
                if let Err(e) = self.notify_logout(&refresh_token).await {
                    warn!(error = %e, "Logout notification failed, clearing session anyway");
                }
            }
            Ok(None) => debug!("No refresh token stored, skipping logout notification"),
            Err(e) => warn!(error = %e, "Could not read refresh token for logout"),
        }

        self.session.teardown();
    }

    async fn notify_logout(&self, refresh_token: &str) -> Result<()> {
        let mut request = HttpRequest::post(self.url(LOGOUT_PATH))
            .with_json(&LogoutRequest { refresh_token })?;
        if let Some(token) = self.auth_state().access_token() {
            request.set_bearer(token);
        }
        let response = self.session.transport().send(request).await?;
        check_response(&response)
    }

    pub async fn list_boletos(&self, filter: &BoletoFilter) -> Result<Vec<Boleto>> {
        let request = HttpRequest::get(self.url(BOLETOS_PATH)).with_query(filter.query());
        let response = self.session.send(request).await?;
        decode(&response)
    }

    pub async fn get_boleto(&self, id: &str) -> Result<Boleto> {
        let request = HttpRequest::get(self.url(&format!("{BOLETOS_PATH}/{id}")));
        let response = self.session.send(request).await?;
        decode(&response)
    }

    pub async fn create_boleto(&self, boleto: &NewBoleto) -> Result<Boleto> {
        let request = HttpRequest::post(self.url(BOLETOS_PATH)).with_json(boleto)?;
        let response = self.session.send(request).await?;
        decode(&response)
    }

    pub async fn update_boleto(&self, id: &str, update: &BoletoUpdate) -> Result<Boleto> {
        let request = HttpRequest::put(self.url(&format!("{BOLETOS_PATH}/{id}"))).with_json(update)?;
        let response = self.session.send(request).await?;
        decode(&response)
    }

    pub async fn delete_boleto(&self, id: &str) -> Result<()> {
        let request = HttpRequest::delete(self.url(&format!("{BOLETOS_PATH}/{id}")));
        let response = self.session.send(request).await?;
        check_response(&response)
    }

    pub async fn mark_boleto_paid(&self, id: &str, payment: &MarkPaid) -> Result<Boleto> {
        let request =
            HttpRequest::patch(self.url(&format!("{BOLETOS_PATH}/{id}/pay"))).with_json(payment)?;
        let response = self.session.send(request).await?;
        decode(&response)
    }

    /// Upload a photo of a boleto and get the fields read from it
    pub async fn scan_boleto(&self, image: Vec<u8>, file_name: &str, mime: &str) -> Result<ScanResult> {
        let request = HttpRequest::post(self.url(&format!("{BOLETOS_PATH}/scan"))).with_multipart(vec![
            FormPart::File {
                name: "file".to_string(),
                file_name: file_name.to_string(),
                mime: mime.to_string(),
                bytes: image,
            },
        ]);
        let response = self.session.send(request).await?;
        decode(&response)
    }

    pub async fn list_categories(&self) -> Result<Vec<Category>> {
        let request = HttpRequest::get(self.url(CATEGORIES_PATH));
        let response = self.session.send(request).await?;
        decode(&response)
    }

    pub async fn create_category(&self, category: &CategoryInput) -> Result<Category> {
        let request = HttpRequest::post(self.url(CATEGORIES_PATH)).with_json(category)?;
        let response = self.session.send(request).await?;
        decode(&response)
    }

    pub async fn update_category(&self, id: &str, category: &CategoryInput) -> Result<Category> {
        let request =
            HttpRequest::put(self.url(&format!("{CATEGORIES_PATH}/{id}"))).with_json(category)?;
        let response = self.session.send(request).await?;
        decode(&response)
    }

    pub async fn delete_category(&self, id: &str) -> Result<()> {
        let request = HttpRequest::delete(self.url(&format!("{CATEGORIES_PATH}/{id}")));
        let response = self.session.send(request).await?;
        check_response(&response)
    }
}
