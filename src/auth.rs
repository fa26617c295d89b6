use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use serde_json::Value as JsonValue;
use tokio::sync::watch;

use crate::error::Error;
use crate::gateway::{ApiRequest, Gateway};
use crate::session::AuthStatus;
use crate::types::{Role, TokenResponse, User};

const LOGIN_PATH: &str = "/auth/login";
const REGISTER_PATH: &str = "/auth/register";
const LOGOUT_PATH: &str = "/auth/logout";
const ME_PATH: &str = "/auth/me";

/// Minimum password length accepted at registration.
pub const MIN_PASSWORD_LEN: usize = 8;

#[derive(Serialize)]
struct Credentials<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct Registration<'a> {
    email: &'a str,
    password: &'a str,
    role: Role,
}

/// Login, registration, logout and startup rehydration for the UI layer.
///
/// ```rust,ignore
/// let auth = AuthContext::new(gateway);
/// auth.initialize().await;
///
/// match auth.login(&email, &password).await {
///     Ok(user) => router.navigate(dashboard_for(user.role)),
///     Err(e) => form.show_error(e.user_message()),
/// }
/// ```
pub struct AuthContext {
    gateway: Gateway,
    loading: AtomicBool,
}

impl AuthContext {
    /// Wrap a gateway. The context reports `is_loading() == true` until
    /// [`initialize`](Self::initialize) has run.
    #[must_use]
    pub fn new(gateway: Gateway) -> Self {
        Self {
            gateway,
            loading: AtomicBool::new(true),
        }
    }

    #[must_use]
    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    /// Rehydrate the session from durable storage.
    ///
    /// A stored token is loaded and confirmed with `GET /auth/me`. Any
    /// failure clears the session and leaves the context anonymous; this
    /// never fails.
    pub async fn initialize(&self) -> Option<User> {
        let session = self.gateway.session();

        let user = if session.load_stored().is_some() {
            session.begin_authenticating();
            match self.fetch_current_user().await {
                Ok(user) => {
                    tracing::info!(user_id = %user.id, role = %user.role, "Session restored");
                    session.set_user(user.clone());
                    Some(user)
                }
                Err(e) => {
                    tracing::debug!(error = %e, "Stored session is no longer valid");
                    session.clear();
                    None
                }
            }
        } else {
            session.clear();
            None
        };

        self.loading.store(false, Ordering::Release);
        user
    }

    /// Sign in and load the user profile. Any previous session is discarded
    /// first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for malformed input, or the gateway error
    /// of the login or profile call. On error no session is kept.
    pub async fn login(&self, email: &str, password: &str) -> Result<User, Error> {
        validate_credentials(email, password)?;
        self.start_new_session();
        let result = self.sign_in(email, password).await;
        self.finish(result)
    }

    /// Create an account, then sign in as it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for malformed input (including passwords
    /// shorter than [`MIN_PASSWORD_LEN`]), or the gateway error of any call.
    pub async fn register(&self, email: &str, password: &str, role: Role) -> Result<User, Error> {
        validate_registration(email, password)?;
        self.start_new_session();
        let result = self.sign_up(email, password, role).await;
        self.finish(result)
    }

    /// Sign out. The local session is cleared even if the backend call fails;
    /// that failure is still returned.
    ///
    /// # Errors
    ///
    /// Returns the gateway error of `POST /auth/logout`.
    pub async fn logout(&self) -> Result<(), Error> {
        let result = self.gateway.send_empty(ApiRequest::post(LOGOUT_PATH)).await;
        self.gateway.session().clear();
        match &result {
            Ok(()) => tracing::info!("Signed out"),
            Err(e) => tracing::warn!(error = %e, "Logout request failed, local session cleared"),
        }
        result
    }

    #[must_use]
    pub fn user(&self) -> Option<User> {
        self.gateway.session().user()
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn status(&self) -> AuthStatus {
        self.gateway.session().status()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AuthStatus> {
        self.gateway.session().subscribe()
    }

    /// Drop whatever session is left so the credential call goes out
    /// without a token and a rejection is never treated as an expiry.
    fn start_new_session(&self) {
        let session = self.gateway.session();
        session.clear();
        session.begin_authenticating();
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<User, Error> {
        let token: TokenResponse = self
            .gateway
            .send(ApiRequest::post(LOGIN_PATH).json(&Credentials { email, password })?)
            .await?;
        self.gateway.session().set_token(token.access_token);
        self.fetch_current_user().await
    }

    async fn sign_up(&self, email: &str, password: &str, role: Role) -> Result<User, Error> {
        let body: JsonValue = self
            .gateway
            .send(ApiRequest::post(REGISTER_PATH).json(&Registration {
                email,
                password,
                role,
            })?)
            .await?;

        // The backend may answer with the created user instead of a token.
        match body.get("access_token").and_then(JsonValue::as_str) {
            Some(token) => {
                self.gateway.session().set_token(token);
                self.fetch_current_user().await
            }
            None => self.sign_in(email, password).await,
        }
    }

    async fn fetch_current_user(&self) -> Result<User, Error> {
        self.gateway.send(ApiRequest::get(ME_PATH)).await
    }

    fn finish(&self, result: Result<User, Error>) -> Result<User, Error> {
        let session = self.gateway.session();
        match result {
            Ok(user) => {
                tracing::info!(user_id = %user.id, role = %user.role, "Signed in");
                session.set_user(user.clone());
                Ok(user)
            }
            Err(e) => {
                tracing::debug!(error = %e, "Authentication failed");
                session.clear();
                Err(e)
            }
        }
    }
}

impl std::fmt::Debug for AuthContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthContext")
            .field("gateway", &self.gateway)
            .field("loading", &self.is_loading())
            .finish()
    }
}

/// Validate login form input.
///
/// # Errors
///
/// Returns [`Error::Validation`] with a form-ready message.
pub fn validate_credentials(email: &str, password: &str) -> Result<(), Error> {
    if !is_plausible_email(email) {
        return Err(Error::Validation("Invalid email address".into()));
    }
    if password.is_empty() {
        return Err(Error::Validation("Password is required".into()));
    }
    Ok(())
}

/// Validate registration form input.
///
/// # Errors
///
/// Returns [`Error::Validation`] with a form-ready message.
pub fn validate_registration(email: &str, password: &str) -> Result<(), Error> {
    validate_credentials(email, password)?;
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(Error::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

fn is_plausible_email(email: &str) -> bool {
    let mut parts = email.split('@');
    matches!(
        (parts.next(), parts.next(), parts.next()),
        (Some(local), Some(domain), None)
            if !local.is_empty() && !domain.is_empty() && !email.contains(char::is_whitespace)
    )
}
