use std::sync::Arc;

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;

use super::navigator::{self, Navigator};
use super::request::{ApiRequest, Attempt};
use crate::config::ClientConfig;
use crate::error::{Error, parse_detail};
use crate::session::{SessionStore, TokenStorage};
use crate::types::TokenResponse;

/// Result of one dispatch that did not fail outright.
enum Outcome {
    Success(reqwest::Response),
    Unauthorized(Option<String>),
}

/// Authenticated request gateway.
///
/// Every call goes Attach → Dispatch, and on a 401 for a call that carried a
/// token, Refreshing → Retry. The retry is dispatched at most once and its
/// outcome is final. Concurrent 401s share a single refresh call.
///
/// Cloning is cheap; clones share the HTTP client, the session store and
/// the refresh lock.
#[derive(Clone)]
pub struct Gateway {
    http: reqwest::Client,
    config: Arc<ClientConfig>,
    session: Arc<SessionStore>,
    navigator: Option<Arc<dyn Navigator>>,
    refresh_lock: Arc<Mutex<()>>,
}

impl Gateway {
    /// Create a gateway over an existing session store.
    ///
    /// The HTTP client keeps a cookie store so the refresh cookie set at
    /// login is sent back to the refresh endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] if the HTTP client cannot be built.
    pub fn new(config: ClientConfig, session: Arc<SessionStore>) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(config.timeout)
            .build()?;
        Ok(Self {
            http,
            config: Arc::new(config),
            session,
            navigator: None,
            refresh_lock: Arc::new(Mutex::new(())),
        })
    }

    /// Create a gateway with a fresh session store over `storage`, using the
    /// configured token key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] if the HTTP client cannot be built.
    pub fn with_storage(config: ClientConfig, storage: Arc<dyn TokenStorage>) -> Result<Self, Error> {
        let session = Arc::new(SessionStore::new(storage, config.token_key.clone()));
        Self::new(config, session)
    }

    /// Use a custom HTTP client. It must keep cookies for refresh to work.
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    /// Install the navigator that receives login redirects.
    #[must_use]
    pub fn with_navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = Some(navigator);
        self
    }

    #[must_use]
    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    pub(crate) fn http_client(&self) -> &reqwest::Client {
        &self.http
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Send a request and decode a JSON response body.
    ///
    /// # Errors
    ///
    /// See [`execute`](Self::execute); also [`Error::Http`] if the body does
    /// not decode into `T`.
    pub async fn send<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, Error> {
        let response = self.execute(&request).await?;
        response.json::<T>().await.map_err(Into::into)
    }

    /// Send a request whose response body is ignored (e.g. `204 No Content`).
    ///
    /// # Errors
    ///
    /// See [`execute`](Self::execute).
    pub async fn send_empty(&self, request: ApiRequest) -> Result<(), Error> {
        self.execute(&request).await.map(drop)
    }

    /// Send a request, refreshing the session once if it is rejected.
    ///
    /// # Errors
    ///
    /// - [`Error::Unauthenticated`] on a 401 when no token was attached.
    /// - [`Error::SessionExpired`] on a 401 whose refresh failed. The
    ///   session is cleared and the navigator sent to the login view.
    /// - [`Error::Api`] for any other non-2xx response, including a 401 on
    ///   the refresh endpoint itself or on the retried call.
    /// - [`Error::Http`] on transport failure. Never retried.
    pub async fn execute(&self, request: &ApiRequest) -> Result<reqwest::Response, Error> {
        let (outcome, sent_token) = self.dispatch(request, Attempt::First).await?;
        let detail = match outcome {
            Outcome::Success(response) => return Ok(response),
            Outcome::Unauthorized(detail) => detail,
        };

        if self.config.is_refresh_path(&request.path) {
            return Err(unauthorized(request, detail));
        }
        let Some(sent_token) = sent_token else {
            return Err(Error::Unauthenticated { detail });
        };

        if let Err(e) = self.refresh(&sent_token).await {
            tracing::debug!(operation = %request.operation(), error = %e, "Giving up after failed refresh");
            return Err(Error::SessionExpired { detail });
        }

        match self.dispatch(request, Attempt::Retry).await?.0 {
            Outcome::Success(response) => Ok(response),
            Outcome::Unauthorized(detail) => Err(unauthorized(request, detail)),
        }
    }

    async fn dispatch(
        &self,
        request: &ApiRequest,
        attempt: Attempt,
    ) -> Result<(Outcome, Option<String>), Error> {
        let token = self.session.current_token();
        let url = self.config.endpoint(&request.path)?;

        let mut builder = self.http.request(request.method.clone(), url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        if let Some(token) = &token {
            builder = builder.bearer_auth(token);
        }

        tracing::debug!(
            method = %request.method,
            path = %request.path,
            attempt = attempt.as_str(),
            authenticated = token.is_some(),
            "Dispatching request"
        );
        let response = builder.send().await?;

        let status = response.status();
        if status.is_success() {
            return Ok((Outcome::Success(response), token));
        }
        let body = response.text().await.unwrap_or_default();
        let detail = parse_detail(&body);
        if status == StatusCode::UNAUTHORIZED {
            return Ok((Outcome::Unauthorized(detail), token));
        }
        Err(Error::Api {
            operation: request.operation(),
            status: status.as_u16(),
            detail,
        })
    }

    /// Replace `stale` with a fresh token, sharing the work with any
    /// concurrent caller holding the same stale token.
    async fn refresh(&self, stale: &str) -> Result<(), Error> {
        let guard = self.refresh_lock.clone().lock_owned().await;

        let (current, generation) = self.session.snapshot();
        match current {
            Some(current) if current != stale => {
                tracing::debug!("Access token already refreshed by a concurrent request");
                return Ok(());
            }
            // A concurrent refresh failed (or the user logged out meanwhile).
            None => return Err(Error::SessionExpired { detail: None }),
            Some(_) => {}
        }

        // Detached so that dropping the caller does not abort the refresh.
        let gateway = self.clone();
        let task = tokio::spawn(async move {
            let _guard = guard;
            gateway.refresh_now(generation).await
        });
        match task.await {
            Ok(result) => result,
            Err(e) => {
                self.session.mark_expired_if(generation);
                Err(Error::SessionExpired {
                    detail: Some(e.to_string()),
                })
            }
        }
    }

    /// Refresh on behalf of session `generation`. The outcome is applied only
    /// if no logout or new login replaced that session in the meantime.
    async fn refresh_now(&self, generation: u64) -> Result<(), Error> {
        match self.request_token().await {
            Ok(token) => {
                if self.session.set_token_if(generation, &token.access_token) {
                    tracing::info!("Access token refreshed");
                    Ok(())
                } else {
                    tracing::debug!("Session changed during refresh, discarding new token");
                    Err(Error::SessionExpired { detail: None })
                }
            }
            Err(e) => {
                if self.session.mark_expired_if(generation) {
                    tracing::warn!(error = %e, "Token refresh failed, clearing session");
                    self.redirect_to_login();
                } else {
                    tracing::debug!(error = %e, "Token refresh failed for a replaced session");
                }
                Err(e)
            }
        }
    }

    async fn request_token(&self) -> Result<TokenResponse, Error> {
        let url = self.config.endpoint(&self.config.refresh_path)?;
        let response = self
            .http
            .post(url)
            .json(&serde_json::json!({}))
            .send()
            .await?;

        let response = ensure_success(response, "token refresh").await?;
        response.json::<TokenResponse>().await.map_err(Into::into)
    }

    fn redirect_to_login(&self) {
        let Some(navigator) = &self.navigator else {
            return;
        };
        let login_path = &self.config.login_path;
        let current = navigator.current_path();
        if navigator::is_login_view(login_path, &current) {
            tracing::debug!(current = %current, "Already on login view, not redirecting");
            return;
        }
        navigator.navigate(&navigator::login_target(login_path, &current));
    }
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("base_url", &self.config.base_url.as_str())
            .field("session", &self.session)
            .field("navigator", &self.navigator.is_some())
            .finish_non_exhaustive()
    }
}

fn unauthorized(request: &ApiRequest, detail: Option<String>) -> Error {
    Error::Api {
        operation: request.operation(),
        status: StatusCode::UNAUTHORIZED.as_u16(),
        detail,
    }
}

/// Checks HTTP response status; returns the response on success or an error with details.
pub(crate) async fn ensure_success(
    response: reqwest::Response,
    operation: &'static str,
) -> Result<reqwest::Response, Error> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    Err(Error::Api {
        operation: operation.to_owned(),
        status,
        detail: parse_detail(&body),
    })
}
