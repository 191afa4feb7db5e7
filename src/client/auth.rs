//! Auth service: login, register, refresh and profile calls

use std::sync::Arc;

use super::{ApiClient, ApiRequest};
use crate::error::{ApiError, ApiResult};
use crate::models::{Credentials, Registration, TokenPair, UserProfile};
use crate::session::{EndReason, SessionManager};

/// Account operations against `/users`
#[derive(Clone)]
pub struct AuthService {
    client: Arc<ApiClient>,
}

impl AuthService {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self { client }
    }

    fn session(&self) -> &Arc<SessionManager> {
        self.client.session()
    }

    /// Exchange credentials for tokens and start an authenticated session
    pub async fn login(&self, email: &str, password: &str) -> ApiResult<TokenPair> {
        self.session().begin_login().await?;

        let credentials = Credentials {
            email: email.trim().to_string(),
            password: password.to_string(),
        };
        let request = match ApiRequest::post("/users/login", &credentials) {
            Ok(request) => request.anonymous(),
            Err(e) => {
                self.session().abort_login().await;
                return Err(e);
            }
        };

        let tokens: TokenPair = match self.client.send_json(request).await {
            Ok(tokens) => tokens,
            Err(e) => {
                tracing::info!(email = %credentials.email, error = %e, "Login failed");
                self.session().abort_login().await;
                return Err(e);
            }
        };

        if let Err(e) = self.session().establish(tokens.clone()).await {
            self.session().abort_login().await;
            return Err(e.into());
        }

        Ok(tokens)
    }

    /// Create an account; no tokens are issued
    pub async fn register(&self, email: &str, full_name: &str, password: &str) -> ApiResult<UserProfile> {
        let registration = Registration {
            email: email.trim().to_string(),
            full_name: full_name.trim().to_string(),
            password: password.to_string(),
        };
        let request = ApiRequest::post("/users/register", &registration)?.anonymous();
        let user: UserProfile = self.client.send_json(request).await?;

        tracing::info!(user_id = %user.id, "Registered account");
        Ok(user)
    }

    /// Exchange a refresh token for a new pair without touching the session
    pub async fn refresh(&self, refresh_token: &str) -> ApiResult<TokenPair> {
        self.client.request_refresh(refresh_token).await
    }

    /// `GET /users/{id}`
    pub async fn get_user(&self, user_id: &str) -> ApiResult<UserProfile> {
        self.client
            .get(&format!("/users/{}", urlencoding::encode(user_id)))
            .await
    }

    /// Fetch and cache the profile of the token subject
    ///
    /// A token without a subject, or a subject whose profile cannot be
    /// fetched, ends the session.
    pub async fn load_profile(&self) -> ApiResult<UserProfile> {
        let subject = self.session().claims().await.and_then(|c| c.sub);
        let Some(subject) = subject else {
            if self.session().state().await.has_credentials() {
                self.session().end(EndReason::InvalidToken).await;
                return Err(ApiError::SessionExpired);
            }
            return Err(ApiError::NotAuthenticated);
        };

        match self.get_user(&subject).await {
            Ok(user) => {
                self.session().set_user(user.clone()).await?;
                Ok(user)
            }
            Err(e) => {
                if !matches!(e, ApiError::SessionExpired) {
                    self.session().end(EndReason::ProfileUnavailable).await;
                }
                Err(e)
            }
        }
    }

    pub async fn logout(&self) {
        self.session().end(EndReason::LoggedOut).await;
    }
}
