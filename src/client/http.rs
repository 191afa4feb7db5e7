//! HTTP client wrapper
//!
//! Attaches the bearer credential to every authenticated request and
//! recovers from a 401 with a single refresh-and-retry. A retried request
//! keeps its method, path, query and body; only the credential changes.

use async_trait::async_trait;
use reqwest::{Method, Response, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::config::ApiConfig;
use crate::error::{ApiError, ApiResult};
use crate::models::TokenPair;
use crate::session::{EndReason, SessionManager, TokenRenewer};

/// A request description that can be replayed
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    body: Option<serde_json::Value>,
    authenticated: bool,
}

impl ApiRequest {
    fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            authenticated: true,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn post<B: Serialize>(path: impl Into<String>, body: &B) -> ApiResult<Self> {
        let mut request = Self::new(Method::POST, path);
        request.body = Some(serde_json::to_value(body)?);
        Ok(request)
    }

    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    /// Send without credentials and without the 401 recovery
    pub fn anonymous(mut self) -> Self {
        self.authenticated = false;
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

/// REST client bound to one session
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    session: Arc<SessionManager>,
}

impl ApiClient {
    pub fn new(config: &ApiConfig, session: Arc<SessionManager>) -> ApiResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(concat!("energy-dash/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ApiError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self::with_http(http, &config.base_url, session))
    }

    pub fn with_http(http: reqwest::Client, base_url: &str, session: Arc<SessionManager>) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            session,
        }
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        self.send_json(ApiRequest::get(path)).await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> ApiResult<T> {
        self.send_json(ApiRequest::post(path, body)?).await
    }

    pub async fn delete(&self, path: &str) -> ApiResult<()> {
        self.send_empty(ApiRequest::delete(path)).await
    }

    /// Send and decode the JSON response body
    pub async fn send_json<T: DeserializeOwned>(&self, request: ApiRequest) -> ApiResult<T> {
        let response = self.execute(&request).await?;
        let response = check_status(response).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| ApiError::Decode(format!("{} {}: {e}", request.method, request.path)))
    }

    /// Send and discard the response body
    pub async fn send_empty(&self, request: ApiRequest) -> ApiResult<()> {
        let response = self.execute(&request).await?;
        check_status(response).await?;
        Ok(())
    }

    async fn execute(&self, request: &ApiRequest) -> ApiResult<Response> {
        let credential = if request.authenticated {
            Some(
                self.session
                    .access_token()
                    .await
                    .ok_or(ApiError::NotAuthenticated)?,
            )
        } else {
            None
        };

        let response = self.dispatch(request, credential.as_deref()).await?;

        let Some(rejected) = credential else {
            return Ok(response);
        };
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        tracing::debug!(method = %request.method, path = %request.path, "Unauthorized, renewing credentials");
        let fresh = self.recover_credential(&rejected).await?;

        let retried = self.dispatch(request, Some(&fresh)).await?;
        if retried.status() == StatusCode::UNAUTHORIZED {
            tracing::warn!(path = %request.path, "Still unauthorized after token refresh");
            self.session.end(EndReason::Unauthorized).await;
            return Err(ApiError::SessionExpired);
        }

        Ok(retried)
    }

    async fn dispatch(&self, request: &ApiRequest, credential: Option<&str>) -> ApiResult<Response> {
        let url = format!("{}{}", self.base_url, request.path);
        let mut builder = self.http.request(request.method.clone(), &url);

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        if let Some(token) = credential {
            builder = builder.bearer_auth(token);
        }

        let response = builder.send().await.map_err(|e| {
            tracing::debug!(url = %url, error = %e, "Request failed");
            ApiError::from(e)
        })?;

        tracing::debug!(
            method = %request.method,
            path = %request.path,
            status = response.status().as_u16(),
            "API response"
        );
        Ok(response)
    }

    /// Credential to retry with after `rejected` got a 401
    ///
    /// Concurrent callers queue on the refresh lock; whoever comes second
    /// finds the token already rotated and reuses it.
    async fn recover_credential(&self, rejected: &str) -> ApiResult<String> {
        let _guard = self.session.refresh_lock().lock().await;

        match self.session.access_token().await {
            Some(current) if current != rejected => return Ok(current),
            Some(_) => {}
            None => return Err(ApiError::SessionExpired),
        }

        self.rotate_tokens().await
    }

    /// Exchange the refresh token for a new pair; the refresh lock must be held
    async fn rotate_tokens(&self) -> ApiResult<String> {
        let refresh = match self.session.begin_refresh().await {
            Ok(refresh) => refresh,
            Err(e) => {
                tracing::warn!(error = %e, "Cannot refresh session");
                self.session.end(EndReason::RefreshFailed).await;
                return Err(ApiError::SessionExpired);
            }
        };

        let tokens = match self.request_refresh(&refresh).await {
            Ok(tokens) => tokens,
            Err(e) => {
                tracing::warn!(error = %e, "Token refresh rejected");
                self.session.end(EndReason::RefreshFailed).await;
                return Err(ApiError::SessionExpired);
            }
        };

        let access = tokens.access_token.clone();
        if let Err(e) = self.session.complete_refresh(tokens).await {
            tracing::warn!(error = %e, "Could not store rotated tokens");
            self.session.end(EndReason::RefreshFailed).await;
            return Err(ApiError::SessionExpired);
        }

        Ok(access)
    }

    /// `POST /users/refresh`, bypassing the 401 recovery
    pub async fn request_refresh(&self, refresh_token: &str) -> ApiResult<TokenPair> {
        #[derive(Serialize)]
        struct RefreshRequest<'a> {
            refresh_token: &'a str,
        }

        let request = ApiRequest::post("/users/refresh", &RefreshRequest { refresh_token })?.anonymous();
        let response = check_status(self.dispatch(&request, None).await?).await?;
        response
            .json::<TokenPair>()
            .await
            .map_err(|e| ApiError::Decode(format!("{} {}: {e}", request.method, request.path)))
    }

    /// Rotate tokens now, outside of any failed request
    pub async fn renew_session(&self) -> ApiResult<()> {
        let _guard = self.session.refresh_lock().lock().await;
        self.rotate_tokens().await.map(|_| ())
    }
}

#[async_trait]
impl TokenRenewer for ApiClient {
    async fn renew(&self) -> ApiResult<()> {
        self.renew_session().await
    }
}

async fn check_status(response: Response) -> ApiResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(ApiError::Server {
        status: status.as_u16(),
        message: error_message(status, &body),
    })
}

/// Best human-readable message from an error body
fn error_message(status: StatusCode, body: &str) -> String {
    if let Ok(json) = serde_json::from_str::<serde_json::Value>(body) {
        if let Some(msg) = json.get("message").and_then(|m| m.as_str()) {
            return msg.to_string();
        }
        match json.get("detail") {
            Some(serde_json::Value::String(detail)) => return detail.clone(),
            // Validation errors: [{"loc": [...], "msg": "...", ...}]
            Some(serde_json::Value::Array(items)) => {
                let msgs: Vec<&str> = items
                    .iter()
                    .filter_map(|i| i.get("msg").and_then(|m| m.as_str()))
                    .collect();
                if !msgs.is_empty() {
                    return msgs.join("; ");
                }
            }
            _ => {}
        }
    }

    let trimmed = body.trim();
    if !trimmed.is_empty() {
        return trimmed.to_string();
    }

    status
        .canonical_reason()
        .map(str::to_string)
        .unwrap_or_else(|| format!("HTTP {}", status.as_u16()))
}
