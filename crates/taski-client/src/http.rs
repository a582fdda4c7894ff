use std::sync::{Arc, Mutex};

use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde_json::Value;
use taski_core::user::{RefreshRequest, RefreshResponse};
use taski_core::{Session, User};
use tracing::{debug, error, info, warn};

use crate::token_store::TokenStore;
use crate::ClientError;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000/api";

const REFRESH_PATH: &str = "/auth/refresh/";

/// Per-request switches.
#[derive(Debug, Clone, Copy)]
pub struct RequestOptions {
    /// Attach the bearer token and refresh on 401.
    pub authenticated: bool,
}

impl RequestOptions {
    /// For login, register and refresh: no token, no refresh on 401.
    pub fn anonymous() -> Self {
        Self {
            authenticated: false,
        }
    }
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            authenticated: true,
        }
    }
}

/// Authenticated JSON requests against the Taski API.
///
/// Holds the in-memory mirror of the session, loaded once from the
/// `TokenStore` at construction. A 401 on an authenticated request triggers a
/// single refresh and a single retry. There is no coordination between
/// concurrent callers: each one that sees a 401 refreshes on its own.
pub struct HttpClient {
    base_url: String,
    client: Client,
    store: Arc<dyn TokenStore>,
    session: Mutex<Option<Session>>,
}

impl HttpClient {
    pub fn new(base_url: &str, store: Arc<dyn TokenStore>) -> Result<Self, ClientError> {
        let base_url = base_url.trim_end_matches('/').to_string();
        let session = store.load()?;
        if session.is_some() {
            debug!("restored stored session");
        }
        Ok(Self {
            base_url,
            client: Client::new(),
            store,
            session: Mutex::new(session),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn session(&self) -> Option<Session> {
        self.session.lock().ok().and_then(|s| s.clone())
    }

    pub fn is_authenticated(&self) -> bool {
        self.session().is_some()
    }

    pub fn current_user(&self) -> Option<User> {
        self.session().and_then(|s| s.user)
    }

    /// Replace the session in memory and in the store.
    pub fn set_session(&self, session: Session) -> Result<(), ClientError> {
        self.store.save(&session)?;
        let mut guard = self.lock_session()?;
        *guard = Some(session);
        Ok(())
    }

    /// Attach the current user to the existing session and persist it.
    pub fn set_user(&self, user: User) -> Result<(), ClientError> {
        let updated = {
            let mut guard = self.lock_session()?;
            match guard.as_mut() {
                Some(session) => {
                    session.user = Some(user);
                    session.clone()
                }
                None => return Ok(()),
            }
        };
        self.store.save(&updated)?;
        Ok(())
    }

    /// Forget the session in memory and in the store.
    pub fn clear_session(&self) -> Result<(), ClientError> {
        if let Ok(mut guard) = self.session.lock() {
            *guard = None;
        }
        self.store.clear()?;
        Ok(())
    }

    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Response, ClientError> {
        self.request_with(method, path, body, RequestOptions::default())
            .await
    }

    pub async fn request_with(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        opts: RequestOptions,
    ) -> Result<Response, ClientError> {
        let body = body
            .map(|v| serde_json::to_vec(&v))
            .transpose()
            .map_err(|e| ClientError::Internal(format!("json encode: {e}")))?;

        let token = if opts.authenticated {
            self.access_token()
        } else {
            None
        };
        let resp = self
            .send_once(method.clone(), path, body.as_deref(), token.as_deref())
            .await?;

        if !opts.authenticated || resp.status() != StatusCode::UNAUTHORIZED {
            return Ok(resp);
        }

        debug!("{method} {path} returned 401, refreshing access token");
        match self.refresh_access_token().await {
            Some(fresh) => {
                self.send_once(method, path, body.as_deref(), Some(&fresh))
                    .await
            }
            None => {
                warn!("token refresh failed, clearing session");
                if let Err(e) = self.clear_session() {
                    error!("failed to clear stored session: {e}");
                }
                Err(ClientError::Auth(
                    "Authentication failed. Please log in again.".into(),
                ))
            }
        }
    }

    fn lock_session(&self) -> Result<std::sync::MutexGuard<'_, Option<Session>>, ClientError> {
        self.session
            .lock()
            .map_err(|_| ClientError::Internal("session lock poisoned".into()))
    }

    fn access_token(&self) -> Option<String> {
        self.session().map(|s| s.access_token)
    }

    fn refresh_token(&self) -> Option<String> {
        self.session()
            .map(|s| s.refresh_token)
            .filter(|t| !t.is_empty())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn with_headers(&self, builder: RequestBuilder, token: Option<&str>) -> RequestBuilder {
        let builder = builder.header("Content-Type", "application/json");
        match token {
            Some(token) => builder.header("Authorization", format!("Bearer {token}")),
            None => builder,
        }
    }

    async fn send_once(
        &self,
        method: Method,
        path: &str,
        body: Option<&[u8]>,
        token: Option<&str>,
    ) -> Result<Response, ClientError> {
        let builder = self.client.request(method, self.url(path));
        let builder = match body {
            Some(bytes) => builder.body(bytes.to_vec()),
            None => builder,
        };
        self.with_headers(builder, token)
            .send()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))
    }

    /// Exchange the refresh token for a new access token and persist it.
    /// Returns `None` on any failure; the caller decides what that means.
    async fn refresh_access_token(&self) -> Option<String> {
        let refresh = self.refresh_token()?;
        let body = serde_json::to_vec(&RefreshRequest { refresh }).ok()?;

        let resp = match self
            .send_once(Method::POST, REFRESH_PATH, Some(&body), None)
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                warn!("token refresh request failed: {e}");
                return None;
            }
        };
        if !resp.status().is_success() {
            info!("token refresh rejected: {}", resp.status());
            return None;
        }
        let access = match resp.json::<RefreshResponse>().await {
            Ok(r) => r.access,
            Err(e) => {
                warn!("token refresh returned unreadable body: {e}");
                return None;
            }
        };

        if let Ok(mut guard) = self.session.lock() {
            if let Some(session) = guard.as_mut() {
                session.access_token = access.clone();
            }
        }
        if let Err(e) = self.store.save_access_token(&access) {
            error!("failed to persist refreshed access token: {e}");
        }
        debug!("access token refreshed");
        Some(access)
    }
}
