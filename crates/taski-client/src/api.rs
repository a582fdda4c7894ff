use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use taski_core::checklist::{
    ChecklistItem, CreateChecklistItem, ReorderChecklist, UpdateChecklistItem,
};
use taski_core::comment::{Comment, CommentInput};
use taski_core::dependency::{CreateDependency, Dependency, UpdateDependency};
use taski_core::task::{Task, TaskFilter, TaskInput};
use taski_core::user::{LoginRequest, RegisterRequest, RegisterResponse, TokenPair};
use taski_core::{Session, User};
use tracing::{debug, warn};

use crate::error::extract_error_message;
use crate::http::{HttpClient, RequestOptions};
use crate::token_store::TokenStore;
use crate::ClientError;

/// Typed operations against the Taski REST API.
///
/// The terminal front end programs against this trait through
/// `BlockingApiClient`; `ApiClient` is the HTTP implementation.
#[async_trait]
pub trait TaskApi: Send + Sync {
    // -- Auth --
    async fn login(&self, username: &str, password: &str) -> Result<Session, ClientError>;
    async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<Session, ClientError>;
    async fn current_user(&self) -> Result<User, ClientError>;
    fn logout(&self) -> Result<(), ClientError>;

    // -- Tasks --
    async fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>, ClientError>;
    async fn get_task(&self, id: i64) -> Result<Task, ClientError>;
    async fn create_task(&self, input: &TaskInput) -> Result<Task, ClientError>;
    async fn update_task(&self, id: i64, input: &TaskInput) -> Result<Task, ClientError>;
    async fn delete_task(&self, id: i64) -> Result<(), ClientError>;

    // -- Comments --
    async fn list_comments(&self, task_id: i64) -> Result<Vec<Comment>, ClientError>;
    async fn create_comment(&self, task_id: i64, content: &str) -> Result<Comment, ClientError>;
    async fn update_comment(
        &self,
        task_id: i64,
        id: i64,
        content: &str,
    ) -> Result<Comment, ClientError>;
    async fn delete_comment(&self, task_id: i64, id: i64) -> Result<(), ClientError>;

    // -- Checklist --
    async fn list_checklist(&self, task_id: i64) -> Result<Vec<ChecklistItem>, ClientError>;
    async fn create_checklist_item(
        &self,
        task_id: i64,
        text: &str,
    ) -> Result<ChecklistItem, ClientError>;
    async fn update_checklist_item(
        &self,
        task_id: i64,
        id: i64,
        text: &str,
    ) -> Result<ChecklistItem, ClientError>;
    async fn delete_checklist_item(&self, task_id: i64, id: i64) -> Result<(), ClientError>;
    async fn complete_checklist_item(
        &self,
        task_id: i64,
        id: i64,
    ) -> Result<ChecklistItem, ClientError>;
    async fn incomplete_checklist_item(
        &self,
        task_id: i64,
        id: i64,
    ) -> Result<ChecklistItem, ClientError>;
    async fn reorder_checklist(
        &self,
        task_id: i64,
        order: &[i64],
    ) -> Result<Vec<ChecklistItem>, ClientError>;

    // -- Dependencies --
    async fn list_dependencies(&self, task_id: i64) -> Result<Vec<Dependency>, ClientError>;
    async fn create_dependency(
        &self,
        task_id: i64,
        input: &CreateDependency,
    ) -> Result<Dependency, ClientError>;
    async fn update_dependency(
        &self,
        task_id: i64,
        id: i64,
        update: &UpdateDependency,
    ) -> Result<Dependency, ClientError>;
    async fn delete_dependency(&self, task_id: i64, id: i64) -> Result<(), ClientError>;
    async fn toggle_dependency(&self, task_id: i64, id: i64) -> Result<Dependency, ClientError>;
    async fn list_blockers(&self, task_id: i64) -> Result<Vec<Task>, ClientError>;
    async fn list_blocked(&self, task_id: i64) -> Result<Vec<Task>, ClientError>;
}

/// HTTP implementation of `TaskApi`.
pub struct ApiClient {
    http: HttpClient,
}

impl ApiClient {
    pub fn new(base_url: &str, store: Arc<dyn TokenStore>) -> Result<Self, ClientError> {
        Ok(Self {
            http: HttpClient::new(base_url, store)?,
        })
    }

    pub fn http(&self) -> &HttpClient {
        &self.http
    }

    pub fn session(&self) -> Option<Session> {
        self.http.session()
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        fallback: &str,
    ) -> Result<T, ClientError> {
        let resp = self.http.request(Method::GET, path, None).await?;
        handle_response(resp, fallback).await
    }

    async fn send_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: &B,
        fallback: &str,
    ) -> Result<T, ClientError> {
        let resp = self.http.request(method, path, Some(to_value(body)?)).await?;
        handle_response(resp, fallback).await
    }

    /// POST with no body, for action endpoints like `complete/`.
    async fn post_action<T: DeserializeOwned>(
        &self,
        path: &str,
        fallback: &str,
    ) -> Result<T, ClientError> {
        let resp = self.http.request(Method::POST, path, None).await?;
        handle_response(resp, fallback).await
    }

    async fn delete_req(&self, path: &str, fallback: &str) -> Result<(), ClientError> {
        let resp = self.http.request(Method::DELETE, path, None).await?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(parse_error(resp, fallback).await)
        }
    }

    async fn anonymous_post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
        fallback: &str,
    ) -> Result<T, ClientError> {
        let resp = self
            .http
            .request_with(
                Method::POST,
                path,
                Some(to_value(body)?),
                RequestOptions::anonymous(),
            )
            .await?;
        handle_response(resp, fallback).await
    }
}

fn to_value<B: Serialize + ?Sized>(body: &B) -> Result<Value, ClientError> {
    serde_json::to_value(body).map_err(|e| ClientError::Internal(format!("json encode: {e}")))
}

/// `/tasks/` with the filter's query string, e.g. `/tasks/?status=DONE`.
pub(crate) fn tasks_path(filter: &TaskFilter) -> String {
    let pairs = filter.query_pairs();
    if pairs.is_empty() {
        return "/tasks/".to_string();
    }
    let qs = url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs.iter().map(|(k, v)| (*k, v.as_str())))
        .finish();
    format!("/tasks/?{qs}")
}

async fn handle_response<T: DeserializeOwned>(
    resp: Response,
    fallback: &str,
) -> Result<T, ClientError> {
    let status = resp.status();
    if status.is_success() {
        resp.json::<T>()
            .await
            .map_err(|e| ClientError::Internal(format!("json decode: {e}")))
    } else {
        Err(parse_error_with_status(status, resp, fallback).await)
    }
}

async fn parse_error(resp: Response, fallback: &str) -> ClientError {
    let status = resp.status();
    parse_error_with_status(status, resp, fallback).await
}

async fn parse_error_with_status(
    status: StatusCode,
    resp: Response,
    fallback: &str,
) -> ClientError {
    let body = resp.text().await.unwrap_or_default();
    let message = extract_error_message(&body, fallback);
    debug!("request failed with {status}: {message}");

    if status == StatusCode::NOT_FOUND {
        ClientError::NotFound(message)
    } else {
        ClientError::Api {
            status: status.as_u16(),
            message,
        }
    }
}

#[async_trait]
impl TaskApi for ApiClient {
    async fn login(&self, username: &str, password: &str) -> Result<Session, ClientError> {
        let pair: TokenPair = self
            .anonymous_post(
                "/auth/login/",
                &LoginRequest {
                    username: username.to_string(),
                    password: password.to_string(),
                },
                "Login failed. Please check your credentials.",
            )
            .await?;
        self.http.set_session(Session {
            access_token: pair.access,
            refresh_token: pair.refresh,
            user: None,
        })?;

        // Tokens are good even if the profile fetch fails.
        if let Err(e) = self.current_user().await {
            warn!("logged in but could not fetch user: {e}");
        }
        self.http
            .session()
            .ok_or_else(|| ClientError::Auth("session lost after login".into()))
    }

    async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<Session, ClientError> {
        let resp: RegisterResponse = self
            .anonymous_post(
                "/auth/register/",
                &RegisterRequest {
                    username: username.to_string(),
                    email: email.to_string(),
                    password: password.to_string(),
                },
                "Registration failed. Please try again.",
            )
            .await?;
        let session = Session {
            access_token: resp.tokens.access,
            refresh_token: resp.tokens.refresh,
            user: Some(resp.user),
        };
        self.http.set_session(session.clone())?;
        Ok(session)
    }

    async fn current_user(&self) -> Result<User, ClientError> {
        let user: User = self
            .get_json("/auth/user/", "Failed to fetch user")
            .await?;
        self.http.set_user(user.clone())?;
        Ok(user)
    }

    fn logout(&self) -> Result<(), ClientError> {
        self.http.clear_session()
    }

    async fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>, ClientError> {
        self.get_json(&tasks_path(filter), "Failed to fetch tasks")
            .await
    }

    async fn get_task(&self, id: i64) -> Result<Task, ClientError> {
        self.get_json(&format!("/tasks/{id}/"), "Failed to fetch task")
            .await
    }

    async fn create_task(&self, input: &TaskInput) -> Result<Task, ClientError> {
        self.send_json(Method::POST, "/tasks/", input, "Failed to create task")
            .await
    }

    async fn update_task(&self, id: i64, input: &TaskInput) -> Result<Task, ClientError> {
        self.send_json(
            Method::PATCH,
            &format!("/tasks/{id}/"),
            input,
            "Failed to update task",
        )
        .await
    }

    async fn delete_task(&self, id: i64) -> Result<(), ClientError> {
        self.delete_req(&format!("/tasks/{id}/"), "Failed to delete task")
            .await
    }

    async fn list_comments(&self, task_id: i64) -> Result<Vec<Comment>, ClientError> {
        self.get_json(
            &format!("/tasks/{task_id}/comments/"),
            "Failed to fetch task comments",
        )
        .await
    }

    async fn create_comment(&self, task_id: i64, content: &str) -> Result<Comment, ClientError> {
        self.send_json(
            Method::POST,
            &format!("/tasks/{task_id}/comments/"),
            &CommentInput {
                content: content.to_string(),
            },
            "Failed to create comment",
        )
        .await
    }

    async fn update_comment(
        &self,
        task_id: i64,
        id: i64,
        content: &str,
    ) -> Result<Comment, ClientError> {
        self.send_json(
            Method::PUT,
            &format!("/tasks/{task_id}/comments/{id}/"),
            &CommentInput {
                content: content.to_string(),
            },
            "Failed to update comment",
        )
        .await
    }

    async fn delete_comment(&self, task_id: i64, id: i64) -> Result<(), ClientError> {
        self.delete_req(
            &format!("/tasks/{task_id}/comments/{id}/"),
            "Failed to delete comment",
        )
        .await
    }

    async fn list_checklist(&self, task_id: i64) -> Result<Vec<ChecklistItem>, ClientError> {
        self.get_json(
            &format!("/tasks/{task_id}/checklist/"),
            "Failed to fetch checklist",
        )
        .await
    }

    async fn create_checklist_item(
        &self,
        task_id: i64,
        text: &str,
    ) -> Result<ChecklistItem, ClientError> {
        self.send_json(
            Method::POST,
            &format!("/tasks/{task_id}/checklist/"),
            &CreateChecklistItem {
                text: text.to_string(),
            },
            "Failed to add checklist item",
        )
        .await
    }

    async fn update_checklist_item(
        &self,
        task_id: i64,
        id: i64,
        text: &str,
    ) -> Result<ChecklistItem, ClientError> {
        self.send_json(
            Method::PATCH,
            &format!("/tasks/{task_id}/checklist/{id}/"),
            &UpdateChecklistItem {
                text: Some(text.to_string()),
            },
            "Failed to update checklist item",
        )
        .await
    }

    async fn delete_checklist_item(&self, task_id: i64, id: i64) -> Result<(), ClientError> {
        self.delete_req(
            &format!("/tasks/{task_id}/checklist/{id}/"),
            "Failed to delete checklist item",
        )
        .await
    }

    async fn complete_checklist_item(
        &self,
        task_id: i64,
        id: i64,
    ) -> Result<ChecklistItem, ClientError> {
        self.post_action(
            &format!("/tasks/{task_id}/checklist/{id}/complete/"),
            "Failed to complete checklist item",
        )
        .await
    }

    async fn incomplete_checklist_item(
        &self,
        task_id: i64,
        id: i64,
    ) -> Result<ChecklistItem, ClientError> {
        self.post_action(
            &format!("/tasks/{task_id}/checklist/{id}/incomplete/"),
            "Failed to reopen checklist item",
        )
        .await
    }

    async fn reorder_checklist(
        &self,
        task_id: i64,
        order: &[i64],
    ) -> Result<Vec<ChecklistItem>, ClientError> {
        self.send_json(
            Method::POST,
            &format!("/tasks/{task_id}/checklist/reorder/"),
            &ReorderChecklist {
                order: order.to_vec(),
            },
            "Failed to reorder checklist",
        )
        .await
    }

    async fn list_dependencies(&self, task_id: i64) -> Result<Vec<Dependency>, ClientError> {
        self.get_json(
            &format!("/tasks/{task_id}/dependencies/"),
            "Failed to fetch dependencies",
        )
        .await
    }

    async fn create_dependency(
        &self,
        task_id: i64,
        input: &CreateDependency,
    ) -> Result<Dependency, ClientError> {
        self.send_json(
            Method::POST,
            &format!("/tasks/{task_id}/dependencies/"),
            input,
            "Failed to add dependency",
        )
        .await
    }

    async fn update_dependency(
        &self,
        task_id: i64,
        id: i64,
        update: &UpdateDependency,
    ) -> Result<Dependency, ClientError> {
        self.send_json(
            Method::PATCH,
            &format!("/tasks/{task_id}/dependencies/{id}/"),
            update,
            "Failed to update dependency",
        )
        .await
    }

    async fn delete_dependency(&self, task_id: i64, id: i64) -> Result<(), ClientError> {
        self.delete_req(
            &format!("/tasks/{task_id}/dependencies/{id}/"),
            "Failed to remove dependency",
        )
        .await
    }

    async fn toggle_dependency(&self, task_id: i64, id: i64) -> Result<Dependency, ClientError> {
        self.post_action(
            &format!("/tasks/{task_id}/dependencies/{id}/toggle/"),
            "Failed to toggle dependency",
        )
        .await
    }

    async fn list_blockers(&self, task_id: i64) -> Result<Vec<Task>, ClientError> {
        self.get_json(
            &format!("/tasks/{task_id}/blockers/"),
            "Failed to fetch blocking tasks",
        )
        .await
    }

    async fn list_blocked(&self, task_id: i64) -> Result<Vec<Task>, ClientError> {
        self.get_json(
            &format!("/tasks/{task_id}/blocked/"),
            "Failed to fetch blocked tasks",
        )
        .await
    }
}
