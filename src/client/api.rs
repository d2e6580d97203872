use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, Response, multipart};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::poller::MessageSource;
use super::session::Session;
use super::{ClientError, ClientResult};
use crate::models::channel::Channel;
use crate::models::message::MessageWithAuthor;
use crate::models::server::Server;
use crate::models::user::UserResponse;
use crate::services::upload::UploadResult;
use crate::utils::error::ErrorResponse;
use crate::utils::time::format_timestamp;

#[derive(Deserialize)]
struct LoginResponse {
    user: UserResponse,
    token: String,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMessage {
    pub channel_id: String,
    pub author_id: String,
    pub content: Option<String>,
    pub attachment_url: Option<String>,
    pub attachment_content_type: Option<String>,
}

/// Typed wrapper over the REST surface. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
        }
    }

    /// A copy of this client that authenticates as `session`.
    pub fn with_session(&self, session: &Session) -> Self {
        Self {
            token: Some(session.token().to_string()),
            ..self.clone()
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.base_url, path)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn check(response: Response) -> ClientResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorResponse>(&body)
            .map(|e| e.message)
            .unwrap_or(body);

        Err(ClientError::Api {
            status: status.as_u16(),
            message,
        })
    }

    async fn send_json<T: serde::de::DeserializeOwned>(&self, request: RequestBuilder) -> ClientResult<T> {
        let response = Self::check(self.authorize(request).send().await?).await?;
        Ok(response.json().await?)
    }

    pub async fn sign_in(&self, username: &str, password: &str) -> ClientResult<Session> {
        let response: LoginResponse = self
            .send_json(
                self.http
                    .post(self.url("/users/login"))
                    .json(&serde_json::json!({ "username": username, "password": password })),
            )
            .await?;

        Ok(Session::new(response.user, response.token))
    }

    pub async fn register(
        &self,
        invite_token: &str,
        username: &str,
        display_name: Option<&str>,
        password: &str,
    ) -> ClientResult<UserResponse> {
        self.send_json(self.http.post(self.url("/users/register")).json(&serde_json::json!({
            "inviteToken": invite_token,
            "username": username,
            "displayName": display_name,
            "password": password,
        })))
        .await
    }

    pub async fn user_servers(&self, user_id: &str) -> ClientResult<Vec<Server>> {
        self.send_json(self.http.get(self.url(&format!("/servers/user/{}", user_id))))
            .await
    }

    pub async fn server_channels(&self, server_id: &str) -> ClientResult<Vec<Channel>> {
        self.send_json(self.http.get(self.url(&format!("/channels/server/{}", server_id))))
            .await
    }

    pub async fn messages(
        &self,
        channel_id: &str,
        since: Option<DateTime<Utc>>,
        limit: Option<i64>,
    ) -> ClientResult<Vec<MessageWithAuthor>> {
        let mut query = Vec::new();
        if let Some(since) = since {
            query.push(("since", format_timestamp(since)));
        }
        if let Some(limit) = limit {
            query.push(("limit", limit.to_string()));
        }

        self.send_json(
            self.http
                .get(self.url(&format!("/messages/channel/{}", channel_id)))
                .query(&query),
        )
        .await
    }

    pub async fn send_message(&self, message: &NewMessage) -> ClientResult<MessageWithAuthor> {
        self.send_json(self.http.post(self.url("/messages")).json(message))
            .await
    }

    pub async fn delete_message(&self, id: &str) -> ClientResult<()> {
        let request = self.http.delete(self.url(&format!("/messages/{}", id)));
        Self::check(self.authorize(request).send().await?).await?;
        Ok(())
    }

    /// Uploads an image. Cancelling `cancel` drops the in-flight request, which
    /// makes the server discard whatever it already received.
    pub async fn upload(
        &self,
        bytes: Vec<u8>,
        file_name: &str,
        content_type: &str,
        cancel: &CancellationToken,
    ) -> ClientResult<UploadResult> {
        let part = multipart::Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(content_type)?;
        let form = multipart::Form::new().part("file", part);
        let request = self.http.post(self.url("/uploads")).multipart(form);

        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!("Upload of {} cancelled", file_name);
                Err(ClientError::Cancelled)
            }
            result = self.send_json(request) => result,
        }
    }
}

impl MessageSource for ApiClient {
    async fn fetch_since(
        &self,
        channel_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> ClientResult<Vec<MessageWithAuthor>> {
        self.messages(channel_id, since, None).await
    }
}
