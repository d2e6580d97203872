#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use huddle::api::AppState;
use huddle::config::Config;
use huddle::server::route_builder::{init_state, register_routes};
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;

pub const ADMIN_USERNAME: &str = "admin";
pub const ADMIN_PASSWORD: &str = "admin-password";

pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    pub admin_token: String,
    pub admin_id: String,
}

pub fn test_config() -> Config {
    let mut config = Config::for_tests();
    config.admin_username = Some(ADMIN_USERNAME.to_string());
    config.admin_password = Some(ADMIN_PASSWORD.to_string());
    config
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with(test_config()).await
}

pub async fn spawn_app_with(config: Config) -> TestApp {
    let state = init_state(config).await.expect("Failed to create app state");
    let router = register_routes(state.clone());

    let (status, body) = send(
        &router,
        "POST",
        "/api/users/login",
        None,
        Some(json!({ "username": ADMIN_USERNAME, "password": ADMIN_PASSWORD })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "admin login failed: {body}");

    TestApp {
        router,
        state,
        admin_token: body["token"].as_str().unwrap().to_string(),
        admin_id: body["user"]["id"].as_str().unwrap().to_string(),
    }
}

pub async fn send(
    router: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }

    let request = match body {
        Some(body) => builder
            .header("Content-Type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };

    (status, value)
}

impl TestApp {
    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        send(&self.router, "GET", uri, None, None).await
    }

    pub async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        send(&self.router, "POST", uri, None, Some(body)).await
    }

    pub async fn admin(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        send(&self.router, method, uri, Some(&self.admin_token), body).await
    }

    pub async fn create_invite(&self, max_uses: i64) -> Value {
        let (status, invite) = self
            .admin("POST", "/api/invitetokens", Some(json!({ "maxUses": max_uses })))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        invite
    }

    pub async fn create_user(&self, username: &str) -> String {
        let (status, user) = self
            .admin(
                "POST",
                "/api/users",
                Some(json!({ "username": username, "password": "password" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{user}");
        user["id"].as_str().unwrap().to_string()
    }

    pub async fn login(&self, username: &str, password: &str) -> String {
        let (status, body) = self
            .post(
                "/api/users/login",
                json!({ "username": username, "password": password }),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        body["token"].as_str().unwrap().to_string()
    }

    pub async fn create_server(&self, name: &str, owner_id: &str) -> String {
        let (status, server) = self
            .post("/api/servers", json!({ "name": name, "ownerId": owner_id }))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{server}");
        server["id"].as_str().unwrap().to_string()
    }

    pub async fn create_channel(&self, server_id: &str, name: &str) -> String {
        let (status, channel) = self
            .post(
                "/api/channels",
                json!({ "serverId": server_id, "name": name, "type": "text" }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{channel}");
        channel["id"].as_str().unwrap().to_string()
    }

    pub async fn post_message(&self, channel_id: &str, author_id: &str, content: &str) -> Value {
        let (status, message) = self
            .post(
                "/api/messages",
                json!({ "channelId": channel_id, "authorId": author_id, "content": content }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{message}");
        message
    }

    pub async fn positions(&self, server_id: &str) -> Vec<i64> {
        let (status, channels) = self.get(&format!("/api/channels/server/{server_id}")).await;
        assert_eq!(status, StatusCode::OK);
        channels
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["position"].as_i64().unwrap())
            .collect()
    }
}
