//! Thin wrappers over the user and auth endpoints.
//!
//! Each wrapper just shapes a request; the captured response is returned
//! as-is so tests can assert on non-2xx bodies too.

use crate::client::{ApiClient, ApiResponse, RequestOptions};
use crate::models::{LoginRequest, UserPayload};
use pulse_core::Result;
use reqwest::Method;

impl ApiClient {
    /// GET /users with optional pagination.
    pub async fn list_users(
        &self,
        limit: Option<u32>,
        skip: Option<u32>,
        mut options: RequestOptions,
    ) -> Result<ApiResponse> {
        if let Some(limit) = limit {
            options = options.query("limit", limit);
        }
        if let Some(skip) = skip {
            options = options.query("skip", skip);
        }
        self.request(Method::GET, "/users", options).await
    }

    /// GET /users/search?q=...
    pub async fn search_users(&self, q: &str, options: RequestOptions) -> Result<ApiResponse> {
        self.request(Method::GET, "/users/search", options.query("q", q))
            .await
    }

    /// GET /users/{id}
    pub async fn get_user(&self, id: i64, options: RequestOptions) -> Result<ApiResponse> {
        self.request(Method::GET, &format!("/users/{}", id), options)
            .await
    }

    /// POST /users/add
    pub async fn create_user(
        &self,
        user: UserPayload,
        options: RequestOptions,
    ) -> Result<ApiResponse> {
        self.request(Method::POST, "/users/add", options.json(user))
            .await
    }

    /// PUT /users/{id}
    pub async fn update_user(
        &self,
        id: i64,
        user: UserPayload,
        options: RequestOptions,
    ) -> Result<ApiResponse> {
        self.request(Method::PUT, &format!("/users/{}", id), options.json(user))
            .await
    }

    /// DELETE /users/{id}
    pub async fn delete_user(&self, id: i64, options: RequestOptions) -> Result<ApiResponse> {
        self.request(Method::DELETE, &format!("/users/{}", id), options)
            .await
    }

    /// POST /auth/login
    pub async fn login(
        &self,
        username: &str,
        password: &str,
        options: RequestOptions,
    ) -> Result<ApiResponse> {
        let body = serde_json::to_value(LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
            expires_in_mins: None,
        })?;
        self.request(Method::POST, "/auth/login", options.json(body))
            .await
    }

    /// GET /auth/me with a bearer token.
    pub async fn me(&self, token: &str, options: RequestOptions) -> Result<ApiResponse> {
        self.request(Method::GET, "/auth/me", options.bearer(token))
            .await
    }

    /// POST /auth/refresh
    pub async fn refresh(
        &self,
        refresh_token: &str,
        options: RequestOptions,
    ) -> Result<ApiResponse> {
        let body = serde_json::json!({ "refreshToken": refresh_token });
        self.request(Method::POST, "/auth/refresh", options.json(body))
            .await
    }
}
