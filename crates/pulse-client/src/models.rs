//! Response shapes of the API under test (fixed external contract).

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A user as returned by the users endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub username: Option<String>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub age: Option<u32>,
    pub gender: Option<String>,
    pub image: Option<String>,
}

/// Paginated user listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserPage {
    pub users: Vec<User>,
    pub total: i64,
    pub skip: i64,
    pub limit: i64,
}

/// Credentials for `/auth/login`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in_mins: Option<u32>,
}

/// An authenticated session. Login returns the full shape; refresh
/// returns only the token pair. `accessToken` is the authoritative token
/// field on both.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: Option<i64>,
    pub username: Option<String>,
    pub email: Option<String>,
    pub access_token: String,
    pub refresh_token: String,
}

/// Error body shape: `{ "message": "..." }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorBody {
    pub message: String,
}

/// Fields for creating or updating a user. The remote echoes whatever it
/// receives, so this stays an open JSON object.
pub type UserPayload = Value;
