use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: String,
    pub exp: Option<u64>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub app_metadata: Option<serde_json::Value>,
    pub user_metadata: Option<serde_json::Value>,
    pub aud: Option<String>,
    pub iat: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    pub role: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    Patient,
    Doctor,
    Admin,
}

/// Request-scoped identity handed into the scheduling core. Built once
/// per request from the validated JWT user; the core never reaches back
/// into ambient auth state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: Uuid,
    pub role: ActorRole,
}

impl Actor {
    pub fn from_user(user: &User) -> Result<Self, AppError> {
        let id = Uuid::parse_str(&user.id)
            .map_err(|_| AppError::Auth("Token subject is not a valid user id".to_string()))?;

        let role = match user.role.as_deref() {
            Some("patient") => ActorRole::Patient,
            Some("doctor") => ActorRole::Doctor,
            Some("admin") => ActorRole::Admin,
            other => {
                return Err(AppError::Forbidden(format!(
                    "Unrecognized role: {}",
                    other.unwrap_or("none")
                )))
            }
        };

        Ok(Self { id, role })
    }

    pub fn is_admin(&self) -> bool {
        self.role == ActorRole::Admin
    }
}
