use chrono::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone, Copy, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "user_role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    User,
    Ti,
    Admin,
}

impl UserRole {
    pub fn to_str(&self) -> &str {
        match self {
            UserRole::User => "user",
            UserRole::Ti => "ti",
            UserRole::Admin => "admin",
        }
    }

    /// Support staff: IT attendants and admins.
    pub fn is_staff(&self) -> bool {
        matches!(self, UserRole::Ti | UserRole::Admin)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "user_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    Active,
    Suspended,
}

impl UserStatus {
    pub fn to_str(&self) -> &str {
        match self {
            UserStatus::Active => "active",
            UserStatus::Suspended => "suspended",
        }
    }
}

#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone)]
pub struct User {
    pub id: uuid::Uuid,
    pub name: String,
    pub email: String,
    // Never leaves the process: not in responses and not in the profile cache.
    #[serde(skip_serializing, default)]
    pub password: String,
    pub role: UserRole,
    pub status: UserStatus,
    pub avatar_url: Option<String>,

    #[serde(skip_serializing, default)]
    pub reset_token: Option<String>,

    #[serde(skip_serializing, default)]
    pub reset_token_expires_at: Option<DateTime<Utc>>,

    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,

    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_suspended(&self) -> bool {
        self.status == UserStatus::Suspended
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::access::fixtures;

    #[test]
    fn cached_profile_carries_no_credentials() {
        let mut user = fixtures::user(UserRole::User);
        user.password = "$argon2id$secret".to_string();
        user.reset_token = Some("live-reset-token".to_string());
        user.reset_token_expires_at = Some(Utc::now());

        let cached = serde_json::to_string(&user).unwrap();
        assert!(!cached.contains("argon2"));
        assert!(!cached.contains("live-reset-token"));
        assert!(!cached.contains("reset_token"));

        let restored: User = serde_json::from_str(&cached).unwrap();
        assert_eq!(restored.id, user.id);
        assert!(restored.password.is_empty());
        assert!(restored.reset_token.is_none());
        assert!(restored.reset_token_expires_at.is_none());
    }
}
