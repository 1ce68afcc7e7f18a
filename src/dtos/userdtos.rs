use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::usermodel::*;

#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct RegisterUserDto {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,

    #[validate(
        length(min = 1, message = "Email is required"),
        email(message = "Email is invalid")
    )]
    pub email: String,

    #[validate(
        length(min = 1, message = "Password is required"),
        length(min = 6, message = "Password must be at least 6 characters"),
        length(max = 64, message = "Password must be at most 64 characters")
    )]
    pub password: String,

    #[validate(
        length(min = 1, message = "Confirm Password is required"),
        must_match(other = "password", message = "passwords do not match")
    )]
    #[serde(rename = "passwordConfirm")]
    pub password_confirm: String,
}

#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct LoginUserDto {
    #[validate(length(min = 1, message = "Email is required"), email(message = "Email is invalid"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Serialize, Deserialize, Validate)]
pub struct RequestQueryDto {
    #[validate(range(min = 1, max = 100000))]
    pub page: Option<usize>,
    #[validate(range(min = 1, max = 50))]
    pub limit: Option<usize>,
}

/// A user as exposed over the API; never carries the password hash or the
/// reset token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterUserDto {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: String,
    pub status: String,
    pub avatar_url: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl FilterUserDto {
    pub fn filter_user(user: &User) -> Self {
        FilterUserDto {
            id: user.id.to_string(),
            name: user.name.to_owned(),
            email: user.email.to_owned(),
            role: user.role.to_str().to_string(),
            status: user.status.to_str().to_string(),
            avatar_url: user.avatar_url.clone(),
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }

    pub fn filter_users(users: &[User]) -> Vec<FilterUserDto> {
        users.iter().map(FilterUserDto::filter_user).collect()
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserData {
    pub user: FilterUserDto,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserResponseDto {
    pub status: String,
    pub data: UserData,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserListResponseDto {
    pub status: String,
    pub users: Vec<FilterUserDto>,
    pub results: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserLoginResponseDto {
    pub status: String,
    pub token: String,
}

#[derive(Serialize, Deserialize)]
pub struct Response {
    pub status: &'static str,
    pub message: String,
}

/// Own-profile edit. `role` is only honoured when an admin sends it.
#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct UpdateProfileDto {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    pub role: Option<UserRole>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleUpdateDto {
    pub role: UserRole,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusUpdateDto {
    pub status: UserStatus,
}

#[derive(Debug, Serialize, Deserialize, Validate, Clone)]
pub struct ResetPasswordRequestDto {
    #[validate(length(min = 1, message = "Token is required."))]
    pub token: String,

    #[validate(
        length(min = 1, message = "New password is required."),
        length(min = 6, message = "new password must be at least 6 characters"),
        length(max = 64, message = "new password must be at most 64 characters")
    )]
    pub new_password: String,

    #[validate(
        length(min = 1, message = "New password confirm is required."),
        must_match(other = "new_password", message = "new passwords do not match")
    )]
    pub new_password_confirm: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::access::fixtures;

    #[test]
    fn registration_requires_matching_passwords() {
        let mut dto = RegisterUserDto {
            name: "Maria".to_string(),
            email: "maria@example.com".to_string(),
            password: "secret1".to_string(),
            password_confirm: "secret1".to_string(),
        };
        assert!(dto.validate().is_ok());

        dto.password_confirm = "secret2".to_string();
        assert!(dto.validate().is_err());

        dto.password = "abc".to_string();
        dto.password_confirm = "abc".to_string();
        assert!(dto.validate().is_err());
    }

    #[test]
    fn passwords_longer_than_the_hash_limit_are_rejected() {
        let long = "x".repeat(65);
        let register = RegisterUserDto {
            name: "Maria".to_string(),
            email: "maria@example.com".to_string(),
            password: long.clone(),
            password_confirm: long.clone(),
        };
        assert!(register.validate().is_err());

        let reset = ResetPasswordRequestDto {
            token: "token".to_string(),
            new_password: long.clone(),
            new_password_confirm: long,
        };
        assert!(reset.validate().is_err());

        let longest = "x".repeat(64);
        assert!(crate::utils::password::hash(longest.as_str()).is_ok());
        let reset = ResetPasswordRequestDto {
            token: "token".to_string(),
            new_password: longest.clone(),
            new_password_confirm: longest,
        };
        assert!(reset.validate().is_ok());
    }

    #[test]
    fn user_list_pages_are_bounded() {
        let query = RequestQueryDto { page: Some(usize::MAX), limit: Some(10) };
        assert!(query.validate().is_err());
        let query = RequestQueryDto { page: Some(3), limit: Some(10) };
        assert!(query.validate().is_ok());
    }

    #[test]
    fn filtered_user_hides_credentials() {
        let mut user = fixtures::user(UserRole::Ti);
        user.password = "$argon2id$secret".to_string();
        user.reset_token = Some("reset-me".to_string());

        let json = serde_json::to_string(&FilterUserDto::filter_user(&user)).unwrap();
        assert!(!json.contains("argon2"));
        assert!(!json.contains("reset-me"));
        assert!(json.contains("\"role\":\"ti\""));
        assert!(json.contains("\"status\":\"active\""));
    }
}
