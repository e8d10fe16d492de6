//! Request/response types for auth endpoints.
//!
//! Field names follow the wire contract (camelCase) rather than crate
//! conventions.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginRequest {
    pub identifier: String,
    pub password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct UserSummary {
    pub id: String,
    pub email: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub user: UserSummary,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ForgotPasswordRequest {
    pub identifier: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ForgotPasswordResponse {
    pub message: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub token: String,
    pub new_password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Context, Result};

    #[test]
    fn login_response_uses_wire_field_names() -> Result<()> {
        let response = LoginResponse {
            access_token: "access".to_string(),
            refresh_token: "refresh".to_string(),
            user: UserSummary {
                id: "id".to_string(),
                email: "alice@example.com".to_string(),
            },
        };
        let value = serde_json::to_value(&response)?;
        let access = value
            .get("accessToken")
            .and_then(serde_json::Value::as_str)
            .context("missing accessToken")?;
        assert_eq!(access, "access");
        assert!(value.get("refreshToken").is_some());
        assert_eq!(value["user"]["email"], "alice@example.com");
        Ok(())
    }

    #[test]
    fn change_password_request_round_trips() -> Result<()> {
        let value = serde_json::json!({
            "currentPassword": "old-secret",
            "newPassword": "new-secret",
        });
        let decoded: ChangePasswordRequest = serde_json::from_value(value)?;
        assert_eq!(decoded.current_password, "old-secret");
        assert_eq!(decoded.new_password, "new-secret");
        Ok(())
    }
}
