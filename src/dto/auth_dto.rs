use serde::Deserialize;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct LoginPayload {
    #[validate(custom(function = "super::non_blank"))]
    pub username: String,
    #[validate(length(min = 1, message = "password must not be empty"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordPayload {
    #[validate(length(min = 1, message = "current password must not be empty"))]
    pub current_password: String,
    #[validate(length(min = 4, message = "new password must be at least 4 characters"))]
    pub new_password: String,
}
