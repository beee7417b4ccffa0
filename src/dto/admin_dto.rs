use serde::Deserialize;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserPayload {
    #[validate(custom(function = "super::non_blank"))]
    pub username: String,
    #[validate(length(min = 4, message = "password must be at least 4 characters"))]
    pub password: String,
    #[serde(default)]
    pub is_admin: bool,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserPayload {
    #[serde(default, deserialize_with = "super::trim_optional_string")]
    pub username: Option<String>,

    #[validate(length(min = 4, message = "password must be at least 4 characters"))]
    pub password: Option<String>,

    pub is_admin: Option<bool>,
}
