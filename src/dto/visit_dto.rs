use serde::Deserialize;
use validator::Validate;

/// Visit creation input. Categories and locations are deliberately free
/// text: the client offers a fixed list for convenience, but CSV import
/// and ad-hoc entries must not be rejected server-side.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateVisitPayload {
    #[validate(custom(function = "super::non_blank"))]
    pub category: String,
    #[validate(custom(function = "super::non_blank"))]
    pub subcategory: String,
    #[validate(custom(function = "super::non_blank"))]
    pub office_location: String,
}

#[derive(Debug, Deserialize)]
pub struct TodayQuery {
    pub location: Option<String>,
}
