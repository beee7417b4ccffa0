use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// One recorded walk-in interaction. Immutable once inserted; only the
/// admin clear-database action removes rows.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Visit {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub category: String,
    pub subcategory: String,
    pub office_location: String,
    pub created_by: Uuid,
}
