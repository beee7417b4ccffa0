use crate::error::Result;
use crate::models::visit::Visit;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

const VISIT_COLUMNS: &str =
    r#"id, "timestamp", category, subcategory, office_location, created_by"#;

/// Shared with the CSV import so its transactional path runs the exact
/// same statement.
pub(crate) const INSERT_VISIT_AT: &str = r#"
    INSERT INTO visits ("timestamp", category, subcategory, office_location, created_by)
    VALUES ($1, $2, $3, $4, $5)
    RETURNING id, "timestamp", category, subcategory, office_location, created_by
"#;

#[derive(Clone)]
pub struct VisitService {
    pool: PgPool,
}

impl VisitService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts a visit stamped with the current time. Single-statement,
    /// so the store's row-level atomicity is all the transaction we need.
    pub async fn create(
        &self,
        category: &str,
        subcategory: &str,
        office_location: &str,
        created_by: Uuid,
    ) -> Result<Visit> {
        let visit = sqlx::query_as::<_, Visit>(&format!(
            r#"
            INSERT INTO visits (category, subcategory, office_location, created_by)
            VALUES ($1, $2, $3, $4)
            RETURNING {VISIT_COLUMNS}
            "#
        ))
        .bind(category)
        .bind(subcategory)
        .bind(office_location)
        .bind(created_by)
        .fetch_one(&self.pool)
        .await?;
        Ok(visit)
    }

    /// Insert with an explicit timestamp; the CSV import goes through
    /// here row by row.
    pub async fn create_at(
        &self,
        timestamp: DateTime<Utc>,
        category: &str,
        subcategory: &str,
        office_location: &str,
        created_by: Uuid,
    ) -> Result<Visit> {
        let visit = sqlx::query_as::<_, Visit>(INSERT_VISIT_AT)
            .bind(timestamp)
            .bind(category)
            .bind(subcategory)
            .bind(office_location)
            .bind(created_by)
            .fetch_one(&self.pool)
            .await?;
        Ok(visit)
    }

    pub async fn list(&self) -> Result<Vec<Visit>> {
        let visits = sqlx::query_as::<_, Visit>(&format!(
            r#"SELECT {VISIT_COLUMNS} FROM visits ORDER BY "timestamp" DESC"#
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(visits)
    }

    /// The caller's visits recorded today, in the configured statistics
    /// time zone. Replaces the client-side per-day counter of the old
    /// front end with an authoritative query.
    pub async fn today_count(&self, user_id: Uuid, location: Option<&str>) -> Result<i64> {
        let tz = &crate::config::get_config().stats_time_zone;
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM visits
            WHERE created_by = $1
              AND ($2::text IS NULL OR office_location = $2)
              AND (visits."timestamp" AT TIME ZONE $3)::date = (now() AT TIME ZONE $3)::date
            "#,
        )
        .bind(user_id)
        .bind(location)
        .bind(tz)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    pub async fn clear_all(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM visits").execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}
