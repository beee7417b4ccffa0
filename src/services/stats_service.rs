use crate::error::Result;
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// One grouped count straight from SQL: (dimension value, year, count).
#[derive(Debug, Clone, FromRow)]
pub struct AggregatedRow {
    pub name: String,
    pub year: String,
    pub count: i64,
}

/// Dense matrix row: one dimension value with a count for every year in
/// the result set. Serialized flat (`{"name": "Monday", "2024": 12, ...}`)
/// to keep the wire shape the charts expect.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReshapedRow {
    pub name: String,
    #[serde(flatten)]
    pub values: BTreeMap<String, i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TopCategory {
    pub category: String,
    pub count: i64,
    pub percentage: f64,
}

/// Per-location category breakdown, grouped by (category, subcategory,
/// year, month). Not reshaped; clients pivot this themselves.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CategoryRow {
    pub category: String,
    pub subcategory: String,
    pub year: String,
    pub month: i32,
    pub count: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationStats {
    pub weekday: Vec<ReshapedRow>,
    pub time_interval: Vec<ReshapedRow>,
    pub month: Vec<ReshapedRow>,
    pub category_data: Vec<CategoryRow>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub weekday: Vec<ReshapedRow>,
    pub time_interval: Vec<ReshapedRow>,
    pub month: Vec<ReshapedRow>,
    pub subcategory: Vec<ReshapedRow>,
    pub top_categories: Vec<TopCategory>,
    pub by_location: BTreeMap<String, LocationStats>,
}

/// Hour buckets for the time-interval dimension. Labels are zero-padded
/// so their lexical order is chronological, and the catch-all sorts
/// after every digit-prefixed label.
const BUCKET_START_HOUR: u32 = 8;
const BUCKET_END_HOUR: u32 = 18;
pub const OTHER_BUCKET: &str = "Andere Zeit";

/// Stored instant converted to the office wall clock; `$2` is always the
/// configured statistics time zone.
const TS_LOCAL: &str = r#"(visits."timestamp" AT TIME ZONE $2)"#;

fn bucket_label(hour: u32) -> String {
    format!("{:02}:00-{:02}:00", hour, hour + 1)
}

fn time_bucket_case() -> String {
    let mut case = String::from("CASE");
    for hour in BUCKET_START_HOUR..BUCKET_END_HOUR {
        case.push_str(&format!(
            " WHEN EXTRACT(HOUR FROM {TS_LOCAL}) = {hour} THEN '{}'",
            bucket_label(hour)
        ));
    }
    case.push_str(&format!(" ELSE '{OTHER_BUCKET}' END"));
    case
}

#[derive(Debug, Clone, Copy)]
enum Dimension {
    Weekday,
    TimeInterval,
    Month,
    Subcategory,
}

/// Grouped-count query for one dimension. Parameterized over the scope:
/// `$1 IS NULL` aggregates every location, otherwise one office. The CTE
/// restricts every dimension to the scope's 5 most recent years, which
/// also bounds the year union used for zero-filling.
fn dimension_sql(dim: Dimension) -> String {
    let (name_expr, group_extra, order_expr) = match dim {
        Dimension::Weekday => (
            format!("initcap(to_char({TS_LOCAL}, 'day'))"),
            format!(", EXTRACT(isodow FROM {TS_LOCAL})"),
            format!("EXTRACT(isodow FROM {TS_LOCAL})"),
        ),
        Dimension::TimeInterval => (time_bucket_case(), String::new(), "1".to_string()),
        Dimension::Month => (
            format!("initcap(to_char({TS_LOCAL}, 'month'))"),
            format!(", EXTRACT(month FROM {TS_LOCAL})"),
            format!("EXTRACT(month FROM {TS_LOCAL})"),
        ),
        Dimension::Subcategory => (
            "subcategory".to_string(),
            String::new(),
            "COUNT(*) DESC".to_string(),
        ),
    };

    format!(
        r#"
        WITH recent_years AS (
            SELECT DISTINCT to_char({TS_LOCAL}, 'YYYY') AS year
            FROM visits
            WHERE ($1::text IS NULL OR office_location = $1)
            ORDER BY year DESC
            LIMIT 5
        )
        SELECT {name_expr} AS name,
               to_char({TS_LOCAL}, 'YYYY') AS year,
               COUNT(*) AS count
        FROM visits
        WHERE ($1::text IS NULL OR office_location = $1)
          AND to_char({TS_LOCAL}, 'YYYY') IN (SELECT year FROM recent_years)
        GROUP BY 1, 2{group_extra}
        ORDER BY {order_expr}, 2
        "#
    )
}

/// Converts flat (name, year, count) rows into the dense matrix: one row
/// per distinct trimmed name, a column for every year in the input, and
/// absent combinations filled with zero. Output keeps first-encounter
/// order, so the SQL ordering survives.
pub fn reshape(rows: &[AggregatedRow]) -> Vec<ReshapedRow> {
    let years: BTreeSet<&str> = rows.iter().map(|r| r.year.as_str()).collect();

    let mut order: Vec<String> = Vec::new();
    let mut by_name: HashMap<String, BTreeMap<String, i64>> = HashMap::new();
    for row in rows {
        // to_char pads weekday and month names to fixed width
        let name = row.name.trim();
        if !by_name.contains_key(name) {
            let mut values = BTreeMap::new();
            for year in &years {
                values.insert((*year).to_string(), 0);
            }
            order.push(name.to_string());
            by_name.insert(name.to_string(), values);
        }
        if let Some(values) = by_name.get_mut(name) {
            values.insert(row.year.clone(), row.count);
        }
    }

    order
        .into_iter()
        .map(|name| {
            let values = by_name.remove(&name).unwrap_or_default();
            ReshapedRow { name, values }
        })
        .collect()
}

/// Display order for the subcategory dimension: total count over all
/// years, descending. Stable, so SQL order breaks ties.
pub fn sort_by_total_desc(mut rows: Vec<ReshapedRow>) -> Vec<ReshapedRow> {
    rows.sort_by_key(|r| std::cmp::Reverse(r.values.values().sum::<i64>()));
    rows
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn top_categories_from(rows: Vec<(String, i64)>, total: i64) -> Vec<TopCategory> {
    rows.into_iter()
        .map(|(category, count)| TopCategory {
            percentage: if total > 0 {
                round2(count as f64 * 100.0 / total as f64)
            } else {
                0.0
            },
            category,
            count,
        })
        .collect()
}

#[derive(Clone)]
pub struct StatsService {
    pool: PgPool,
}

impl StatsService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn dimension_counts(
        &self,
        scope: Option<&str>,
        dim: Dimension,
    ) -> Result<Vec<AggregatedRow>> {
        let tz = &crate::config::get_config().stats_time_zone;
        let rows = sqlx::query_as::<_, AggregatedRow>(&dimension_sql(dim))
            .bind(scope)
            .bind(tz)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// Top 3 categories by count with their share of the total visit
    /// count. Deliberately not year-limited.
    async fn top_categories(&self) -> Result<Vec<TopCategory>> {
        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM visits")
            .fetch_one(&self.pool)
            .await?;
        let rows = sqlx::query_as::<_, (String, i64)>(
            r#"
            SELECT category, COUNT(*) AS count
            FROM visits
            GROUP BY category
            ORDER BY count DESC
            LIMIT 3
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(top_categories_from(rows, total))
    }

    async fn category_breakdown(&self, location: &str) -> Result<Vec<CategoryRow>> {
        let tz = &crate::config::get_config().stats_time_zone;
        let rows = sqlx::query_as::<_, CategoryRow>(&format!(
            r#"
            WITH recent_years AS (
                SELECT DISTINCT to_char({TS_LOCAL}, 'YYYY') AS year
                FROM visits
                WHERE office_location = $1
                ORDER BY year DESC
                LIMIT 5
            )
            SELECT category,
                   subcategory,
                   to_char({TS_LOCAL}, 'YYYY') AS year,
                   EXTRACT(month FROM {TS_LOCAL})::int AS month,
                   COUNT(*) AS count
            FROM visits
            WHERE office_location = $1
              AND to_char({TS_LOCAL}, 'YYYY') IN (SELECT year FROM recent_years)
            GROUP BY 1, 2, 3, 4
            ORDER BY year DESC, month ASC
            "#
        ))
        .bind(location)
        .bind(tz)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// The three reshaped tables every scope gets.
    async fn scope_tables(
        &self,
        scope: Option<&str>,
    ) -> Result<(Vec<ReshapedRow>, Vec<ReshapedRow>, Vec<ReshapedRow>)> {
        let weekday = self.dimension_counts(scope, Dimension::Weekday).await?;
        let time_interval = self
            .dimension_counts(scope, Dimension::TimeInterval)
            .await?;
        let month = self.dimension_counts(scope, Dimension::Month).await?;
        Ok((
            reshape(&weekday),
            reshape(&time_interval),
            reshape(&month),
        ))
    }

    /// Full statistics response: global tables plus one block per
    /// configured office location. Any query failure fails the whole
    /// request; no partial results.
    pub async fn collect(&self) -> Result<StatsResponse> {
        let (weekday, time_interval, month) = self.scope_tables(None).await?;
        let subcategory = self.dimension_counts(None, Dimension::Subcategory).await?;
        let top_categories = self.top_categories().await?;

        let mut by_location = BTreeMap::new();
        for location in &crate::config::get_config().office_locations {
            let (weekday, time_interval, month) =
                self.scope_tables(Some(location)).await?;
            let category_data = self.category_breakdown(location).await?;
            by_location.insert(
                location.clone(),
                LocationStats {
                    weekday,
                    time_interval,
                    month,
                    category_data,
                },
            );
        }

        Ok(StatsResponse {
            weekday,
            time_interval,
            month,
            subcategory: sort_by_total_desc(reshape(&subcategory)),
            top_categories,
            by_location,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(name: &str, year: &str, count: i64) -> AggregatedRow {
        AggregatedRow {
            name: name.to_string(),
            year: year.to_string(),
            count,
        }
    }

    #[test]
    fn reshape_produces_a_dense_matrix() {
        let rows = vec![
            row("Monday", "2023", 4),
            row("Monday", "2024", 7),
            row("Tuesday", "2024", 2),
        ];
        let out = reshape(&rows);
        assert_eq!(out.len(), 2);
        for r in &out {
            assert_eq!(
                r.values.keys().collect::<Vec<_>>(),
                vec!["2023", "2024"],
                "every row carries every year"
            );
        }
        assert_eq!(out[1].name, "Tuesday");
        assert_eq!(out[1].values["2023"], 0, "absent combination zero-filled");
        assert_eq!(out[1].values["2024"], 2);
    }

    #[test]
    fn reshape_conserves_counts_per_year() {
        let rows = vec![
            row("08:00-09:00", "2024", 3),
            row("09:00-10:00", "2024", 5),
            row("08:00-09:00", "2023", 2),
        ];
        let out = reshape(&rows);
        let sum_2024: i64 = out.iter().map(|r| r.values["2024"]).sum();
        let sum_2023: i64 = out.iter().map(|r| r.values["2023"]).sum();
        assert_eq!(sum_2024, 8);
        assert_eq!(sum_2023, 2);
    }

    #[test]
    fn reshape_trims_padded_names_and_merges_them() {
        // Postgres to_char pads day/month names to fixed width.
        let rows = vec![row("Monday   ", "2024", 1), row("Monday", "2023", 2)];
        let out = reshape(&rows);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].name, "Monday");
        assert_eq!(out[0].values["2024"], 1);
        assert_eq!(out[0].values["2023"], 2);
    }

    #[test]
    fn reshape_preserves_first_encounter_order() {
        let rows = vec![
            row("January", "2024", 1),
            row("February", "2024", 1),
            row("January", "2023", 1),
            row("March", "2023", 1),
        ];
        let names: Vec<_> = reshape(&rows).into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["January", "February", "March"]);
    }

    #[test]
    fn reshape_of_empty_input_is_empty() {
        assert!(reshape(&[]).is_empty());
    }

    #[test]
    fn subcategory_sort_is_total_count_descending() {
        let rows = vec![
            row("Beratung", "2023", 1),
            row("Zählerstand", "2023", 5),
            row("Beratung", "2024", 3),
            row("Pass", "2024", 2),
        ];
        let sorted = sort_by_total_desc(reshape(&rows));
        let names: Vec<_> = sorted.into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["Zählerstand", "Beratung", "Pass"]);
    }

    #[test]
    fn top_category_percentages_round_to_two_decimals() {
        let out = top_categories_from(
            vec![
                ("Energie".to_string(), 2),
                ("Media".to_string(), 1),
            ],
            3,
        );
        assert_eq!(out[0].percentage, 66.67);
        assert_eq!(out[1].percentage, 33.33);
        let sum: f64 = out.iter().map(|c| c.percentage).sum();
        assert!(sum <= 100.0);
    }

    #[test]
    fn top_categories_with_no_visits_have_zero_percentage() {
        let out = top_categories_from(vec![("Media".to_string(), 0)], 0);
        assert_eq!(out[0].percentage, 0.0);
    }

    #[test]
    fn bucket_labels_cover_the_configured_range() {
        let case = time_bucket_case();
        assert!(case.contains("'08:00-09:00'"));
        assert!(case.contains("'17:00-18:00'"));
        assert!(!case.contains("'18:00-19:00'"));
        assert!(case.ends_with(&format!("ELSE '{OTHER_BUCKET}' END")));
    }

    #[test]
    fn bucket_labels_sort_chronologically_with_catch_all_last() {
        let mut labels: Vec<String> = (BUCKET_START_HOUR..BUCKET_END_HOUR)
            .map(bucket_label)
            .collect();
        labels.push(OTHER_BUCKET.to_string());
        let mut sorted = labels.clone();
        sorted.sort();
        assert_eq!(labels, sorted, "lexical order must match display order");
    }

    #[test]
    fn dimension_sql_limits_years_per_scope() {
        for dim in [
            Dimension::Weekday,
            Dimension::TimeInterval,
            Dimension::Month,
            Dimension::Subcategory,
        ] {
            let sql = dimension_sql(dim);
            assert!(sql.contains("LIMIT 5"));
            assert!(sql.contains("$1::text IS NULL OR office_location = $1"));
            assert!(sql.contains("IN (SELECT year FROM recent_years)"));
        }
    }
}
