use crate::error::{Error, Result};
use crate::services::visit_service::{VisitService, INSERT_VISIT_AT};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

pub const CSV_COLUMNS: [&str; 4] = ["timestamp", "category", "subcategory", "office_location"];

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub total_processed: usize,
    pub success_count: usize,
    pub failed_count: usize,
    pub failed_records: Vec<FailedRecord>,
}

/// Per-row failure, echoing the offending record for operator review.
#[derive(Debug, Serialize)]
pub struct FailedRecord {
    pub row: usize,
    pub record: String,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct ParsedVisit {
    pub row: usize,
    pub timestamp: DateTime<Utc>,
    pub category: String,
    pub subcategory: String,
    pub office_location: String,
}

/// Parses the uploaded CSV into insertable visits plus per-row failures.
/// Fails outright only when the header row itself is unusable.
pub fn parse_rows(data: &[u8]) -> Result<(Vec<ParsedVisit>, Vec<FailedRecord>)> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(data);

    let headers = reader.headers()?.clone();
    let mut indices = [0usize; 4];
    for (i, column) in CSV_COLUMNS.iter().enumerate() {
        indices[i] = headers
            .iter()
            .position(|h| h.eq_ignore_ascii_case(column))
            .ok_or_else(|| Error::BadRequest(format!("Missing CSV column: {}", column)))?;
    }

    let mut parsed = Vec::new();
    let mut failed = Vec::new();

    for (n, record) in reader.records().enumerate() {
        let row = n + 1;
        let record = match record {
            Ok(r) => r,
            Err(e) => {
                failed.push(FailedRecord {
                    row,
                    record: String::new(),
                    reason: e.to_string(),
                });
                continue;
            }
        };
        let raw = record.iter().collect::<Vec<_>>().join(",");
        let field = |i: usize| record.get(indices[i]).unwrap_or("").trim().to_string();

        let reject = |reason: String, failed: &mut Vec<FailedRecord>| {
            failed.push(FailedRecord {
                row,
                record: raw.clone(),
                reason,
            });
        };

        let (timestamp_raw, category, subcategory, office_location) =
            (field(0), field(1), field(2), field(3));

        let mut blank = CSV_COLUMNS
            .iter()
            .zip([&timestamp_raw, &category, &subcategory, &office_location])
            .filter(|(_, value)| value.is_empty())
            .map(|(column, _)| *column);
        if let Some(column) = blank.next() {
            reject(format!("{} must not be empty", column), &mut failed);
            continue;
        }

        let timestamp = match DateTime::parse_from_rfc3339(&timestamp_raw) {
            Ok(ts) => ts.with_timezone(&Utc),
            Err(_) => {
                reject(
                    format!("invalid timestamp: {}", timestamp_raw),
                    &mut failed,
                );
                continue;
            }
        };

        parsed.push(ParsedVisit {
            row,
            timestamp,
            category,
            subcategory,
            office_location,
        });
    }

    Ok((parsed, failed))
}

/// Sample file matching the import format, offered for download.
pub fn template() -> String {
    let rows = [
        ["2023-06-15T09:30:00.000Z", "Media", "Pass", "Geesthacht"],
        ["2023-07-22T11:15:00.000Z", "Energie", "Zählerstand", "Büchen"],
        ["2023-08-10T14:45:00.000Z", "Allgemeines", "Beratung", "Schwarzenbek"],
        ["2023-09-05T16:20:00.000Z", "Media", "Störung", "Geesthacht"],
        ["2023-10-18T10:05:00.000Z", "Energie", "Neuanmeldung", "Büchen"],
    ];
    let mut out = CSV_COLUMNS.join(",");
    out.push('\n');
    for row in rows {
        out.push_str(&row.join(","));
        out.push('\n');
    }
    out
}

#[derive(Clone)]
pub struct CsvService {
    pool: PgPool,
    visits: VisitService,
}

impl CsvService {
    pub fn new(pool: PgPool) -> Self {
        let visits = VisitService::new(pool.clone());
        Self { pool, visits }
    }

    /// Imports one uploaded file, tagging every row with the importing
    /// admin. Non-atomic by default: a failed row is reported and the
    /// rows before it stay inserted. With `CSV_IMPORT_ATOMIC=true` the
    /// whole file runs in one transaction and any failure rolls it back.
    pub async fn import(&self, data: &[u8], created_by: Uuid) -> Result<ImportReport> {
        let atomic = crate::config::get_config().csv_import_atomic;
        let (parsed, mut failed) = parse_rows(data)?;
        let total_processed = parsed.len() + failed.len();
        let mut success_count = 0usize;

        if atomic {
            if failed.is_empty() {
                match self.insert_all_transactional(&parsed, created_by).await? {
                    None => success_count = parsed.len(),
                    Some(failure) => failed.push(failure),
                }
            }
            // parse failures present: nothing is inserted at all
        } else {
            for visit in &parsed {
                match self
                    .visits
                    .create_at(
                        visit.timestamp,
                        &visit.category,
                        &visit.subcategory,
                        &visit.office_location,
                        created_by,
                    )
                    .await
                {
                    Ok(_) => success_count += 1,
                    Err(e) => {
                        tracing::error!(row = visit.row, error = %e, "CSV row insert failed");
                        failed.push(FailedRecord {
                            row: visit.row,
                            record: describe(visit),
                            reason: "insert failed".to_string(),
                        });
                    }
                }
            }
        }

        failed.sort_by_key(|f| f.row);
        Ok(ImportReport {
            total_processed,
            success_count,
            failed_count: failed.len(),
            failed_records: failed,
        })
    }

    /// Returns the failing record on rollback, `None` on commit.
    async fn insert_all_transactional(
        &self,
        parsed: &[ParsedVisit],
        created_by: Uuid,
    ) -> Result<Option<FailedRecord>> {
        let mut tx = self.pool.begin().await?;
        for visit in parsed {
            let result = sqlx::query(INSERT_VISIT_AT)
                .bind(visit.timestamp)
                .bind(&visit.category)
                .bind(&visit.subcategory)
                .bind(&visit.office_location)
                .bind(created_by)
                .execute(&mut *tx)
                .await;
            if let Err(e) = result {
                tracing::error!(row = visit.row, error = %e, "CSV import rolled back");
                tx.rollback().await?;
                return Ok(Some(FailedRecord {
                    row: visit.row,
                    record: describe(visit),
                    reason: "insert failed, import rolled back".to_string(),
                }));
            }
        }
        tx.commit().await?;
        Ok(None)
    }
}

fn describe(visit: &ParsedVisit) -> String {
    format!(
        "{},{},{},{}",
        visit.timestamp.to_rfc3339(),
        visit.category,
        visit.subcategory,
        visit.office_location
    )
}
