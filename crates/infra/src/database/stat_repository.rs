//! SQLite-backed metric storage.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use communaute_core::StatRecordStore;
use communaute_domain::{Granularity, MetricRecord, Result as DomainResult};
use rusqlite::params_from_iter;
use rusqlite::types::Value;
use tokio::task;

use super::manager::DbManager;
use super::watermark_repository::{parse_date, DATE_FORMAT};
use crate::errors::{map_join_error, map_storage_error};

pub struct SqliteStatRepository {
    db: Arc<DbManager>,
}

impl SqliteStatRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    /// Records for one metric, oldest first.
    pub async fn list(
        &self,
        granularity: Granularity,
        name: &str,
    ) -> DomainResult<Vec<MetricRecord>> {
        let db = Arc::clone(&self.db);
        let name = name.to_string();

        task::spawn_blocking(move || -> DomainResult<Vec<MetricRecord>> {
            let conn = db.get_connection()?;
            let mut stmt = conn
                .prepare(
                    "SELECT date, value FROM stats WHERE period = ?1 AND name = ?2 ORDER BY date",
                )
                .map_err(map_storage_error)?;
            let rows = stmt
                .query_map([granularity.as_str(), name.as_str()], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
                })
                .map_err(map_storage_error)?;

            let mut records = Vec::new();
            for row in rows {
                let (date, value) = row.map_err(map_storage_error)?;
                let date = parse_date(&date)?;
                records.push(MetricRecord::new(granularity, date, name.clone(), value));
            }
            Ok(records)
        })
        .await
        .map_err(map_join_error)?
    }

    /// Number of records stored for `granularity` on or after `since`.
    pub async fn count_since(
        &self,
        granularity: Granularity,
        since: NaiveDate,
    ) -> DomainResult<usize> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<usize> {
            let conn = db.get_connection()?;
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM stats WHERE period = ?1 AND date >= ?2",
                    [granularity.as_str().to_string(), since.format(DATE_FORMAT).to_string()],
                    |row| row.get(0),
                )
                .map_err(map_storage_error)?;
            Ok(usize::try_from(count).unwrap_or_default())
        })
        .await
        .map_err(map_join_error)?
    }
}

#[async_trait]
impl StatRecordStore for SqliteStatRepository {
    async fn insert_if_absent(&self, record: &MetricRecord) -> DomainResult<bool> {
        let db = Arc::clone(&self.db);
        let record = record.clone();

        task::spawn_blocking(move || -> DomainResult<bool> {
            let conn = db.get_connection()?;
            let inserted = conn
                .execute(
                    "INSERT OR IGNORE INTO stats (period, date, name, value)
                     VALUES (?1, ?2, ?3, ?4)",
                    rusqlite::params![
                        record.period.as_str(),
                        record.date.format(DATE_FORMAT).to_string(),
                        record.name,
                        record.value
                    ],
                )
                .map_err(map_storage_error)?;
            Ok(inserted == 1)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn latest_period_start(
        &self,
        granularity: Granularity,
        names: &[&str],
    ) -> DomainResult<Option<NaiveDate>> {
        if names.is_empty() {
            return Ok(None);
        }

        let db = Arc::clone(&self.db);
        let mut values = vec![Value::Text(granularity.as_str().to_string())];
        values.extend(names.iter().map(|name| Value::Text((*name).to_string())));
        let placeholders = vec!["?"; names.len()].join(", ");

        task::spawn_blocking(move || -> DomainResult<Option<NaiveDate>> {
            let conn = db.get_connection()?;
            let sql = format!(
                "SELECT MAX(date) FROM stats WHERE period = ? AND name IN ({placeholders})"
            );
            let latest: Option<String> = conn
                .query_row(&sql, params_from_iter(values), |row| row.get(0))
                .map_err(map_storage_error)?;
            latest.as_deref().map(parse_date).transpose()
        })
        .await
        .map_err(map_join_error)?
    }
}
