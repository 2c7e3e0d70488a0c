//! SQLite-backed watermark store.
//!
//! The compare-then-write in [`SqliteWatermarkRepository::advance`] runs in an
//! immediate transaction, so a concurrent writer cannot slip in between the
//! read and the update.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use communaute_core::WatermarkStore;
use communaute_domain::{CommunauteError, Granularity, Result as DomainResult, Watermark};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use tokio::task;
use tracing::{debug, instrument};

use super::manager::DbManager;
use crate::errors::{map_join_error, map_storage_error};

pub(crate) const DATE_FORMAT: &str = "%Y-%m-%d";

pub struct SqliteWatermarkRepository {
    db: Arc<DbManager>,
}

impl SqliteWatermarkRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    pub async fn get(
        &self,
        subject_key: &str,
        granularity: Granularity,
    ) -> DomainResult<Option<NaiveDate>> {
        let db = Arc::clone(&self.db);
        let subject_key = subject_key.to_string();

        task::spawn_blocking(move || -> DomainResult<Option<NaiveDate>> {
            let conn = db.get_connection()?;
            query_watermark(&conn, &subject_key, granularity)
        })
        .await
        .map_err(map_join_error)?
    }

    #[instrument(skip(self))]
    pub async fn advance(
        &self,
        subject_key: &str,
        granularity: Granularity,
        new_date: NaiveDate,
    ) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let subject_key = subject_key.to_string();

        task::spawn_blocking(move || -> DomainResult<()> {
            let mut conn = db.get_connection()?;
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(map_storage_error)?;

            if let Some(current) = query_watermark(&tx, &subject_key, granularity)? {
                if new_date <= current {
                    return Err(CommunauteError::WatermarkRegression {
                        subject_key,
                        granularity,
                        current,
                        attempted: new_date,
                    });
                }
            }

            tx.execute(
                "INSERT INTO sync_watermarks
                     (subject_key, granularity, last_completed_date, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(subject_key, granularity)
                 DO UPDATE SET last_completed_date = excluded.last_completed_date,
                               updated_at = excluded.updated_at",
                params![
                    subject_key,
                    granularity.as_str(),
                    new_date.format(DATE_FORMAT).to_string(),
                    Utc::now().timestamp()
                ],
            )
            .map_err(map_storage_error)?;
            tx.commit().map_err(map_storage_error)?;

            debug!("watermark advanced");
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }

    /// Every stored watermark, ordered by subject then granularity.
    pub async fn list(&self) -> DomainResult<Vec<Watermark>> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<Vec<Watermark>> {
            let conn = db.get_connection()?;
            let mut stmt = conn
                .prepare(
                    "SELECT subject_key, granularity, last_completed_date, updated_at
                     FROM sync_watermarks ORDER BY subject_key, granularity",
                )
                .map_err(map_storage_error)?;

            let rows = stmt
                .query_map([], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, i64>(3)?,
                    ))
                })
                .map_err(map_storage_error)?;

            let mut watermarks = Vec::new();
            for row in rows {
                let (subject_key, granularity, date, updated_at) = row.map_err(map_storage_error)?;
                watermarks.push(Watermark {
                    subject_key,
                    granularity: Granularity::from_str(&granularity)
                        .map_err(CommunauteError::Database)?,
                    last_completed_date: parse_date(&date)?,
                    updated_at: DateTime::<Utc>::from_timestamp(updated_at, 0).unwrap_or_default(),
                });
            }
            Ok(watermarks)
        })
        .await
        .map_err(map_join_error)?
    }
}

#[async_trait]
impl WatermarkStore for SqliteWatermarkRepository {
    async fn get_watermark(
        &self,
        subject_key: &str,
        granularity: Granularity,
    ) -> DomainResult<Option<NaiveDate>> {
        Self::get(self, subject_key, granularity).await
    }

    async fn advance(
        &self,
        subject_key: &str,
        granularity: Granularity,
        new_date: NaiveDate,
    ) -> DomainResult<()> {
        Self::advance(self, subject_key, granularity, new_date).await
    }
}

fn query_watermark(
    conn: &Connection,
    subject_key: &str,
    granularity: Granularity,
) -> DomainResult<Option<NaiveDate>> {
    let stored: Option<String> = conn
        .query_row(
            "SELECT last_completed_date FROM sync_watermarks
             WHERE subject_key = ?1 AND granularity = ?2",
            params![subject_key, granularity.as_str()],
            |row| row.get(0),
        )
        .optional()
        .map_err(map_storage_error)?;

    stored.as_deref().map(parse_date).transpose()
}

pub(crate) fn parse_date(value: &str) -> DomainResult<NaiveDate> {
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map_err(|e| CommunauteError::Database(format!("invalid stored date '{value}': {e}")))
}
