//! Analytics collection executor
//!
//! Plans windows from the stored watermark, then for each window fetches the
//! visit and engagement metrics, persists them idempotently and only then
//! advances the watermark. A failure aborts the granularity's run, leaving
//! the watermark on the last fully persisted window.

use std::sync::Arc;

use chrono::NaiveDate;
use communaute_domain::constants::{MATOMO_STAT_NAMES, MATOMO_SUBJECT_KEY};
use communaute_domain::{CommunauteError, Granularity, MetricRecord, Result, RunReport, SyncWindow};
use tracing::{debug, error, info, instrument, warn};

use super::planner::WindowPlanner;
use super::ports::{AnalyticsSource, StatRecordStore, WatermarkStore};

/// Per-granularity outcomes of [`StatsCollectionService::run_all`].
#[derive(Debug, Default)]
pub struct CollectionSummary {
    pub reports: Vec<RunReport>,
    pub failures: Vec<(Granularity, CommunauteError)>,
}

impl CollectionSummary {
    /// Whether every granularity completed.
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Records written across all granularities.
    pub fn records_inserted(&self) -> usize {
        self.reports.iter().map(|r| r.records_inserted).sum()
    }
}

/// Drives plan → fetch → persist → advance cycles
pub struct StatsCollectionService {
    watermarks: Arc<dyn WatermarkStore>,
    records: Arc<dyn StatRecordStore>,
    source: Arc<dyn AnalyticsSource>,
    planner: WindowPlanner,
    subject_key: String,
    metric_names: Vec<&'static str>,
}

impl StatsCollectionService {
    /// Matomo collection from the default epoch.
    pub fn new(
        watermarks: Arc<dyn WatermarkStore>,
        records: Arc<dyn StatRecordStore>,
        source: Arc<dyn AnalyticsSource>,
    ) -> Self {
        Self {
            watermarks,
            records,
            source,
            planner: WindowPlanner::default(),
            subject_key: MATOMO_SUBJECT_KEY.to_string(),
            metric_names: MATOMO_STAT_NAMES.to_vec(),
        }
    }

    /// Replace the planner, e.g. to start from another epoch.
    pub fn with_planner(mut self, planner: WindowPlanner) -> Self {
        self.planner = planner;
        self
    }

    /// Key under which watermarks are stored.
    pub fn with_subject_key(mut self, subject_key: impl Into<String>) -> Self {
        self.subject_key = subject_key.into();
        self
    }

    /// Collect every elapsed window for one granularity.
    #[instrument(skip(self), fields(subject = %self.subject_key))]
    pub async fn run(&self, granularity: Granularity, today: NaiveDate) -> Result<RunReport> {
        let watermark = self.resolve_watermark(granularity).await?;
        let windows = self.planner.plan(granularity, watermark, today);
        let mut report = RunReport::empty(granularity, watermark);

        if windows.is_empty() {
            info!(?watermark, "Already caught up, nothing to collect");
            return Ok(report);
        }
        info!(windows = windows.len(), ?watermark, "Collecting analytics windows");

        for window in windows {
            let (inserted, skipped) = self.collect_window(&window).await.map_err(|e| {
                error!(
                    period_start = %window.period_start,
                    error = %e,
                    "Window collection failed, aborting run"
                );
                e
            })?;

            self.watermarks
                .advance(&self.subject_key, granularity, window.period_start)
                .await
                .map_err(|e| {
                    if e.is_fatal() {
                        error!(fatal = true, error = %e, "Refusing to regress watermark");
                    }
                    e
                })?;

            report.windows_processed += 1;
            report.records_inserted += inserted;
            report.records_skipped += skipped;
            report.watermark = Some(window.period_start);
            debug!(period_start = %window.period_start, inserted, skipped, "Window committed");
        }

        info!(
            windows = report.windows_processed,
            inserted = report.records_inserted,
            skipped = report.records_skipped,
            "Analytics collection finished"
        );
        Ok(report)
    }

    /// Run day then month collection.
    ///
    /// Ordinary failures are logged and reported per granularity. A watermark
    /// regression is returned as an error.
    pub async fn run_all(&self, today: NaiveDate) -> Result<CollectionSummary> {
        let mut summary = CollectionSummary::default();
        for granularity in Granularity::ALL {
            match self.run(granularity, today).await {
                Ok(report) => summary.reports.push(report),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(%granularity, error = %e, "Analytics collection failed");
                    summary.failures.push((granularity, e));
                }
            }
        }
        Ok(summary)
    }

    /// Stored watermark, seeded from existing stats on first use.
    async fn resolve_watermark(&self, granularity: Granularity) -> Result<Option<NaiveDate>> {
        if let Some(watermark) =
            self.watermarks.get_watermark(&self.subject_key, granularity).await?
        {
            return Ok(Some(watermark));
        }

        let latest = self.records.latest_period_start(granularity, &self.metric_names).await?;
        if let Some(date) = latest {
            info!(%granularity, %date, "Seeding watermark from previously collected stats");
            self.watermarks.advance(&self.subject_key, granularity, date).await?;
        }
        Ok(latest)
    }

    async fn collect_window(&self, window: &SyncWindow) -> Result<(usize, usize)> {
        let granularity = window.granularity;
        let mut records = self.source.fetch_visits(granularity, window.period_start).await?;
        records.extend(
            self.source
                .fetch_engagement(granularity, window.period_start, granularity.visitors_key())
                .await?,
        );

        let mut inserted = 0;
        let mut skipped = 0;
        for record in &records {
            ensure_in_window(record, window)?;
            if self.records.insert_if_absent(record).await? {
                inserted += 1;
            } else {
                skipped += 1;
            }
        }
        Ok((inserted, skipped))
    }
}

fn ensure_in_window(record: &MetricRecord, window: &SyncWindow) -> Result<()> {
    if record.period == window.granularity && record.date == window.period_start {
        Ok(())
    } else {
        Err(CommunauteError::ExternalService(format!(
            "analytics source returned {} {} for window {} {}",
            record.period, record.date, window.granularity, window.period_start
        )))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, HashSet};

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[derive(Default)]
    struct MemoryWatermarks(Mutex<BTreeMap<(String, Granularity), NaiveDate>>);

    #[async_trait]
    impl WatermarkStore for MemoryWatermarks {
        async fn get_watermark(
            &self,
            subject_key: &str,
            granularity: Granularity,
        ) -> Result<Option<NaiveDate>> {
            Ok(self.0.lock().get(&(subject_key.to_string(), granularity)).copied())
        }

        async fn advance(
            &self,
            subject_key: &str,
            granularity: Granularity,
            new_date: NaiveDate,
        ) -> Result<()> {
            let mut map = self.0.lock();
            let key = (subject_key.to_string(), granularity);
            if let Some(current) = map.get(&key).copied() {
                if new_date <= current {
                    return Err(CommunauteError::WatermarkRegression {
                        subject_key: subject_key.to_string(),
                        granularity,
                        current,
                        attempted: new_date,
                    });
                }
            }
            map.insert(key, new_date);
            Ok(())
        }
    }

    #[derive(Default)]
    struct MemoryRecords(Mutex<Vec<MetricRecord>>);

    #[async_trait]
    impl StatRecordStore for MemoryRecords {
        async fn insert_if_absent(&self, record: &MetricRecord) -> Result<bool> {
            let mut rows = self.0.lock();
            let exists = rows.iter().any(|r| {
                r.period == record.period && r.date == record.date && r.name == record.name
            });
            if !exists {
                rows.push(record.clone());
            }
            Ok(!exists)
        }

        async fn latest_period_start(
            &self,
            granularity: Granularity,
            names: &[&str],
        ) -> Result<Option<NaiveDate>> {
            let names: HashSet<&str> = names.iter().copied().collect();
            Ok(self
                .0
                .lock()
                .iter()
                .filter(|r| r.period == granularity && names.contains(r.name.as_str()))
                .map(|r| r.date)
                .max())
        }
    }

    /// One visits and one engagement record per call; fails on `fail_on`.
    #[derive(Default)]
    struct FakeMatomo {
        calls: Mutex<Vec<(Granularity, NaiveDate, Option<String>)>>,
        fail_on: Option<NaiveDate>,
    }

    #[async_trait]
    impl AnalyticsSource for FakeMatomo {
        async fn fetch_visits(
            &self,
            granularity: Granularity,
            period_start: NaiveDate,
        ) -> Result<Vec<MetricRecord>> {
            self.calls.lock().push((granularity, period_start, None));
            if self.fail_on == Some(period_start) {
                return Err(CommunauteError::ExternalService("matomo unavailable".into()));
            }
            Ok(vec![MetricRecord::new(granularity, period_start, "nb_uniq_visitors", 10)])
        }

        async fn fetch_engagement(
            &self,
            granularity: Granularity,
            period_start: NaiveDate,
            visitors_key: &str,
        ) -> Result<Vec<MetricRecord>> {
            self.calls.lock().push((granularity, period_start, Some(visitors_key.to_string())));
            Ok(vec![MetricRecord::new(granularity, period_start, "nb_uniq_active_visitors", 4)])
        }
    }

    struct Harness {
        watermarks: Arc<MemoryWatermarks>,
        records: Arc<MemoryRecords>,
        source: Arc<FakeMatomo>,
        service: StatsCollectionService,
    }

    fn harness(source: FakeMatomo) -> Harness {
        let watermarks = Arc::new(MemoryWatermarks::default());
        let records = Arc::new(MemoryRecords::default());
        let source = Arc::new(source);
        let service =
            StatsCollectionService::new(watermarks.clone(), records.clone(), source.clone());
        Harness { watermarks, records, source, service }
    }

    async fn seed(h: &Harness, granularity: Granularity, last: NaiveDate) {
        h.watermarks.advance(MATOMO_SUBJECT_KEY, granularity, last).await.unwrap();
    }

    #[tokio::test]
    async fn collects_previous_day_and_month() {
        let h = harness(FakeMatomo::default());
        seed(&h, Granularity::Day, date(2025, 10, 30)).await;
        seed(&h, Granularity::Month, date(2025, 9, 1)).await;

        let summary = h.service.run_all(date(2025, 11, 1)).await.unwrap();

        assert!(summary.is_success());
        assert_eq!(summary.records_inserted(), 4);
        assert_eq!(
            *h.source.calls.lock(),
            vec![
                (Granularity::Day, date(2025, 10, 31), None),
                (Granularity::Day, date(2025, 10, 31), Some("nb_uniq_visitors".into())),
                (Granularity::Month, date(2025, 10, 1), None),
                (Granularity::Month, date(2025, 10, 1), Some("sum_daily_nb_uniq_visitors".into())),
            ]
        );
        assert_eq!(
            h.watermarks.get_watermark(MATOMO_SUBJECT_KEY, Granularity::Month).await.unwrap(),
            Some(date(2025, 10, 1))
        );
    }

    #[tokio::test]
    async fn second_run_same_day_is_a_no_op() {
        let h = harness(FakeMatomo::default());
        seed(&h, Granularity::Day, date(2025, 10, 30)).await;

        h.service.run(Granularity::Day, date(2025, 11, 1)).await.unwrap();
        let rows_before = h.records.0.lock().len();
        let report = h.service.run(Granularity::Day, date(2025, 11, 1)).await.unwrap();

        assert_eq!(report.windows_processed, 0);
        assert_eq!(h.records.0.lock().len(), rows_before);
        assert_eq!(report.watermark, Some(date(2025, 10, 31)));
    }

    #[tokio::test]
    async fn next_day_only_adds_the_new_day() {
        let h = harness(FakeMatomo::default());
        seed(&h, Granularity::Day, date(2025, 10, 30)).await;
        h.service.run(Granularity::Day, date(2025, 11, 1)).await.unwrap();

        let report = h.service.run(Granularity::Day, date(2025, 11, 2)).await.unwrap();

        assert_eq!(report.windows_processed, 1);
        assert_eq!(report.watermark, Some(date(2025, 11, 1)));
    }

    #[tokio::test]
    async fn failure_keeps_watermark_on_last_persisted_window() {
        let h = harness(FakeMatomo { fail_on: Some(date(2025, 11, 1)), ..FakeMatomo::default() });
        seed(&h, Granularity::Day, date(2025, 10, 30)).await;

        let err = h.service.run(Granularity::Day, date(2025, 11, 3)).await.unwrap_err();

        assert!(matches!(err, CommunauteError::ExternalService(_)));
        assert_eq!(
            h.watermarks.get_watermark(MATOMO_SUBJECT_KEY, Granularity::Day).await.unwrap(),
            Some(date(2025, 10, 31))
        );
        assert!(h.records.0.lock().iter().all(|r| r.date <= date(2025, 10, 31)));
    }

    #[tokio::test]
    async fn rerun_after_partial_window_skips_existing_records() {
        let h = harness(FakeMatomo::default());
        seed(&h, Granularity::Day, date(2025, 10, 30)).await;
        let existing =
            MetricRecord::new(Granularity::Day, date(2025, 10, 31), "nb_uniq_visitors", 10);
        h.records.insert_if_absent(&existing).await.unwrap();

        let report = h.service.run(Granularity::Day, date(2025, 11, 1)).await.unwrap();

        assert_eq!(report.records_inserted, 1);
        assert_eq!(report.records_skipped, 1);
    }

    #[tokio::test]
    async fn seeds_watermark_from_existing_stats() {
        let h = harness(FakeMatomo::default());
        let visits = MetricRecord::new(Granularity::Day, date(2024, 5, 18), "nb_uniq_visitors", 3);
        h.records.insert_if_absent(&visits).await.unwrap();
        let other = MetricRecord::new(Granularity::Day, date(2024, 5, 20), "unexpected_name", 3);
        h.records.insert_if_absent(&other).await.unwrap();

        let report = h.service.run(Granularity::Day, date(2024, 5, 20)).await.unwrap();

        assert_eq!(h.source.calls.lock()[0], (Granularity::Day, date(2024, 5, 19), None));
        assert_eq!(report.watermark, Some(date(2024, 5, 19)));
    }

    #[tokio::test]
    async fn one_failing_granularity_does_not_block_the_other() {
        let h = harness(FakeMatomo { fail_on: Some(date(2025, 10, 31)), ..FakeMatomo::default() });
        seed(&h, Granularity::Day, date(2025, 10, 30)).await;
        seed(&h, Granularity::Month, date(2025, 9, 1)).await;

        let summary = h.service.run_all(date(2025, 11, 1)).await.unwrap();

        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.failures[0].0, Granularity::Day);
        assert_eq!(summary.reports[0].granularity, Granularity::Month);
    }

    struct RegressingWatermarks;

    #[async_trait]
    impl WatermarkStore for RegressingWatermarks {
        async fn get_watermark(&self, _: &str, _: Granularity) -> Result<Option<NaiveDate>> {
            Ok(Some(date(2025, 10, 30)))
        }

        async fn advance(
            &self,
            subject_key: &str,
            granularity: Granularity,
            new_date: NaiveDate,
        ) -> Result<()> {
            Err(CommunauteError::WatermarkRegression {
                subject_key: subject_key.to_string(),
                granularity,
                current: date(2025, 12, 31),
                attempted: new_date,
            })
        }
    }

    #[tokio::test]
    async fn watermark_regression_is_not_swallowed() {
        let service = StatsCollectionService::new(
            Arc::new(RegressingWatermarks),
            Arc::new(MemoryRecords::default()),
            Arc::new(FakeMatomo::default()),
        );

        let err = service.run_all(date(2025, 11, 1)).await.unwrap_err();
        assert!(err.is_fatal());
    }
}
