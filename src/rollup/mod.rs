//! Daily rollup driver.
//!
//! Each tick asks the cursor for the next unit of work, persists the cursor
//! explicitly, then runs the day's incomplete stages in order.

pub mod cursor;
mod stages;

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::analytics_db::AnalyticsDb;
use crate::config::RollupConfig;
use crate::date::today_as_integer;
use crate::error::Result;
use crate::lookup::Directory;
use crate::models::processing::{ProcessingStage, ProcessingStatus};

pub use cursor::{NextUnit, next_unit_of_work};
pub use stages::{
    calculate_organization_daily, calculate_organization_election, calculate_sitewide_daily,
    calculate_sitewide_election, calculate_voter,
};

#[derive(Debug, Clone, Serialize)]
pub struct StageFailure {
    pub date_as_integer: u32,
    pub stage: ProcessingStage,
    pub error: String,
}

/// What one driver run did.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RollupReport {
    pub days_completed: Vec<u32>,
    pub stages_finished: usize,
    pub failure: Option<StageFailure>,
    /// Cursor answer that ended the run, if it ended on one.
    pub stopped_on: Option<NextUnit>,
}

pub struct RollupEngine {
    db: Arc<AnalyticsDb>,
    directory: Arc<dyn Directory>,
    config: RollupConfig,
    // Held for a whole run so the HTTP trigger and the timer never overlap.
    run_lock: tokio::sync::Mutex<()>,
}

impl RollupEngine {
    pub fn new(db: Arc<AnalyticsDb>, directory: Arc<dyn Directory>, config: RollupConfig) -> Self {
        Self {
            db,
            directory,
            config,
            run_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn config(&self) -> &RollupConfig {
        &self.config
    }

    /// Today in the reference timezone.
    pub fn today(&self) -> u32 {
        today_as_integer(self.config.reference_utc_offset_hours)
    }

    /// Process up to `max_days_per_tick` days, stopping on a failed stage
    /// or when the cursor has nothing left before `today`.
    pub async fn run_once(&self, today: u32) -> Result<RollupReport> {
        let _guard = self.run_lock.lock().await;
        let mut report = RollupReport::default();

        for _ in 0..self.config.max_days_per_tick.max(1) {
            let stored = self.db.last_processed_day()?;
            let cursor = stored.or(self.config.start_day);
            let next = next_unit_of_work(&self.db, cursor, today, self.config.max_scan_days)?;
            let status = match &next {
                NextUnit::Work { status, .. } => status.clone(),
                _ => {
                    tracing::debug!("rollup: stopping on {next:?}");
                    report.stopped_on = Some(next);
                    break;
                }
            };

            let day = status.analytics_date_as_integer;
            if stored != Some(day) {
                self.db.set_last_processed_day(day)?;
                tracing::info!("rollup: cursor moved to {day}");
            }

            if !self.process_day(&status, &mut report).await? {
                break;
            }
            report.days_completed.push(day);
        }
        Ok(report)
    }

    /// Run every incomplete stage of one day. Returns whether the day is complete.
    async fn process_day(&self, status: &ProcessingStatus, report: &mut RollupReport) -> Result<bool> {
        let day = status.analytics_date_as_integer;
        let mut progress = status.clone();
        for stage in status.incomplete_stages() {
            match stages::run_stage(&self.db, self.directory.as_ref(), day, stage).await {
                Ok(written) => {
                    self.db.mark_stage_finished(day, stage)?;
                    progress.mark_finished(stage);
                    report.stages_finished += 1;
                    tracing::info!("rollup: {day} {} done ({written} rows)", stage.kind_of_process());
                }
                Err(e) => {
                    tracing::error!("rollup: {day} {} failed: {e}", stage.kind_of_process());
                    report.failure = Some(StageFailure {
                        date_as_integer: day,
                        stage,
                        error: e.to_string(),
                    });
                    return Ok(false);
                }
            }
        }
        Ok(progress.is_complete())
    }
}

/// Spawn the rollup engine as a background task (fire-and-forget).
pub fn spawn_rollup_engine(engine: Arc<RollupEngine>) {
    let config = engine.config().clone();
    if !config.enabled {
        tracing::info!("rollup engine: disabled by config");
        return;
    }

    tokio::spawn(async move {
        // Let ingestion settle before the first pass
        tokio::time::sleep(Duration::from_secs(config.startup_delay_secs)).await;
        tracing::info!(
            "rollup engine: started (interval={}s, max_days_per_tick={})",
            config.interval_secs,
            config.max_days_per_tick
        );

        let mut interval = tokio::time::interval(Duration::from_secs(config.interval_secs.max(1)));
        loop {
            interval.tick().await;
            match engine.run_once(engine.today()).await {
                Ok(report) if !report.days_completed.is_empty() => {
                    tracing::info!("rollup engine: completed days {:?}", report.days_completed);
                }
                Ok(_) => {}
                Err(e) => tracing::error!("rollup engine error: {e}"),
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookup::StaticDirectory;
    use crate::models::action::{ActionKind, AnalyticsAction};

    fn record(db: &AnalyticsDb, kind: ActionKind, voter: &str, day: u32, org: Option<&str>) {
        db.insert_action(&AnalyticsAction {
            action_constant: kind.code(),
            exact_time: "2024-01-05T12:00:00Z".into(),
            date_as_integer: day,
            voter_we_vote_id: Some(voter.into()),
            organization_we_vote_id: org.map(String::from),
            ..Default::default()
        })
        .unwrap();
    }

    fn engine(db: Arc<AnalyticsDb>, start_day: Option<u32>) -> RollupEngine {
        let config = RollupConfig {
            start_day,
            ..Default::default()
        };
        RollupEngine::new(db, Arc::new(StaticDirectory::default()), config)
    }

    #[tokio::test]
    async fn test_run_processes_days_until_today() {
        let db = Arc::new(AnalyticsDb::open_in_memory().unwrap());
        record(&db, ActionKind::VoterGuideVisit, "voterA", 20240105, Some("orgO"));
        record(&db, ActionKind::BallotVisit, "voterA", 20240107, None);
        record(&db, ActionKind::BallotVisit, "voterB", 20240110, None);

        let engine = engine(db.clone(), Some(20240105));
        let report = engine.run_once(20240110).await.unwrap();

        assert_eq!(report.days_completed, vec![20240105, 20240107]);
        assert_eq!(report.stages_finished, 14);
        assert!(report.failure.is_none());
        assert_eq!(
            report.stopped_on,
            Some(NextUnit::WaitForMidnight { next_day: 20240110 })
        );
        assert_eq!(db.last_processed_day().unwrap(), Some(20240107));
        assert!(db.get_processing_status(20240107).unwrap().unwrap().is_complete());
        assert!(db.get_processing_status(20240110).unwrap().is_none());

        let daily = db.list_organization_daily_metrics("orgO", None, None).unwrap();
        assert_eq!(daily.len(), 1);
        assert_eq!(daily[0].visitors_today, 1);
        assert_eq!(db.list_sitewide_daily_metrics(None, None).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_second_run_is_idle() {
        let db = Arc::new(AnalyticsDb::open_in_memory().unwrap());
        record(&db, ActionKind::BallotVisit, "voterA", 20240105, None);
        let engine = engine(db.clone(), Some(20240105));

        engine.run_once(20240106).await.unwrap();
        let again = engine.run_once(20240106).await.unwrap();
        assert!(again.days_completed.is_empty());
        assert_eq!(again.stages_finished, 0);
    }

    #[tokio::test]
    async fn test_without_cursor_nothing_runs() {
        let db = Arc::new(AnalyticsDb::open_in_memory().unwrap());
        record(&db, ActionKind::BallotVisit, "voterA", 20240105, None);
        let report = engine(db.clone(), None).run_once(20240110).await.unwrap();
        assert_eq!(report.stopped_on, Some(NextUnit::NoCursor));
        assert_eq!(db.last_processed_day().unwrap(), None);
    }

    #[tokio::test]
    async fn test_tick_limit_caps_days() {
        let db = Arc::new(AnalyticsDb::open_in_memory().unwrap());
        for day in [20240101, 20240102, 20240103] {
            record(&db, ActionKind::BallotVisit, "voterA", day, None);
        }
        let config = RollupConfig {
            start_day: Some(20240101),
            max_days_per_tick: 2,
            ..Default::default()
        };
        let engine = RollupEngine::new(db.clone(), Arc::new(StaticDirectory::default()), config);

        let report = engine.run_once(20240110).await.unwrap();
        assert_eq!(report.days_completed, vec![20240101, 20240102]);
        let report = engine.run_once(20240110).await.unwrap();
        assert_eq!(report.days_completed, vec![20240103]);
    }
}
