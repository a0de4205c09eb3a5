use serde::Serialize;

use crate::analytics_db::AnalyticsDb;
use crate::date::DayScan;
use crate::error::Result;
use crate::models::processing::ProcessingStatus;

/// Answer to "what should the rollup work on next?".
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum NextUnit {
    /// A day with stages still pending. Its day is the new cursor value.
    Work { status: ProcessingStatus, advanced: bool },
    /// The next candidate day has not ended yet in the reference timezone.
    WaitForMidnight { next_day: u32 },
    /// No day with events within the scan allowance.
    NotFound { scanned_after: u32 },
    /// Nothing was ever processed and no start day was given.
    NoCursor,
}

/// Find the next unit of rollup work.
///
/// `last_processed_day` is the caller's cursor; when absent the newest
/// processing status is used. The day's status row is created if missing.
/// The cursor itself is not persisted here.
pub fn next_unit_of_work(
    db: &AnalyticsDb,
    last_processed_day: Option<u32>,
    today: u32,
    max_scan_days: u32,
) -> Result<NextUnit> {
    let cursor = match last_processed_day {
        Some(day) => day,
        None => match db.latest_processing_status()? {
            Some(status) => status.analytics_date_as_integer,
            None => return Ok(NextUnit::NoCursor),
        },
    };

    if cursor >= today {
        return Ok(NextUnit::WaitForMidnight { next_day: cursor });
    }

    match db.get_processing_status(cursor)? {
        None => {
            let status = db.create_processing_status(cursor)?;
            return Ok(NextUnit::Work {
                status,
                advanced: false,
            });
        }
        Some(status) if !status.is_complete() => {
            return Ok(NextUnit::Work {
                status,
                advanced: false,
            });
        }
        Some(_) => {}
    }

    for day in DayScan::after(cursor, max_scan_days)? {
        if day >= today {
            return Ok(NextUnit::WaitForMidnight { next_day: day });
        }
        if db.has_actions_on(day)? {
            let status = db.create_processing_status(day)?;
            return Ok(NextUnit::Work {
                status,
                advanced: true,
            });
        }
    }
    tracing::warn!("no actions within {max_scan_days} days after {cursor}");
    Ok(NextUnit::NotFound {
        scanned_after: cursor,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::processing::ProcessingStage;

    fn add_action(db: &AnalyticsDb, day: u32) {
        db.insert_action(&crate::models::action::AnalyticsAction {
            id: 0,
            action_constant: 6,
            exact_time: "2024-01-05T12:00:00Z".into(),
            date_as_integer: day,
            voter_we_vote_id: Some("wv01voter1".into()),
            voter_id: None,
            is_signed_in: false,
            state_code: None,
            organization_we_vote_id: None,
            organization_id: None,
            ballot_item_we_vote_id: None,
            google_civic_election_id: None,
            first_visit_today: false,
            voter_device_id: None,
            user_agent: None,
            is_bot: false,
            is_mobile: false,
            is_desktop: false,
            is_tablet: false,
        })
        .unwrap();
    }

    fn finish(db: &AnalyticsDb, day: u32) {
        for stage in ProcessingStage::ALL {
            db.mark_stage_finished(day, stage).unwrap();
        }
    }

    #[test]
    fn test_missing_status_is_created() {
        let db = AnalyticsDb::open_in_memory().unwrap();
        let next = next_unit_of_work(&db, Some(20240105), 20240110, 500).unwrap();
        assert_eq!(
            next,
            NextUnit::Work {
                status: ProcessingStatus::new(20240105),
                advanced: false
            }
        );
        assert!(db.get_processing_status(20240105).unwrap().is_some());
    }

    #[test]
    fn test_incomplete_day_is_returned_again() {
        let db = AnalyticsDb::open_in_memory().unwrap();
        db.create_processing_status(20240105).unwrap();
        db.mark_stage_finished(20240105, ProcessingStage::AugmentAnalyticsActionWithElectionId)
            .unwrap();
        match next_unit_of_work(&db, Some(20240105), 20240110, 500).unwrap() {
            NextUnit::Work { status, advanced } => {
                assert_eq!(status.analytics_date_as_integer, 20240105);
                assert!(status.finished_augment_analytics_action_with_election_id);
                assert!(!advanced);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_advances_over_empty_days() {
        let db = AnalyticsDb::open_in_memory().unwrap();
        db.create_processing_status(20240105).unwrap();
        finish(&db, 20240105);
        add_action(&db, 20240108);

        match next_unit_of_work(&db, Some(20240105), 20240110, 500).unwrap() {
            NextUnit::Work { status, advanced } => {
                assert_eq!(status, ProcessingStatus::new(20240108));
                assert!(advanced);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_never_advances_into_today() {
        let db = AnalyticsDb::open_in_memory().unwrap();
        db.create_processing_status(20240105).unwrap();
        finish(&db, 20240105);
        add_action(&db, 20240106);
        add_action(&db, 20240107);

        assert_eq!(
            next_unit_of_work(&db, Some(20240105), 20240106, 500).unwrap(),
            NextUnit::WaitForMidnight { next_day: 20240106 }
        );
        assert!(db.get_processing_status(20240106).unwrap().is_none());

        // A cursor already on today also waits.
        assert_eq!(
            next_unit_of_work(&db, Some(20240106), 20240106, 500).unwrap(),
            NextUnit::WaitForMidnight { next_day: 20240106 }
        );
    }

    #[test]
    fn test_scan_guard_reports_not_found() {
        let db = AnalyticsDb::open_in_memory().unwrap();
        db.create_processing_status(20200101).unwrap();
        finish(&db, 20200101);
        // The only later action sits past the 500-day allowance.
        add_action(&db, 20220101);

        assert_eq!(
            next_unit_of_work(&db, Some(20200101), 20240101, 500).unwrap(),
            NextUnit::NotFound {
                scanned_after: 20200101
            }
        );
        assert_eq!(
            db.latest_processing_status().unwrap().unwrap().analytics_date_as_integer,
            20200101
        );
    }

    #[test]
    fn test_falls_back_to_latest_status() {
        let db = AnalyticsDb::open_in_memory().unwrap();
        assert_eq!(next_unit_of_work(&db, None, 20240110, 500).unwrap(), NextUnit::NoCursor);

        db.create_processing_status(20240103).unwrap();
        match next_unit_of_work(&db, None, 20240110, 500).unwrap() {
            NextUnit::Work { status, .. } => assert_eq!(status.analytics_date_as_integer, 20240103),
            other => panic!("unexpected {other:?}"),
        }
    }
}
