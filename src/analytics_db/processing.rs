use rusqlite::types::Value;
use rusqlite::{OptionalExtension, Row, params, params_from_iter};

use super::AnalyticsDb;
use crate::error::{AnalyticsError, Result};
use crate::models::processing::{
    ProcessedFilter, ProcessedList, ProcessedMarker, ProcessingStage, ProcessingStatus,
};

const STATUS_COLUMNS: &str = "analytics_date_as_integer, \
     finished_augment_analytics_action_with_election_id, \
     finished_augment_analytics_action_with_first_visit, \
     finished_calculate_organization_daily_metrics, \
     finished_calculate_organization_election_metrics, \
     finished_calculate_sitewide_daily_metrics, \
     finished_calculate_sitewide_election_metrics, \
     finished_calculate_sitewide_voter_metrics";

fn status_from_row(row: &Row<'_>) -> rusqlite::Result<ProcessingStatus> {
    Ok(ProcessingStatus {
        analytics_date_as_integer: row.get(0)?,
        finished_augment_analytics_action_with_election_id: row.get(1)?,
        finished_augment_analytics_action_with_first_visit: row.get(2)?,
        finished_calculate_organization_daily_metrics: row.get(3)?,
        finished_calculate_organization_election_metrics: row.get(4)?,
        finished_calculate_sitewide_daily_metrics: row.get(5)?,
        finished_calculate_sitewide_election_metrics: row.get(6)?,
        finished_calculate_sitewide_voter_metrics: row.get(7)?,
    })
}

fn marker_from_row(row: &Row<'_>) -> rusqlite::Result<ProcessedMarker> {
    let voter: String = row.get(6)?;
    Ok(ProcessedMarker {
        id: row.get(0)?,
        analytics_date_as_integer: row.get(1)?,
        batch_process_id: row.get(2)?,
        batch_process_analytics_chunk_id: row.get(3)?,
        organization_we_vote_id: row.get(4)?,
        google_civic_election_id: row.get(5)?,
        voter_we_vote_id: if voter.is_empty() { None } else { Some(voter) },
        kind_of_process: row.get(7)?,
    })
}

/// Conditions shared by marker listing and deletion.
fn processed_where(filter: &ProcessedFilter) -> (String, Vec<Value>) {
    let mut conditions = vec!["1 = 1".to_string()];
    let mut values = Vec::new();

    if let Some(day) = filter.analytics_date_as_integer {
        let op = if filter.more_recent_than { ">=" } else { "=" };
        conditions.push(format!("analytics_date_as_integer {op} ?"));
        values.push(Value::Integer(i64::from(day)));
    }
    if let Some(voter) = filter.voter_we_vote_id.as_deref().filter(|v| !v.is_empty()) {
        conditions.push("voter_we_vote_id = ? COLLATE NOCASE".to_string());
        values.push(Value::Text(voter.to_string()));
    } else if !filter.voter_we_vote_id_list.is_empty() {
        let slots = vec!["?"; filter.voter_we_vote_id_list.len()].join(", ");
        conditions.push(format!("voter_we_vote_id IN ({slots})"));
        values.extend(filter.voter_we_vote_id_list.iter().cloned().map(Value::Text));
    }
    if let Some(election) = filter.google_civic_election_id {
        conditions.push("google_civic_election_id = ?".to_string());
        values.push(Value::Integer(election));
    }
    if let Some(org) = filter.organization_we_vote_id.as_deref().filter(|v| !v.is_empty()) {
        conditions.push("organization_we_vote_id = ? COLLATE NOCASE".to_string());
        values.push(Value::Text(org.to_string()));
    }
    if let Some(kind) = filter.kind_of_process.as_deref().filter(|v| !v.is_empty()) {
        conditions.push("kind_of_process = ?".to_string());
        values.push(Value::Text(kind.to_string()));
    }
    if let Some(batch) = filter.batch_process_id {
        conditions.push("batch_process_id = ?".to_string());
        values.push(Value::Integer(batch));
    }
    if let Some(chunk) = filter.batch_process_analytics_chunk_id {
        conditions.push("batch_process_analytics_chunk_id = ?".to_string());
        values.push(Value::Integer(chunk));
    }
    (conditions.join(" AND "), values)
}

impl AnalyticsDb {
    // ── Processing status ──

    pub fn get_processing_status(&self, day: u32) -> Result<Option<ProcessingStatus>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {STATUS_COLUMNS} FROM analytics_processing_status WHERE analytics_date_as_integer = ?1"
        );
        let status = conn.query_row(&sql, params![day], status_from_row).optional()?;
        Ok(status)
    }

    /// Create the day's status with every flag false. An existing row is
    /// returned untouched.
    pub fn create_processing_status(&self, day: u32) -> Result<ProcessingStatus> {
        {
            let conn = self.conn()?;
            conn.execute(
                "INSERT OR IGNORE INTO analytics_processing_status (analytics_date_as_integer) VALUES (?1)",
                params![day],
            )?;
        }
        Ok(self
            .get_processing_status(day)?
            .unwrap_or_else(|| ProcessingStatus::new(day)))
    }

    /// The status with the highest day key.
    pub fn latest_processing_status(&self) -> Result<Option<ProcessingStatus>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {STATUS_COLUMNS} FROM analytics_processing_status
             ORDER BY analytics_date_as_integer DESC LIMIT 1"
        );
        let status = conn.query_row(&sql, [], status_from_row).optional()?;
        Ok(status)
    }

    pub fn mark_stage_finished(&self, day: u32, stage: ProcessingStage) -> Result<bool> {
        let conn = self.conn()?;
        let sql = format!(
            "UPDATE analytics_processing_status SET {} = 1 WHERE analytics_date_as_integer = ?1",
            stage.column()
        );
        let count = conn.execute(&sql, params![day])?;
        Ok(count > 0)
    }

    // ── Processed markers ──

    /// Record a finished unit of work. Returns false when the same
    /// (day, voter, kind) was already recorded.
    pub fn save_processed_marker(&self, marker: &ProcessedMarker) -> Result<bool> {
        let conn = self.conn()?;
        let count = conn.execute(
            "INSERT OR IGNORE INTO analytics_processed (
                analytics_date_as_integer, batch_process_id, batch_process_analytics_chunk_id,
                organization_we_vote_id, google_civic_election_id, voter_we_vote_id, kind_of_process
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                marker.analytics_date_as_integer,
                marker.batch_process_id,
                marker.batch_process_analytics_chunk_id,
                marker.organization_we_vote_id,
                marker.google_civic_election_id,
                marker.voter_we_vote_id.as_deref().unwrap_or(""),
                marker.kind_of_process,
            ],
        )?;
        Ok(count > 0)
    }

    pub fn list_processed(&self, filter: &ProcessedFilter) -> Result<ProcessedList> {
        let conn = self.conn()?;
        let (clause, values) = processed_where(filter);
        let sql = format!(
            "SELECT id, analytics_date_as_integer, batch_process_id, batch_process_analytics_chunk_id,
                    organization_we_vote_id, google_civic_election_id, voter_we_vote_id, kind_of_process
             FROM analytics_processed WHERE {clause} ORDER BY id"
        );
        let mut stmt = conn.prepare(&sql)?;
        let markers = stmt
            .query_map(params_from_iter(values.iter()), marker_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut voter_we_vote_id_list: Vec<String> = Vec::new();
        for voter in markers.iter().filter_map(|m| m.voter_we_vote_id.as_ref()) {
            if !voter_we_vote_id_list.contains(voter) {
                voter_we_vote_id_list.push(voter.clone());
            }
        }
        Ok(ProcessedList {
            markers,
            voter_we_vote_id_list,
        })
    }

    /// Bulk delete markers to force reprocessing. A day is required so a bare
    /// filter cannot wipe the table.
    pub fn delete_processed(&self, filter: &ProcessedFilter) -> Result<usize> {
        if filter.analytics_date_as_integer.is_none() {
            return Err(AnalyticsError::MissingField("analytics_date_as_integer"));
        }
        let conn = self.conn()?;
        let (clause, values) = processed_where(filter);
        let count = conn.execute(
            &format!("DELETE FROM analytics_processed WHERE {clause}"),
            params_from_iter(values.iter()),
        )?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn voter_marker(day: u32, voter: &str) -> ProcessedMarker {
        ProcessedMarker {
            analytics_date_as_integer: day,
            voter_we_vote_id: Some(voter.into()),
            kind_of_process: ProcessingStage::CalculateSitewideVoterMetrics
                .kind_of_process()
                .into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_create_status_is_idempotent() {
        let db = AnalyticsDb::open_in_memory().unwrap();
        let status = db.create_processing_status(20240105).unwrap();
        assert_eq!(status, ProcessingStatus::new(20240105));

        assert!(db
            .mark_stage_finished(20240105, ProcessingStage::AugmentAnalyticsActionWithFirstVisit)
            .unwrap());
        let again = db.create_processing_status(20240105).unwrap();
        assert!(again.finished_augment_analytics_action_with_first_visit);
        assert!(!again.is_complete());
    }

    #[test]
    fn test_latest_status_uses_highest_day() {
        let db = AnalyticsDb::open_in_memory().unwrap();
        assert!(db.latest_processing_status().unwrap().is_none());
        db.create_processing_status(20240107).unwrap();
        db.create_processing_status(20240103).unwrap();
        assert_eq!(
            db.latest_processing_status().unwrap().unwrap().analytics_date_as_integer,
            20240107
        );
    }

    #[test]
    fn test_marker_uniqueness_and_listing() {
        let db = AnalyticsDb::open_in_memory().unwrap();
        assert!(db.save_processed_marker(&voter_marker(20240105, "wv01voter1")).unwrap());
        assert!(!db.save_processed_marker(&voter_marker(20240105, "wv01voter1")).unwrap());
        db.save_processed_marker(&voter_marker(20240105, "wv01voter2")).unwrap();
        db.save_processed_marker(&voter_marker(20240106, "wv01voter1")).unwrap();

        let filter = ProcessedFilter {
            analytics_date_as_integer: Some(20240105),
            ..Default::default()
        };
        let list = db.list_processed(&filter).unwrap();
        assert_eq!(list.markers.len(), 2);
        assert_eq!(list.voter_we_vote_id_list, vec!["wv01voter1", "wv01voter2"]);

        let recent = ProcessedFilter {
            analytics_date_as_integer: Some(20240105),
            more_recent_than: true,
            voter_we_vote_id: Some("wv01voter1".into()),
            ..Default::default()
        };
        assert_eq!(db.list_processed(&recent).unwrap().markers.len(), 2);
    }

    #[test]
    fn test_delete_markers_by_day_and_voter() {
        let db = AnalyticsDb::open_in_memory().unwrap();
        db.save_processed_marker(&voter_marker(20240105, "wv01voter1")).unwrap();
        db.save_processed_marker(&voter_marker(20240105, "wv01voter2")).unwrap();

        assert!(matches!(
            db.delete_processed(&ProcessedFilter::default()),
            Err(AnalyticsError::MissingField(_))
        ));

        let filter = ProcessedFilter {
            analytics_date_as_integer: Some(20240105),
            voter_we_vote_id_list: vec!["wv01voter1".into()],
            ..Default::default()
        };
        assert_eq!(db.delete_processed(&filter).unwrap(), 1);
        let left = db
            .list_processed(&ProcessedFilter::default())
            .unwrap()
            .voter_we_vote_id_list;
        assert_eq!(left, vec!["wv01voter2"]);
    }
}
