use serde::{Deserialize, Serialize};

/// One aggregation stage of the daily rollup, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessingStage {
    AugmentAnalyticsActionWithElectionId,
    AugmentAnalyticsActionWithFirstVisit,
    CalculateOrganizationDailyMetrics,
    CalculateOrganizationElectionMetrics,
    CalculateSitewideDailyMetrics,
    CalculateSitewideElectionMetrics,
    CalculateSitewideVoterMetrics,
}

impl ProcessingStage {
    pub const ALL: [ProcessingStage; 7] = [
        Self::AugmentAnalyticsActionWithElectionId,
        Self::AugmentAnalyticsActionWithFirstVisit,
        Self::CalculateOrganizationDailyMetrics,
        Self::CalculateOrganizationElectionMetrics,
        Self::CalculateSitewideDailyMetrics,
        Self::CalculateSitewideElectionMetrics,
        Self::CalculateSitewideVoterMetrics,
    ];

    /// The `kind_of_process` label written to processed markers.
    pub fn kind_of_process(self) -> &'static str {
        match self {
            Self::AugmentAnalyticsActionWithElectionId => "AUGMENT_ANALYTICS_ACTION_WITH_ELECTION_ID",
            Self::AugmentAnalyticsActionWithFirstVisit => "AUGMENT_ANALYTICS_ACTION_WITH_FIRST_VISIT",
            Self::CalculateOrganizationDailyMetrics => "CALCULATE_ORGANIZATION_DAILY_METRICS",
            Self::CalculateOrganizationElectionMetrics => "CALCULATE_ORGANIZATION_ELECTION_METRICS",
            Self::CalculateSitewideDailyMetrics => "CALCULATE_SITEWIDE_DAILY_METRICS",
            Self::CalculateSitewideElectionMetrics => "CALCULATE_SITEWIDE_ELECTION_METRICS",
            Self::CalculateSitewideVoterMetrics => "CALCULATE_SITEWIDE_VOTER_METRICS",
        }
    }

    /// Completion-flag column in `analytics_processing_status`.
    pub fn column(self) -> &'static str {
        match self {
            Self::AugmentAnalyticsActionWithElectionId => "finished_augment_analytics_action_with_election_id",
            Self::AugmentAnalyticsActionWithFirstVisit => "finished_augment_analytics_action_with_first_visit",
            Self::CalculateOrganizationDailyMetrics => "finished_calculate_organization_daily_metrics",
            Self::CalculateOrganizationElectionMetrics => "finished_calculate_organization_election_metrics",
            Self::CalculateSitewideDailyMetrics => "finished_calculate_sitewide_daily_metrics",
            Self::CalculateSitewideElectionMetrics => "finished_calculate_sitewide_election_metrics",
            Self::CalculateSitewideVoterMetrics => "finished_calculate_sitewide_voter_metrics",
        }
    }
}

/// Per-day rollup progress. Created with every flag false.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessingStatus {
    pub analytics_date_as_integer: u32,
    pub finished_augment_analytics_action_with_election_id: bool,
    pub finished_augment_analytics_action_with_first_visit: bool,
    pub finished_calculate_organization_daily_metrics: bool,
    pub finished_calculate_organization_election_metrics: bool,
    pub finished_calculate_sitewide_daily_metrics: bool,
    pub finished_calculate_sitewide_election_metrics: bool,
    pub finished_calculate_sitewide_voter_metrics: bool,
}

impl ProcessingStatus {
    pub fn new(analytics_date_as_integer: u32) -> Self {
        Self {
            analytics_date_as_integer,
            ..Self::default()
        }
    }

    pub fn is_finished(&self, stage: ProcessingStage) -> bool {
        match stage {
            ProcessingStage::AugmentAnalyticsActionWithElectionId => {
                self.finished_augment_analytics_action_with_election_id
            }
            ProcessingStage::AugmentAnalyticsActionWithFirstVisit => {
                self.finished_augment_analytics_action_with_first_visit
            }
            ProcessingStage::CalculateOrganizationDailyMetrics => {
                self.finished_calculate_organization_daily_metrics
            }
            ProcessingStage::CalculateOrganizationElectionMetrics => {
                self.finished_calculate_organization_election_metrics
            }
            ProcessingStage::CalculateSitewideDailyMetrics => {
                self.finished_calculate_sitewide_daily_metrics
            }
            ProcessingStage::CalculateSitewideElectionMetrics => {
                self.finished_calculate_sitewide_election_metrics
            }
            ProcessingStage::CalculateSitewideVoterMetrics => {
                self.finished_calculate_sitewide_voter_metrics
            }
        }
    }

    pub fn mark_finished(&mut self, stage: ProcessingStage) {
        let flag = match stage {
            ProcessingStage::AugmentAnalyticsActionWithElectionId => {
                &mut self.finished_augment_analytics_action_with_election_id
            }
            ProcessingStage::AugmentAnalyticsActionWithFirstVisit => {
                &mut self.finished_augment_analytics_action_with_first_visit
            }
            ProcessingStage::CalculateOrganizationDailyMetrics => {
                &mut self.finished_calculate_organization_daily_metrics
            }
            ProcessingStage::CalculateOrganizationElectionMetrics => {
                &mut self.finished_calculate_organization_election_metrics
            }
            ProcessingStage::CalculateSitewideDailyMetrics => {
                &mut self.finished_calculate_sitewide_daily_metrics
            }
            ProcessingStage::CalculateSitewideElectionMetrics => {
                &mut self.finished_calculate_sitewide_election_metrics
            }
            ProcessingStage::CalculateSitewideVoterMetrics => {
                &mut self.finished_calculate_sitewide_voter_metrics
            }
        };
        *flag = true;
    }

    pub fn incomplete_stages(&self) -> Vec<ProcessingStage> {
        ProcessingStage::ALL
            .into_iter()
            .filter(|stage| !self.is_finished(*stage))
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        ProcessingStage::ALL.iter().all(|stage| self.is_finished(*stage))
    }
}

/// Record that one unit of aggregation work (day, voter, kind) already ran.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessedMarker {
    pub id: i64,
    pub analytics_date_as_integer: u32,
    pub batch_process_id: Option<i64>,
    pub batch_process_analytics_chunk_id: Option<i64>,
    pub organization_we_vote_id: Option<String>,
    pub google_civic_election_id: Option<i64>,
    pub voter_we_vote_id: Option<String>,
    pub kind_of_process: String,
}

/// Selection over processed markers. Empty fields do not filter.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProcessedFilter {
    #[serde(default)]
    pub analytics_date_as_integer: Option<u32>,
    /// Treat `analytics_date_as_integer` as an inclusive lower bound.
    #[serde(default)]
    pub more_recent_than: bool,
    #[serde(default)]
    pub voter_we_vote_id: Option<String>,
    #[serde(default)]
    pub voter_we_vote_id_list: Vec<String>,
    #[serde(default)]
    pub google_civic_election_id: Option<i64>,
    #[serde(default)]
    pub organization_we_vote_id: Option<String>,
    #[serde(default)]
    pub kind_of_process: Option<String>,
    #[serde(default)]
    pub batch_process_id: Option<i64>,
    #[serde(default)]
    pub batch_process_analytics_chunk_id: Option<i64>,
}

/// Query-string form of a marker listing. The voter list is comma-separated.
#[derive(Debug, Default, Deserialize)]
pub struct ProcessedQuery {
    pub analytics_date_as_integer: Option<u32>,
    #[serde(default)]
    pub more_recent_than: bool,
    pub voter_we_vote_id: Option<String>,
    pub voter_we_vote_id_list: Option<String>,
    pub google_civic_election_id: Option<i64>,
    pub organization_we_vote_id: Option<String>,
    pub kind_of_process: Option<String>,
    pub batch_process_id: Option<i64>,
    pub batch_process_analytics_chunk_id: Option<i64>,
}

impl ProcessedQuery {
    pub fn to_filter(self) -> ProcessedFilter {
        let voter_we_vote_id_list = self
            .voter_we_vote_id_list
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(String::from)
            .collect();
        ProcessedFilter {
            analytics_date_as_integer: self.analytics_date_as_integer,
            more_recent_than: self.more_recent_than,
            voter_we_vote_id: self.voter_we_vote_id,
            voter_we_vote_id_list,
            google_civic_election_id: self.google_civic_election_id,
            organization_we_vote_id: self.organization_we_vote_id,
            kind_of_process: self.kind_of_process,
            batch_process_id: self.batch_process_id,
            batch_process_analytics_chunk_id: self.batch_process_analytics_chunk_id,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ProcessedList {
    pub markers: Vec<ProcessedMarker>,
    pub voter_we_vote_id_list: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_status_has_every_stage_pending() {
        let status = ProcessingStatus::new(20240105);
        assert!(!status.is_complete());
        assert_eq!(status.incomplete_stages(), ProcessingStage::ALL.to_vec());
    }

    #[test]
    fn test_mark_finished_flips_one_flag() {
        let mut status = ProcessingStatus::new(20240105);
        status.mark_finished(ProcessingStage::CalculateSitewideDailyMetrics);
        assert!(status.finished_calculate_sitewide_daily_metrics);
        assert!(!status.is_finished(ProcessingStage::CalculateSitewideVoterMetrics));
        assert_eq!(status.incomplete_stages().len(), 6);

        for stage in ProcessingStage::ALL {
            status.mark_finished(stage);
        }
        assert!(status.is_complete());
    }

    #[test]
    fn test_stage_serializes_as_kind_of_process() {
        let json = serde_json::to_string(&ProcessingStage::CalculateSitewideVoterMetrics).unwrap();
        assert_eq!(json, "\"CALCULATE_SITEWIDE_VOTER_METRICS\"");
    }

    #[test]
    fn test_processed_query_splits_voter_list() {
        let query = ProcessedQuery {
            analytics_date_as_integer: Some(20240105),
            voter_we_vote_id_list: Some("wv01a, ,wv01b".into()),
            ..Default::default()
        };
        let filter = query.to_filter();
        assert_eq!(filter.voter_we_vote_id_list, vec!["wv01a", "wv01b"]);
        assert_eq!(filter.analytics_date_as_integer, Some(20240105));
    }
}
