use serde::Deserialize;

use crate::error::{AnalyticsError, Result};
use crate::models::action::ActionKind;

/// Selection over stored actions. Every populated field narrows the match;
/// multiple kinds are OR-ed together.
#[derive(Debug, Clone, Default)]
pub struct ActionFilter {
    pub kinds: Vec<ActionKind>,
    pub day: Option<u32>,
    pub from_day: Option<u32>,
    pub through_day: Option<u32>,
    pub organization_we_vote_id: Option<String>,
    pub google_civic_election_id: Option<i64>,
    pub voter_we_vote_id: Option<String>,
    /// Allowlist of actors. `Some(vec![])` matches nothing.
    pub voter_we_vote_ids: Option<Vec<String>>,
    pub state_code: Option<String>,
    pub signed_in_only: bool,
    pub first_visit_only: bool,
    /// Keep only actors with no action in the same organization scope before this day.
    pub new_since_day: Option<u32>,
}

impl ActionFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn kind(mut self, kind: ActionKind) -> Self {
        self.kinds.push(kind);
        self
    }

    pub fn kinds(mut self, kinds: &[ActionKind]) -> Self {
        self.kinds.extend_from_slice(kinds);
        self
    }

    pub fn on_day(mut self, day: u32) -> Self {
        self.day = Some(day);
        self
    }

    pub fn from_day(mut self, day: u32) -> Self {
        self.from_day = Some(day);
        self
    }

    pub fn through_day(mut self, day: u32) -> Self {
        self.through_day = Some(day);
        self
    }

    pub fn organization(mut self, organization_we_vote_id: &str) -> Self {
        self.organization_we_vote_id = Some(organization_we_vote_id.to_string());
        self
    }

    pub fn election(mut self, google_civic_election_id: i64) -> Self {
        self.google_civic_election_id = Some(google_civic_election_id);
        self
    }

    pub fn voter(mut self, voter_we_vote_id: &str) -> Self {
        self.voter_we_vote_id = Some(voter_we_vote_id.to_string());
        self
    }

    pub fn voters(mut self, voter_we_vote_ids: Vec<String>) -> Self {
        self.voter_we_vote_ids = Some(voter_we_vote_ids);
        self
    }

    pub fn signed_in(mut self) -> Self {
        self.signed_in_only = true;
        self
    }

    pub fn first_visit(mut self) -> Self {
        self.first_visit_only = true;
        self
    }

    pub fn new_since(mut self, day: u32) -> Self {
        self.new_since_day = Some(day);
        self
    }
}

/// What a distinct count counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountColumn {
    Voters,
    Organizations,
    Elections,
    Days,
    /// One per (voter, organization) pair, e.g. one person viewing one voter guide.
    VoterOrganizationPairs,
    /// Every matching row.
    Rows,
}

/// Query-string form of an action listing, as accepted over HTTP.
#[derive(Debug, Default, Deserialize)]
pub struct ActionListQuery {
    pub voter_we_vote_id: Option<String>,
    /// Comma-separated voter ids, used when `voter_we_vote_id` is absent.
    pub voter_we_vote_ids: Option<String>,
    pub google_civic_election_id: Option<i64>,
    pub organization_we_vote_id: Option<String>,
    pub action_constant: Option<u16>,
    /// Kind by display name, e.g. `BALLOT_VISIT`. OR-ed with `action_constant`.
    pub action_name: Option<String>,
    pub state_code: Option<String>,
    pub date_as_integer: Option<u32>,
    pub through_date_as_integer: Option<u32>,
    #[serde(default)]
    pub distinct_for_members: bool,
    pub limit: Option<u32>,
}

impl ActionListQuery {
    /// Unknown kinds are rejected rather than dropped, so a typo never
    /// widens the listing to every kind.
    pub fn to_filter(&self) -> Result<ActionFilter> {
        let mut filter = ActionFilter::new();
        if let Some(voter) = non_empty(&self.voter_we_vote_id) {
            filter = filter.voter(voter);
        } else if let Some(list) = non_empty(&self.voter_we_vote_ids) {
            let ids: Vec<String> = list
                .split(',')
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(String::from)
                .collect();
            if !ids.is_empty() {
                filter = filter.voters(ids);
            }
        }
        if let Some(election) = self.google_civic_election_id.filter(|id| *id > 0) {
            filter = filter.election(election);
        }
        if let Some(organization) = non_empty(&self.organization_we_vote_id) {
            filter = filter.organization(organization);
        }
        if let Some(code) = self.action_constant.filter(|code| *code > 0) {
            let kind = ActionKind::from_code(code).ok_or(AnalyticsError::UnknownActionKind(code))?;
            filter = filter.kind(kind);
        }
        if let Some(name) = non_empty(&self.action_name) {
            let kind = ActionKind::from_name(name)
                .ok_or_else(|| AnalyticsError::UnknownActionName(name.to_string()))?;
            if !filter.kinds.contains(&kind) {
                filter = filter.kind(kind);
            }
        }
        if let Some(state) = non_empty(&self.state_code) {
            filter.state_code = Some(state.to_string());
        }
        match (self.date_as_integer, self.through_date_as_integer) {
            (Some(from), Some(through)) => filter = filter.from_day(from).through_day(through),
            (Some(day), None) => filter = filter.on_day(day),
            (None, Some(through)) => filter = filter.through_day(through),
            (None, None) => {}
        }
        Ok(filter)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct DayRangeQuery {
    pub from: Option<u32>,
    pub through: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ElectionQuery {
    pub google_civic_election_id: Option<i64>,
}

/// Manual rollup trigger. `today` overrides the reference-timezone day.
#[derive(Debug, Default, Deserialize)]
pub struct RollupRunQuery {
    pub today: Option<u32>,
}

/// First-visit backfill over a day range, or for one voter on one day or
/// on every day they have actions.
#[derive(Debug, Default, Deserialize)]
pub struct BackfillRequest {
    #[serde(default)]
    pub from: Option<u32>,
    #[serde(default)]
    pub through: Option<u32>,
    #[serde(default)]
    pub voter_we_vote_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DayQuery {
    pub date_as_integer: Option<u32>,
}

pub(crate) fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}
