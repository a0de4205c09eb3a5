//! Filtered counts over the event store used to build summary rows.
//!
//! Counts are distinct voters unless the name says otherwise. An `Err` means
//! the count could not be taken and is never the same as zero.

use crate::analytics_db::AnalyticsDb;
use crate::error::Result;
use crate::lookup::Directory;
use crate::models::action::{ActionKind, ENTRY_KINDS, FOLLOW_KINDS};
use crate::models::query::{ActionFilter, CountColumn};

/// Narrow to one election when a real election id is given.
fn in_election(filter: ActionFilter, google_civic_election_id: Option<i64>) -> ActionFilter {
    match google_civic_election_id.filter(|id| *id > 0) {
        Some(id) => filter.election(id),
        None => filter,
    }
}

/// Voters who viewed at least one ballot.
pub fn ballot_views(
    db: &AnalyticsDb,
    google_civic_election_id: Option<i64>,
    day: Option<u32>,
) -> Result<u64> {
    let mut filter = in_election(ActionFilter::new().kind(ActionKind::BallotVisit), google_civic_election_id);
    if let Some(day) = day {
        filter = filter.on_day(day);
    }
    db.count_distinct(&filter, CountColumn::Voters)
}

/// Voters whose first touch of the day on the organization was a guide
/// visit or an auto-follow.
pub fn organization_entrants(
    db: &AnalyticsDb,
    organization_we_vote_id: &str,
    google_civic_election_id: Option<i64>,
) -> Result<Vec<String>> {
    let filter = in_election(
        ActionFilter::new()
            .kinds(&ENTRY_KINDS)
            .organization(organization_we_vote_id)
            .first_visit(),
        google_civic_election_id,
    );
    db.distinct_voters(&filter)
}

pub fn organization_entrants_took_position(
    db: &AnalyticsDb,
    organization_we_vote_id: &str,
    google_civic_election_id: Option<i64>,
) -> Result<u64> {
    db.count_entrants_with_later_action(
        organization_we_vote_id,
        google_civic_election_id.filter(|id| *id > 0),
        ActionKind::PositionTaken,
    )
}

pub fn organization_entrants_visited_ballot(
    db: &AnalyticsDb,
    organization_we_vote_id: &str,
    google_civic_election_id: Option<i64>,
) -> Result<u64> {
    db.count_entrants_with_later_action(
        organization_we_vote_id,
        google_civic_election_id.filter(|id| *id > 0),
        ActionKind::BallotVisit,
    )
}

async fn followers_who(
    db: &AnalyticsDb,
    directory: &dyn Directory,
    organization_we_vote_id: &str,
    google_civic_election_id: Option<i64>,
    kind: ActionKind,
) -> Result<u64> {
    let followers = directory.followers(organization_we_vote_id).await;
    let filter = in_election(ActionFilter::new().kind(kind).voters(followers), google_civic_election_id);
    db.count_distinct(&filter, CountColumn::Voters)
}

pub async fn organization_followers_took_position(
    db: &AnalyticsDb,
    directory: &dyn Directory,
    organization_we_vote_id: &str,
    google_civic_election_id: Option<i64>,
) -> Result<u64> {
    followers_who(db, directory, organization_we_vote_id, google_civic_election_id, ActionKind::PositionTaken).await
}

pub async fn organization_followers_visited_ballot(
    db: &AnalyticsDb,
    directory: &dyn Directory,
    organization_we_vote_id: &str,
    google_civic_election_id: Option<i64>,
) -> Result<u64> {
    followers_who(db, directory, organization_we_vote_id, google_civic_election_id, ActionKind::BallotVisit).await
}

/// Scope of a visitor count. With an organization only its voter-guide
/// visits count; `day` wins over `through_day`.
#[derive(Debug, Clone, Default)]
pub struct VisitorScope<'a> {
    pub google_civic_election_id: Option<i64>,
    pub organization_we_vote_id: Option<&'a str>,
    pub day: Option<u32>,
    pub through_day: Option<u32>,
    pub authenticated_only: bool,
}

pub fn visitors(db: &AnalyticsDb, scope: &VisitorScope<'_>) -> Result<u64> {
    let mut filter = in_election(ActionFilter::new(), scope.google_civic_election_id);
    if let Some(org) = scope.organization_we_vote_id.filter(|o| !o.is_empty()) {
        filter = filter.kind(ActionKind::VoterGuideVisit).organization(org);
    }
    if let Some(day) = scope.day {
        filter = filter.on_day(day);
    } else if let Some(through) = scope.through_day {
        filter = filter.through_day(through);
    }
    if scope.authenticated_only {
        filter = filter.signed_in();
    }
    db.count_distinct(&filter, CountColumn::Voters)
}

pub fn visitors_first_visit_to_organization_in_election(
    db: &AnalyticsDb,
    organization_we_vote_id: &str,
    google_civic_election_id: i64,
) -> Result<u64> {
    let filter = ActionFilter::new()
        .kinds(&ENTRY_KINDS)
        .organization(organization_we_vote_id)
        .election(google_civic_election_id)
        .first_visit();
    db.count_distinct(&filter, CountColumn::Voters)
}

fn followers_in_election(
    db: &AnalyticsDb,
    kinds: &[ActionKind],
    google_civic_election_id: i64,
    organization_we_vote_id: Option<&str>,
) -> Result<u64> {
    let mut filter = ActionFilter::new().kinds(kinds).election(google_civic_election_id);
    if let Some(org) = organization_we_vote_id.filter(|o| !o.is_empty()) {
        filter = filter.organization(org);
    }
    db.count_distinct(&filter, CountColumn::Voters)
}

/// Voters who followed or auto-followed during the election.
pub fn new_followers_in_election(
    db: &AnalyticsDb,
    google_civic_election_id: i64,
    organization_we_vote_id: Option<&str>,
) -> Result<u64> {
    followers_in_election(db, &FOLLOW_KINDS, google_civic_election_id, organization_we_vote_id)
}

pub fn new_auto_followers_in_election(
    db: &AnalyticsDb,
    google_civic_election_id: i64,
    organization_we_vote_id: Option<&str>,
) -> Result<u64> {
    followers_in_election(
        db,
        &[ActionKind::OrganizationAutoFollow],
        google_civic_election_id,
        organization_we_vote_id,
    )
}

// ── Per-voter lifetime counters ──

/// Every action the voter ever recorded.
pub fn voter_action_count(db: &AnalyticsDb, voter_we_vote_id: &str) -> Result<u64> {
    db.count_distinct(&ActionFilter::new().voter(voter_we_vote_id), CountColumn::Rows)
}

/// Number of ballot visits, not distinct.
pub fn voter_ballot_visited(
    db: &AnalyticsDb,
    voter_we_vote_id: &str,
    google_civic_election_id: Option<i64>,
    organization_we_vote_id: Option<&str>,
) -> Result<u64> {
    let mut filter = in_election(
        ActionFilter::new().voter(voter_we_vote_id).kind(ActionKind::BallotVisit),
        google_civic_election_id,
    );
    if let Some(org) = organization_we_vote_id.filter(|o| !o.is_empty()) {
        filter = filter.organization(org);
    }
    db.count_distinct(&filter, CountColumn::Rows)
}

pub fn voter_welcome_visited(db: &AnalyticsDb, voter_we_vote_id: &str) -> Result<u64> {
    let filter = ActionFilter::new().voter(voter_we_vote_id).kind(ActionKind::WelcomeVisit);
    db.count_distinct(&filter, CountColumn::Rows)
}

pub fn voter_days_visited(db: &AnalyticsDb, voter_we_vote_id: &str) -> Result<u64> {
    db.count_distinct(&ActionFilter::new().voter(voter_we_vote_id), CountColumn::Days)
}

pub fn voter_last_action_date(db: &AnalyticsDb, voter_we_vote_id: &str) -> Result<Option<String>> {
    db.last_action_time(&ActionFilter::new().voter(voter_we_vote_id))
}

/// Distinct organizations whose voter guide this voter opened.
pub fn voter_voter_guides_viewed(db: &AnalyticsDb, voter_we_vote_id: &str) -> Result<u64> {
    let filter = ActionFilter::new()
        .voter(voter_we_vote_id)
        .kind(ActionKind::VoterGuideVisit);
    db.count_distinct(&filter, CountColumn::Organizations)
}

/// Distinct voter guides (organizations) opened by anyone.
pub fn voter_guides_viewed(
    db: &AnalyticsDb,
    google_civic_election_id: Option<i64>,
    day: Option<u32>,
    through_day: Option<u32>,
) -> Result<u64> {
    let mut filter = in_election(ActionFilter::new().kind(ActionKind::VoterGuideVisit), google_civic_election_id);
    if let Some(day) = day {
        filter = filter.on_day(day);
    } else if let Some(through) = through_day {
        filter = filter.through_day(through);
    }
    db.count_distinct(&filter, CountColumn::Organizations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookup::StaticDirectory;
    use crate::models::action::AnalyticsAction;

    const DAY: u32 = 20240105;

    fn record(db: &AnalyticsDb, kind: ActionKind, voter: &str, org: Option<&str>, first_visit: bool) {
        db.insert_action(&AnalyticsAction {
            id: 0,
            action_constant: kind.code(),
            exact_time: "2024-01-05T12:00:00Z".into(),
            date_as_integer: DAY,
            voter_we_vote_id: Some(voter.into()),
            voter_id: None,
            is_signed_in: false,
            state_code: None,
            organization_we_vote_id: org.map(String::from),
            organization_id: None,
            ballot_item_we_vote_id: None,
            google_civic_election_id: None,
            first_visit_today: first_visit,
            voter_device_id: None,
            user_agent: None,
            is_bot: false,
            is_mobile: false,
            is_desktop: false,
            is_tablet: false,
        })
        .unwrap();
    }

    #[test]
    fn test_entrants_who_took_position() {
        let db = AnalyticsDb::open_in_memory().unwrap();
        record(&db, ActionKind::VoterGuideVisit, "voterA", Some("orgO"), true);
        record(&db, ActionKind::VoterGuideVisit, "voterB", Some("orgO"), true);
        record(&db, ActionKind::PositionTaken, "voterA", None, false);

        assert_eq!(organization_entrants(&db, "orgO", None).unwrap(), vec!["voterA", "voterB"]);
        assert_eq!(organization_entrants_took_position(&db, "orgO", None).unwrap(), 1);
        assert_eq!(organization_entrants_visited_ballot(&db, "orgO", None).unwrap(), 0);
    }

    #[test]
    fn test_position_before_entry_does_not_count() {
        let db = AnalyticsDb::open_in_memory().unwrap();
        record(&db, ActionKind::PositionTaken, "voterA", None, true);
        record(&db, ActionKind::VoterGuideVisit, "voterA", Some("orgO"), true);
        assert_eq!(organization_entrants_took_position(&db, "orgO", None).unwrap(), 0);
    }

    #[test]
    fn test_ballot_views_count_each_voter_once() {
        let db = AnalyticsDb::open_in_memory().unwrap();
        record(&db, ActionKind::BallotVisit, "voterA", None, true);
        record(&db, ActionKind::BallotVisit, "voterA", None, false);
        record(&db, ActionKind::BallotVisit, "voterB", None, true);

        assert_eq!(ballot_views(&db, None, Some(DAY)).unwrap(), 2);
        assert_eq!(voter_ballot_visited(&db, "voterA", None, None).unwrap(), 2);
        assert_eq!(voter_days_visited(&db, "voterA").unwrap(), 1);
    }

    #[test]
    fn test_visitors_to_organization_only_count_guide_visits() {
        let db = AnalyticsDb::open_in_memory().unwrap();
        record(&db, ActionKind::VoterGuideVisit, "voterA", Some("orgO"), true);
        record(&db, ActionKind::OrganizationFollow, "voterB", Some("orgO"), true);
        record(&db, ActionKind::VoterGuideVisit, "voterC", Some("orgP"), true);

        let scope = VisitorScope {
            organization_we_vote_id: Some("ORGO"),
            day: Some(DAY),
            ..Default::default()
        };
        assert_eq!(visitors(&db, &scope).unwrap(), 1);
        assert_eq!(visitors(&db, &VisitorScope::default()).unwrap(), 3);
        assert_eq!(voter_guides_viewed(&db, None, Some(DAY), None).unwrap(), 2);
        assert_eq!(voter_voter_guides_viewed(&db, "voterA").unwrap(), 1);
    }

    #[tokio::test]
    async fn test_followers_are_intersected_with_actions() {
        let db = AnalyticsDb::open_in_memory().unwrap();
        record(&db, ActionKind::BallotVisit, "voterA", None, true);
        record(&db, ActionKind::BallotVisit, "voterC", None, true);
        record(&db, ActionKind::PositionTaken, "voterB", None, false);
        let directory = StaticDirectory::default().with_followers("orgO", &["voterA", "voterB"]);

        assert_eq!(
            organization_followers_visited_ballot(&db, &directory, "orgO", None).await.unwrap(),
            1
        );
        assert_eq!(
            organization_followers_took_position(&db, &directory, "orgO", None).await.unwrap(),
            1
        );
        // No followers means nobody qualifies.
        assert_eq!(
            organization_followers_visited_ballot(&db, &directory, "orgX", None).await.unwrap(),
            0
        );
    }

    #[test]
    fn test_voter_lifetime_counters() {
        let db = AnalyticsDb::open_in_memory().unwrap();
        record(&db, ActionKind::WelcomeVisit, "voterA", None, true);
        record(&db, ActionKind::WelcomeVisit, "voterA", None, false);
        record(&db, ActionKind::BallotVisit, "voterA", None, false);

        assert_eq!(voter_action_count(&db, "VOTERA").unwrap(), 3);
        assert_eq!(voter_welcome_visited(&db, "voterA").unwrap(), 2);
        assert_eq!(
            voter_last_action_date(&db, "voterA").unwrap().as_deref(),
            Some("2024-01-05T12:00:00Z")
        );
        assert_eq!(voter_last_action_date(&db, "nobody").unwrap(), None);
    }
}
