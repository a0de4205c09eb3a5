//! One function per rollup stage. Each reads the event store for a single
//! day and writes the matching summary rows.

use std::collections::HashSet;

use crate::analytics_db::AnalyticsDb;
use crate::counts::{self, VisitorScope};
use crate::error::Result;
use crate::lookup::Directory;
use crate::models::action::{ActionKind, ENTRY_KINDS, FOLLOW_KINDS};
use crate::models::metrics::{
    OrganizationDailyMetrics, OrganizationElectionMetrics, SitewideDailyMetrics,
    SitewideElectionMetrics, SitewideVoterMetrics,
};
use crate::models::processing::{ProcessedFilter, ProcessedMarker, ProcessingStage};
use crate::models::query::{ActionFilter, CountColumn};

pub async fn run_stage(
    db: &AnalyticsDb,
    directory: &dyn Directory,
    day: u32,
    stage: ProcessingStage,
) -> Result<usize> {
    match stage {
        ProcessingStage::AugmentAnalyticsActionWithElectionId => db.augment_election_ids(day),
        ProcessingStage::AugmentAnalyticsActionWithFirstVisit => db.update_first_visit_today(day, day),
        ProcessingStage::CalculateOrganizationDailyMetrics => {
            organization_daily_metrics(db, directory, day).await
        }
        ProcessingStage::CalculateOrganizationElectionMetrics => {
            organization_election_metrics(db, directory, day).await
        }
        ProcessingStage::CalculateSitewideDailyMetrics => sitewide_daily_metrics(db, day).map(|_| 1),
        ProcessingStage::CalculateSitewideElectionMetrics => {
            sitewide_election_metrics(db, directory, day).await
        }
        ProcessingStage::CalculateSitewideVoterMetrics => sitewide_voter_metrics(db, day),
    }
}

fn shared_link_kinds() -> Vec<ActionKind> {
    ActionKind::ALL
        .iter()
        .copied()
        .filter(|kind| kind.is_shared_link_view())
        .collect()
}

// ── Organization daily ──

async fn organization_daily_metrics(db: &AnalyticsDb, directory: &dyn Directory, day: u32) -> Result<usize> {
    let organizations = db.distinct_organizations(&ActionFilter::new().on_day(day))?;
    for org in &organizations {
        let metrics = calculate_organization_daily(db, directory, org, day).await?;
        db.upsert_organization_daily_metrics(&metrics)?;
    }
    Ok(organizations.len())
}

pub async fn calculate_organization_daily(
    db: &AnalyticsDb,
    directory: &dyn Directory,
    organization_we_vote_id: &str,
    day: u32,
) -> Result<OrganizationDailyMetrics> {
    let org = organization_we_vote_id;
    let through = VisitorScope {
        organization_we_vote_id: Some(org),
        through_day: Some(day),
        ..Default::default()
    };
    let today = VisitorScope {
        organization_we_vote_id: Some(org),
        day: Some(day),
        ..Default::default()
    };
    let entrants = ActionFilter::new().kinds(&ENTRY_KINDS).organization(org).first_visit();
    let voters = |filter: &ActionFilter| db.count_distinct(filter, CountColumn::Voters);

    Ok(OrganizationDailyMetrics {
        organization_we_vote_id: org.to_string(),
        date_as_integer: day,
        visitors_total: counts::visitors(db, &through)?,
        authenticated_visitors_total: counts::visitors(
            db,
            &VisitorScope {
                authenticated_only: true,
                ..through.clone()
            },
        )?,
        visitors_today: counts::visitors(db, &today)?,
        authenticated_visitors_today: counts::visitors(
            db,
            &VisitorScope {
                authenticated_only: true,
                ..today.clone()
            },
        )?,
        new_visitors_today: voters(
            &ActionFilter::new()
                .kind(ActionKind::VoterGuideVisit)
                .organization(org)
                .on_day(day)
                .new_since(day),
        )?,
        voter_guide_entrants_today: voters(&entrants.clone().on_day(day))?,
        voter_guide_entrants: voters(&entrants.through_day(day))?,
        entrants_visiting_ballot: counts::organization_entrants_visited_ballot(db, org, None)?,
        followers_visiting_ballot: counts::organization_followers_visited_ballot(db, directory, org, None)
            .await?,
        followers_total: directory.followers(org).await.len() as u64,
        new_followers_today: voters(&ActionFilter::new().kinds(&FOLLOW_KINDS).organization(org).on_day(day))?,
        auto_followers_total: voters(
            &ActionFilter::new()
                .kind(ActionKind::OrganizationAutoFollow)
                .organization(org)
                .through_day(day),
        )?,
        new_auto_followers_today: voters(
            &ActionFilter::new()
                .kind(ActionKind::OrganizationAutoFollow)
                .organization(org)
                .on_day(day),
        )?,
    })
}

// ── Organization election ──

async fn organization_election_metrics(db: &AnalyticsDb, directory: &dyn Directory, day: u32) -> Result<usize> {
    let elections = db.distinct_elections(&ActionFilter::new().on_day(day))?;
    let mut written = 0;
    for election in elections {
        let election_day_text = directory.election_day_text(election).await;
        for org in db.organizations_with_election_activity(election)? {
            let mut metrics = calculate_organization_election(db, directory, &org, election).await?;
            metrics.election_day_text = election_day_text.clone();
            db.upsert_organization_election_metrics(&metrics)?;
            written += 1;
        }
    }
    Ok(written)
}

pub async fn calculate_organization_election(
    db: &AnalyticsDb,
    directory: &dyn Directory,
    organization_we_vote_id: &str,
    google_civic_election_id: i64,
) -> Result<OrganizationElectionMetrics> {
    let org = organization_we_vote_id;
    let election = Some(google_civic_election_id);
    let scope = VisitorScope {
        google_civic_election_id: election,
        organization_we_vote_id: Some(org),
        ..Default::default()
    };

    Ok(OrganizationElectionMetrics {
        google_civic_election_id,
        organization_we_vote_id: org.to_string(),
        election_day_text: None,
        visitors_total: counts::visitors(db, &scope)?,
        authenticated_visitors_total: counts::visitors(
            db,
            &VisitorScope {
                authenticated_only: true,
                ..scope.clone()
            },
        )?,
        voter_guide_entrants: counts::visitors_first_visit_to_organization_in_election(
            db,
            org,
            google_civic_election_id,
        )?,
        followers_at_time_of_election: directory.followers(org).await.len() as u64,
        new_followers: counts::new_followers_in_election(db, google_civic_election_id, Some(org))?,
        new_auto_followers: counts::new_auto_followers_in_election(db, google_civic_election_id, Some(org))?,
        entrants_visited_ballot: counts::organization_entrants_visited_ballot(db, org, election)?,
        followers_visited_ballot: counts::organization_followers_visited_ballot(db, directory, org, election)
            .await?,
        entrants_took_position: counts::organization_entrants_took_position(db, org, election)?,
        followers_took_position: counts::organization_followers_took_position(db, directory, org, election)
            .await?,
    })
}

// ── Sitewide daily ──

fn sitewide_daily_metrics(db: &AnalyticsDb, day: u32) -> Result<()> {
    let metrics = calculate_sitewide_daily(db, day)?;
    db.upsert_sitewide_daily_metrics(&metrics)
}

pub fn calculate_sitewide_daily(db: &AnalyticsDb, day: u32) -> Result<SitewideDailyMetrics> {
    let voters = |filter: ActionFilter| db.count_distinct(&filter, CountColumn::Voters);
    let rows = |filter: ActionFilter| db.count_distinct(&filter, CountColumn::Rows);
    let through = VisitorScope {
        through_day: Some(day),
        ..Default::default()
    };
    let today = VisitorScope {
        day: Some(day),
        ..Default::default()
    };
    let shared = shared_link_kinds();

    Ok(SitewideDailyMetrics {
        date_as_integer: day,
        visitors_total: counts::visitors(db, &through)?,
        visitors_today: counts::visitors(db, &today)?,
        new_visitors_today: voters(ActionFilter::new().on_day(day).new_since(day))?,
        voter_guide_entrants_today: voters(ActionFilter::new().kinds(&ENTRY_KINDS).on_day(day).first_visit())?,
        welcome_page_entrants_today: voters(
            ActionFilter::new().kind(ActionKind::WelcomeVisit).on_day(day).first_visit(),
        )?,
        friend_entrants_today: voters(ActionFilter::new().kind(ActionKind::FriendEntry).on_day(day).first_visit())?,
        authenticated_visitors_total: counts::visitors(
            db,
            &VisitorScope {
                authenticated_only: true,
                ..through.clone()
            },
        )?,
        authenticated_visitors_today: counts::visitors(
            db,
            &VisitorScope {
                authenticated_only: true,
                ..today.clone()
            },
        )?,
        ballot_views_today: counts::ballot_views(db, None, Some(day))?,
        voter_guides_viewed_total: counts::voter_guides_viewed(db, None, None, Some(day))?,
        voter_guides_viewed_today: counts::voter_guides_viewed(db, None, Some(day), None)?,
        issues_followed_total: rows(ActionFilter::new().kind(ActionKind::IssueFollow).through_day(day))?,
        issues_followed_today: rows(ActionFilter::new().kind(ActionKind::IssueFollow).on_day(day))?,
        organizations_followed_total: rows(
            ActionFilter::new().kind(ActionKind::OrganizationFollow).through_day(day),
        )?,
        organizations_followed_today: rows(ActionFilter::new().kind(ActionKind::OrganizationFollow).on_day(day))?,
        organizations_auto_followed_total: rows(
            ActionFilter::new().kind(ActionKind::OrganizationAutoFollow).through_day(day),
        )?,
        organizations_auto_followed_today: rows(
            ActionFilter::new().kind(ActionKind::OrganizationAutoFollow).on_day(day),
        )?,
        shared_link_clicked_count_today: rows(ActionFilter::new().kinds(&shared).on_day(day))?,
        shared_link_clicked_unique_viewers_today: voters(ActionFilter::new().kinds(&shared).on_day(day))?,
    })
}

// ── Sitewide election ──

async fn sitewide_election_metrics(db: &AnalyticsDb, directory: &dyn Directory, day: u32) -> Result<usize> {
    let elections = db.distinct_elections(&ActionFilter::new().on_day(day))?;
    for election in &elections {
        let mut metrics = calculate_sitewide_election(db, *election)?;
        metrics.election_day_text = directory.election_day_text(*election).await;
        db.upsert_sitewide_election_metrics(&metrics)?;
    }
    Ok(elections.len())
}

pub fn calculate_sitewide_election(db: &AnalyticsDb, google_civic_election_id: i64) -> Result<SitewideElectionMetrics> {
    let in_election = |kinds: &[ActionKind]| ActionFilter::new().kinds(kinds).election(google_civic_election_id);
    let scope = VisitorScope {
        google_civic_election_id: Some(google_civic_election_id),
        ..Default::default()
    };

    Ok(SitewideElectionMetrics {
        google_civic_election_id,
        election_day_text: None,
        visitors_total: counts::visitors(db, &scope)?,
        authenticated_visitors_total: counts::visitors(
            db,
            &VisitorScope {
                authenticated_only: true,
                ..scope.clone()
            },
        )?,
        voter_guide_entries: db.count_distinct(&in_election(&ENTRY_KINDS).first_visit(), CountColumn::Voters)?,
        voter_guide_views: db.count_distinct(
            &in_election(&[ActionKind::VoterGuideVisit]),
            CountColumn::Rows,
        )?,
        voter_guides_viewed: counts::voter_guides_viewed(db, Some(google_civic_election_id), None, None)?,
        issues_followed: db.count_distinct(&in_election(&[ActionKind::IssueFollow]), CountColumn::Rows)?,
        unique_voters_that_followed_organizations: db.count_distinct(
            &in_election(&[ActionKind::OrganizationFollow]),
            CountColumn::Voters,
        )?,
        unique_voters_that_auto_followed_organizations: db.count_distinct(
            &in_election(&[ActionKind::OrganizationAutoFollow]),
            CountColumn::Voters,
        )?,
        organizations_followed: db.count_distinct(
            &in_election(&[ActionKind::OrganizationFollow]),
            CountColumn::Rows,
        )?,
        organizations_auto_followed: db.count_distinct(
            &in_election(&[ActionKind::OrganizationAutoFollow]),
            CountColumn::Rows,
        )?,
    })
}

// ── Voter lifetime ──

/// Recalculate every voter active on the day. Voters already carrying a
/// processed marker for the day are skipped, so a crashed run resumes.
fn sitewide_voter_metrics(db: &AnalyticsDb, day: u32) -> Result<usize> {
    let kind_of_process = ProcessingStage::CalculateSitewideVoterMetrics.kind_of_process();
    let done: HashSet<String> = db
        .list_processed(&ProcessedFilter {
            analytics_date_as_integer: Some(day),
            kind_of_process: Some(kind_of_process.to_string()),
            ..Default::default()
        })?
        .voter_we_vote_id_list
        .into_iter()
        .map(|voter| voter.to_ascii_lowercase())
        .collect();

    let mut written = 0;
    for voter in db.distinct_voters(&ActionFilter::new().on_day(day))? {
        if done.contains(&voter.to_ascii_lowercase()) {
            continue;
        }
        let metrics = calculate_voter(db, &voter, day)?;
        db.upsert_sitewide_voter_metrics(&metrics)?;
        db.save_processed_marker(&ProcessedMarker {
            analytics_date_as_integer: day,
            voter_we_vote_id: Some(voter),
            kind_of_process: kind_of_process.to_string(),
            ..Default::default()
        })?;
        written += 1;
    }
    Ok(written)
}

pub fn calculate_voter(db: &AnalyticsDb, voter_we_vote_id: &str, day: u32) -> Result<SitewideVoterMetrics> {
    let voter = voter_we_vote_id;
    let has_any = |kinds: &[ActionKind]| -> Result<bool> {
        Ok(db.count_distinct(&ActionFilter::new().voter(voter).kinds(kinds), CountColumn::Rows)? > 0)
    };
    let rows = |kind: ActionKind| db.count_distinct(&ActionFilter::new().voter(voter).kind(kind), CountColumn::Rows);

    Ok(SitewideVoterMetrics {
        voter_we_vote_id: voter.to_string(),
        actions_count: counts::voter_action_count(db, voter)?,
        elections_viewed: db.distinct_elections(&ActionFilter::new().voter(voter))?.len() as u64,
        voter_guides_viewed: counts::voter_voter_guides_viewed(db, voter)?,
        ballot_visited: counts::voter_ballot_visited(db, voter, None, None)?,
        welcome_visited: counts::voter_welcome_visited(db, voter)?,
        issues_followed: rows(ActionKind::IssueFollow)?,
        organizations_followed: rows(ActionKind::OrganizationFollow)?,
        signed_in_twitter: has_any(&[ActionKind::VoterTwitterAuth, ActionKind::TwitterAuthenticationExists])?,
        signed_in_facebook: has_any(&[ActionKind::VoterFacebookAuth, ActionKind::FacebookAuthenticationExists])?,
        signed_in_with_email: has_any(&[ActionKind::EmailAuthenticationExists])?,
        days_visited: counts::voter_days_visited(db, voter)?,
        last_action_date: counts::voter_last_action_date(db, voter)?,
        last_calculated_date_as_integer: day,
    })
}
