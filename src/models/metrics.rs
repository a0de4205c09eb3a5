use serde::{Deserialize, Serialize};

/// Activity around one organization on one day. Natural key: (organization, day).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrganizationDailyMetrics {
    pub organization_we_vote_id: String,
    pub date_as_integer: u32,
    pub visitors_total: u64,
    pub authenticated_visitors_total: u64,
    pub visitors_today: u64,
    pub authenticated_visitors_today: u64,
    pub new_visitors_today: u64,
    pub voter_guide_entrants_today: u64,
    pub voter_guide_entrants: u64,
    pub entrants_visiting_ballot: u64,
    pub followers_visiting_ballot: u64,
    pub followers_total: u64,
    pub new_followers_today: u64,
    pub auto_followers_total: u64,
    pub new_auto_followers_today: u64,
}

/// Activity around one organization within one election.
/// Natural key: (election, organization).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrganizationElectionMetrics {
    pub google_civic_election_id: i64,
    pub organization_we_vote_id: String,
    pub election_day_text: Option<String>,
    pub visitors_total: u64,
    pub authenticated_visitors_total: u64,
    pub voter_guide_entrants: u64,
    pub followers_at_time_of_election: u64,
    pub new_followers: u64,
    pub new_auto_followers: u64,
    pub entrants_visited_ballot: u64,
    pub followers_visited_ballot: u64,
    pub entrants_took_position: u64,
    pub followers_took_position: u64,
}

/// Sitewide activity on one day. Natural key: day.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SitewideDailyMetrics {
    pub date_as_integer: u32,
    pub visitors_total: u64,
    pub visitors_today: u64,
    pub new_visitors_today: u64,
    pub voter_guide_entrants_today: u64,
    pub welcome_page_entrants_today: u64,
    pub friend_entrants_today: u64,
    pub authenticated_visitors_total: u64,
    pub authenticated_visitors_today: u64,
    pub ballot_views_today: u64,
    pub voter_guides_viewed_total: u64,
    pub voter_guides_viewed_today: u64,
    pub issues_followed_total: u64,
    pub issues_followed_today: u64,
    pub organizations_followed_total: u64,
    pub organizations_followed_today: u64,
    pub organizations_auto_followed_total: u64,
    pub organizations_auto_followed_today: u64,
    pub shared_link_clicked_count_today: u64,
    pub shared_link_clicked_unique_viewers_today: u64,
}

/// Sitewide activity within one election. Natural key: election.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SitewideElectionMetrics {
    pub google_civic_election_id: i64,
    pub election_day_text: Option<String>,
    pub visitors_total: u64,
    pub authenticated_visitors_total: u64,
    pub voter_guide_entries: u64,
    pub voter_guide_views: u64,
    pub voter_guides_viewed: u64,
    pub issues_followed: u64,
    pub unique_voters_that_followed_organizations: u64,
    pub unique_voters_that_auto_followed_organizations: u64,
    pub organizations_followed: u64,
    pub organizations_auto_followed: u64,
}

/// Lifetime summary for one voter. Natural key: voter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SitewideVoterMetrics {
    pub voter_we_vote_id: String,
    pub actions_count: u64,
    pub elections_viewed: u64,
    pub voter_guides_viewed: u64,
    pub ballot_visited: u64,
    pub welcome_visited: u64,
    pub issues_followed: u64,
    pub organizations_followed: u64,
    pub signed_in_twitter: bool,
    pub signed_in_facebook: bool,
    pub signed_in_with_email: bool,
    pub days_visited: u64,
    pub last_action_date: Option<String>,
    pub last_calculated_date_as_integer: u32,
}
