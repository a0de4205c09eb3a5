use rusqlite::{OptionalExtension, Row, params};

use super::{AnalyticsDb, from_sql_count, to_sql_count};
use crate::error::{AnalyticsError, Result};
use crate::models::metrics::{
    OrganizationDailyMetrics, OrganizationElectionMetrics, SitewideDailyMetrics,
    SitewideElectionMetrics, SitewideVoterMetrics,
};

fn count(row: &Row<'_>, idx: usize) -> rusqlite::Result<u64> {
    Ok(from_sql_count(row.get::<_, i64>(idx)?))
}

fn require_text(value: &str, field: &'static str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(AnalyticsError::MissingField(field));
    }
    Ok(())
}

fn require_day(day: u32) -> Result<()> {
    if day == 0 {
        return Err(AnalyticsError::MissingField("date_as_integer"));
    }
    Ok(())
}

fn require_election(google_civic_election_id: i64) -> Result<()> {
    if google_civic_election_id <= 0 {
        return Err(AnalyticsError::MissingField("google_civic_election_id"));
    }
    Ok(())
}

fn organization_daily_from_row(row: &Row<'_>) -> rusqlite::Result<OrganizationDailyMetrics> {
    Ok(OrganizationDailyMetrics {
        organization_we_vote_id: row.get(0)?,
        date_as_integer: row.get(1)?,
        visitors_total: count(row, 2)?,
        authenticated_visitors_total: count(row, 3)?,
        visitors_today: count(row, 4)?,
        authenticated_visitors_today: count(row, 5)?,
        new_visitors_today: count(row, 6)?,
        voter_guide_entrants_today: count(row, 7)?,
        voter_guide_entrants: count(row, 8)?,
        entrants_visiting_ballot: count(row, 9)?,
        followers_visiting_ballot: count(row, 10)?,
        followers_total: count(row, 11)?,
        new_followers_today: count(row, 12)?,
        auto_followers_total: count(row, 13)?,
        new_auto_followers_today: count(row, 14)?,
    })
}

fn organization_election_from_row(row: &Row<'_>) -> rusqlite::Result<OrganizationElectionMetrics> {
    Ok(OrganizationElectionMetrics {
        google_civic_election_id: row.get(0)?,
        organization_we_vote_id: row.get(1)?,
        election_day_text: row.get(2)?,
        visitors_total: count(row, 3)?,
        authenticated_visitors_total: count(row, 4)?,
        voter_guide_entrants: count(row, 5)?,
        followers_at_time_of_election: count(row, 6)?,
        new_followers: count(row, 7)?,
        new_auto_followers: count(row, 8)?,
        entrants_visited_ballot: count(row, 9)?,
        followers_visited_ballot: count(row, 10)?,
        entrants_took_position: count(row, 11)?,
        followers_took_position: count(row, 12)?,
    })
}

fn sitewide_daily_from_row(row: &Row<'_>) -> rusqlite::Result<SitewideDailyMetrics> {
    Ok(SitewideDailyMetrics {
        date_as_integer: row.get(0)?,
        visitors_total: count(row, 1)?,
        visitors_today: count(row, 2)?,
        new_visitors_today: count(row, 3)?,
        voter_guide_entrants_today: count(row, 4)?,
        welcome_page_entrants_today: count(row, 5)?,
        friend_entrants_today: count(row, 6)?,
        authenticated_visitors_total: count(row, 7)?,
        authenticated_visitors_today: count(row, 8)?,
        ballot_views_today: count(row, 9)?,
        voter_guides_viewed_total: count(row, 10)?,
        voter_guides_viewed_today: count(row, 11)?,
        issues_followed_total: count(row, 12)?,
        issues_followed_today: count(row, 13)?,
        organizations_followed_total: count(row, 14)?,
        organizations_followed_today: count(row, 15)?,
        organizations_auto_followed_total: count(row, 16)?,
        organizations_auto_followed_today: count(row, 17)?,
        shared_link_clicked_count_today: count(row, 18)?,
        shared_link_clicked_unique_viewers_today: count(row, 19)?,
    })
}

fn sitewide_election_from_row(row: &Row<'_>) -> rusqlite::Result<SitewideElectionMetrics> {
    Ok(SitewideElectionMetrics {
        google_civic_election_id: row.get(0)?,
        election_day_text: row.get(1)?,
        visitors_total: count(row, 2)?,
        authenticated_visitors_total: count(row, 3)?,
        voter_guide_entries: count(row, 4)?,
        voter_guide_views: count(row, 5)?,
        voter_guides_viewed: count(row, 6)?,
        issues_followed: count(row, 7)?,
        unique_voters_that_followed_organizations: count(row, 8)?,
        unique_voters_that_auto_followed_organizations: count(row, 9)?,
        organizations_followed: count(row, 10)?,
        organizations_auto_followed: count(row, 11)?,
    })
}

fn voter_from_row(row: &Row<'_>) -> rusqlite::Result<SitewideVoterMetrics> {
    Ok(SitewideVoterMetrics {
        voter_we_vote_id: row.get(0)?,
        actions_count: count(row, 1)?,
        elections_viewed: count(row, 2)?,
        voter_guides_viewed: count(row, 3)?,
        ballot_visited: count(row, 4)?,
        welcome_visited: count(row, 5)?,
        issues_followed: count(row, 6)?,
        organizations_followed: count(row, 7)?,
        signed_in_twitter: row.get(8)?,
        signed_in_facebook: row.get(9)?,
        signed_in_with_email: row.get(10)?,
        days_visited: count(row, 11)?,
        last_action_date: row.get(12)?,
        last_calculated_date_as_integer: row.get(13)?,
    })
}

impl AnalyticsDb {
    // ── Organization daily ──

    /// Create or fully overwrite the row for (organization, day).
    pub fn upsert_organization_daily_metrics(&self, m: &OrganizationDailyMetrics) -> Result<()> {
        require_text(&m.organization_we_vote_id, "organization_we_vote_id")?;
        require_day(m.date_as_integer)?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO organization_daily_metrics (
                organization_we_vote_id, date_as_integer, visitors_total, authenticated_visitors_total,
                visitors_today, authenticated_visitors_today, new_visitors_today,
                voter_guide_entrants_today, voter_guide_entrants, entrants_visiting_ballot,
                followers_visiting_ballot, followers_total, new_followers_today,
                auto_followers_total, new_auto_followers_today
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
            ON CONFLICT (organization_we_vote_id, date_as_integer) DO UPDATE SET
                visitors_total = excluded.visitors_total,
                authenticated_visitors_total = excluded.authenticated_visitors_total,
                visitors_today = excluded.visitors_today,
                authenticated_visitors_today = excluded.authenticated_visitors_today,
                new_visitors_today = excluded.new_visitors_today,
                voter_guide_entrants_today = excluded.voter_guide_entrants_today,
                voter_guide_entrants = excluded.voter_guide_entrants,
                entrants_visiting_ballot = excluded.entrants_visiting_ballot,
                followers_visiting_ballot = excluded.followers_visiting_ballot,
                followers_total = excluded.followers_total,
                new_followers_today = excluded.new_followers_today,
                auto_followers_total = excluded.auto_followers_total,
                new_auto_followers_today = excluded.new_auto_followers_today,
                updated_at = strftime('%Y-%m-%dT%H:%M:%SZ','now')",
            params![
                m.organization_we_vote_id,
                m.date_as_integer,
                to_sql_count(m.visitors_total),
                to_sql_count(m.authenticated_visitors_total),
                to_sql_count(m.visitors_today),
                to_sql_count(m.authenticated_visitors_today),
                to_sql_count(m.new_visitors_today),
                to_sql_count(m.voter_guide_entrants_today),
                to_sql_count(m.voter_guide_entrants),
                to_sql_count(m.entrants_visiting_ballot),
                to_sql_count(m.followers_visiting_ballot),
                to_sql_count(m.followers_total),
                to_sql_count(m.new_followers_today),
                to_sql_count(m.auto_followers_total),
                to_sql_count(m.new_auto_followers_today),
            ],
        )?;
        Ok(())
    }

    pub fn list_organization_daily_metrics(
        &self,
        organization_we_vote_id: &str,
        from_day: Option<u32>,
        through_day: Option<u32>,
    ) -> Result<Vec<OrganizationDailyMetrics>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT organization_we_vote_id, date_as_integer, visitors_total, authenticated_visitors_total,
                    visitors_today, authenticated_visitors_today, new_visitors_today,
                    voter_guide_entrants_today, voter_guide_entrants, entrants_visiting_ballot,
                    followers_visiting_ballot, followers_total, new_followers_today,
                    auto_followers_total, new_auto_followers_today
             FROM organization_daily_metrics
             WHERE organization_we_vote_id = ?1
               AND (?2 IS NULL OR date_as_integer >= ?2)
               AND (?3 IS NULL OR date_as_integer <= ?3)
             ORDER BY date_as_integer",
        )?;
        let rows = stmt
            .query_map(params![organization_we_vote_id, from_day, through_day], organization_daily_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    // ── Organization election ──

    pub fn upsert_organization_election_metrics(&self, m: &OrganizationElectionMetrics) -> Result<()> {
        require_election(m.google_civic_election_id)?;
        require_text(&m.organization_we_vote_id, "organization_we_vote_id")?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO organization_election_metrics (
                google_civic_election_id, organization_we_vote_id, election_day_text, visitors_total,
                authenticated_visitors_total, voter_guide_entrants, followers_at_time_of_election,
                new_followers, new_auto_followers, entrants_visited_ballot, followers_visited_ballot,
                entrants_took_position, followers_took_position
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            ON CONFLICT (google_civic_election_id, organization_we_vote_id) DO UPDATE SET
                election_day_text = excluded.election_day_text,
                visitors_total = excluded.visitors_total,
                authenticated_visitors_total = excluded.authenticated_visitors_total,
                voter_guide_entrants = excluded.voter_guide_entrants,
                followers_at_time_of_election = excluded.followers_at_time_of_election,
                new_followers = excluded.new_followers,
                new_auto_followers = excluded.new_auto_followers,
                entrants_visited_ballot = excluded.entrants_visited_ballot,
                followers_visited_ballot = excluded.followers_visited_ballot,
                entrants_took_position = excluded.entrants_took_position,
                followers_took_position = excluded.followers_took_position,
                updated_at = strftime('%Y-%m-%dT%H:%M:%SZ','now')",
            params![
                m.google_civic_election_id,
                m.organization_we_vote_id,
                m.election_day_text,
                to_sql_count(m.visitors_total),
                to_sql_count(m.authenticated_visitors_total),
                to_sql_count(m.voter_guide_entrants),
                to_sql_count(m.followers_at_time_of_election),
                to_sql_count(m.new_followers),
                to_sql_count(m.new_auto_followers),
                to_sql_count(m.entrants_visited_ballot),
                to_sql_count(m.followers_visited_ballot),
                to_sql_count(m.entrants_took_position),
                to_sql_count(m.followers_took_position),
            ],
        )?;
        Ok(())
    }

    pub fn list_organization_election_metrics(
        &self,
        google_civic_election_id: Option<i64>,
    ) -> Result<Vec<OrganizationElectionMetrics>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT google_civic_election_id, organization_we_vote_id, election_day_text, visitors_total,
                    authenticated_visitors_total, voter_guide_entrants, followers_at_time_of_election,
                    new_followers, new_auto_followers, entrants_visited_ballot, followers_visited_ballot,
                    entrants_took_position, followers_took_position
             FROM organization_election_metrics
             WHERE (?1 IS NULL OR google_civic_election_id = ?1)
             ORDER BY google_civic_election_id DESC, organization_we_vote_id",
        )?;
        let rows = stmt
            .query_map(params![google_civic_election_id], organization_election_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    // ── Sitewide daily ──

    pub fn upsert_sitewide_daily_metrics(&self, m: &SitewideDailyMetrics) -> Result<()> {
        require_day(m.date_as_integer)?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO sitewide_daily_metrics (
                date_as_integer, visitors_total, visitors_today, new_visitors_today,
                voter_guide_entrants_today, welcome_page_entrants_today, friend_entrants_today,
                authenticated_visitors_total, authenticated_visitors_today, ballot_views_today,
                voter_guides_viewed_total, voter_guides_viewed_today, issues_followed_total,
                issues_followed_today, organizations_followed_total, organizations_followed_today,
                organizations_auto_followed_total, organizations_auto_followed_today,
                shared_link_clicked_count_today, shared_link_clicked_unique_viewers_today
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20)
            ON CONFLICT (date_as_integer) DO UPDATE SET
                visitors_total = excluded.visitors_total,
                visitors_today = excluded.visitors_today,
                new_visitors_today = excluded.new_visitors_today,
                voter_guide_entrants_today = excluded.voter_guide_entrants_today,
                welcome_page_entrants_today = excluded.welcome_page_entrants_today,
                friend_entrants_today = excluded.friend_entrants_today,
                authenticated_visitors_total = excluded.authenticated_visitors_total,
                authenticated_visitors_today = excluded.authenticated_visitors_today,
                ballot_views_today = excluded.ballot_views_today,
                voter_guides_viewed_total = excluded.voter_guides_viewed_total,
                voter_guides_viewed_today = excluded.voter_guides_viewed_today,
                issues_followed_total = excluded.issues_followed_total,
                issues_followed_today = excluded.issues_followed_today,
                organizations_followed_total = excluded.organizations_followed_total,
                organizations_followed_today = excluded.organizations_followed_today,
                organizations_auto_followed_total = excluded.organizations_auto_followed_total,
                organizations_auto_followed_today = excluded.organizations_auto_followed_today,
                shared_link_clicked_count_today = excluded.shared_link_clicked_count_today,
                shared_link_clicked_unique_viewers_today = excluded.shared_link_clicked_unique_viewers_today,
                updated_at = strftime('%Y-%m-%dT%H:%M:%SZ','now')",
            params![
                m.date_as_integer,
                to_sql_count(m.visitors_total),
                to_sql_count(m.visitors_today),
                to_sql_count(m.new_visitors_today),
                to_sql_count(m.voter_guide_entrants_today),
                to_sql_count(m.welcome_page_entrants_today),
                to_sql_count(m.friend_entrants_today),
                to_sql_count(m.authenticated_visitors_total),
                to_sql_count(m.authenticated_visitors_today),
                to_sql_count(m.ballot_views_today),
                to_sql_count(m.voter_guides_viewed_total),
                to_sql_count(m.voter_guides_viewed_today),
                to_sql_count(m.issues_followed_total),
                to_sql_count(m.issues_followed_today),
                to_sql_count(m.organizations_followed_total),
                to_sql_count(m.organizations_followed_today),
                to_sql_count(m.organizations_auto_followed_total),
                to_sql_count(m.organizations_auto_followed_today),
                to_sql_count(m.shared_link_clicked_count_today),
                to_sql_count(m.shared_link_clicked_unique_viewers_today),
            ],
        )?;
        Ok(())
    }

    pub fn list_sitewide_daily_metrics(
        &self,
        from_day: Option<u32>,
        through_day: Option<u32>,
    ) -> Result<Vec<SitewideDailyMetrics>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT date_as_integer, visitors_total, visitors_today, new_visitors_today,
                    voter_guide_entrants_today, welcome_page_entrants_today, friend_entrants_today,
                    authenticated_visitors_total, authenticated_visitors_today, ballot_views_today,
                    voter_guides_viewed_total, voter_guides_viewed_today, issues_followed_total,
                    issues_followed_today, organizations_followed_total, organizations_followed_today,
                    organizations_auto_followed_total, organizations_auto_followed_today,
                    shared_link_clicked_count_today, shared_link_clicked_unique_viewers_today
             FROM sitewide_daily_metrics
             WHERE (?1 IS NULL OR date_as_integer >= ?1)
               AND (?2 IS NULL OR date_as_integer <= ?2)
             ORDER BY date_as_integer",
        )?;
        let rows = stmt
            .query_map(params![from_day, through_day], sitewide_daily_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    // ── Sitewide election ──

    pub fn upsert_sitewide_election_metrics(&self, m: &SitewideElectionMetrics) -> Result<()> {
        require_election(m.google_civic_election_id)?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO sitewide_election_metrics (
                google_civic_election_id, election_day_text, visitors_total, authenticated_visitors_total,
                voter_guide_entries, voter_guide_views, voter_guides_viewed, issues_followed,
                unique_voters_that_followed_organizations, unique_voters_that_auto_followed_organizations,
                organizations_followed, organizations_auto_followed
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            ON CONFLICT (google_civic_election_id) DO UPDATE SET
                election_day_text = excluded.election_day_text,
                visitors_total = excluded.visitors_total,
                authenticated_visitors_total = excluded.authenticated_visitors_total,
                voter_guide_entries = excluded.voter_guide_entries,
                voter_guide_views = excluded.voter_guide_views,
                voter_guides_viewed = excluded.voter_guides_viewed,
                issues_followed = excluded.issues_followed,
                unique_voters_that_followed_organizations = excluded.unique_voters_that_followed_organizations,
                unique_voters_that_auto_followed_organizations = excluded.unique_voters_that_auto_followed_organizations,
                organizations_followed = excluded.organizations_followed,
                organizations_auto_followed = excluded.organizations_auto_followed,
                updated_at = strftime('%Y-%m-%dT%H:%M:%SZ','now')",
            params![
                m.google_civic_election_id,
                m.election_day_text,
                to_sql_count(m.visitors_total),
                to_sql_count(m.authenticated_visitors_total),
                to_sql_count(m.voter_guide_entries),
                to_sql_count(m.voter_guide_views),
                to_sql_count(m.voter_guides_viewed),
                to_sql_count(m.issues_followed),
                to_sql_count(m.unique_voters_that_followed_organizations),
                to_sql_count(m.unique_voters_that_auto_followed_organizations),
                to_sql_count(m.organizations_followed),
                to_sql_count(m.organizations_auto_followed),
            ],
        )?;
        Ok(())
    }

    pub fn list_sitewide_election_metrics(
        &self,
        google_civic_election_id: Option<i64>,
    ) -> Result<Vec<SitewideElectionMetrics>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT google_civic_election_id, election_day_text, visitors_total, authenticated_visitors_total,
                    voter_guide_entries, voter_guide_views, voter_guides_viewed, issues_followed,
                    unique_voters_that_followed_organizations, unique_voters_that_auto_followed_organizations,
                    organizations_followed, organizations_auto_followed
             FROM sitewide_election_metrics
             WHERE (?1 IS NULL OR google_civic_election_id = ?1)
             ORDER BY google_civic_election_id DESC",
        )?;
        let rows = stmt
            .query_map(params![google_civic_election_id], sitewide_election_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    // ── Voter lifetime ──

    pub fn upsert_sitewide_voter_metrics(&self, m: &SitewideVoterMetrics) -> Result<()> {
        require_text(&m.voter_we_vote_id, "voter_we_vote_id")?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO sitewide_voter_metrics (
                voter_we_vote_id, actions_count, elections_viewed, voter_guides_viewed, ballot_visited,
                welcome_visited, issues_followed, organizations_followed, signed_in_twitter,
                signed_in_facebook, signed_in_with_email, days_visited, last_action_date,
                last_calculated_date_as_integer
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            ON CONFLICT (voter_we_vote_id) DO UPDATE SET
                actions_count = excluded.actions_count,
                elections_viewed = excluded.elections_viewed,
                voter_guides_viewed = excluded.voter_guides_viewed,
                ballot_visited = excluded.ballot_visited,
                welcome_visited = excluded.welcome_visited,
                issues_followed = excluded.issues_followed,
                organizations_followed = excluded.organizations_followed,
                signed_in_twitter = excluded.signed_in_twitter,
                signed_in_facebook = excluded.signed_in_facebook,
                signed_in_with_email = excluded.signed_in_with_email,
                days_visited = excluded.days_visited,
                last_action_date = excluded.last_action_date,
                last_calculated_date_as_integer = excluded.last_calculated_date_as_integer",
            params![
                m.voter_we_vote_id,
                to_sql_count(m.actions_count),
                to_sql_count(m.elections_viewed),
                to_sql_count(m.voter_guides_viewed),
                to_sql_count(m.ballot_visited),
                to_sql_count(m.welcome_visited),
                to_sql_count(m.issues_followed),
                to_sql_count(m.organizations_followed),
                m.signed_in_twitter,
                m.signed_in_facebook,
                m.signed_in_with_email,
                to_sql_count(m.days_visited),
                m.last_action_date,
                m.last_calculated_date_as_integer,
            ],
        )?;
        Ok(())
    }

    pub fn get_sitewide_voter_metrics(&self, voter_we_vote_id: &str) -> Result<Option<SitewideVoterMetrics>> {
        let conn = self.conn()?;
        let metrics = conn
            .query_row(
                "SELECT voter_we_vote_id, actions_count, elections_viewed, voter_guides_viewed, ballot_visited,
                        welcome_visited, issues_followed, organizations_followed, signed_in_twitter,
                        signed_in_facebook, signed_in_with_email, days_visited, last_action_date,
                        last_calculated_date_as_integer
                 FROM sitewide_voter_metrics WHERE voter_we_vote_id = ?1",
                params![voter_we_vote_id],
                voter_from_row,
            )
            .optional()?;
        Ok(metrics)
    }

    /// Whether the voter's lifetime row was already recalculated for this day.
    pub fn voter_metrics_updated_on(&self, voter_we_vote_id: &str, day: u32) -> Result<bool> {
        let conn = self.conn()?;
        let found = conn
            .query_row(
                "SELECT 1 FROM sitewide_voter_metrics
                 WHERE voter_we_vote_id = ?1 AND last_calculated_date_as_integer = ?2",
                params![voter_we_vote_id, day],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_organization_daily_upsert_is_last_write_wins() {
        let db = AnalyticsDb::open_in_memory().unwrap();
        let first = OrganizationDailyMetrics {
            organization_we_vote_id: "wv01org1".into(),
            date_as_integer: 20240105,
            visitors_today: 3,
            followers_total: 10,
            ..Default::default()
        };
        db.upsert_organization_daily_metrics(&first).unwrap();

        let second = OrganizationDailyMetrics {
            visitors_today: 7,
            ..OrganizationDailyMetrics {
                organization_we_vote_id: "WV01ORG1".into(),
                ..first.clone()
            }
        };
        db.upsert_organization_daily_metrics(&second).unwrap();

        let rows = db.list_organization_daily_metrics("wv01org1", None, None).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].visitors_today, 7);
        assert_eq!(rows[0].followers_total, 10);
    }

    #[test]
    fn test_missing_natural_key_aborts_write() {
        let db = AnalyticsDb::open_in_memory().unwrap();
        let err = db
            .upsert_organization_daily_metrics(&OrganizationDailyMetrics {
                date_as_integer: 20240105,
                ..Default::default()
            })
            .unwrap_err();
        assert_eq!(err.status_code(), "MISSING_ORGANIZATION_WE_VOTE_ID");

        let err = db
            .upsert_sitewide_election_metrics(&SitewideElectionMetrics::default())
            .unwrap_err();
        assert_eq!(err.status_code(), "MISSING_GOOGLE_CIVIC_ELECTION_ID");
        assert!(db.list_sitewide_election_metrics(None).unwrap().is_empty());
        assert!(db.list_organization_daily_metrics("", None, None).unwrap().is_empty());
    }

    #[test]
    fn test_sitewide_rows_replace_every_field() {
        let db = AnalyticsDb::open_in_memory().unwrap();
        let day = SitewideDailyMetrics {
            date_as_integer: 20240105,
            ballot_views_today: 4,
            issues_followed_total: 9,
            ..Default::default()
        };
        db.upsert_sitewide_daily_metrics(&day).unwrap();
        let replacement = SitewideDailyMetrics {
            date_as_integer: 20240105,
            ballot_views_today: 5,
            ..Default::default()
        };
        db.upsert_sitewide_daily_metrics(&replacement).unwrap();
        assert_eq!(db.list_sitewide_daily_metrics(None, None).unwrap(), vec![replacement]);

        let election = SitewideElectionMetrics {
            google_civic_election_id: 9000,
            election_day_text: Some("2024-11-05".into()),
            visitors_total: 12,
            ..Default::default()
        };
        db.upsert_sitewide_election_metrics(&election).unwrap();
        db.upsert_sitewide_election_metrics(&election).unwrap();
        assert_eq!(db.list_sitewide_election_metrics(Some(9000)).unwrap(), vec![election]);
    }

    #[test]
    fn test_voter_metrics_round_trip_and_updated_on() {
        let db = AnalyticsDb::open_in_memory().unwrap();
        let metrics = SitewideVoterMetrics {
            voter_we_vote_id: "wv01voter1".into(),
            actions_count: 5,
            signed_in_twitter: true,
            last_action_date: Some("2024-01-05T12:00:00Z".into()),
            last_calculated_date_as_integer: 20240105,
            ..Default::default()
        };
        db.upsert_sitewide_voter_metrics(&metrics).unwrap();
        assert_eq!(db.get_sitewide_voter_metrics("wv01voter1").unwrap(), Some(metrics));
        assert!(db.voter_metrics_updated_on("wv01voter1", 20240105).unwrap());
        assert!(!db.voter_metrics_updated_on("wv01voter1", 20240106).unwrap());
    }
}
