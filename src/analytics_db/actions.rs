use rusqlite::{OptionalExtension, Row, params, params_from_iter};

use super::{AnalyticsDb, from_sql_count};
use crate::error::Result;
use crate::models::action::{ActionKind, AnalyticsAction, ENTRY_KINDS};
use crate::models::query::{ActionFilter, CountColumn};
use crate::query_builder::{build_count_sql, build_where_clause};

const ACTION_COLUMNS: &str = "id, action_constant, exact_time, date_as_integer, voter_we_vote_id, voter_id, \
     is_signed_in, state_code, organization_we_vote_id, organization_id, ballot_item_we_vote_id, \
     google_civic_election_id, first_visit_today, voter_device_id, user_agent, \
     is_bot, is_mobile, is_desktop, is_tablet";

fn action_from_row(row: &Row<'_>) -> rusqlite::Result<AnalyticsAction> {
    Ok(AnalyticsAction {
        id: row.get(0)?,
        action_constant: row.get(1)?,
        exact_time: row.get(2)?,
        date_as_integer: row.get(3)?,
        voter_we_vote_id: row.get(4)?,
        voter_id: row.get(5)?,
        is_signed_in: row.get(6)?,
        state_code: row.get(7)?,
        organization_we_vote_id: row.get(8)?,
        organization_id: row.get(9)?,
        ballot_item_we_vote_id: row.get(10)?,
        google_civic_election_id: row.get(11)?,
        first_visit_today: row.get(12)?,
        voter_device_id: row.get(13)?,
        user_agent: row.get(14)?,
        is_bot: row.get(15)?,
        is_mobile: row.get(16)?,
        is_desktop: row.get(17)?,
        is_tablet: row.get(18)?,
    })
}

impl AnalyticsDb {
    // ── Event store writes ──

    /// Append one action. The stored row (with its id) is returned.
    pub fn insert_action(&self, action: &AnalyticsAction) -> Result<AnalyticsAction> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO analytics_action (
                action_constant, exact_time, date_as_integer, voter_we_vote_id, voter_id,
                is_signed_in, state_code, organization_we_vote_id, organization_id,
                ballot_item_we_vote_id, google_civic_election_id, first_visit_today,
                voter_device_id, user_agent, is_bot, is_mobile, is_desktop, is_tablet
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
            params![
                action.action_constant,
                action.exact_time,
                action.date_as_integer,
                action.voter_we_vote_id,
                action.voter_id,
                action.is_signed_in,
                action.state_code,
                action.organization_we_vote_id,
                action.organization_id,
                action.ballot_item_we_vote_id,
                action.google_civic_election_id,
                action.first_visit_today,
                action.voter_device_id,
                action.user_agent,
                action.is_bot,
                action.is_mobile,
                action.is_desktop,
                action.is_tablet,
            ],
        )?;
        let mut saved = action.clone();
        saved.id = conn.last_insert_rowid();
        Ok(saved)
    }

    /// Fill in the actor on every action recorded under a device session and
    /// clear the device id from those rows.
    pub fn attach_voter_to_device(
        &self,
        voter_device_id: &str,
        voter_we_vote_id: &str,
        voter_id: Option<i64>,
    ) -> Result<usize> {
        let conn = self.conn()?;
        let count = conn.execute(
            "UPDATE analytics_action
             SET voter_we_vote_id = ?2,
                 voter_id = COALESCE(?3, voter_id),
                 voter_device_id = NULL
             WHERE voter_device_id = ?1",
            params![voter_device_id, voter_we_vote_id, voter_id],
        )?;
        Ok(count)
    }

    // ── Augmentation ──

    /// Mark the oldest action of every (day, voter) group in the range as the
    /// first visit of that day. Returns the number of rows newly marked.
    pub fn update_first_visit_today(&self, from_day: u32, through_day: u32) -> Result<usize> {
        let conn = self.conn()?;
        let count = conn.execute(
            "UPDATE analytics_action SET first_visit_today = 1
             WHERE first_visit_today = 0
               AND id IN (
                   SELECT MIN(id) FROM analytics_action
                   WHERE date_as_integer BETWEEN ?1 AND ?2
                     AND voter_we_vote_id IS NOT NULL AND voter_we_vote_id != ''
                   GROUP BY date_as_integer, voter_we_vote_id COLLATE NOCASE
               )",
            params![from_day, through_day],
        )?;
        Ok(count)
    }

    /// Single-voter form of the first-visit backfill. Without a day every day
    /// the voter has actions on is covered.
    pub fn update_first_visit_today_for_voter(
        &self,
        voter_we_vote_id: &str,
        day: Option<u32>,
    ) -> Result<usize> {
        let conn = self.conn()?;
        let count = conn.execute(
            "UPDATE analytics_action SET first_visit_today = 1
             WHERE first_visit_today = 0
               AND id IN (
                   SELECT MIN(id) FROM analytics_action
                   WHERE voter_we_vote_id = ?1 COLLATE NOCASE
                     AND (?2 IS NULL OR date_as_integer = ?2)
                   GROUP BY date_as_integer
               )",
            params![voter_we_vote_id, day],
        )?;
        Ok(count)
    }

    /// Give actions lacking an election the election of the same voter's
    /// nearest earlier action that day.
    pub fn augment_election_ids(&self, day: u32) -> Result<usize> {
        let conn = self.conn()?;
        let count = conn.execute(
            "UPDATE analytics_action
             SET google_civic_election_id = (
                 SELECT prior.google_civic_election_id FROM analytics_action AS prior
                 WHERE prior.voter_we_vote_id = analytics_action.voter_we_vote_id
                   AND prior.date_as_integer = analytics_action.date_as_integer
                   AND prior.id < analytics_action.id
                   AND prior.google_civic_election_id > 0
                 ORDER BY prior.id DESC LIMIT 1
             )
             WHERE date_as_integer = ?1
               AND (google_civic_election_id IS NULL OR google_civic_election_id = 0)
               AND voter_we_vote_id IS NOT NULL
               AND EXISTS (
                   SELECT 1 FROM analytics_action AS prior
                   WHERE prior.voter_we_vote_id = analytics_action.voter_we_vote_id
                     AND prior.date_as_integer = analytics_action.date_as_integer
                     AND prior.id < analytics_action.id
                     AND prior.google_civic_election_id > 0
               )",
            params![day],
        )?;
        Ok(count)
    }

    // ── Event store reads ──

    pub fn get_action(&self, id: i64) -> Result<Option<AnalyticsAction>> {
        let conn = self.conn()?;
        let sql = format!("SELECT {ACTION_COLUMNS} FROM analytics_action WHERE id = ?1");
        let action = conn.query_row(&sql, params![id], action_from_row).optional()?;
        Ok(action)
    }

    /// Actions matching a filter, oldest first. With `distinct_for_members`
    /// only the first action per (election, organization, voter) is kept.
    pub fn list_actions(
        &self,
        filter: &ActionFilter,
        distinct_for_members: bool,
        limit: Option<u32>,
    ) -> Result<Vec<AnalyticsAction>> {
        let conn = self.conn()?;
        let clause = build_where_clause(filter);
        let mut sql = if distinct_for_members {
            format!(
                "SELECT {ACTION_COLUMNS} FROM analytics_action WHERE id IN (
                     SELECT MIN(id) FROM analytics_action WHERE {}
                     GROUP BY google_civic_election_id, organization_we_vote_id, voter_we_vote_id
                 )",
                clause.sql
            )
        } else {
            format!("SELECT {ACTION_COLUMNS} FROM analytics_action WHERE {}", clause.sql)
        };
        sql.push_str(" ORDER BY id");
        if let Some(limit) = limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(clause.params.iter()), action_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn count_distinct(&self, filter: &ActionFilter, column: CountColumn) -> Result<u64> {
        let conn = self.conn()?;
        let stmt = build_count_sql(filter, column);
        let count: i64 = conn.query_row(&stmt.sql, params_from_iter(stmt.params.iter()), |row| row.get(0))?;
        Ok(from_sql_count(count))
    }

    pub fn distinct_voters(&self, filter: &ActionFilter) -> Result<Vec<String>> {
        self.distinct_text("voter_we_vote_id", filter)
    }

    pub fn distinct_organizations(&self, filter: &ActionFilter) -> Result<Vec<String>> {
        self.distinct_text("organization_we_vote_id", filter)
    }

    fn distinct_text(&self, column: &str, filter: &ActionFilter) -> Result<Vec<String>> {
        let conn = self.conn()?;
        let clause = build_where_clause(filter);
        let sql = format!(
            "SELECT DISTINCT {column} FROM analytics_action
             WHERE {} AND {column} IS NOT NULL AND {column} != ''
             ORDER BY {column}",
            clause.sql
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(clause.params.iter()), |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(rows)
    }

    pub fn distinct_elections(&self, filter: &ActionFilter) -> Result<Vec<i64>> {
        let conn = self.conn()?;
        let clause = build_where_clause(filter);
        let sql = format!(
            "SELECT DISTINCT google_civic_election_id FROM analytics_action
             WHERE {} AND google_civic_election_id > 0
             ORDER BY google_civic_election_id",
            clause.sql
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(clause.params.iter()), |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<i64>>>()?;
        Ok(rows)
    }

    /// Days carrying at least one action, ascending.
    pub fn dates_with_actions(&self, from_day: u32, through_day: Option<u32>) -> Result<Vec<u32>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT DISTINCT date_as_integer FROM analytics_action
             WHERE date_as_integer >= ?1 AND (?2 IS NULL OR date_as_integer <= ?2)
             ORDER BY date_as_integer",
        )?;
        let rows = stmt
            .query_map(params![from_day, through_day], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<u32>>>()?;
        Ok(rows)
    }

    pub fn has_actions_on(&self, day: u32) -> Result<bool> {
        let conn = self.conn()?;
        let found = conn
            .query_row(
                "SELECT 1 FROM analytics_action WHERE date_as_integer = ?1 LIMIT 1",
                params![day],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    pub fn organizations_with_election_activity(&self, google_civic_election_id: i64) -> Result<Vec<String>> {
        self.distinct_organizations(&ActionFilter::new().election(google_civic_election_id))
    }

    /// Voters with any action in the inclusive day range.
    pub fn voters_with_changes(&self, from_day: u32, through_day: u32) -> Result<Vec<String>> {
        self.distinct_voters(&ActionFilter::new().from_day(from_day).through_day(through_day))
    }

    /// Distinct voters who entered through the organization (first visit of
    /// the day on a guide visit or auto-follow) and afterwards performed `kind`.
    pub fn count_entrants_with_later_action(
        &self,
        organization_we_vote_id: &str,
        google_civic_election_id: Option<i64>,
        kind: ActionKind,
    ) -> Result<u64> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(DISTINCT later.voter_we_vote_id) FROM analytics_action AS later
             WHERE later.action_constant = ?1
               AND (?3 IS NULL OR later.google_civic_election_id = ?3)
               AND EXISTS (
                   SELECT 1 FROM analytics_action AS entry
                   WHERE entry.voter_we_vote_id = later.voter_we_vote_id
                     AND entry.organization_we_vote_id = ?2 COLLATE NOCASE
                     AND entry.action_constant IN (?4, ?5)
                     AND entry.first_visit_today = 1
                     AND (?3 IS NULL OR entry.google_civic_election_id = ?3)
                     AND entry.id < later.id
               )",
            params![
                kind.code(),
                organization_we_vote_id,
                google_civic_election_id,
                ENTRY_KINDS[0].code(),
                ENTRY_KINDS[1].code(),
            ],
            |row| row.get(0),
        )?;
        Ok(from_sql_count(count))
    }

    /// Timestamp of the newest matching action.
    pub fn last_action_time(&self, filter: &ActionFilter) -> Result<Option<String>> {
        let conn = self.conn()?;
        let clause = build_where_clause(filter);
        let sql = format!(
            "SELECT exact_time FROM analytics_action WHERE {} ORDER BY id DESC LIMIT 1",
            clause.sql
        );
        let time = conn
            .query_row(&sql, params_from_iter(clause.params.iter()), |row| row.get(0))
            .optional()?;
        Ok(time)
    }
}
