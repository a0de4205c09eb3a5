//! SQLite-backed persistence for actions, rollup progress and summary tables.

mod actions;
mod processing;
mod settings;
mod summaries;

use rusqlite::Connection;
use std::sync::{Mutex, MutexGuard};

use crate::error::{AnalyticsError, Result};

pub use settings::LAST_PROCESSED_DAY_SETTING;

pub struct AnalyticsDb {
    conn: Mutex<Connection>,
}

impl AnalyticsDb {
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.run_migrations()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| AnalyticsError::LockPoisoned)
    }

    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS analytics_action (
                id                       INTEGER PRIMARY KEY AUTOINCREMENT,
                action_constant          INTEGER NOT NULL,
                exact_time               TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now')),
                date_as_integer          INTEGER NOT NULL,
                voter_we_vote_id         TEXT,
                voter_id                 INTEGER,
                is_signed_in             INTEGER NOT NULL DEFAULT 0,
                state_code               TEXT,
                organization_we_vote_id  TEXT,
                organization_id          INTEGER,
                ballot_item_we_vote_id   TEXT,
                google_civic_election_id INTEGER,
                first_visit_today        INTEGER NOT NULL DEFAULT 0,
                voter_device_id          TEXT,
                user_agent               TEXT,
                is_bot                   INTEGER NOT NULL DEFAULT 0,
                is_mobile                INTEGER NOT NULL DEFAULT 0,
                is_desktop               INTEGER NOT NULL DEFAULT 0,
                is_tablet                INTEGER NOT NULL DEFAULT 0
            );
            CREATE INDEX IF NOT EXISTS idx_action_constant ON analytics_action(action_constant);
            CREATE INDEX IF NOT EXISTS idx_action_date ON analytics_action(date_as_integer);
            CREATE INDEX IF NOT EXISTS idx_action_voter ON analytics_action(voter_we_vote_id COLLATE NOCASE, date_as_integer, id);
            CREATE INDEX IF NOT EXISTS idx_action_organization ON analytics_action(organization_we_vote_id COLLATE NOCASE);
            CREATE INDEX IF NOT EXISTS idx_action_election ON analytics_action(google_civic_election_id);
            CREATE INDEX IF NOT EXISTS idx_action_device ON analytics_action(voter_device_id);

            CREATE TABLE IF NOT EXISTS analytics_processing_status (
                analytics_date_as_integer                          INTEGER PRIMARY KEY,
                finished_augment_analytics_action_with_election_id INTEGER NOT NULL DEFAULT 0,
                finished_augment_analytics_action_with_first_visit INTEGER NOT NULL DEFAULT 0,
                finished_calculate_organization_daily_metrics      INTEGER NOT NULL DEFAULT 0,
                finished_calculate_organization_election_metrics   INTEGER NOT NULL DEFAULT 0,
                finished_calculate_sitewide_daily_metrics          INTEGER NOT NULL DEFAULT 0,
                finished_calculate_sitewide_election_metrics       INTEGER NOT NULL DEFAULT 0,
                finished_calculate_sitewide_voter_metrics          INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS analytics_processed (
                id                               INTEGER PRIMARY KEY AUTOINCREMENT,
                analytics_date_as_integer        INTEGER NOT NULL,
                batch_process_id                 INTEGER,
                batch_process_analytics_chunk_id INTEGER,
                organization_we_vote_id          TEXT,
                google_civic_election_id         INTEGER,
                voter_we_vote_id                 TEXT NOT NULL DEFAULT '',
                kind_of_process                  TEXT NOT NULL,
                UNIQUE (analytics_date_as_integer, voter_we_vote_id, kind_of_process)
            );

            CREATE TABLE IF NOT EXISTS organization_daily_metrics (
                organization_we_vote_id      TEXT NOT NULL COLLATE NOCASE,
                date_as_integer              INTEGER NOT NULL,
                visitors_total               INTEGER NOT NULL DEFAULT 0,
                authenticated_visitors_total INTEGER NOT NULL DEFAULT 0,
                visitors_today               INTEGER NOT NULL DEFAULT 0,
                authenticated_visitors_today INTEGER NOT NULL DEFAULT 0,
                new_visitors_today           INTEGER NOT NULL DEFAULT 0,
                voter_guide_entrants_today   INTEGER NOT NULL DEFAULT 0,
                voter_guide_entrants         INTEGER NOT NULL DEFAULT 0,
                entrants_visiting_ballot     INTEGER NOT NULL DEFAULT 0,
                followers_visiting_ballot    INTEGER NOT NULL DEFAULT 0,
                followers_total              INTEGER NOT NULL DEFAULT 0,
                new_followers_today          INTEGER NOT NULL DEFAULT 0,
                auto_followers_total         INTEGER NOT NULL DEFAULT 0,
                new_auto_followers_today     INTEGER NOT NULL DEFAULT 0,
                updated_at                   TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now')),
                PRIMARY KEY (organization_we_vote_id, date_as_integer)
            );

            CREATE TABLE IF NOT EXISTS organization_election_metrics (
                google_civic_election_id      INTEGER NOT NULL,
                organization_we_vote_id       TEXT NOT NULL COLLATE NOCASE,
                election_day_text             TEXT,
                visitors_total                INTEGER NOT NULL DEFAULT 0,
                authenticated_visitors_total  INTEGER NOT NULL DEFAULT 0,
                voter_guide_entrants          INTEGER NOT NULL DEFAULT 0,
                followers_at_time_of_election INTEGER NOT NULL DEFAULT 0,
                new_followers                 INTEGER NOT NULL DEFAULT 0,
                new_auto_followers            INTEGER NOT NULL DEFAULT 0,
                entrants_visited_ballot       INTEGER NOT NULL DEFAULT 0,
                followers_visited_ballot      INTEGER NOT NULL DEFAULT 0,
                entrants_took_position        INTEGER NOT NULL DEFAULT 0,
                followers_took_position       INTEGER NOT NULL DEFAULT 0,
                updated_at                    TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now')),
                PRIMARY KEY (google_civic_election_id, organization_we_vote_id)
            );

            CREATE TABLE IF NOT EXISTS sitewide_daily_metrics (
                date_as_integer                          INTEGER PRIMARY KEY,
                visitors_total                           INTEGER NOT NULL DEFAULT 0,
                visitors_today                           INTEGER NOT NULL DEFAULT 0,
                new_visitors_today                       INTEGER NOT NULL DEFAULT 0,
                voter_guide_entrants_today               INTEGER NOT NULL DEFAULT 0,
                welcome_page_entrants_today              INTEGER NOT NULL DEFAULT 0,
                friend_entrants_today                    INTEGER NOT NULL DEFAULT 0,
                authenticated_visitors_total             INTEGER NOT NULL DEFAULT 0,
                authenticated_visitors_today             INTEGER NOT NULL DEFAULT 0,
                ballot_views_today                       INTEGER NOT NULL DEFAULT 0,
                voter_guides_viewed_total                INTEGER NOT NULL DEFAULT 0,
                voter_guides_viewed_today                INTEGER NOT NULL DEFAULT 0,
                issues_followed_total                    INTEGER NOT NULL DEFAULT 0,
                issues_followed_today                    INTEGER NOT NULL DEFAULT 0,
                organizations_followed_total             INTEGER NOT NULL DEFAULT 0,
                organizations_followed_today             INTEGER NOT NULL DEFAULT 0,
                organizations_auto_followed_total        INTEGER NOT NULL DEFAULT 0,
                organizations_auto_followed_today        INTEGER NOT NULL DEFAULT 0,
                shared_link_clicked_count_today          INTEGER NOT NULL DEFAULT 0,
                shared_link_clicked_unique_viewers_today INTEGER NOT NULL DEFAULT 0,
                updated_at                               TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now'))
            );

            CREATE TABLE IF NOT EXISTS sitewide_election_metrics (
                google_civic_election_id                       INTEGER PRIMARY KEY,
                election_day_text                              TEXT,
                visitors_total                                 INTEGER NOT NULL DEFAULT 0,
                authenticated_visitors_total                   INTEGER NOT NULL DEFAULT 0,
                voter_guide_entries                            INTEGER NOT NULL DEFAULT 0,
                voter_guide_views                              INTEGER NOT NULL DEFAULT 0,
                voter_guides_viewed                            INTEGER NOT NULL DEFAULT 0,
                issues_followed                                INTEGER NOT NULL DEFAULT 0,
                unique_voters_that_followed_organizations      INTEGER NOT NULL DEFAULT 0,
                unique_voters_that_auto_followed_organizations INTEGER NOT NULL DEFAULT 0,
                organizations_followed                         INTEGER NOT NULL DEFAULT 0,
                organizations_auto_followed                    INTEGER NOT NULL DEFAULT 0,
                updated_at                                     TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now'))
            );

            CREATE TABLE IF NOT EXISTS sitewide_voter_metrics (
                voter_we_vote_id                TEXT PRIMARY KEY COLLATE NOCASE,
                actions_count                   INTEGER NOT NULL DEFAULT 0,
                elections_viewed                INTEGER NOT NULL DEFAULT 0,
                voter_guides_viewed             INTEGER NOT NULL DEFAULT 0,
                ballot_visited                  INTEGER NOT NULL DEFAULT 0,
                welcome_visited                 INTEGER NOT NULL DEFAULT 0,
                issues_followed                 INTEGER NOT NULL DEFAULT 0,
                organizations_followed          INTEGER NOT NULL DEFAULT 0,
                signed_in_twitter               INTEGER NOT NULL DEFAULT 0,
                signed_in_facebook              INTEGER NOT NULL DEFAULT 0,
                signed_in_with_email            INTEGER NOT NULL DEFAULT 0,
                days_visited                    INTEGER NOT NULL DEFAULT 0,
                last_action_date                TEXT,
                last_calculated_date_as_integer INTEGER NOT NULL DEFAULT 0
            );
            CREATE INDEX IF NOT EXISTS idx_voter_metrics_calculated ON sitewide_voter_metrics(last_calculated_date_as_integer);

            CREATE TABLE IF NOT EXISTS analytics_settings (
                setting_name  TEXT PRIMARY KEY,
                setting_value TEXT NOT NULL,
                updated_at    TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now'))
            );
            ",
        )?;
        Ok(())
    }
}

/// Counters are stored as SQLite integers.
pub(crate) fn to_sql_count(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

pub(crate) fn from_sql_count(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}
