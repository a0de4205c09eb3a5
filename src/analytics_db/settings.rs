use rusqlite::{OptionalExtension, params};

use super::AnalyticsDb;
use crate::error::Result;

/// Durable position of the rollup cursor.
pub const LAST_PROCESSED_DAY_SETTING: &str = "analytics_date_as_integer_last_processed";

impl AnalyticsDb {
    pub fn get_setting(&self, name: &str) -> Result<Option<String>> {
        let conn = self.conn()?;
        let value = conn
            .query_row(
                "SELECT setting_value FROM analytics_settings WHERE setting_name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    pub fn set_setting(&self, name: &str, value: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO analytics_settings (setting_name, setting_value) VALUES (?1, ?2)
             ON CONFLICT (setting_name) DO UPDATE SET
                 setting_value = excluded.setting_value,
                 updated_at = strftime('%Y-%m-%dT%H:%M:%SZ','now')",
            params![name, value],
        )?;
        Ok(())
    }

    /// The stored cursor day; unparsable values read as unset.
    pub fn last_processed_day(&self) -> Result<Option<u32>> {
        Ok(self
            .get_setting(LAST_PROCESSED_DAY_SETTING)?
            .and_then(|value| value.trim().parse().ok()))
    }

    pub fn set_last_processed_day(&self, day: u32) -> Result<()> {
        self.set_setting(LAST_PROCESSED_DAY_SETTING, &day.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_setting_overwrites() {
        let db = AnalyticsDb::open_in_memory().unwrap();
        assert_eq!(db.last_processed_day().unwrap(), None);
        db.set_last_processed_day(20240105).unwrap();
        db.set_last_processed_day(20240106).unwrap();
        assert_eq!(db.last_processed_day().unwrap(), Some(20240106));

        db.set_setting(LAST_PROCESSED_DAY_SETTING, "garbage").unwrap();
        assert_eq!(db.last_processed_day().unwrap(), None);
    }
}
