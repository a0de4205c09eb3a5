use rusqlite::types::Value;

use crate::models::query::{ActionFilter, CountColumn};

/// A SQL condition over `analytics_action` plus its positional parameters.
#[derive(Debug, Clone)]
pub struct WhereClause {
    pub sql: String,
    pub params: Vec<Value>,
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

/// Build the WHERE clause for a filter. An empty filter matches every row.
pub fn build_where_clause(filter: &ActionFilter) -> WhereClause {
    let mut conditions: Vec<String> = Vec::new();
    let mut params: Vec<Value> = Vec::new();

    if !filter.kinds.is_empty() {
        conditions.push(format!(
            "action_constant IN ({})",
            placeholders(filter.kinds.len())
        ));
        params.extend(filter.kinds.iter().map(|k| Value::Integer(k.code() as i64)));
    }

    if let Some(day) = filter.day {
        conditions.push("date_as_integer = ?".to_string());
        params.push(Value::Integer(day as i64));
    }
    if let Some(from) = filter.from_day {
        conditions.push("date_as_integer >= ?".to_string());
        params.push(Value::Integer(from as i64));
    }
    if let Some(through) = filter.through_day {
        conditions.push("date_as_integer <= ?".to_string());
        params.push(Value::Integer(through as i64));
    }

    if let Some(org) = &filter.organization_we_vote_id {
        conditions.push("organization_we_vote_id = ? COLLATE NOCASE".to_string());
        params.push(Value::Text(org.clone()));
    }
    if let Some(election) = filter.google_civic_election_id {
        conditions.push("google_civic_election_id = ?".to_string());
        params.push(Value::Integer(election));
    }

    if let Some(voter) = &filter.voter_we_vote_id {
        conditions.push("voter_we_vote_id = ? COLLATE NOCASE".to_string());
        params.push(Value::Text(voter.clone()));
    } else if let Some(voters) = &filter.voter_we_vote_ids {
        if voters.is_empty() {
            conditions.push("0 = 1".to_string());
        } else {
            // One JSON array parameter, so large follower lists stay under
            // SQLite's bound-variable limit.
            conditions.push(
                "voter_we_vote_id COLLATE NOCASE IN (SELECT value FROM json_each(?))".to_string(),
            );
            params.push(Value::Text(serde_json::Value::from(voters.clone()).to_string()));
        }
    }

    if let Some(state) = &filter.state_code {
        conditions.push("state_code = ? COLLATE NOCASE".to_string());
        params.push(Value::Text(state.clone()));
    }
    if filter.signed_in_only {
        conditions.push("is_signed_in = 1".to_string());
    }
    if filter.first_visit_only {
        conditions.push("first_visit_today = 1".to_string());
    }

    if let Some(since) = filter.new_since_day {
        let mut prior = vec![
            "prior.voter_we_vote_id = analytics_action.voter_we_vote_id".to_string(),
            "prior.date_as_integer < ?".to_string(),
        ];
        params.push(Value::Integer(since as i64));
        if !filter.kinds.is_empty() {
            prior.push(format!(
                "prior.action_constant IN ({})",
                placeholders(filter.kinds.len())
            ));
            params.extend(filter.kinds.iter().map(|k| Value::Integer(k.code() as i64)));
        }
        if let Some(org) = &filter.organization_we_vote_id {
            prior.push("prior.organization_we_vote_id = ? COLLATE NOCASE".to_string());
            params.push(Value::Text(org.clone()));
        }
        conditions.push(format!(
            "NOT EXISTS (SELECT 1 FROM analytics_action AS prior WHERE {})",
            prior.join(" AND ")
        ));
    }

    let sql = if conditions.is_empty() {
        "1 = 1".to_string()
    } else {
        conditions.join(" AND ")
    };
    WhereClause { sql, params }
}

/// Aggregate expression for a count. NULL members are never counted.
pub fn count_expression(column: CountColumn) -> &'static str {
    match column {
        CountColumn::Voters => "COUNT(DISTINCT voter_we_vote_id)",
        CountColumn::Organizations => "COUNT(DISTINCT organization_we_vote_id)",
        CountColumn::Elections => "COUNT(DISTINCT google_civic_election_id)",
        CountColumn::Days => "COUNT(DISTINCT date_as_integer)",
        CountColumn::VoterOrganizationPairs => {
            "COUNT(DISTINCT voter_we_vote_id || '|' || organization_we_vote_id)"
        }
        CountColumn::Rows => "COUNT(*)",
    }
}

/// Full count statement for a filter.
pub fn build_count_sql(filter: &ActionFilter, column: CountColumn) -> WhereClause {
    let clause = build_where_clause(filter);
    WhereClause {
        sql: format!(
            "SELECT {} FROM analytics_action WHERE {}",
            count_expression(column),
            clause.sql
        ),
        params: clause.params,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::action::{ActionKind, ENTRY_KINDS};

    #[test]
    fn test_empty_filter_matches_everything() {
        let clause = build_where_clause(&ActionFilter::new());
        assert_eq!(clause.sql, "1 = 1");
        assert!(clause.params.is_empty());
    }

    #[test]
    fn test_kinds_are_or_set() {
        let clause = build_where_clause(&ActionFilter::new().kinds(&ENTRY_KINDS));
        assert_eq!(clause.sql, "action_constant IN (?, ?)");
        assert_eq!(clause.params, vec![Value::Integer(1), Value::Integer(4)]);
    }

    #[test]
    fn test_conditions_are_anded_in_parameter_order() {
        let filter = ActionFilter::new()
            .kind(ActionKind::BallotVisit)
            .on_day(20240105)
            .organization("wv01org1")
            .election(9000)
            .signed_in()
            .first_visit();
        let clause = build_where_clause(&filter);
        assert_eq!(
            clause.sql,
            "action_constant IN (?) AND date_as_integer = ? \
             AND organization_we_vote_id = ? COLLATE NOCASE \
             AND google_civic_election_id = ? AND is_signed_in = 1 AND first_visit_today = 1"
        );
        assert_eq!(
            clause.params,
            vec![
                Value::Integer(6),
                Value::Integer(20240105),
                Value::Text("wv01org1".into()),
                Value::Integer(9000),
            ]
        );
    }

    #[test]
    fn test_empty_allowlist_matches_nothing() {
        let clause = build_where_clause(&ActionFilter::new().voters(vec![]));
        assert_eq!(clause.sql, "0 = 1");
    }

    #[test]
    fn test_allowlist_binds_one_parameter() {
        let voters: Vec<String> = (0..40_000).map(|n| format!("wv01voter{n}")).collect();
        let clause = build_where_clause(&ActionFilter::new().voters(voters));
        assert_eq!(
            clause.sql,
            "voter_we_vote_id COLLATE NOCASE IN (SELECT value FROM json_each(?))"
        );
        assert_eq!(clause.params.len(), 1);
        let Value::Text(json) = &clause.params[0] else {
            panic!("allowlist should bind as text");
        };
        assert!(json.starts_with("[\"wv01voter0\",\"wv01voter1\""));
    }

    #[test]
    fn test_new_since_scopes_prior_lookup() {
        let filter = ActionFilter::new()
            .kind(ActionKind::VoterGuideVisit)
            .organization("wv01org1")
            .on_day(20240105)
            .new_since(20240105);
        let clause = build_where_clause(&filter);
        assert!(clause.sql.contains("NOT EXISTS (SELECT 1 FROM analytics_action AS prior"));
        assert!(clause.sql.contains("prior.organization_we_vote_id = ? COLLATE NOCASE"));
        assert_eq!(clause.params.len(), 6);
    }

    #[test]
    fn test_count_sql_uses_distinct_voters() {
        let stmt = build_count_sql(&ActionFilter::new().on_day(20240105), CountColumn::Voters);
        assert_eq!(
            stmt.sql,
            "SELECT COUNT(DISTINCT voter_we_vote_id) FROM analytics_action WHERE date_as_integer = ?"
        );
    }
}
