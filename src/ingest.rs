//! Recording single actions from request handlers.

use chrono::{DateTime, Utc};

use crate::analytics_db::AnalyticsDb;
use crate::date::{date_as_integer_at, is_valid_date_as_integer};
use crate::models::action::{ActionKind, AnalyticsAction, RecordActionRequest, RecordOutcome};
use crate::models::query::non_empty;

/// Validate and append one action.
///
/// Kinds in the organization-required set need the organization's external
/// id; every other kind is stored without the internal organization id. A missing required
/// field is not a failure: the outcome reports `success` with nothing saved.
/// An action carrying only a device session is stored so it can be attached
/// to a voter later.
pub fn record_action(
    db: &AnalyticsDb,
    req: &RecordActionRequest,
    now: DateTime<Utc>,
    utc_offset_hours: i32,
) -> RecordOutcome {
    let kind = ActionKind::from_code(req.action_constant);
    let label = kind
        .map(|k| k.name().to_string())
        .unwrap_or_else(|| req.action_constant.to_string());
    let mut status = format!("ACTION_CONSTANT:{label} ");

    let voter = non_empty(&req.voter_we_vote_id);
    let device = non_empty(&req.voter_device_id);
    let organization = non_empty(&req.organization_we_vote_id);
    let organization_bound = kind.is_some_and(ActionKind::requires_organization);

    let mut missing = false;
    if req.action_constant == 0 {
        missing = true;
        status.push_str("MISSING_ACTION_CONSTANT ");
    } else if kind.is_none() {
        missing = true;
        status.push_str("UNKNOWN_ACTION_CONSTANT ");
    }
    if voter.is_none() && device.is_none() {
        missing = true;
        status.push_str("MISSING_VOTER_WE_VOTE_ID ");
    }
    if organization_bound && organization.is_none() {
        missing = true;
        status.push_str("MISSING_ORGANIZATION_WE_VOTE_ID ");
    }
    if req.date_as_integer.is_some_and(|day| !is_valid_date_as_integer(day)) {
        missing = true;
        status.push_str("INVALID_DATE_AS_INTEGER ");
    }
    if missing {
        return RecordOutcome {
            success: true,
            status,
            action_saved: false,
            action: None,
        };
    }

    let action = AnalyticsAction {
        id: 0,
        action_constant: req.action_constant,
        exact_time: now.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        date_as_integer: req
            .date_as_integer
            .unwrap_or_else(|| date_as_integer_at(now, utc_offset_hours)),
        voter_we_vote_id: voter.map(String::from),
        voter_id: req.voter_id.filter(|id| *id > 0),
        is_signed_in: req.is_signed_in,
        state_code: non_empty(&req.state_code).map(String::from),
        organization_we_vote_id: organization.map(String::from),
        organization_id: if organization_bound {
            req.organization_id.filter(|id| *id > 0)
        } else {
            None
        },
        ballot_item_we_vote_id: non_empty(&req.ballot_item_we_vote_id).map(String::from),
        google_civic_election_id: req.google_civic_election_id.filter(|id| *id > 0),
        first_visit_today: false,
        voter_device_id: device.map(String::from),
        user_agent: non_empty(&req.user_agent.user_agent).map(String::from),
        is_bot: req.user_agent.is_bot,
        is_mobile: req.user_agent.is_mobile,
        is_desktop: req.user_agent.is_desktop,
        is_tablet: req.user_agent.is_tablet,
    };

    let variant = if organization_bound { "TYPE1" } else { "TYPE2" };
    match db.insert_action(&action) {
        Ok(saved) => {
            tracing::debug!("recorded {} as action {} on {}", saved.action_name(), saved.id, saved.date_as_integer);
            status.push_str(&format!("ACTION_{variant}_SAVED "));
            RecordOutcome {
                success: true,
                status,
                action_saved: true,
                action: Some(saved),
            }
        }
        Err(e) => {
            tracing::error!("could not save action {label}: {e}");
            status.push_str(&format!("COULD_NOT_SAVE_ACTION_{variant}: {} ", e.status()));
            RecordOutcome {
                success: false,
                status,
                action_saved: false,
                action: None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::action::UserAgentFlags;
    use crate::models::query::ActionFilter;
    use chrono::TimeZone;

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 5, 20, 0, 0).unwrap()
    }

    fn request(kind: ActionKind) -> RecordActionRequest {
        RecordActionRequest {
            action_constant: kind.code(),
            voter_we_vote_id: Some("wv01voter1".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_missing_organization_skips_write() {
        let db = AnalyticsDb::open_in_memory().unwrap();
        let outcome = record_action(&db, &request(ActionKind::VoterGuideVisit), noon(), -8);
        assert!(outcome.success);
        assert!(!outcome.action_saved);
        assert!(outcome.status.starts_with("ACTION_CONSTANT:VOTER_GUIDE_VISIT "));
        assert!(outcome.status.contains("MISSING_ORGANIZATION_WE_VOTE_ID"));
        assert!(db.list_actions(&ActionFilter::new(), false, None).unwrap().is_empty());
    }

    #[test]
    fn test_organization_bound_action_keeps_both_ids() {
        let db = AnalyticsDb::open_in_memory().unwrap();
        let req = RecordActionRequest {
            organization_we_vote_id: Some("wv01org1".into()),
            organization_id: Some(41),
            user_agent: UserAgentFlags {
                user_agent: Some("Mozilla/5.0".into()),
                is_desktop: true,
                ..Default::default()
            },
            ..request(ActionKind::OrganizationFollow)
        };
        let outcome = record_action(&db, &req, noon(), -8);
        assert!(outcome.action_saved);
        assert!(outcome.status.contains("ACTION_TYPE1_SAVED"));
        let action = outcome.action.unwrap();
        assert_eq!(action.organization_id, Some(41));
        assert_eq!(action.date_as_integer, 20240105);
        assert_eq!(action.exact_time, "2024-01-05T20:00:00Z");
        assert_eq!(action.user_agent.as_deref(), Some("Mozilla/5.0"));
        assert!(action.is_desktop);
    }

    #[test]
    fn test_organization_free_action_drops_internal_org_id() {
        let db = AnalyticsDb::open_in_memory().unwrap();
        let req = RecordActionRequest {
            organization_we_vote_id: Some("wv01org1".into()),
            organization_id: Some(41),
            google_civic_election_id: Some(9000),
            ..request(ActionKind::PositionTaken)
        };
        let outcome = record_action(&db, &req, noon(), -8);
        assert!(outcome.status.contains("ACTION_TYPE2_SAVED"));
        let action = outcome.action.unwrap();
        assert_eq!(action.organization_we_vote_id.as_deref(), Some("wv01org1"));
        assert_eq!(action.organization_id, None);
        assert_eq!(action.google_civic_election_id, Some(9000));
    }

    #[test]
    fn test_missing_fields_accumulate() {
        let db = AnalyticsDb::open_in_memory().unwrap();
        let outcome = record_action(&db, &RecordActionRequest::default(), noon(), -8);
        assert!(outcome.success);
        assert!(!outcome.action_saved);
        assert_eq!(
            outcome.status,
            "ACTION_CONSTANT:0 MISSING_ACTION_CONSTANT MISSING_VOTER_WE_VOTE_ID "
        );

        let unknown = RecordActionRequest {
            action_constant: 999,
            ..request(ActionKind::BallotVisit)
        };
        let outcome = record_action(&db, &unknown, noon(), -8);
        assert!(outcome.status.contains("UNKNOWN_ACTION_CONSTANT"));
        assert!(!outcome.action_saved);
    }

    #[test]
    fn test_reference_day_and_override() {
        let db = AnalyticsDb::open_in_memory().unwrap();
        let late = Utc.with_ymd_and_hms(2024, 1, 6, 3, 0, 0).unwrap();
        let outcome = record_action(&db, &request(ActionKind::BallotVisit), late, -8);
        assert_eq!(outcome.action.unwrap().date_as_integer, 20240105);

        let req = RecordActionRequest {
            date_as_integer: Some(20231231),
            ..request(ActionKind::BallotVisit)
        };
        let outcome = record_action(&db, &req, late, -8);
        assert_eq!(outcome.action.unwrap().date_as_integer, 20231231);
    }

    #[test]
    fn test_device_only_action_is_kept_for_attachment() {
        let db = AnalyticsDb::open_in_memory().unwrap();
        let req = RecordActionRequest {
            voter_we_vote_id: None,
            voter_device_id: Some("device-1".into()),
            ..request(ActionKind::WelcomeVisit)
        };
        let outcome = record_action(&db, &req, noon(), -8);
        assert!(outcome.action_saved);
        assert_eq!(db.attach_voter_to_device("device-1", "wv01voter1", None).unwrap(), 1);
    }
}
