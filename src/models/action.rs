use serde::{Deserialize, Serialize};

/// Declares every tracked action kind once, with its numeric code and display name.
macro_rules! action_kinds {
    ($($variant:ident = $code:literal => $name:literal,)*) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u16)]
        pub enum ActionKind {
            $($variant = $code,)*
        }

        impl ActionKind {
            pub const ALL: &'static [ActionKind] = &[$(ActionKind::$variant,)*];

            pub fn code(self) -> u16 {
                self as u16
            }

            /// Display name, e.g. `BALLOT_VISIT`.
            pub fn name(self) -> &'static str {
                match self {
                    $(ActionKind::$variant => $name,)*
                }
            }

            pub fn from_code(code: u16) -> Option<Self> {
                match code {
                    $($code => Some(ActionKind::$variant),)*
                    _ => None,
                }
            }
        }
    };
}

action_kinds! {
    VoterGuideVisit = 1 => "VOTER_GUIDE_VISIT",
    VoterGuideEntry = 2 => "VOTER_GUIDE_ENTRY",
    OrganizationFollow = 3 => "ORGANIZATION_FOLLOW",
    OrganizationAutoFollow = 4 => "ORGANIZATION_AUTO_FOLLOW",
    IssueFollow = 5 => "ISSUE_FOLLOW",
    BallotVisit = 6 => "BALLOT_VISIT",
    PositionTaken = 7 => "POSITION_TAKEN",
    VoterTwitterAuth = 8 => "VOTER_TWITTER_AUTH",
    VoterFacebookAuth = 9 => "VOTER_FACEBOOK_AUTH",
    WelcomeEntry = 10 => "WELCOME_ENTRY",
    FriendEntry = 11 => "FRIEND_ENTRY",
    WelcomeVisit = 12 => "WELCOME_VISIT",
    OrganizationFollowIgnore = 13 => "ORGANIZATION_FOLLOW_IGNORE",
    OrganizationStopFollowing = 14 => "ORGANIZATION_STOP_FOLLOWING",
    IssueFollowIgnore = 15 => "ISSUE_FOLLOW_IGNORE",
    IssueStopFollowing = 16 => "ISSUE_STOP_FOLLOWING",
    ModalIssues = 17 => "MODAL_ISSUES",
    ModalOrganizations = 18 => "MODAL_ORGANIZATIONS",
    ModalPositions = 19 => "MODAL_POSITIONS",
    ModalFriends = 20 => "MODAL_FRIENDS",
    ModalShare = 21 => "MODAL_SHARE",
    ModalVote = 22 => "MODAL_VOTE",
    Network = 23 => "NETWORK",
    FacebookInvitableFriends = 24 => "FACEBOOK_INVITABLE_FRIENDS",
    DonateVisit = 25 => "DONATE_VISIT",
    AccountPage = 26 => "ACCOUNT_PAGE",
    InviteByEmail = 27 => "INVITE_BY_EMAIL",
    AboutGettingStarted = 28 => "ABOUT_GETTING_STARTED",
    AboutVision = 29 => "ABOUT_VISION",
    AboutOrganization = 30 => "ABOUT_ORGANIZATION",
    AboutTeam = 31 => "ABOUT_TEAM",
    AboutMobile = 32 => "ABOUT_MOBILE",
    Office = 33 => "OFFICE",
    Candidate = 34 => "CANDIDATE",
    VoterGuideGetStarted = 35 => "VOTER_GUIDE_GET_STARTED",
    FacebookAuthenticationExists = 36 => "FACEBOOK_AUTHENTICATION_EXISTS",
    GoogleAuthenticationExists = 37 => "GOOGLE_AUTHENTICATION_EXISTS",
    TwitterAuthenticationExists = 38 => "TWITTER_AUTHENTICATION_EXISTS",
    EmailAuthenticationExists = 39 => "EMAIL_AUTHENTICATION_EXISTS",
    Elections = 40 => "ELECTIONS",
    OrganizationStopIgnoring = 41 => "ORGANIZATION_STOP_IGNORING",
    ModalVoterPlan = 42 => "MODAL_VOTER_PLAN",
    ReadyVisit = 43 => "READY_VISIT",
    SelectBallotModal = 44 => "SELECT_BALLOT_MODAL",
    ShareButtonCopy = 45 => "SHARE_BUTTON_COPY",
    ShareButtonEmail = 46 => "SHARE_BUTTON_EMAIL",
    ShareButtonFacebook = 47 => "SHARE_BUTTON_FACEBOOK",
    ShareButtonFriends = 48 => "SHARE_BUTTON_FRIENDS",
    ShareButtonTwitter = 49 => "SHARE_BUTTON_TWITTER",
    ShareBallot = 50 => "SHARE_BALLOT",
    ShareBallotAllOpinions = 51 => "SHARE_BALLOT_ALL_OPINIONS",
    ShareCandidate = 52 => "SHARE_CANDIDATE",
    ShareCandidateAllOpinions = 53 => "SHARE_CANDIDATE_ALL_OPINIONS",
    ShareMeasure = 54 => "SHARE_MEASURE",
    ShareMeasureAllOpinions = 55 => "SHARE_MEASURE_ALL_OPINIONS",
    ShareOffice = 56 => "SHARE_OFFICE",
    ShareOfficeAllOpinions = 57 => "SHARE_OFFICE_ALL_OPINIONS",
    ShareReady = 58 => "SHARE_READY",
    ShareReadyAllOpinions = 59 => "SHARE_READY_ALL_OPINIONS",
    ViewSharedBallot = 60 => "VIEW_SHARED_BALLOT",
    ViewSharedBallotAllOpinions = 61 => "VIEW_SHARED_BALLOT_ALL_OPINIONS",
    ViewSharedCandidate = 62 => "VIEW_SHARED_CANDIDATE",
    ViewSharedCandidateAllOpinions = 63 => "VIEW_SHARED_CANDIDATE_ALL_OPINIONS",
    ViewSharedMeasure = 64 => "VIEW_SHARED_MEASURE",
    ViewSharedMeasureAllOpinions = 65 => "VIEW_SHARED_MEASURE_ALL_OPINIONS",
    ViewSharedOffice = 66 => "VIEW_SHARED_OFFICE",
    ViewSharedOfficeAllOpinions = 67 => "VIEW_SHARED_OFFICE_ALL_OPINIONS",
    ViewSharedReady = 68 => "VIEW_SHARED_READY",
    ViewSharedReadyAllOpinions = 69 => "VIEW_SHARED_READY_ALL_OPINIONS",
    SearchOpinions = 70 => "SEARCH_OPINIONS",
    UnsubscribeEmailPage = 71 => "UNSUBSCRIBE_EMAIL_PAGE",
    UnsubscribeSmsPage = 72 => "UNSUBSCRIBE_SMS_PAGE",
    Measure = 73 => "MEASURE",
    News = 74 => "NEWS",
    ShareOrganization = 75 => "SHARE_ORGANIZATION",
    ShareOrganizationAllOpinions = 76 => "SHARE_ORGANIZATION_ALL_OPINIONS",
    ViewSharedOrganization = 77 => "VIEW_SHARED_ORGANIZATION",
    ViewSharedOrganizationAllOpinions = 78 => "VIEW_SHARED_ORGANIZATION_ALL_OPINIONS",
}

/// Kinds that must carry both organization identifiers when recorded.
pub const ORGANIZATION_REQUIRED: [ActionKind; 6] = [
    ActionKind::OrganizationAutoFollow,
    ActionKind::OrganizationFollow,
    ActionKind::OrganizationFollowIgnore,
    ActionKind::OrganizationStopFollowing,
    ActionKind::OrganizationStopIgnoring,
    ActionKind::VoterGuideVisit,
];

/// First-touch kinds that make a voter an organization's entrant.
pub const ENTRY_KINDS: [ActionKind; 2] =
    [ActionKind::VoterGuideVisit, ActionKind::OrganizationAutoFollow];

pub const FOLLOW_KINDS: [ActionKind; 2] =
    [ActionKind::OrganizationFollow, ActionKind::OrganizationAutoFollow];

impl ActionKind {
    /// Exact, case-insensitive lookup by display name, with or without the
    /// `ACTION_` prefix.
    pub fn from_name(name: &str) -> Option<Self> {
        let upper = name.trim().to_ascii_uppercase();
        let bare = upper.strip_prefix("ACTION_").unwrap_or(&upper);
        Self::ALL.iter().copied().find(|kind| kind.name() == bare)
    }

    pub fn requires_organization(self) -> bool {
        ORGANIZATION_REQUIRED.contains(&self)
    }

    /// A visitor arriving through someone else's shared link.
    pub fn is_shared_link_view(self) -> bool {
        self.name().starts_with("VIEW_SHARED_")
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Display name for a raw code; unknown codes render as `ACTION_CONSTANT:<code>`.
pub fn display_action_name(code: u16) -> String {
    match ActionKind::from_code(code) {
        Some(kind) => kind.name().to_string(),
        None => format!("ACTION_CONSTANT:{code}"),
    }
}

/// One stored interaction event.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AnalyticsAction {
    pub id: i64,
    pub action_constant: u16,
    pub exact_time: String,
    pub date_as_integer: u32,
    pub voter_we_vote_id: Option<String>,
    pub voter_id: Option<i64>,
    pub is_signed_in: bool,
    pub state_code: Option<String>,
    pub organization_we_vote_id: Option<String>,
    pub organization_id: Option<i64>,
    pub ballot_item_we_vote_id: Option<String>,
    pub google_civic_election_id: Option<i64>,
    pub first_visit_today: bool,
    pub voter_device_id: Option<String>,
    pub user_agent: Option<String>,
    pub is_bot: bool,
    pub is_mobile: bool,
    pub is_desktop: bool,
    pub is_tablet: bool,
}

impl AnalyticsAction {
    pub fn action_name(&self) -> String {
        display_action_name(self.action_constant)
    }
}

/// Device classification derived from the request's user agent.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UserAgentFlags {
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub is_bot: bool,
    #[serde(default)]
    pub is_mobile: bool,
    #[serde(default)]
    pub is_desktop: bool,
    #[serde(default)]
    pub is_tablet: bool,
}

/// Inbound request to record one action.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordActionRequest {
    #[serde(default)]
    pub action_constant: u16,
    #[serde(default)]
    pub voter_we_vote_id: Option<String>,
    #[serde(default)]
    pub voter_id: Option<i64>,
    #[serde(default)]
    pub is_signed_in: bool,
    #[serde(default)]
    pub state_code: Option<String>,
    #[serde(default)]
    pub organization_we_vote_id: Option<String>,
    #[serde(default)]
    pub organization_id: Option<i64>,
    #[serde(default)]
    pub google_civic_election_id: Option<i64>,
    #[serde(default)]
    pub ballot_item_we_vote_id: Option<String>,
    #[serde(default)]
    pub voter_device_id: Option<String>,
    #[serde(default, flatten)]
    pub user_agent: UserAgentFlags,
    /// Overrides the reference-timezone day the action is filed under.
    #[serde(default)]
    pub date_as_integer: Option<u32>,
}

/// Result envelope of recording one action.
#[derive(Debug, Clone, Serialize)]
pub struct RecordOutcome {
    pub success: bool,
    pub status: String,
    pub action_saved: bool,
    pub action: Option<AnalyticsAction>,
}

#[derive(Debug, Deserialize)]
pub struct AttachVoterRequest {
    pub voter_device_id: String,
    pub voter_we_vote_id: String,
    #[serde(default)]
    pub voter_id: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_and_names_line_up() {
        assert_eq!(ActionKind::BallotVisit.code(), 6);
        assert_eq!(ActionKind::BallotVisit.name(), "BALLOT_VISIT");
        assert_eq!(ActionKind::from_code(7), Some(ActionKind::PositionTaken));
        assert_eq!(ActionKind::from_code(0), None);
        assert_eq!(ActionKind::ALL.len(), 78);
        for kind in ActionKind::ALL {
            assert_eq!(ActionKind::from_code(kind.code()), Some(*kind));
        }
    }

    #[test]
    fn test_from_name_requires_exact_match() {
        assert_eq!(ActionKind::from_name("ballot_visit"), Some(ActionKind::BallotVisit));
        assert_eq!(
            ActionKind::from_name("ACTION_VOTER_GUIDE_VISIT"),
            Some(ActionKind::VoterGuideVisit)
        );
        // Fragments of a longer name must not resolve.
        assert_eq!(ActionKind::from_name("VISIT"), None);
        assert_eq!(ActionKind::from_name("ORGANIZATION_FOLLOW_IGN"), None);
    }

    #[test]
    fn test_organization_required_set() {
        assert!(ActionKind::VoterGuideVisit.requires_organization());
        assert!(ActionKind::OrganizationStopIgnoring.requires_organization());
        assert!(!ActionKind::BallotVisit.requires_organization());
        assert!(!ActionKind::PositionTaken.requires_organization());
    }

    #[test]
    fn test_display_unknown_code() {
        assert_eq!(display_action_name(12), "WELCOME_VISIT");
        assert_eq!(display_action_name(999), "ACTION_CONSTANT:999");
    }

    #[test]
    fn test_shared_link_kinds() {
        assert!(ActionKind::ViewSharedBallot.is_shared_link_view());
        assert!(!ActionKind::ShareBallot.is_shared_link_view());
    }

    #[test]
    fn test_request_accepts_flat_user_agent_fields() {
        let req: RecordActionRequest = serde_json::from_str(
            r#"{"action_constant": 6, "voter_we_vote_id": "wv01voter1", "is_mobile": true}"#,
        )
        .unwrap();
        assert_eq!(req.action_constant, 6);
        assert!(req.user_agent.is_mobile);
        assert!(!req.user_agent.is_bot);
    }
}
