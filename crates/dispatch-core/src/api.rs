//! Request and response bodies shared by the daemon and its CLI client.

use serde::{Deserialize, Serialize};

use crate::geo::Coordinate;
use crate::model::{
    AgencyId, AgencyType, AlertStatus, CoordinationSession, JoinedAgency, TeamStatus, UserStatus,
};

/// Report an emergency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportRequest {
    /// Disaster or service keyword, e.g. `fire`, `flood`.
    pub emergency_type: String,
    /// Responder type to look for; derived from `emergency_type` when absent.
    #[serde(default)]
    pub response_type: Option<String>,
    /// Place name, resolved by the location resolver.
    pub location: String,
    /// True when a specific service was requested.
    #[serde(default)]
    pub is_service_request: bool,
}

/// Alert listing filter. Both fields combine with AND.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlertQuery {
    /// Only alerts in this state.
    #[serde(default)]
    pub status: Option<AlertStatus>,
    /// Only alerts at this location, ignoring case.
    #[serde(default)]
    pub location: Option<String>,
}

/// Assign a team to the alert named in the path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignRequest {
    /// Team name or id.
    pub team: String,
}

/// Add or replace a roster entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterTeamRequest {
    /// Display name.
    pub name: String,
    /// Responder type.
    #[serde(rename = "type")]
    pub team_type: AgencyType,
    /// Initial status, `available` by default.
    #[serde(default)]
    pub status: TeamStatus,
}

/// Change the operator's availability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserStatusRequest {
    /// `available`, `busy` or `offline`, any case.
    pub status: String,
}

/// The operator's availability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserStatusResponse {
    /// Current status.
    pub status: UserStatus,
    /// Human-readable confirmation.
    pub message: String,
}

/// Join an agency from the catalog into the coordination session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinAgencyRequest {
    /// Catalog id.
    pub agency_id: AgencyId,
    /// Disaster the session is about.
    pub disaster_type: String,
    /// Where the agency will work.
    pub location: Coordinate,
}

/// Join the closest agencies around a named place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinateRequest {
    /// Place name.
    pub location: String,
    /// Defaults to `coordination`.
    #[serde(default = "default_coordination_type")]
    pub disaster_type: String,
}

fn default_coordination_type() -> String {
    "coordination".to_string()
}

/// The active session, if any, with its participants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentSessionResponse {
    /// `None` when no session is active.
    pub session: Option<CoordinationSession>,
    /// Participants in join order.
    pub joined: Vec<JoinedAgency>,
}

/// Remove one agency from the session named in the path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaveRequest {
    /// Catalog id of the leaving agency.
    pub agency_id: AgencyId,
}

/// Nearby agency query. `radius` is in kilometres.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NearbyQuery {
    /// Origin latitude.
    pub lat: f64,
    /// Origin longitude.
    pub lng: f64,
    /// Restrict to one agency type.
    #[serde(default, rename = "type")]
    pub agency_type: Option<AgencyType>,
    /// Search radius; the configured default when absent.
    #[serde(default)]
    pub radius: Option<f64>,
}

/// Result of a catalog reload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReloadResponse {
    /// Agencies now in the registry.
    pub agencies: usize,
}

/// Free-text operator command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandRequest {
    /// The phrase, e.g. `fire in Mumbai`.
    pub text: String,
}

/// Generic acknowledgement.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OkResponse {
    /// False when the request was declined.
    pub ok: bool,
    /// Machine-readable decline reason.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Operator-facing text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl OkResponse {
    /// Success with a message.
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            reason: None,
            message: Some(message.into()),
        }
    }

    /// Declined with a reason code and a message.
    pub fn declined(reason: &str, message: impl Into<String>) -> Self {
        Self {
            ok: false,
            reason: Some(reason.to_string()),
            message: Some(message.into()),
        }
    }
}
