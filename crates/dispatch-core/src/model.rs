//! Domain types shared across the engine.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DispatchError;
use crate::geo::Coordinate;
use crate::util::EpochMs;

/// Agency identifier as supplied by the catalog.
pub type AgencyId = u64;

/// Kind of responder an agency (or team) provides.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum AgencyType {
    /// Fire brigade.
    Fire,
    /// Ambulance and hospital services.
    Medical,
    /// Police.
    Police,
    /// Flood rescue.
    Flood,
    /// General disaster response.
    Disaster,
}

impl AgencyType {
    /// All variants, in declaration order.
    pub const ALL: [AgencyType; 5] = [
        AgencyType::Fire,
        AgencyType::Medical,
        AgencyType::Police,
        AgencyType::Flood,
        AgencyType::Disaster,
    ];

    /// Lowercase wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            AgencyType::Fire => "fire",
            AgencyType::Medical => "medical",
            AgencyType::Police => "police",
            AgencyType::Flood => "flood",
            AgencyType::Disaster => "disaster",
        }
    }
}

impl fmt::Display for AgencyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgencyType {
    type Err = DispatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        AgencyType::ALL
            .into_iter()
            .find(|t| t.as_str() == wanted)
            .ok_or_else(|| DispatchError::InvalidAgencyType(s.to_string()))
    }
}

/// A responder organization with a home location.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Agency {
    /// Catalog id.
    pub id: AgencyId,
    /// Display name.
    pub name: String,
    /// Responder kind.
    #[serde(rename = "type")]
    pub agency_type: AgencyType,
    /// Home base.
    pub location: Coordinate,
    /// Headcount; 0 when the catalog omits it.
    #[serde(default)]
    pub staff_count: u32,
    /// Vehicles available; 0 when the catalog omits it.
    #[serde(default)]
    pub vehicle_count: u32,
    /// Free-form notes.
    #[serde(default)]
    pub description: String,
}

/// Participation state of a joined agency.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ParticipationStatus {
    /// Taking part in the current session.
    Active,
}

/// An agency that has joined the coordination session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JoinedAgency {
    /// Snapshot of the agency at join time.
    pub agency: Agency,
    /// When the join happened.
    pub joined_at_ms: EpochMs,
    /// Disaster the agency joined for.
    pub disaster_type: String,
    /// Where the disaster is, not where the agency is based.
    pub disaster_location: Coordinate,
    /// Participation state.
    pub status: ParticipationStatus,
}

/// Availability of a response team.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TeamStatus {
    /// Free to take an alert.
    #[default]
    Available,
    /// Holding an alert.
    Busy,
}

/// A named, typed dispatch unit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResponseTeam {
    /// Stable identity, e.g. `fireteam1`.
    pub id: String,
    /// Display name, e.g. `FireTeam 1`.
    pub name: String,
    /// Responder kind.
    #[serde(rename = "type")]
    pub team_type: AgencyType,
    /// Availability.
    pub status: TeamStatus,
}

/// Lifecycle state of an alert.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    /// Reported, no team yet.
    Active,
    /// A team is working it.
    Assigned,
    /// Closed; terminal.
    Resolved,
}

impl AlertStatus {
    /// Lowercase wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertStatus::Active => "active",
            AlertStatus::Assigned => "assigned",
            AlertStatus::Resolved => "resolved",
        }
    }
}

impl fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A recorded emergency report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Alert {
    /// `alert-<n>`.
    pub id: String,
    /// Human-readable location name, as reported.
    pub location: String,
    /// Emergency type as reported, e.g. `fire`.
    #[serde(rename = "type")]
    pub alert_type: String,
    /// Operator-facing summary.
    pub details: String,
    /// When the alert was recorded.
    pub created_at_ms: EpochMs,
    /// Lifecycle state.
    pub status: AlertStatus,
    /// Team id; set iff `status == Assigned`.
    pub assigned_team: Option<String>,
}

/// Lifecycle state of a coordination session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Accepting participants.
    Active,
    /// Closed; kept in history.
    Ended,
}

/// A time-bounded grouping of agencies working one disaster.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CoordinationSession {
    /// `coord-<epoch ms>`.
    pub id: String,
    /// Disaster being coordinated.
    pub disaster_type: String,
    /// Disaster location.
    pub location: Coordinate,
    /// When the session opened.
    pub start_time_ms: EpochMs,
    /// Set once the session ends.
    pub end_time_ms: Option<EpochMs>,
    /// Participants in join order; never contains duplicates.
    pub agency_ids: Vec<AgencyId>,
    /// Lifecycle state.
    pub status: SessionStatus,
}

/// Operator availability.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    /// Taking work.
    #[default]
    Available,
    /// At the console but occupied.
    Busy,
    /// Away.
    Offline,
}

impl UserStatus {
    /// Lowercase wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Available => "available",
            UserStatus::Busy => "busy",
            UserStatus::Offline => "offline",
        }
    }
}

impl FromStr for UserStatus {
    type Err = DispatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "available" => Ok(UserStatus::Available),
            "busy" => Ok(UserStatus::Busy),
            "offline" => Ok(UserStatus::Offline),
            _ => Err(DispatchError::InvalidStatus(format!(
                "'{s}' (use: available, busy, or offline)"
            ))),
        }
    }
}

/// An agency paired with its distance from a query origin.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NearbyAgency {
    /// The agency.
    pub agency: Agency,
    /// Great-circle distance from the origin.
    pub distance_km: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agency_type_parses_case_insensitively() {
        assert_eq!("FIRE".parse::<AgencyType>().unwrap(), AgencyType::Fire);
        assert_eq!(" flood ".parse::<AgencyType>().unwrap(), AgencyType::Flood);
        assert!("chemical".parse::<AgencyType>().is_err());
    }

    #[test]
    fn agency_serde_uses_type_key() {
        let json = r#"{
            "id": 1,
            "name": "Delhi Fire Brigade",
            "type": "fire",
            "location": { "lat": 28.7041, "lng": 77.1025 }
        }"#;
        let agency: Agency = serde_json::from_str(json).unwrap();
        assert_eq!(agency.agency_type, AgencyType::Fire);
        assert_eq!(agency.location.latitude, 28.7041);
        assert_eq!(agency.staff_count, 0);

        let out = serde_json::to_value(&agency).unwrap();
        assert_eq!(out["type"], "fire");
    }

    #[test]
    fn user_status_closed_set() {
        assert_eq!("Busy".parse::<UserStatus>().unwrap(), UserStatus::Busy);
        assert_eq!("OFFLINE".parse::<UserStatus>().unwrap(), UserStatus::Offline);
        let err = "sleeping".parse::<UserStatus>().unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::InvalidStatus);
    }

    #[test]
    fn alert_status_serde() {
        let s = serde_json::to_string(&AlertStatus::Assigned).unwrap();
        assert_eq!(s, r#""assigned""#);
    }
}
