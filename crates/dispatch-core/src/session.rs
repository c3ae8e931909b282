//! Multi-agency coordination session lifecycle.
//!
//! At most one session is active. It starts lazily on the first join and
//! ends either explicitly or when its last participant leaves.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{DispatchError, Result};
use crate::geo::Coordinate;
use crate::model::{
    Agency, AgencyId, CoordinationSession, JoinedAgency, ParticipationStatus, SessionStatus,
};
use crate::util::{now_ms, EpochMs};

/// Join parameters. Every field is required; absent ones yield
/// [`DispatchError::MissingArgument`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JoinRequest {
    /// Agency to join.
    pub agency: Option<Agency>,
    /// Disaster the session is about.
    pub disaster_type: Option<String>,
    /// Where the agency is working.
    pub location: Option<Coordinate>,
}

impl JoinRequest {
    /// A request with every field present.
    pub fn new(agency: Agency, disaster_type: impl Into<String>, location: Coordinate) -> Self {
        Self {
            agency: Some(agency),
            disaster_type: Some(disaster_type.into()),
            location: Some(location),
        }
    }
}

/// Outcome of a join attempt that passed argument validation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum JoinOutcome {
    /// The agency is now a participant.
    Joined {
        /// Session the agency is now part of.
        session_id: String,
        /// True when this join started the session.
        started_session: bool,
        /// Confirmation for the operator.
        message: String,
    },
    /// The agency was already a participant; nothing changed.
    AlreadyJoined {
        /// The active session.
        session_id: String,
        /// Explanation for the operator.
        message: String,
    },
}

impl JoinOutcome {
    /// True for [`JoinOutcome::Joined`].
    pub fn is_joined(&self) -> bool {
        matches!(self, JoinOutcome::Joined { .. })
    }

    /// Operator-facing message of either outcome.
    pub fn message(&self) -> &str {
        match self {
            JoinOutcome::Joined { message, .. } | JoinOutcome::AlreadyJoined { message, .. } => {
                message
            }
        }
    }
}

/// Sole owner of session and joined-agency state.
#[derive(Debug, Default)]
pub struct CoordinationManager {
    joined: Vec<JoinedAgency>,
    current: Option<CoordinationSession>,
    history: Vec<CoordinationSession>,
    last_session_ms: EpochMs,
}

impl CoordinationManager {
    /// Manager with no session and empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an agency to the active session, starting one if needed.
    pub fn join(&mut self, req: JoinRequest) -> Result<JoinOutcome> {
        let agency = req.agency.ok_or(DispatchError::MissingArgument("agency"))?;
        let disaster_type = req
            .disaster_type
            .filter(|d| !d.trim().is_empty())
            .ok_or(DispatchError::MissingArgument("disaster_type"))?;
        let location = req
            .location
            .ok_or(DispatchError::MissingArgument("location"))?;

        if self.is_participant(agency.id) {
            let session_id = self
                .current
                .as_ref()
                .map(|s| s.id.clone())
                .unwrap_or_default();
            warn!(agency_id = agency.id, %session_id, "agency already joined");
            return Ok(JoinOutcome::AlreadyJoined {
                session_id,
                message: format!("Already coordinating with {}", agency.name),
            });
        }

        let now = now_ms();
        let started_session = self.current.is_none();
        let mut session = match self.current.take() {
            Some(session) => session,
            None => {
                let id = self.next_session_id(now);
                info!(session_id = %id, %disaster_type, "coordination session started");
                CoordinationSession {
                    id,
                    disaster_type: disaster_type.clone(),
                    location,
                    start_time_ms: now,
                    end_time_ms: None,
                    agency_ids: Vec::new(),
                    status: SessionStatus::Active,
                }
            }
        };

        let message = format!("Now coordinating with {}", agency.name);
        let agency_id = agency.id;
        self.joined.push(JoinedAgency {
            agency,
            joined_at_ms: now,
            disaster_type,
            disaster_location: location,
            status: ParticipationStatus::Active,
        });
        session.agency_ids.push(agency_id);
        let session_id = session.id.clone();
        self.current = Some(session);
        info!(agency_id, %session_id, "agency joined");

        Ok(JoinOutcome::Joined {
            session_id,
            started_session,
            message,
        })
    }

    /// Removes a participant. Ends the session when it becomes empty.
    ///
    /// Returns false when the agency was not participating.
    pub fn leave(&mut self, agency_id: AgencyId) -> bool {
        let Some(pos) = self.joined.iter().position(|j| j.agency.id == agency_id) else {
            return false;
        };
        self.joined.remove(pos);

        let now_empty = match self.current.as_mut() {
            Some(session) => {
                session.agency_ids.retain(|id| *id != agency_id);
                info!(agency_id, session_id = %session.id, "agency left");
                session.agency_ids.is_empty()
            }
            None => false,
        };
        if now_empty {
            self.end();
        }
        true
    }

    /// Ends the active session. Returns false when none is active.
    pub fn end(&mut self) -> bool {
        let Some(mut session) = self.current.take() else {
            return false;
        };
        session.status = SessionStatus::Ended;
        session.end_time_ms = Some(now_ms());
        session.agency_ids.clear();
        self.joined.clear();
        info!(session_id = %session.id, "coordination session ended");
        self.history.push(session);
        true
    }

    /// The active session, if any.
    pub fn current(&self) -> Option<&CoordinationSession> {
        self.current.as_ref()
    }

    /// Participants of the active session in join order.
    pub fn joined(&self) -> &[JoinedAgency] {
        &self.joined
    }

    /// Ended sessions, oldest first.
    pub fn history(&self) -> &[CoordinationSession] {
        &self.history
    }

    /// True if the agency is in the active session.
    pub fn is_participant(&self, agency_id: AgencyId) -> bool {
        self.joined.iter().any(|j| j.agency.id == agency_id)
    }

    /// `coord-<ms>`; bumped past the previous session's stamp so two
    /// sessions started within one millisecond still get distinct ids.
    fn next_session_id(&mut self, now: EpochMs) -> String {
        let stamp = now.max(self.last_session_ms + 1);
        self.last_session_ms = stamp;
        format!("coord-{stamp}")
    }
}
