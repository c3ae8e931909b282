//! Typed failures returned by the dispatch engine.
//!
//! Every variant is an expected, recoverable outcome; callers render the
//! message. Only `CatalogInvalid` indicates bad input data, and it surfaces
//! at load time.

use thiserror::Error;

/// Result alias for engine operations.
pub type Result<T> = std::result::Result<T, DispatchError>;

/// Engine failure.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DispatchError {
    /// No agency with this id or name.
    #[error("agency not found: {0}")]
    AgencyNotFound(String),
    /// No team with this name or id.
    #[error("team not found: {0}")]
    TeamNotFound(String),
    /// No alert with this id.
    #[error("alert not found: {0}")]
    AlertNotFound(String),
    /// The id is not the active session.
    #[error("session not found: {0}")]
    SessionNotFound(String),
    /// Status string outside the closed set.
    #[error("invalid status: {0}")]
    InvalidStatus(String),
    /// Agency type string outside the five known types.
    #[error("unknown agency type: {0}")]
    InvalidAgencyType(String),
    /// The team is busy with another alert.
    #[error("team {0} is not available")]
    TeamUnavailable(String),
    /// A required argument was absent or blank.
    #[error("missing argument: {0}")]
    MissingArgument(&'static str),
    /// The location resolver did not know the place.
    #[error("could not find location: {0}")]
    UnknownLocation(String),
    /// The renderer declined, failed or timed out. The alert stays in the
    /// ledger.
    #[error("failed to place map marker for {alert_id}: {reason}")]
    MarkerPlacementFailed {
        /// The alert that was created.
        alert_id: String,
        /// What the renderer reported.
        reason: String,
    },
    /// The notifier failed after the alert was created and marked.
    #[error("notifying agencies for {alert_id} failed: {cause}")]
    NotificationFailed {
        /// The alert that was created.
        alert_id: String,
        /// The notifier's error; decides [`DispatchError::kind`].
        #[source]
        cause: Box<DispatchError>,
    },
    /// An alert action not allowed from the alert's current state.
    #[error("alert {alert_id} cannot {action} while {from}")]
    InvalidTransition {
        /// The alert acted on.
        alert_id: String,
        /// Its current state.
        from: &'static str,
        /// The refused action.
        action: &'static str,
    },
    /// Free text that maps to no command.
    #[error("command not understood: {0}")]
    UnrecognizedCommand(String),
    /// Catalog data rejected at load time.
    #[error("invalid catalog: {0}")]
    CatalogInvalid(String),
    /// A collaborator call exceeded its time bound.
    #[error("{collaborator} timed out after {timeout_ms}ms")]
    CollaboratorTimeout {
        /// Which collaborator.
        collaborator: &'static str,
        /// The bound that was exceeded.
        timeout_ms: u64,
    },
    /// A collaborator reported an error.
    #[error("{collaborator} failed: {message}")]
    CollaboratorFailed {
        /// Which collaborator.
        collaborator: &'static str,
        /// Its error text.
        message: String,
    },
}

/// Flat classification of [`DispatchError`], used for transport mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Unknown agency, team, alert or session.
    NotFound,
    /// Bad status string.
    InvalidStatus,
    /// Malformed argument such as an agency type or a command.
    InvalidArgument,
    /// Team already busy.
    TeamUnavailable,
    /// Required argument absent.
    MissingArgument,
    /// Location could not be resolved.
    UnknownLocation,
    /// Marker could not be placed.
    MarkerPlacementFailed,
    /// Alert state forbids the action.
    InvalidTransition,
    /// Catalog rejected.
    CatalogInvalid,
    /// Collaborator too slow.
    CollaboratorTimeout,
    /// Collaborator error.
    CollaboratorFailed,
}

impl DispatchError {
    /// Classifies this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DispatchError::AgencyNotFound(_)
            | DispatchError::TeamNotFound(_)
            | DispatchError::AlertNotFound(_)
            | DispatchError::SessionNotFound(_) => ErrorKind::NotFound,
            DispatchError::InvalidStatus(_) => ErrorKind::InvalidStatus,
            DispatchError::InvalidAgencyType(_) | DispatchError::UnrecognizedCommand(_) => {
                ErrorKind::InvalidArgument
            }
            DispatchError::TeamUnavailable(_) => ErrorKind::TeamUnavailable,
            DispatchError::MissingArgument(_) => ErrorKind::MissingArgument,
            DispatchError::UnknownLocation(_) => ErrorKind::UnknownLocation,
            DispatchError::MarkerPlacementFailed { .. } => ErrorKind::MarkerPlacementFailed,
            DispatchError::InvalidTransition { .. } => ErrorKind::InvalidTransition,
            DispatchError::CatalogInvalid(_) => ErrorKind::CatalogInvalid,
            DispatchError::CollaboratorTimeout { .. } => ErrorKind::CollaboratorTimeout,
            DispatchError::CollaboratorFailed { .. } => ErrorKind::CollaboratorFailed,
            DispatchError::NotificationFailed { cause, .. } => cause.kind(),
        }
    }

    /// The alert a failure refers to, when one exists.
    pub fn alert_id(&self) -> Option<&str> {
        match self {
            DispatchError::MarkerPlacementFailed { alert_id, .. }
            | DispatchError::NotificationFailed { alert_id, .. }
            | DispatchError::InvalidTransition { alert_id, .. } => Some(alert_id),
            _ => None,
        }
    }

    /// Stable snake_case code for wire responses.
    pub fn code(&self) -> &'static str {
        match self.kind() {
            ErrorKind::NotFound => "not_found",
            ErrorKind::InvalidStatus => "invalid_status",
            ErrorKind::InvalidArgument => "invalid_argument",
            ErrorKind::TeamUnavailable => "team_unavailable",
            ErrorKind::MissingArgument => "missing_argument",
            ErrorKind::UnknownLocation => "unknown_location",
            ErrorKind::MarkerPlacementFailed => "marker_placement_failed",
            ErrorKind::InvalidTransition => "invalid_transition",
            ErrorKind::CatalogInvalid => "catalog_invalid",
            ErrorKind::CollaboratorTimeout => "collaborator_timeout",
            ErrorKind::CollaboratorFailed => "collaborator_failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notification_failure_keeps_cause_kind() {
        let err = DispatchError::NotificationFailed {
            alert_id: "alert-4".into(),
            cause: Box::new(DispatchError::CollaboratorTimeout {
                collaborator: "notifier",
                timeout_ms: 20,
            }),
        };
        assert_eq!(err.kind(), ErrorKind::CollaboratorTimeout);
        assert_eq!(err.code(), "collaborator_timeout");
        assert_eq!(err.alert_id(), Some("alert-4"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn alert_id_only_on_alert_scoped_errors() {
        assert_eq!(DispatchError::AlertNotFound("alert-1".into()).alert_id(), None);
        let err = DispatchError::MarkerPlacementFailed {
            alert_id: "alert-1".into(),
            reason: "declined".into(),
        };
        assert_eq!(err.alert_id(), Some("alert-1"));
        assert_eq!(err.to_string(), "failed to place map marker for alert-1: declined");
    }
}
