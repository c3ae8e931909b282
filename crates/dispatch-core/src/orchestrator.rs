//! The dispatch façade.
//!
//! [`Dispatcher`] composes the registry, ledger and session manager with
//! the external collaborators. Each entity group sits behind its own lock;
//! every ledger or session operation takes exactly one lock acquisition so
//! check-then-act sequences stay atomic. Collaborator calls run with no
//! engine lock held and are bounded by [`DispatchConfig::collaborator_timeout`].

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::api::{AlertQuery, ReportRequest};
use crate::catalog::{builtin_catalog, response_type_for_disaster};
use crate::collaborators::{
    CatalogSource, LocationResolver, LogNotifier, MapRenderer, Marker, MarkerBoard,
    NotificationRequest, Notifier, StaticCatalog,
};
use crate::command::{interpret, Command, CommandReply};
use crate::error::{DispatchError, Result};
use crate::gazetteer::Gazetteer;
use crate::geo::Coordinate;
use crate::ledger::{AlertLedger, Assignment};
use crate::model::{
    Agency, AgencyId, AgencyType, Alert, CoordinationSession, JoinedAgency, NearbyAgency,
    ResponseTeam, TeamStatus, UserStatus,
};
use crate::registry::{AgencyRegistry, DEFAULT_MAX_DISTANCE_KM};
use crate::session::{CoordinationManager, JoinOutcome, JoinRequest};

/// Search radius used when joining agencies around a place.
pub const COORDINATION_RADIUS_KM: f64 = 30.0;

/// How many of the closest agencies a nearby coordination joins.
pub const MAX_COORDINATION_JOINS: usize = 3;

/// Disaster type recorded for joins made without a specific disaster.
pub const COORDINATION_DISASTER_TYPE: &str = "coordination";

/// Tunables for a [`Dispatcher`].
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Upper bound on any single collaborator call.
    pub collaborator_timeout: Duration,
    /// Radius used by [`Dispatcher::report_emergency`].
    pub default_radius_km: f64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            collaborator_timeout: Duration::from_millis(5_000),
            default_radius_km: DEFAULT_MAX_DISTANCE_KM,
        }
    }
}

/// The external services a dispatcher talks to.
#[derive(Clone)]
pub struct Collaborators {
    /// Turns place names into coordinates.
    pub resolver: Arc<dyn LocationResolver>,
    /// Places alert markers on the map.
    pub renderer: Arc<dyn MapRenderer>,
    /// Delivers alerts to agencies.
    pub notifier: Arc<dyn Notifier>,
    /// Supplies the agency catalog on reload.
    pub catalog: Arc<dyn CatalogSource>,
}

impl Collaborators {
    /// Gazetteer, in-memory marker board, log notifier and the built-in
    /// agency catalog.
    pub fn builtin() -> Self {
        Self {
            resolver: Arc::new(Gazetteer::new()),
            renderer: Arc::new(MarkerBoard::new()),
            notifier: Arc::new(LogNotifier),
            catalog: Arc::new(StaticCatalog::new(builtin_catalog())),
        }
    }

    /// Replaces the location resolver.
    pub fn with_resolver(mut self, resolver: Arc<dyn LocationResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    /// Replaces the map renderer.
    pub fn with_renderer(mut self, renderer: Arc<dyn MapRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    /// Replaces the notifier.
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Replaces the catalog source.
    pub fn with_catalog(mut self, catalog: Arc<dyn CatalogSource>) -> Self {
        self.catalog = catalog;
        self
    }
}

/// An emergency as reported by an operator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EmergencyReport {
    /// What happened, e.g. `fire` or `flood`.
    pub emergency_type: String,
    /// Responder type to search for. Blank means "derive from
    /// `emergency_type`".
    pub response_type: String,
    /// Place name, resolved through the location resolver.
    pub location_name: String,
    /// Non-urgent request rather than an emergency.
    pub is_service_request: bool,
}

impl EmergencyReport {
    /// An urgent report; see [`service_request`](Self::service_request).
    pub fn new(
        emergency_type: impl Into<String>,
        response_type: impl Into<String>,
        location_name: impl Into<String>,
    ) -> Self {
        Self {
            emergency_type: emergency_type.into(),
            response_type: response_type.into(),
            location_name: location_name.into(),
            is_service_request: false,
        }
    }

    /// Marks the report as a non-urgent service request.
    pub fn service_request(mut self, is_service_request: bool) -> Self {
        self.is_service_request = is_service_request;
        self
    }
}

impl From<ReportRequest> for EmergencyReport {
    fn from(req: ReportRequest) -> Self {
        Self {
            emergency_type: req.emergency_type,
            response_type: req.response_type.unwrap_or_default(),
            location_name: req.location,
            is_service_request: req.is_service_request,
        }
    }
}

/// Result of a successful [`Dispatcher::report_emergency`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DispatchOutcome {
    /// The recorded alert.
    pub alert: Alert,
    /// Length of `notified`.
    pub agencies_notified: usize,
    /// Agencies the notifier reported as reached.
    pub notified: Vec<Agency>,
    /// Operator-facing summary.
    pub message: String,
}

/// Result of [`Dispatcher::coordinate_nearby`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CoordinationOutcome {
    /// Resolved coordinates of the requested place.
    pub location: Coordinate,
    /// Active session after the joins, if any.
    pub session_id: Option<String>,
    /// Agencies that joined in this call.
    pub joined: Vec<Agency>,
    /// Candidates that were already participating.
    pub already_joined: Vec<Agency>,
    /// Operator-facing summary.
    pub message: String,
}

/// Shared dispatch engine. Cheap to wrap in an `Arc` and share between
/// request handlers.
pub struct Dispatcher {
    config: DispatchConfig,
    registry: RwLock<AgencyRegistry>,
    ledger: Mutex<AlertLedger>,
    sessions: Mutex<CoordinationManager>,
    collaborators: Collaborators,
}

impl Dispatcher {
    /// Dispatcher with an empty catalog and the default team roster. Call
    /// [`reload_catalog`](Self::reload_catalog) to populate agencies.
    pub fn new(config: DispatchConfig, collaborators: Collaborators) -> Self {
        Self {
            config,
            registry: RwLock::new(AgencyRegistry::new()),
            ledger: Mutex::new(AlertLedger::with_default_roster()),
            sessions: Mutex::new(CoordinationManager::new()),
            collaborators,
        }
    }

    /// Replaces the ledger (and with it the team roster).
    pub fn with_ledger(self, ledger: AlertLedger) -> Self {
        Self {
            ledger: Mutex::new(ledger),
            ..self
        }
    }

    /// Active configuration.
    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    // -----------------------------------------------------------------------
    // Catalog
    // -----------------------------------------------------------------------

    /// Pulls a fresh catalog from the catalog source and swaps it in.
    pub async fn reload_catalog(&self) -> Result<usize> {
        let agencies = self
            .bounded("catalog source", self.collaborators.catalog.load())
            .await?;
        self.load_catalog(agencies).await
    }

    /// Swaps in the given catalog. The previous one stays on error.
    pub async fn load_catalog(&self, agencies: Vec<Agency>) -> Result<usize> {
        let mut registry = self.registry.write().await;
        registry.load(agencies)?;
        Ok(registry.len())
    }

    /// Every catalog agency, in catalog order.
    pub async fn agencies(&self) -> Vec<Agency> {
        self.registry.read().await.agencies().to_vec()
    }

    /// Looks up one agency by id.
    pub async fn get_agency(&self, id: AgencyId) -> Result<Agency> {
        self.registry.read().await.get(id).cloned()
    }

    /// Nearest agencies to `origin`; `radius_km` defaults to the configured
    /// radius.
    pub async fn find_nearby(
        &self,
        origin: Coordinate,
        agency_type: Option<AgencyType>,
        radius_km: Option<f64>,
    ) -> Vec<NearbyAgency> {
        let radius = radius_km.unwrap_or(self.config.default_radius_km);
        self.registry
            .read()
            .await
            .find_nearby(origin, agency_type, radius)
    }

    // -----------------------------------------------------------------------
    // Emergency reporting
    // -----------------------------------------------------------------------

    /// Resolves the location, records an alert, places its marker and
    /// notifies nearby agencies of the requested type.
    ///
    /// Failures after the alert is created leave the alert in the ledger
    /// with status `active` and carry its id: any renderer failure is
    /// `MarkerPlacementFailed`, a notifier failure is `NotificationFailed`.
    pub async fn report_emergency(&self, report: EmergencyReport) -> Result<DispatchOutcome> {
        let emergency_type = report.emergency_type.trim().to_lowercase();
        if emergency_type.is_empty() {
            return Err(DispatchError::MissingArgument("emergency_type"));
        }
        let location_name = report.location_name.trim();
        if location_name.is_empty() {
            return Err(DispatchError::MissingArgument("location"));
        }
        let response_type = match report.response_type.trim() {
            "" => response_type_for_disaster(&emergency_type).to_string(),
            given => given.to_lowercase(),
        };

        let coordinate = self.resolve(location_name).await?;

        let details = format!(
            "{} emergency in {}",
            emergency_type.to_uppercase(),
            location_name
        );
        let alert = self
            .ledger
            .lock()
            .await
            .create_alert(location_name, &emergency_type, &details);
        let alert_id = alert.id.clone();

        let marker = Marker {
            alert_id: alert_id.clone(),
            coordinate,
            marker_type: emergency_type.clone(),
            label: report
                .is_service_request
                .then(|| format!("{} SERVICE NEEDED", response_type.to_uppercase())),
        };
        let reason = match self
            .bounded("map renderer", self.collaborators.renderer.place_marker(&marker))
            .await
        {
            Ok(true) => None,
            Ok(false) => Some("renderer declined the marker".to_string()),
            Err(e) => Some(e.to_string()),
        };
        if let Some(reason) = reason {
            warn!(%alert_id, %reason, "dispatch aborted after alert creation");
            return Err(DispatchError::MarkerPlacementFailed { alert_id, reason });
        }

        let candidates = match response_type.parse::<AgencyType>() {
            Ok(agency_type) => {
                self.find_nearby(coordinate, Some(agency_type), None)
                    .await
            }
            Err(_) => {
                debug!(%response_type, "no agency type serves this response type");
                Vec::new()
            }
        };

        let request = NotificationRequest {
            alert_id: alert_id.clone(),
            coordinate,
            emergency_type,
            location_name: location_name.to_string(),
            is_service_request: report.is_service_request,
            response_type,
            candidates,
        };
        let notified = match self
            .bounded("notifier", self.collaborators.notifier.notify(&request))
            .await
        {
            Ok(notified) => notified,
            Err(cause) => {
                warn!(%alert_id, error = %cause, "dispatch aborted after alert creation");
                return Err(DispatchError::NotificationFailed {
                    alert_id,
                    cause: Box::new(cause),
                });
            }
        };

        let agencies_notified = notified.len();
        info!(%alert_id, agencies_notified, location = %location_name, "emergency dispatched");
        Ok(DispatchOutcome {
            alert,
            agencies_notified,
            notified,
            message: format!("{agencies_notified} agencies notified"),
        })
    }

    // -----------------------------------------------------------------------
    // Alerts and teams
    // -----------------------------------------------------------------------

    /// Assigns a team to an active alert; fails if the team is busy.
    pub async fn assign_team(&self, team_name: &str, alert_id: &str) -> Result<Assignment> {
        self.ledger.lock().await.assign_team(team_name, alert_id)
    }

    /// Returns an assigned alert to active and frees its team.
    pub async fn unassign(&self, alert_id: &str) -> Result<Alert> {
        self.ledger.lock().await.unassign(alert_id)
    }

    /// Closes an alert and frees its team.
    pub async fn resolve_alert(&self, alert_id: &str) -> Result<Alert> {
        self.ledger.lock().await.resolve(alert_id)
    }

    /// Looks up one alert by id.
    pub async fn get_alert(&self, alert_id: &str) -> Result<Alert> {
        self.ledger.lock().await.get_alert(alert_id).cloned()
    }

    /// Alerts in creation order, filtered by `query`.
    pub async fn alerts(&self, query: &AlertQuery) -> Vec<Alert> {
        let ledger = self.ledger.lock().await;
        let location = query.location.as_deref().map(|l| l.trim().to_lowercase());
        ledger
            .alerts()
            .iter()
            .filter(|a| query.status.map_or(true, |s| a.status == s))
            .filter(|a| {
                location
                    .as_deref()
                    .map_or(true, |l| a.location.to_lowercase() == l)
            })
            .cloned()
            .collect()
    }

    /// Alerts still waiting for a team.
    pub async fn active_alerts(&self) -> Vec<Alert> {
        self.ledger.lock().await.active_alerts()
    }

    /// Alerts reported at `location`, any status.
    pub async fn alerts_at(&self, location: &str) -> Vec<Alert> {
        self.ledger.lock().await.alerts_at(location)
    }

    /// Adds or replaces a roster entry.
    pub async fn register_team(
        &self,
        name: &str,
        team_type: AgencyType,
        status: TeamStatus,
    ) -> Result<ResponseTeam> {
        self.ledger
            .lock()
            .await
            .register_team(name, team_type, status)
    }

    /// The roster, sorted by id.
    pub async fn teams(&self) -> Vec<ResponseTeam> {
        self.ledger.lock().await.teams()
    }

    /// Parses and stores the operator status.
    pub async fn set_user_status(&self, status: &str) -> Result<UserStatus> {
        self.ledger.lock().await.set_user_status(status)
    }

    /// Current operator status.
    pub async fn user_status(&self) -> UserStatus {
        self.ledger.lock().await.user_status()
    }

    // -----------------------------------------------------------------------
    // Coordination sessions
    // -----------------------------------------------------------------------

    /// Runs one join request against the active session.
    pub async fn join(&self, req: JoinRequest) -> Result<JoinOutcome> {
        self.sessions.lock().await.join(req)
    }

    /// Joins a catalog agency by id.
    pub async fn join_agency(
        &self,
        agency_id: AgencyId,
        disaster_type: &str,
        location: Coordinate,
    ) -> Result<JoinOutcome> {
        let agency = self.get_agency(agency_id).await?;
        self.join(JoinRequest::new(agency, disaster_type, location))
            .await
    }

    /// Resolves `location_name` and joins up to [`MAX_COORDINATION_JOINS`]
    /// of the closest agencies of any type within
    /// [`COORDINATION_RADIUS_KM`].
    pub async fn coordinate_nearby(
        &self,
        location_name: &str,
        disaster_type: &str,
    ) -> Result<CoordinationOutcome> {
        let location_name = location_name.trim();
        if location_name.is_empty() {
            return Err(DispatchError::MissingArgument("location"));
        }
        let location = self.resolve(location_name).await?;
        let nearby = self
            .find_nearby(location, None, Some(COORDINATION_RADIUS_KM))
            .await;

        let mut joined = Vec::new();
        let mut already_joined = Vec::new();
        let mut sessions = self.sessions.lock().await;
        for candidate in nearby.iter().take(MAX_COORDINATION_JOINS) {
            let req = JoinRequest::new(candidate.agency.clone(), disaster_type, location);
            match sessions.join(req)? {
                JoinOutcome::Joined { .. } => joined.push(candidate.agency.clone()),
                JoinOutcome::AlreadyJoined { .. } => {
                    already_joined.push(candidate.agency.clone())
                }
            }
        }
        let session_id = sessions.current().map(|s| s.id.clone());
        drop(sessions);

        let message = if nearby.is_empty() {
            format!("No agencies found near {location_name}")
        } else if joined.is_empty() {
            "Could not connect with any agencies".to_string()
        } else {
            format!(
                "Connected with {} agencies near {location_name}",
                joined.len()
            )
        };
        info!(
            location = %location_name,
            joined = joined.len(),
            already_joined = already_joined.len(),
            "nearby coordination"
        );
        Ok(CoordinationOutcome {
            location,
            session_id,
            joined,
            already_joined,
            message,
        })
    }

    /// Removes an agency from the active session.
    pub async fn leave(&self, agency_id: AgencyId) -> bool {
        self.sessions.lock().await.leave(agency_id)
    }

    /// Like [`leave`](Self::leave), but only if `session_id` names the
    /// active session.
    pub async fn leave_session(&self, session_id: &str, agency_id: AgencyId) -> Result<bool> {
        let mut sessions = self.sessions.lock().await;
        ensure_current(&sessions, session_id)?;
        Ok(sessions.leave(agency_id))
    }

    /// Ends the active session, if any.
    pub async fn end_current(&self) -> bool {
        self.sessions.lock().await.end()
    }

    /// Ends the named session and returns its final record.
    pub async fn end_session(&self, session_id: &str) -> Result<CoordinationSession> {
        let mut sessions = self.sessions.lock().await;
        ensure_current(&sessions, session_id)?;
        sessions.end();
        sessions
            .history()
            .last()
            .cloned()
            .ok_or_else(|| DispatchError::SessionNotFound(session_id.to_string()))
    }

    /// The active session, if any.
    pub async fn current_session(&self) -> Option<CoordinationSession> {
        self.sessions.lock().await.current().cloned()
    }

    /// Participants of the active session, in join order.
    pub async fn joined_agencies(&self) -> Vec<JoinedAgency> {
        self.sessions.lock().await.joined().to_vec()
    }

    /// Active session and its participants, read under one lock.
    pub async fn session_snapshot(&self) -> (Option<CoordinationSession>, Vec<JoinedAgency>) {
        let sessions = self.sessions.lock().await;
        (sessions.current().cloned(), sessions.joined().to_vec())
    }

    /// Ended sessions, oldest first.
    pub async fn session_history(&self) -> Vec<CoordinationSession> {
        self.sessions.lock().await.history().to_vec()
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    /// Interprets and runs one free-text operator command.
    pub async fn run_text(&self, text: &str) -> Result<CommandReply> {
        let command = interpret(text)
            .ok_or_else(|| DispatchError::UnrecognizedCommand(text.trim().to_string()))?;
        self.execute(command).await
    }

    /// Runs an already parsed operator command.
    pub async fn execute(&self, command: Command) -> Result<CommandReply> {
        let (ok, message) = match &command {
            Command::Report {
                emergency_type,
                response_type,
                location,
                is_service_request,
            } => {
                let report = EmergencyReport::new(
                    emergency_type.as_str(),
                    response_type.as_str(),
                    location.as_str(),
                )
                .service_request(*is_service_request);
                (true, self.report_emergency(report).await?.message)
            }
            Command::JoinNearby { location } => {
                let out = self
                    .coordinate_nearby(location, COORDINATION_DISASTER_TYPE)
                    .await?;
                (!out.joined.is_empty(), out.message)
            }
            Command::JoinAgency { agency, location } => {
                let agency = self.find_agency_by_name(agency).await?;
                let at = match location {
                    Some(name) => self.resolve(name).await?,
                    None => agency.location,
                };
                let out = self
                    .join(JoinRequest::new(agency, COORDINATION_DISASTER_TYPE, at))
                    .await?;
                (out.is_joined(), out.message().to_string())
            }
            Command::Leave { agency } => {
                let fragment = agency.to_lowercase();
                let mut sessions = self.sessions.lock().await;
                let target = sessions
                    .joined()
                    .iter()
                    .find(|j| j.agency.name.to_lowercase().contains(&fragment))
                    .map(|j| (j.agency.id, j.agency.name.clone()));
                match target {
                    Some((id, name)) if sessions.leave(id) => {
                        (true, format!("Disconnected from {name}"))
                    }
                    _ => (false, format!("You are not connected with {agency}")),
                }
            }
            Command::LeaveAll => {
                if self.end_current().await {
                    (true, "All agency coordination ended".to_string())
                } else {
                    (false, "No active coordination to end".to_string())
                }
            }
            Command::Assign { team, alert_id } => {
                (true, self.assign_team(team, alert_id).await?.message)
            }
            Command::SetStatus { status } => {
                let status = self.set_user_status(status).await?;
                (true, format!("Status updated to: {}", status.as_str()))
            }
        };
        Ok(CommandReply {
            command,
            ok,
            message,
        })
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    async fn resolve(&self, name: &str) -> Result<Coordinate> {
        self.bounded("location resolver", self.collaborators.resolver.resolve(name))
            .await?
            .ok_or_else(|| DispatchError::UnknownLocation(name.to_string()))
    }

    /// First catalog agency whose name contains `fragment` or whose type
    /// equals it.
    async fn find_agency_by_name(&self, fragment: &str) -> Result<Agency> {
        let wanted = fragment.trim().to_lowercase();
        let registry = self.registry.read().await;
        registry
            .agencies()
            .iter()
            .find(|a| a.name.to_lowercase().contains(&wanted) || a.agency_type.as_str() == wanted)
            .cloned()
            .ok_or_else(|| DispatchError::AgencyNotFound(fragment.to_string()))
    }

    async fn bounded<T, F>(&self, collaborator: &'static str, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let limit = self.config.collaborator_timeout;
        match tokio::time::timeout(limit, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                warn!(collaborator, error = %e, "collaborator failed");
                Err(e)
            }
            Err(_) => {
                let timeout_ms = u64::try_from(limit.as_millis()).unwrap_or(u64::MAX);
                warn!(collaborator, timeout_ms, "collaborator timed out");
                Err(DispatchError::CollaboratorTimeout {
                    collaborator,
                    timeout_ms,
                })
            }
        }
    }
}

fn ensure_current(sessions: &CoordinationManager, session_id: &str) -> Result<()> {
    match sessions.current() {
        Some(s) if s.id == session_id => Ok(()),
        _ => Err(DispatchError::SessionNotFound(session_id.to_string())),
    }
}
