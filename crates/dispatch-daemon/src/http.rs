use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use dispatch_core::api::{
    AlertQuery, AssignRequest, CommandRequest, CoordinateRequest, CurrentSessionResponse,
    JoinAgencyRequest, LeaveRequest, NearbyQuery, OkResponse, RegisterTeamRequest, ReloadResponse,
    ReportRequest, UserStatusRequest, UserStatusResponse,
};
use dispatch_core::command::CommandReply;
use dispatch_core::ledger::Assignment;
use dispatch_core::model::{
    Agency, AgencyId, Alert, CoordinationSession, NearbyAgency, ResponseTeam,
};
use dispatch_core::orchestrator::CoordinationOutcome;
use dispatch_core::session::JoinOutcome;
use dispatch_core::{Coordinate, DispatchError, DispatchOutcome, Dispatcher, ErrorKind};
use thiserror::Error;

#[derive(Clone)]
pub struct AppState {
    dispatcher: Arc<Dispatcher>,
}

pub fn router(dispatcher: Arc<Dispatcher>) -> Router {
    let state = AppState { dispatcher };
    Router::new()
        .route("/healthz", get(healthz))
        .route("/v1/alerts", post(report_emergency).get(list_alerts))
        .route("/v1/alerts/{id}", get(get_alert))
        .route("/v1/alerts/{id}/assign", post(assign_team))
        .route("/v1/alerts/{id}/unassign", post(unassign))
        .route("/v1/alerts/{id}/resolve", post(resolve_alert))
        .route("/v1/teams", get(list_teams).post(register_team))
        .route("/v1/user/status", put(set_user_status).get(get_user_status))
        .route("/v1/sessions/join", post(join_session))
        .route("/v1/sessions/coordinate", post(coordinate_nearby))
        .route("/v1/sessions/current", get(current_session))
        .route("/v1/sessions/history", get(session_history))
        .route("/v1/sessions/{id}/leave", post(leave_session))
        .route("/v1/sessions/{id}/end", post(end_session))
        .route("/v1/agencies", get(list_agencies))
        .route("/v1/agencies/nearby", get(nearby_agencies))
        .route("/v1/agencies/reload", post(reload_catalog))
        .route("/v1/agencies/{id}", get(get_agency))
        .route("/v1/commands", post(run_command))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

// ---------------------------------------------------------------------------
// Alerts and teams
// ---------------------------------------------------------------------------

async fn report_emergency(
    State(st): State<AppState>,
    Json(req): Json<ReportRequest>,
) -> Result<Json<DispatchOutcome>, ApiError> {
    Ok(Json(st.dispatcher.report_emergency(req.into()).await?))
}

async fn list_alerts(
    State(st): State<AppState>,
    Query(query): Query<AlertQuery>,
) -> Json<Vec<Alert>> {
    Json(st.dispatcher.alerts(&query).await)
}

async fn get_alert(
    State(st): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Alert>, ApiError> {
    Ok(Json(st.dispatcher.get_alert(&id).await?))
}

async fn assign_team(
    State(st): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<AssignRequest>,
) -> Result<Json<Assignment>, ApiError> {
    Ok(Json(st.dispatcher.assign_team(&req.team, &id).await?))
}

async fn unassign(
    State(st): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Alert>, ApiError> {
    Ok(Json(st.dispatcher.unassign(&id).await?))
}

async fn resolve_alert(
    State(st): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Alert>, ApiError> {
    Ok(Json(st.dispatcher.resolve_alert(&id).await?))
}

async fn list_teams(State(st): State<AppState>) -> Json<Vec<ResponseTeam>> {
    Json(st.dispatcher.teams().await)
}

async fn register_team(
    State(st): State<AppState>,
    Json(req): Json<RegisterTeamRequest>,
) -> Result<Json<ResponseTeam>, ApiError> {
    let team = st
        .dispatcher
        .register_team(&req.name, req.team_type, req.status)
        .await?;
    Ok(Json(team))
}

async fn set_user_status(
    State(st): State<AppState>,
    Json(req): Json<UserStatusRequest>,
) -> Result<Json<UserStatusResponse>, ApiError> {
    let status = st.dispatcher.set_user_status(&req.status).await?;
    Ok(Json(UserStatusResponse {
        status,
        message: format!("Status updated to: {}", status.as_str()),
    }))
}

async fn get_user_status(State(st): State<AppState>) -> Json<UserStatusResponse> {
    let status = st.dispatcher.user_status().await;
    Json(UserStatusResponse {
        status,
        message: format!("Status: {}", status.as_str()),
    })
}

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

async fn join_session(
    State(st): State<AppState>,
    Json(req): Json<JoinAgencyRequest>,
) -> Result<Response, ApiError> {
    if !req.location.is_valid() {
        return Err(ApiError::BadRequest("location is out of range".into()));
    }
    let outcome = st
        .dispatcher
        .join_agency(req.agency_id, &req.disaster_type, req.location)
        .await?;
    Ok(match outcome {
        JoinOutcome::Joined { .. } => Json(outcome).into_response(),
        JoinOutcome::AlreadyJoined { message, .. } => (
            StatusCode::CONFLICT,
            Json(OkResponse::declined("already_joined", message)),
        )
            .into_response(),
    })
}

async fn coordinate_nearby(
    State(st): State<AppState>,
    Json(req): Json<CoordinateRequest>,
) -> Result<Json<CoordinationOutcome>, ApiError> {
    let out = st
        .dispatcher
        .coordinate_nearby(&req.location, &req.disaster_type)
        .await?;
    Ok(Json(out))
}

async fn current_session(State(st): State<AppState>) -> Json<CurrentSessionResponse> {
    let (session, joined) = st.dispatcher.session_snapshot().await;
    Json(CurrentSessionResponse { session, joined })
}

async fn session_history(State(st): State<AppState>) -> Json<Vec<CoordinationSession>> {
    Json(st.dispatcher.session_history().await)
}

async fn leave_session(
    State(st): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<LeaveRequest>,
) -> Result<Response, ApiError> {
    let left = st.dispatcher.leave_session(&id, req.agency_id).await?;
    Ok(if left {
        Json(OkResponse::ok(format!("agency {} left {id}", req.agency_id))).into_response()
    } else {
        (
            StatusCode::NOT_FOUND,
            Json(OkResponse::declined(
                "not_participating",
                format!("agency {} is not part of {id}", req.agency_id),
            )),
        )
            .into_response()
    })
}

async fn end_session(
    State(st): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CoordinationSession>, ApiError> {
    Ok(Json(st.dispatcher.end_session(&id).await?))
}

// ---------------------------------------------------------------------------
// Agencies
// ---------------------------------------------------------------------------

async fn list_agencies(State(st): State<AppState>) -> Json<Vec<Agency>> {
    Json(st.dispatcher.agencies().await)
}

async fn nearby_agencies(
    State(st): State<AppState>,
    Query(q): Query<NearbyQuery>,
) -> Result<Json<Vec<NearbyAgency>>, ApiError> {
    let origin = Coordinate::new(q.lat, q.lng);
    if !origin.is_valid() {
        return Err(ApiError::BadRequest(format!(
            "coordinate ({}, {}) is out of range",
            q.lat, q.lng
        )));
    }
    if let Some(r) = q.radius {
        if !r.is_finite() || r < 0.0 {
            return Err(ApiError::BadRequest(format!("invalid radius {r}")));
        }
    }
    Ok(Json(
        st.dispatcher
            .find_nearby(origin, q.agency_type, q.radius)
            .await,
    ))
}

async fn get_agency(
    State(st): State<AppState>,
    Path(id): Path<AgencyId>,
) -> Result<Json<Agency>, ApiError> {
    Ok(Json(st.dispatcher.get_agency(id).await?))
}

async fn reload_catalog(State(st): State<AppState>) -> Result<Json<ReloadResponse>, ApiError> {
    let agencies = st.dispatcher.reload_catalog().await?;
    Ok(Json(ReloadResponse { agencies }))
}

async fn run_command(
    State(st): State<AppState>,
    Json(req): Json<CommandRequest>,
) -> Result<Json<CommandReply>, ApiError> {
    Ok(Json(st.dispatcher.run_text(&req.text).await?))
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    #[error("bad request: {0}")]
    BadRequest(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Dispatch(e) => match e.kind() {
                ErrorKind::NotFound => StatusCode::NOT_FOUND,
                ErrorKind::InvalidStatus
                | ErrorKind::InvalidArgument
                | ErrorKind::MissingArgument => StatusCode::BAD_REQUEST,
                ErrorKind::InvalidTransition
                | ErrorKind::CatalogInvalid
                | ErrorKind::UnknownLocation => StatusCode::UNPROCESSABLE_ENTITY,
                ErrorKind::TeamUnavailable => StatusCode::CONFLICT,
                ErrorKind::MarkerPlacementFailed | ErrorKind::CollaboratorFailed => {
                    StatusCode::BAD_GATEWAY
                }
                ErrorKind::CollaboratorTimeout => StatusCode::GATEWAY_TIMEOUT,
            },
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "bad_request",
            ApiError::Dispatch(e) => e.code(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, "request rejected");
        }
        let mut body = serde_json::json!({
            "error": self.to_string(),
            "code": self.code(),
        });
        if let ApiError::Dispatch(e) = &self {
            if let Some(alert_id) = e.alert_id() {
                body["alert_id"] = alert_id.into();
            }
        }
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use dispatch_core::Collaborators;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn app() -> Router {
        let dispatcher = Dispatcher::new(Default::default(), Collaborators::builtin());
        dispatcher.reload_catalog().await.unwrap();
        router(Arc::new(dispatcher))
    }

    async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let req = Request::builder().method(method).uri(uri);
        let req = match body {
            Some(b) => req
                .header("content-type", "application/json")
                .body(Body::from(b.to_string()))
                .unwrap(),
            None => req.body(Body::empty()).unwrap(),
        };
        let resp = app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn test_healthz() {
        let app = app().await;
        let resp = app
            .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_report_and_assign_flow() {
        let app = app().await;
        let (status, body) = call(
            &app,
            "POST",
            "/v1/alerts",
            Some(json!({"emergency_type": "fire", "location": "Delhi"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["alert"]["id"], "alert-1");
        assert_eq!(body["agencies_notified"], 1);

        let (status, body) = call(
            &app,
            "POST",
            "/v1/alerts/alert-1/assign",
            Some(json!({"team": "fireteam 1"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["team"]["status"], "busy");

        let (status, _) = call(&app, "POST", "/v1/alerts", Some(json!({"emergency_type": "fire", "location": "Delhi"}))).await;
        assert_eq!(status, StatusCode::OK);
        let (status, body) = call(
            &app,
            "POST",
            "/v1/alerts/alert-2/assign",
            Some(json!({"team": "FireTeam 1"})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "team_unavailable");

        let (_, body) = call(&app, "GET", "/v1/alerts?status=assigned", None).await;
        assert_eq!(body.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_error_status_mapping() {
        let app = app().await;
        let (status, body) = call(&app, "GET", "/v1/alerts/alert-9", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "not_found");

        let (status, _) = call(
            &app,
            "POST",
            "/v1/alerts",
            Some(json!({"emergency_type": "fire", "location": "Atlantis"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let (status, body) = call(
            &app,
            "PUT",
            "/v1/user/status",
            Some(json!({"status": "asleep"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "invalid_status");

        let (status, _) = call(&app, "GET", "/v1/agencies/nearby?lat=120&lng=0", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_alert_scoped_errors_report_alert_id() {
        let err = ApiError::from(DispatchError::MarkerPlacementFailed {
            alert_id: "alert-7".into(),
            reason: "renderer declined the marker".into(),
        });
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);

        let err = ApiError::from(DispatchError::NotificationFailed {
            alert_id: "alert-7".into(),
            cause: Box::new(DispatchError::CollaboratorTimeout {
                collaborator: "notifier",
                timeout_ms: 5000,
            }),
        });
        assert_eq!(err.status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(err.code(), "collaborator_timeout");
    }

    #[tokio::test]
    async fn test_resolve_twice_reports_alert_id() {
        let app = app().await;
        call(&app, "POST", "/v1/alerts", Some(json!({"emergency_type": "fire", "location": "Delhi"}))).await;
        let (status, _) = call(&app, "POST", "/v1/alerts/alert-1/resolve", None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, body) = call(&app, "POST", "/v1/alerts/alert-1/resolve", None).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["code"], "invalid_transition");
        assert_eq!(body["alert_id"], "alert-1");
    }

    #[tokio::test]
    async fn test_session_routes() {
        let app = app().await;
        let join = json!({
            "agency_id": 1,
            "disaster_type": "fire",
            "location": {"lat": 28.7041, "lng": 77.1025}
        });
        let (status, body) = call(&app, "POST", "/v1/sessions/join", Some(join.clone())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["outcome"], "joined");
        let session_id = body["session_id"].as_str().unwrap().to_string();

        let (status, body) = call(&app, "POST", "/v1/sessions/join", Some(join)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["reason"], "already_joined");

        let (_, body) = call(&app, "GET", "/v1/sessions/current", None).await;
        assert_eq!(body["session"]["id"], session_id.as_str());
        assert_eq!(body["joined"].as_array().unwrap().len(), 1);

        let (status, _) = call(
            &app,
            "POST",
            "/v1/sessions/coord-0/leave",
            Some(json!({"agency_id": 1})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let uri = format!("/v1/sessions/{session_id}/leave");
        let (status, body) = call(&app, "POST", &uri, Some(json!({"agency_id": 1}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);

        let (_, body) = call(&app, "GET", "/v1/sessions/history", None).await;
        assert_eq!(body[0]["status"], "ended");
    }

    #[tokio::test]
    async fn test_agency_routes_and_commands() {
        let app = app().await;
        let (status, body) = call(&app, "GET", "/v1/agencies/nearby?lat=28.7041&lng=77.1025&type=fire&radius=10", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["agency"]["id"], 1);

        let (status, body) = call(&app, "GET", "/v1/agencies/3", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "Kolkata Medical Response");

        let (_, body) = call(&app, "POST", "/v1/agencies/reload", None).await;
        assert_eq!(body["agencies"], 15);

        let (status, body) = call(
            &app,
            "POST",
            "/v1/commands",
            Some(json!({"text": "Need ambulance in Pune"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["command"]["command"], "report");
        assert_eq!(body["message"], "1 agencies notified");
    }
}
