//! Contracts for the external collaborators the dispatcher drives, plus
//! in-process implementations used by the daemon and by tests.
//!
//! Every collaborator is async; the dispatcher bounds each call with its
//! configured timeout and never holds engine locks across one.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{info, warn};
use ulid::Ulid;

use crate::error::Result;
use crate::geo::Coordinate;
use crate::model::{Agency, NearbyAgency};

// ---------------------------------------------------------------------------
// Contracts
// ---------------------------------------------------------------------------

/// Turns a human-readable place name into coordinates.
#[async_trait]
pub trait LocationResolver: Send + Sync {
    /// `Ok(None)` when the name is unknown.
    async fn resolve(&self, name: &str) -> Result<Option<Coordinate>>;
}

/// A marker the dispatcher asks a renderer to show for an alert.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Marker {
    /// One marker per alert; placing again replaces it.
    pub alert_id: String,
    /// Where to draw it.
    pub coordinate: Coordinate,
    /// Emergency type, used for the icon.
    #[serde(rename = "type")]
    pub marker_type: String,
    /// Extra caption, e.g. `MEDICAL SERVICE NEEDED`.
    pub label: Option<String>,
}

/// Displays alert markers.
#[async_trait]
pub trait MapRenderer: Send + Sync {
    /// `Ok(false)` when the renderer declined to place the marker.
    async fn place_marker(&self, marker: &Marker) -> Result<bool>;
}

/// Everything a notifier needs to fan an alert out to agencies.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotificationRequest {
    /// Alert being dispatched.
    pub alert_id: String,
    /// Resolved location of the emergency.
    pub coordinate: Coordinate,
    /// Lowercased emergency type.
    pub emergency_type: String,
    /// Place name as reported.
    pub location_name: String,
    /// True when a specific service was requested.
    pub is_service_request: bool,
    /// Responder type the candidates were filtered by.
    pub response_type: String,
    /// Agencies selected by proximity, nearest first.
    pub candidates: Vec<NearbyAgency>,
}

/// Delivers alerts to agencies.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Returns the agencies that were actually notified.
    async fn notify(&self, request: &NotificationRequest) -> Result<Vec<Agency>>;
}

/// Supplies the agency catalog on startup and on reload.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Reads the full catalog.
    async fn load(&self) -> Result<Vec<Agency>>;
}

// ---------------------------------------------------------------------------
// MarkerBoard
// ---------------------------------------------------------------------------

/// In-memory map renderer. Placing a marker for an alert id that already
/// has one replaces it.
#[derive(Debug, Default)]
pub struct MarkerBoard {
    markers: Mutex<HashMap<String, Marker>>,
}

impl MarkerBoard {
    /// Empty board.
    pub fn new() -> Self {
        Self::default()
    }

    /// Placed markers ordered by alert id.
    pub async fn markers(&self) -> Vec<Marker> {
        let markers = self.markers.lock().await;
        let mut out: Vec<Marker> = markers.values().cloned().collect();
        out.sort_by(|a, b| a.alert_id.cmp(&b.alert_id));
        out
    }

    /// The marker placed for an alert.
    pub async fn get(&self, alert_id: &str) -> Option<Marker> {
        self.markers.lock().await.get(alert_id).cloned()
    }
}

#[async_trait]
impl MapRenderer for MarkerBoard {
    async fn place_marker(&self, marker: &Marker) -> Result<bool> {
        if !marker.coordinate.is_valid() {
            warn!(alert_id = %marker.alert_id, "refusing marker with invalid coordinate");
            return Ok(false);
        }
        let mut markers = self.markers.lock().await;
        if markers
            .insert(marker.alert_id.clone(), marker.clone())
            .is_some()
        {
            info!(alert_id = %marker.alert_id, "marker replaced");
        }
        Ok(true)
    }
}

// ---------------------------------------------------------------------------
// LogNotifier
// ---------------------------------------------------------------------------

/// Notifier that records each fan-out as a log event and reports every
/// candidate as notified.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, request: &NotificationRequest) -> Result<Vec<Agency>> {
        let notification_id = Ulid::new();
        if request.candidates.is_empty() {
            info!(
                %notification_id,
                alert_id = %request.alert_id,
                response_type = %request.response_type,
                "no nearby agencies to notify"
            );
            return Ok(Vec::new());
        }
        for candidate in &request.candidates {
            info!(
                %notification_id,
                alert_id = %request.alert_id,
                agency_id = candidate.agency.id,
                agency = %candidate.agency.name,
                distance_km = candidate.distance_km,
                emergency_type = %request.emergency_type,
                location = %request.location_name,
                "agency notified"
            );
        }
        Ok(request
            .candidates
            .iter()
            .map(|c| c.agency.clone())
            .collect())
    }
}

// ---------------------------------------------------------------------------
// StaticCatalog
// ---------------------------------------------------------------------------

/// Catalog source that always yields the same list.
#[derive(Debug, Default, Clone)]
pub struct StaticCatalog {
    agencies: Vec<Agency>,
}

impl StaticCatalog {
    /// Catalog that always yields `agencies`.
    pub fn new(agencies: Vec<Agency>) -> Self {
        Self { agencies }
    }
}

#[async_trait]
impl CatalogSource for StaticCatalog {
    async fn load(&self) -> Result<Vec<Agency>> {
        Ok(self.agencies.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AgencyType;

    fn agency(id: u64) -> Agency {
        Agency {
            id,
            name: format!("Agency {id}"),
            agency_type: AgencyType::Fire,
            location: Coordinate::new(28.7, 77.1),
            staff_count: 0,
            vehicle_count: 0,
            description: String::new(),
        }
    }

    fn marker(id: &str, lat: f64) -> Marker {
        Marker {
            alert_id: id.into(),
            coordinate: Coordinate::new(lat, 77.1),
            marker_type: "fire".into(),
            label: None,
        }
    }

    #[tokio::test]
    async fn marker_board_replaces_by_alert_id() {
        let board = MarkerBoard::new();
        assert!(board.place_marker(&marker("alert-1", 28.0)).await.unwrap());
        assert!(board.place_marker(&marker("alert-1", 29.0)).await.unwrap());
        let markers = board.markers().await;
        assert_eq!(markers.len(), 1);
        assert_eq!(markers[0].coordinate.latitude, 29.0);
    }

    #[tokio::test]
    async fn marker_board_declines_invalid_coordinate() {
        let board = MarkerBoard::new();
        assert!(!board.place_marker(&marker("alert-1", 95.0)).await.unwrap());
        assert!(board.get("alert-1").await.is_none());
    }

    #[tokio::test]
    async fn log_notifier_returns_candidates_in_order() {
        let req = NotificationRequest {
            alert_id: "alert-1".into(),
            coordinate: Coordinate::new(28.7, 77.1),
            emergency_type: "fire".into(),
            location_name: "Delhi".into(),
            is_service_request: false,
            response_type: "fire".into(),
            candidates: vec![
                NearbyAgency {
                    agency: agency(2),
                    distance_km: 1.0,
                },
                NearbyAgency {
                    agency: agency(1),
                    distance_km: 3.0,
                },
            ],
        };
        let notified = LogNotifier.notify(&req).await.unwrap();
        let ids: Vec<_> = notified.iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![2, 1]);
    }
}
