//! Webhook fan-out for dispatch notifications.

use async_trait::async_trait;
use dispatch_core::collaborators::{NotificationRequest, Notifier};
use dispatch_core::model::Agency;
use dispatch_core::{DispatchError, Result};
use serde::Serialize;
use tracing::info;

const COLLABORATOR: &str = "webhook notifier";

/// Posts one JSON document per dispatch to a fixed URL. Any non-2xx
/// answer counts as a failed notification.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    alert_id: &'a str,
    emergency_type: &'a str,
    response_type: &'a str,
    location: &'a str,
    latitude: f64,
    longitude: f64,
    is_service_request: bool,
    agencies: Vec<&'a Agency>,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, request: &NotificationRequest) -> Result<Vec<Agency>> {
        if request.candidates.is_empty() {
            return Ok(Vec::new());
        }
        let payload = WebhookPayload {
            alert_id: &request.alert_id,
            emergency_type: &request.emergency_type,
            response_type: &request.response_type,
            location: &request.location_name,
            latitude: request.coordinate.latitude,
            longitude: request.coordinate.longitude,
            is_service_request: request.is_service_request,
            agencies: request.candidates.iter().map(|c| &c.agency).collect(),
        };

        let resp = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(failed)?;
        resp.error_for_status_ref().map_err(failed)?;

        info!(
            alert_id = %request.alert_id,
            agencies = request.candidates.len(),
            status = resp.status().as_u16(),
            "webhook delivered"
        );
        Ok(request
            .candidates
            .iter()
            .map(|c| c.agency.clone())
            .collect())
    }
}

fn failed(e: reqwest::Error) -> DispatchError {
    DispatchError::CollaboratorFailed {
        collaborator: COLLABORATOR,
        message: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dispatch_core::model::{AgencyType, NearbyAgency};
    use dispatch_core::Coordinate;

    fn request(candidates: Vec<NearbyAgency>) -> NotificationRequest {
        NotificationRequest {
            alert_id: "alert-1".into(),
            coordinate: Coordinate::new(28.7041, 77.1025),
            emergency_type: "fire".into(),
            location_name: "Delhi".into(),
            is_service_request: false,
            response_type: "fire".into(),
            candidates,
        }
    }

    #[tokio::test]
    async fn empty_candidate_list_skips_the_call() {
        // Nothing listens on the discard port; no request may be attempted.
        let notifier = WebhookNotifier::new("http://127.0.0.1:9/hook");
        assert!(notifier.notify(&request(Vec::new())).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_a_collaborator_failure() {
        let notifier = WebhookNotifier::new("http://127.0.0.1:9/hook");
        let candidate = NearbyAgency {
            agency: Agency {
                id: 1,
                name: "Delhi Fire Brigade".into(),
                agency_type: AgencyType::Fire,
                location: Coordinate::new(28.7041, 77.1025),
                staff_count: 0,
                vehicle_count: 0,
                description: String::new(),
            },
            distance_km: 0.0,
        };
        let err = notifier.notify(&request(vec![candidate])).await.unwrap_err();
        assert!(matches!(
            err,
            DispatchError::CollaboratorFailed {
                collaborator: "webhook notifier",
                ..
            }
        ));
    }
}
