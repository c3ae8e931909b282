//! Agency catalogs and the disaster-to-responder mapping.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::info;

use crate::collaborators::CatalogSource;
use crate::error::{DispatchError, Result};
use crate::geo::Coordinate;
use crate::model::{Agency, AgencyType};

type Row = (u64, &'static str, AgencyType, f64, f64, &'static str, u32, u32);

const BUILTIN: &[Row] = &[
    (1, "Delhi Fire Brigade", AgencyType::Fire, 28.7041, 77.1025, "Fire fighting and rescue operations in Delhi NCR", 150, 45),
    (2, "Mumbai Rescue Squad", AgencyType::Disaster, 19.0760, 72.8777, "All-hazards emergency response in Mumbai metro area", 180, 32),
    (3, "Kolkata Medical Response", AgencyType::Medical, 22.5726, 88.3639, "Emergency medical services and ambulance services", 120, 40),
    (4, "Chennai Emergency Services", AgencyType::Police, 13.0827, 80.2707, "Law enforcement and emergency coordination", 200, 65),
    (5, "Bangalore Fire Department", AgencyType::Fire, 12.9716, 77.5946, "Fire suppression and technical rescue", 140, 38),
    (6, "Hyderabad Flood Response", AgencyType::Flood, 17.3850, 78.4867, "Flood rescue and water management", 95, 28),
    (7, "Pune Medical Team", AgencyType::Medical, 18.5204, 73.8567, "Advanced life support and trauma care", 85, 25),
    (8, "Ahmedabad Police Unit", AgencyType::Police, 23.0225, 72.5714, "Emergency response coordination", 175, 55),
    (9, "Jaipur Fire Brigade", AgencyType::Fire, 26.9124, 75.7873, "Fire prevention and suppression", 110, 32),
    (10, "Lucknow Disaster Relief", AgencyType::Disaster, 26.8467, 80.9462, "Disaster relief and management", 85, 20),
    (11, "Chandigarh Rescue Team", AgencyType::Fire, 30.7333, 76.7794, "Urban search and rescue", 75, 18),
    (12, "Bhopal Medical Response", AgencyType::Medical, 23.2599, 77.4126, "Medical emergency response", 65, 22),
    (13, "Nagpur Fire Services", AgencyType::Fire, 21.1458, 79.0882, "Firefighting and hazmat response", 90, 26),
    (14, "Amritsar Emergency Squad", AgencyType::Police, 31.6340, 74.8723, "Emergency coordination and public safety", 120, 35),
    (15, "Jalandhar Rescue Team", AgencyType::Disaster, 31.3260, 75.5762, "Urban rescue operations", 65, 18),
];

/// The catalog a deployment starts with when no file is configured.
pub fn builtin_catalog() -> Vec<Agency> {
    BUILTIN
        .iter()
        .map(
            |&(id, name, agency_type, lat, lng, description, staff_count, vehicle_count)| Agency {
                id,
                name: name.to_string(),
                agency_type,
                location: Coordinate::new(lat, lng),
                staff_count,
                vehicle_count,
                description: description.to_string(),
            },
        )
        .collect()
}

/// Responder type to request for a reported disaster.
///
/// Returns `"chemical"` for chemical incidents, which no agency type
/// matches; everything unrecognized maps to `"disaster"`.
pub fn response_type_for_disaster(disaster_type: &str) -> &'static str {
    match disaster_type.trim().to_lowercase().as_str() {
        "fire" | "industrial" => "fire",
        "flood" | "tsunami" => "flood",
        "medical" | "heatwave" | "coldwave" | "epidemic" | "stampede" => "medical",
        "chemical" => "chemical",
        _ => "disaster",
    }
}

/// Catalog read from a JSON array of agencies on every load.
#[derive(Debug, Clone)]
pub struct JsonFileCatalog {
    path: PathBuf,
}

impl JsonFileCatalog {
    /// Catalog read from `path` on every load.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The file this catalog reads.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl CatalogSource for JsonFileCatalog {
    async fn load(&self) -> Result<Vec<Agency>> {
        let raw = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            DispatchError::CatalogInvalid(format!("read {}: {e}", self.path.display()))
        })?;
        let agencies: Vec<Agency> = serde_json::from_str(&raw).map_err(|e| {
            DispatchError::CatalogInvalid(format!("parse {}: {e}", self.path.display()))
        })?;
        info!(path = %self.path.display(), agencies = agencies.len(), "catalog file read");
        Ok(agencies)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::io::Write;

    use super::*;

    #[test]
    fn builtin_catalog_is_well_formed() {
        let catalog = builtin_catalog();
        assert_eq!(catalog.len(), 15);
        let ids: HashSet<_> = catalog.iter().map(|a| a.id).collect();
        assert_eq!(ids.len(), 15);
        assert!(catalog.iter().all(|a| a.location.is_valid()));
        assert_eq!(catalog[0].name, "Delhi Fire Brigade");
    }

    #[test]
    fn disaster_mapping() {
        assert_eq!(response_type_for_disaster("fire"), "fire");
        assert_eq!(response_type_for_disaster("Earthquake"), "disaster");
        assert_eq!(response_type_for_disaster("tsunami"), "flood");
        assert_eq!(response_type_for_disaster("heatwave"), "medical");
        assert_eq!(response_type_for_disaster("industrial"), "fire");
        assert_eq!(response_type_for_disaster("chemical"), "chemical");
        assert_eq!(response_type_for_disaster("meteor"), "disaster");
    }

    #[tokio::test]
    async fn json_file_catalog_reads_agencies() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let body = serde_json::to_string(&builtin_catalog()[..2]).unwrap();
        file.write_all(body.as_bytes()).unwrap();

        let agencies = JsonFileCatalog::new(file.path()).load().await.unwrap();
        assert_eq!(agencies.len(), 2);
        assert_eq!(agencies[1].agency_type, AgencyType::Disaster);
    }

    #[tokio::test]
    async fn json_file_catalog_reports_bad_input() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"{ not json").unwrap();
        let err = JsonFileCatalog::new(file.path()).load().await.unwrap_err();
        assert!(matches!(err, DispatchError::CatalogInvalid(_)));

        let err = JsonFileCatalog::new("/nonexistent/agencies.json")
            .load()
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::CatalogInvalid(_)));
    }
}
