//! In-memory catalog of responder agencies with proximity queries.

use std::collections::HashSet;

use tracing::{debug, info};

use crate::error::{DispatchError, Result};
use crate::geo::{distance_km, Coordinate};
use crate::model::{Agency, AgencyId, AgencyType, NearbyAgency};

/// Default search radius for [`AgencyRegistry::find_nearby`].
pub const DEFAULT_MAX_DISTANCE_KM: f64 = 50.0;

/// Upper bound on results returned by [`AgencyRegistry::find_nearby`].
pub const MAX_NEARBY_RESULTS: usize = 5;

/// Read-mostly agency catalog. Replaced wholesale on [`load`](Self::load).
#[derive(Debug, Default, Clone)]
pub struct AgencyRegistry {
    agencies: Vec<Agency>,
}

impl AgencyRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the catalog.
    ///
    /// Rejects the whole batch (leaving the previous catalog in place) when
    /// an entry has a duplicate id, a blank name, or an invalid coordinate.
    pub fn load(&mut self, catalog: Vec<Agency>) -> Result<()> {
        validate_catalog(&catalog)?;
        info!(agencies = catalog.len(), "agency catalog loaded");
        self.agencies = catalog;
        Ok(())
    }

    /// Agencies in catalog order.
    pub fn agencies(&self) -> &[Agency] {
        &self.agencies
    }

    /// Number of loaded agencies.
    pub fn len(&self) -> usize {
        self.agencies.len()
    }

    /// True before the first non-empty load.
    pub fn is_empty(&self) -> bool {
        self.agencies.is_empty()
    }

    /// Looks up an agency by id.
    pub fn get(&self, id: AgencyId) -> Result<&Agency> {
        self.agencies
            .iter()
            .find(|a| a.id == id)
            .ok_or_else(|| DispatchError::AgencyNotFound(id.to_string()))
    }

    /// Closest agencies to `origin`, nearest first, at most
    /// [`MAX_NEARBY_RESULTS`].
    ///
    /// `agency_type = None` matches every type. Agencies at equal distance
    /// keep their catalog order.
    pub fn find_nearby(
        &self,
        origin: Coordinate,
        agency_type: Option<AgencyType>,
        max_distance_km: f64,
    ) -> Vec<NearbyAgency> {
        let mut hits: Vec<NearbyAgency> = self
            .agencies
            .iter()
            .filter(|a| agency_type.map_or(true, |t| a.agency_type == t))
            .map(|a| NearbyAgency {
                agency: a.clone(),
                distance_km: distance_km(origin, a.location),
            })
            .filter(|n| n.distance_km <= max_distance_km)
            .collect();

        // Vec::sort_by is stable; NaN distances were already dropped by the filter.
        hits.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));
        hits.truncate(MAX_NEARBY_RESULTS);

        debug!(
            lat = origin.latitude,
            lng = origin.longitude,
            agency_type = agency_type.map(|t| t.as_str()).unwrap_or("any"),
            max_distance_km,
            hits = hits.len(),
            "nearby agency query"
        );
        hits
    }
}

fn validate_catalog(catalog: &[Agency]) -> Result<()> {
    let mut seen = HashSet::new();
    for agency in catalog {
        if !seen.insert(agency.id) {
            return Err(DispatchError::CatalogInvalid(format!(
                "duplicate agency id {}",
                agency.id
            )));
        }
        if agency.name.trim().is_empty() {
            return Err(DispatchError::CatalogInvalid(format!(
                "agency {} has an empty name",
                agency.id
            )));
        }
        if !agency.location.is_valid() {
            return Err(DispatchError::CatalogInvalid(format!(
                "agency {} has invalid coordinates ({}, {})",
                agency.id, agency.location.latitude, agency.location.longitude
            )));
        }
    }
    Ok(())
}
