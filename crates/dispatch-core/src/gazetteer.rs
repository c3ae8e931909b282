//! Built-in place-name resolver for Indian cities and states.

use async_trait::async_trait;

use crate::collaborators::LocationResolver;
use crate::error::Result;
use crate::geo::Coordinate;

const CITIES: &[(&str, f64, f64)] = &[
    ("delhi", 28.7041, 77.1025),
    ("mumbai", 19.0760, 72.8777),
    ("kolkata", 22.5726, 88.3639),
    ("chennai", 13.0827, 80.2707),
    ("bangalore", 12.9716, 77.5946),
    ("hyderabad", 17.3850, 78.4867),
    ("pune", 18.5204, 73.8567),
    ("ahmedabad", 23.0225, 72.5714),
    ("jaipur", 26.9124, 75.7873),
    ("lucknow", 26.8467, 80.9462),
    ("chandigarh", 30.7333, 76.7794),
    ("jalandhar", 31.3260, 75.5762),
    ("amritsar", 31.6340, 74.8723),
    ("ludhiana", 30.9010, 75.8573),
];

const STATES: &[(&str, f64, f64)] = &[
    ("punjab", 31.1471, 75.3412),
    ("haryana", 29.0588, 76.0856),
    ("uttar pradesh", 26.8467, 80.9462),
    ("rajasthan", 26.9124, 75.7873),
    ("gujarat", 23.0225, 72.5714),
    ("maharashtra", 19.7515, 75.7139),
    ("madhya pradesh", 23.2599, 77.4126),
    ("telangana", 17.3850, 78.4867),
    ("andhra pradesh", 15.9129, 79.7400),
    ("karnataka", 12.9716, 77.5946),
    ("tamil nadu", 13.0827, 80.2707),
    ("kerala", 10.8505, 76.2711),
    ("west bengal", 22.5726, 88.3639),
    ("bihar", 25.0961, 85.3131),
    ("odisha", 20.2961, 85.8245),
];

/// Static gazetteer.
///
/// Lookup order: exact (case-insensitive) match on any entry, then a
/// substring match in either direction over cities, then over states.
/// Extra entries added with [`with_entry`](Self::with_entry) count as
/// cities and are checked before the built-in ones.
#[derive(Debug, Clone)]
pub struct Gazetteer {
    cities: Vec<(String, Coordinate)>,
    states: Vec<(String, Coordinate)>,
}

impl Default for Gazetteer {
    fn default() -> Self {
        let table = |rows: &[(&str, f64, f64)]| {
            rows.iter()
                .map(|(name, lat, lng)| (name.to_string(), Coordinate::new(*lat, *lng)))
                .collect()
        };
        Self {
            cities: table(CITIES),
            states: table(STATES),
        }
    }
}

impl Gazetteer {
    /// Gazetteer loaded with the built-in city and state table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Gazetteer with no entries.
    pub fn empty() -> Self {
        Self {
            cities: Vec::new(),
            states: Vec::new(),
        }
    }

    /// Adds a city entry that wins over the built-in ones.
    pub fn with_entry(mut self, name: &str, coordinate: Coordinate) -> Self {
        self.cities.insert(0, (name.trim().to_lowercase(), coordinate));
        self
    }

    /// Resolves a place name; `None` when nothing matches.
    pub fn lookup(&self, name: &str) -> Option<Coordinate> {
        let wanted = name.trim().to_lowercase();
        if wanted.is_empty() {
            return None;
        }

        let all = || self.cities.iter().chain(self.states.iter());
        if let Some((_, c)) = all().find(|(n, _)| *n == wanted) {
            return Some(*c);
        }

        let fuzzy = |table: &[(String, Coordinate)]| {
            table
                .iter()
                .find(|(n, _)| wanted.contains(n.as_str()) || n.contains(wanted.as_str()))
                .map(|(_, c)| *c)
        };
        fuzzy(&self.cities).or_else(|| fuzzy(&self.states))
    }
}

#[async_trait]
impl LocationResolver for Gazetteer {
    async fn resolve(&self, name: &str) -> Result<Option<Coordinate>> {
        Ok(self.lookup(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match_ignores_case() {
        let g = Gazetteer::new();
        assert_eq!(g.lookup("DELHI"), Some(Coordinate::new(28.7041, 77.1025)));
        assert_eq!(g.lookup(" Tamil Nadu "), Some(Coordinate::new(13.0827, 80.2707)));
    }

    #[test]
    fn substring_in_either_direction() {
        let g = Gazetteer::new();
        // query contains the entry
        assert_eq!(g.lookup("ambulance to Chennai"), Some(Coordinate::new(13.0827, 80.2707)));
        // entry contains the query
        assert_eq!(g.lookup("hyder"), Some(Coordinate::new(17.3850, 78.4867)));
    }

    #[test]
    fn cities_win_over_states() {
        let g = Gazetteer::new();
        // "bihar" is only a state, "pune" is a city
        assert_eq!(g.lookup("pune bihar"), Some(Coordinate::new(18.5204, 73.8567)));
    }

    #[test]
    fn unknown_and_blank() {
        let g = Gazetteer::new();
        assert_eq!(g.lookup("Atlantis"), None);
        assert_eq!(g.lookup("   "), None);
    }

    #[test]
    fn custom_entries_take_precedence() {
        let g = Gazetteer::empty().with_entry("Depot", Coordinate::new(1.0, 2.0));
        assert_eq!(g.lookup("depot"), Some(Coordinate::new(1.0, 2.0)));
        assert_eq!(g.lookup("delhi"), None);
    }
}
