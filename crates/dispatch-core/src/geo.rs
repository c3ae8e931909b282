//! Great-circle distance and bearing between coordinates.
//!
//! Inputs are plain degrees; no datum correction is performed. NaN or
//! infinite inputs propagate into the result.

use serde::{Deserialize, Serialize};

/// Mean Earth radius in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// A point on the globe, in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    /// Latitude in degrees, positive north.
    #[serde(alias = "lat")]
    pub latitude: f64,
    /// Longitude in degrees, positive east.
    #[serde(alias = "lng")]
    pub longitude: f64,
}

impl Coordinate {
    /// Builds a coordinate from latitude/longitude degrees.
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// True when both components are finite and inside the usual degree ranges.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// Haversine distance between `a` and `b` in kilometres.
pub fn distance_km(a: Coordinate, b: Coordinate) -> f64 {
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();
    let h = (d_lat / 2.0).sin().powi(2)
        + a.latitude.to_radians().cos() * b.latitude.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    // Rounding can push antipodal points just past 1.0; NaN must pass through.
    let h = if h > 1.0 { 1.0 } else { h };
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_KM * c
}

/// Initial bearing from `a` to `b`, in degrees within `[0, 360)`.
///
/// All angular inputs are converted to radians before use:
///
/// ```text
/// θ = atan2( sin Δλ · cos φ2 , cos φ1 · sin φ2 − sin φ1 · cos φ2 · cos Δλ )
/// ```
pub fn bearing_degrees(a: Coordinate, b: Coordinate) -> f64 {
    let phi1 = a.latitude.to_radians();
    let phi2 = b.latitude.to_radians();
    let d_lambda = (b.longitude - a.longitude).to_radians();
    let y = d_lambda.sin() * phi2.cos();
    let x = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * d_lambda.cos();
    normalize_degrees(y.atan2(x).to_degrees())
}

/// Bearing as computed by the legacy web client: raw degrees are fed to the
/// trigonometric functions unconverted.
///
/// Only useful for parity checks against recorded legacy output.
pub fn bearing_degrees_legacy(a: Coordinate, b: Coordinate) -> f64 {
    let d_lon = b.longitude - a.longitude;
    let y = d_lon.sin() * b.latitude.cos();
    let x = a.latitude.cos() * b.latitude.sin() - a.latitude.sin() * b.latitude.cos() * d_lon.cos();
    normalize_degrees(y.atan2(x).to_degrees())
}

fn normalize_degrees(deg: f64) -> f64 {
    let n = deg.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360.0 for tiny negative inputs.
    if n >= 360.0 {
        0.0
    } else {
        n
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DELHI: Coordinate = Coordinate::new(28.7041, 77.1025);
    const MUMBAI: Coordinate = Coordinate::new(19.0760, 72.8777);

    #[test]
    fn distance_is_symmetric_and_zero_on_self() {
        let pairs = [
            (DELHI, MUMBAI),
            (Coordinate::new(0.0, 0.0), Coordinate::new(0.0, 180.0)),
            (Coordinate::new(-33.86, 151.21), Coordinate::new(51.5, -0.12)),
        ];
        for (a, b) in pairs {
            assert_eq!(distance_km(a, b), distance_km(b, a));
            assert_eq!(distance_km(a, a), 0.0);
        }
    }

    #[test]
    fn distance_delhi_mumbai_is_about_1150_km() {
        let d = distance_km(DELHI, MUMBAI);
        assert!((1140.0..1160.0).contains(&d), "got {d}");
    }

    #[test]
    fn quarter_meridian() {
        let d = distance_km(Coordinate::new(0.0, 0.0), Coordinate::new(90.0, 0.0));
        let expected = EARTH_RADIUS_KM * std::f64::consts::FRAC_PI_2;
        assert!((d - expected).abs() < 1e-6);
    }

    #[test]
    fn bearing_cardinal_directions() {
        let origin = Coordinate::new(0.0, 0.0);
        assert!((bearing_degrees(origin, Coordinate::new(1.0, 0.0)) - 0.0).abs() < 1e-9);
        assert!((bearing_degrees(origin, Coordinate::new(0.0, 1.0)) - 90.0).abs() < 1e-9);
        assert!((bearing_degrees(origin, Coordinate::new(-1.0, 0.0)) - 180.0).abs() < 1e-9);
        assert!((bearing_degrees(origin, Coordinate::new(0.0, -1.0)) - 270.0).abs() < 1e-9);
    }

    #[test]
    fn bearing_stays_in_range() {
        for b in [
            bearing_degrees(DELHI, MUMBAI),
            bearing_degrees(MUMBAI, DELHI),
            bearing_degrees_legacy(DELHI, MUMBAI),
            bearing_degrees_legacy(MUMBAI, DELHI),
        ] {
            assert!((0.0..360.0).contains(&b), "bearing {b} out of range");
        }
        // Delhi -> Mumbai heads roughly south-south-west.
        let b = bearing_degrees(DELHI, MUMBAI);
        assert!((190.0..220.0).contains(&b), "got {b}");
    }

    #[test]
    fn nan_propagates() {
        let bad = Coordinate::new(f64::NAN, 0.0);
        assert!(distance_km(bad, DELHI).is_nan());
        assert!(!bad.is_valid());
    }

    #[test]
    fn validity_bounds() {
        assert!(DELHI.is_valid());
        assert!(!Coordinate::new(91.0, 0.0).is_valid());
        assert!(!Coordinate::new(0.0, -180.5).is_valid());
        assert!(!Coordinate::new(0.0, f64::INFINITY).is_valid());
    }
}
