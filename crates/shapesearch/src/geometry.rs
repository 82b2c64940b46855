//! Great-circle distance and mile-to-degree conversions on a spherical earth.
//!
//! The degree deltas produced here define the semi-axes of the approximation
//! ellipse used by the radius index for O(1) membership tests; they trade
//! accuracy at large radii for cheap per-candidate checks.

pub const EARTH_RADIUS_MILES: f64 = 3958.756;

/// Distance in miles as the crow flies, assuming the earth is a sphere of
/// radius [`EARTH_RADIUS_MILES`]. Haversine formulation.
pub fn great_circle_distance(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let dlat = (lat2 - lat1).to_radians();
    let dlng = (lng2 - lng1).to_radians();

    let a = (dlat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (dlng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_MILES * a.sqrt().atan2((1.0 - a).sqrt())
}

/// Latitude delta corresponding to a purely North/South mile offset.
pub fn latitude_delta_from_miles(miles: f64) -> f64 {
    (miles / EARTH_RADIUS_MILES).to_degrees()
}

/// Longitude delta corresponding to a purely East/West mile offset at the
/// given reference latitude. Meridians converge toward the poles, so the same
/// mileage spans more degrees the further from the equator it is measured.
pub fn longitude_delta_from_miles(lat: f64, miles: f64) -> f64 {
    let r = EARTH_RADIUS_MILES * lat.to_radians().cos();
    (miles / r).to_degrees()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_degree_of_latitude_is_about_69_miles() {
        let delta = latitude_delta_from_miles(69.17);
        assert!((delta - 1.0).abs() < 1e-3, "delta was {delta}");
    }

    #[test]
    fn longitude_delta_grows_away_from_the_equator() {
        let at_equator = longitude_delta_from_miles(0.0, 50.0);
        let at_chicago = longitude_delta_from_miles(41.88, 50.0);
        assert!(at_chicago > at_equator);
    }

    #[test]
    fn nashville_to_chicago_is_about_four_hundred_miles() {
        let d = great_circle_distance(36.1627, -86.7816, 41.8781, -87.6298);
        assert!((390.0..410.0).contains(&d), "distance was {d}");
    }

    #[test]
    fn distance_is_symmetric_and_zero_on_identity() {
        let ab = great_circle_distance(36.1627, -86.7816, 43.6532, -79.3832);
        let ba = great_circle_distance(43.6532, -79.3832, 36.1627, -86.7816);
        assert!((ab - ba).abs() < 1e-9);
        assert_eq!(great_circle_distance(10.0, 20.0, 10.0, 20.0), 0.0);
    }
}
