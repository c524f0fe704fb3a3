//! Geographic to forecast-grid projection
//!
//! The village forecast service addresses its grid with integer (nx, ny)
//! cells on a Lambert Conformal Conic projection with fixed parameters.
//! The projection is pure arithmetic: identical input must produce
//! bit-identical integer output on every platform.

use std::f64::consts::PI;

/// Earth radius in km
const EARTH_RADIUS_KM: f64 = 6371.008_77;
/// Grid spacing in km
const GRID_KM: f64 = 5.0;
/// First standard parallel in degrees
const STANDARD_PARALLEL_1: f64 = 30.0;
/// Second standard parallel in degrees
const STANDARD_PARALLEL_2: f64 = 60.0;
/// Origin longitude in degrees
const ORIGIN_LON: f64 = 126.0;
/// Origin latitude in degrees
const ORIGIN_LAT: f64 = 38.0;
/// Grid offset of the projection origin
const ORIGIN_X: f64 = 43.0;
const ORIGIN_Y: f64 = 136.0;

/// One cell of the provider's projected grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GridCell {
    pub x: i32,
    pub y: i32,
}

impl std::fmt::Display for GridCell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{}", self.x, self.y)
    }
}

/// Project a geographic coordinate onto the forecast grid.
///
/// `lat` and `lon` are decimal degrees. Real-world beach coordinates stay
/// well clear of the projection's singularities, so there is no failure
/// mode. Rounding adds 0.5 before truncation, the provider's convention
/// for its (always positive) grid indices.
#[must_use]
pub fn project(lat: f64, lon: f64) -> GridCell {
    let degrad = PI / 180.0;

    let re = EARTH_RADIUS_KM / GRID_KM;
    let slat1 = STANDARD_PARALLEL_1 * degrad;
    let slat2 = STANDARD_PARALLEL_2 * degrad;
    let olon = ORIGIN_LON * degrad;
    let olat = ORIGIN_LAT * degrad;

    let mut sn = (PI * 0.25 + slat2 * 0.5).tan() / (PI * 0.25 + slat1 * 0.5).tan();
    sn = (slat1.cos() / slat2.cos()).ln() / sn.ln();
    let mut sf = (PI * 0.25 + slat1 * 0.5).tan();
    sf = sf.powf(sn) * slat1.cos() / sn;
    let mut ro = (PI * 0.25 + olat * 0.5).tan();
    ro = (re * sf) / ro.powf(sn);

    let mut ra = (PI * 0.25 + lat * degrad * 0.5).tan();
    ra = (re * sf) / ra.powf(sn);

    let mut theta = lon * degrad - olon;
    if theta > PI {
        theta -= 2.0 * PI;
    }
    if theta < -PI {
        theta += 2.0 * PI;
    }
    theta *= sn;

    let x = (ra * theta.sin() + ORIGIN_X + 0.5) as i32;
    let y = (ro - ra * theta.cos() + ORIGIN_Y + 0.5) as i32;
    GridCell { x, y }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    // Reference coordinates with previously verified grid cells. The first
    // is the provider's own documented reference point.
    #[rstest]
    #[case(37.5663, 126.9779, 60, 127)] // Seoul city hall
    #[case(35.1587, 129.1604, 99, 75)] // Haeundae
    #[case(37.8057, 128.9092, 93, 133)] // Gyeongpo
    #[case(33.2448, 126.4122, 51, 32)] // Jungmun
    #[case(35.1786, 129.1997, 100, 76)] // Songjeong
    #[case(36.3219, 126.5127, 52, 100)] // Daecheon
    fn test_known_grid_cells(#[case] lat: f64, #[case] lon: f64, #[case] x: i32, #[case] y: i32) {
        assert_eq!(project(lat, lon), GridCell { x, y });
    }

    #[test]
    fn test_projection_is_deterministic() {
        let a = project(35.1587, 129.1604);
        let b = project(35.1587, 129.1604);
        assert_eq!(a, b);
    }

    #[test]
    fn test_nearby_points_share_a_cell() {
        // 5 km grid spacing: a few hundred meters stays in the same cell
        let a = project(35.1587, 129.1604);
        let b = project(35.1590, 129.1610);
        assert_eq!(a, b);
    }
}
