//! Geographic point selected by the user.
//!
//! Points follow the map convention of the backend: `x` is longitude and `y` is
//! latitude, both in WGS84 degrees.

use serde::{Deserialize, Serialize};

/// A geographic point (longitude/latitude).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Longitude in degrees.
    pub x: f64,
    /// Latitude in degrees.
    pub y: f64,
}

impl Point {
    /// Create a point from longitude and latitude.
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Create a point from latitude and longitude, in that order.
    pub fn from_lat_lon(lat: f64, lon: f64) -> Self {
        Self { x: lon, y: lat }
    }

    /// Latitude in degrees.
    pub fn lat(&self) -> f64 {
        self.y
    }

    /// Longitude in degrees.
    pub fn lon(&self) -> f64 {
        self.x
    }

    /// Whether both coordinates are usable for a request.
    ///
    /// Zero is a valid coordinate; NaN and infinities are not.
    pub fn is_valid(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// The `x,y` form used by the seed source API `point` parameter.
    pub fn query_value(&self) -> String {
        format!("{},{}", self.x, self.y)
    }

    /// The ArcGIS geometry form, `{"x":..,"y":..}`.
    pub fn geometry_json(&self) -> String {
        serde_json::json!({ "x": self.x, "y": self.y }).to_string()
    }
}

impl std::fmt::Display for Point {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let lat_hem = if self.y >= 0.0 { 'N' } else { 'S' };
        let lon_hem = if self.x >= 0.0 { 'E' } else { 'W' };
        write!(
            f,
            "{:.4}°{} {:.4}°{}",
            self.y.abs(),
            lat_hem,
            self.x.abs(),
            lon_hem
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_lat_lon_orders_axes() {
        let point = Point::from_lat_lon(45.0, -123.0);
        assert_eq!(point.x, -123.0);
        assert_eq!(point.y, 45.0);
        assert_eq!(point.lat(), 45.0);
        assert_eq!(point.lon(), -123.0);
    }

    #[test]
    fn test_zero_coordinates_are_valid() {
        assert!(Point::new(0.0, 0.0).is_valid());
    }

    #[test]
    fn test_non_finite_coordinates_are_invalid() {
        assert!(!Point::new(f64::NAN, 45.0).is_valid());
        assert!(!Point::new(-123.0, f64::INFINITY).is_valid());
    }

    #[test]
    fn test_query_value() {
        assert_eq!(Point::new(-123.5, 45.25).query_value(), "-123.5,45.25");
    }

    #[test]
    fn test_geometry_json() {
        let geometry = Point::new(-123.5, 45.25).geometry_json();
        let parsed: serde_json::Value = serde_json::from_str(&geometry).unwrap();
        assert_eq!(parsed["x"], -123.5);
        assert_eq!(parsed["y"], 45.25);
    }

    #[test]
    fn test_display() {
        assert_eq!(Point::new(-123.0, 45.0).to_string(), "45.0000°N 123.0000°W");
    }
}
