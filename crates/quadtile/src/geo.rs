//! Geographic value types: angles, locations and lat/lon rectangles.
//!
//! Surface points use a spherical globe with the Y axis through the north
//! pole and the Z axis through (0°, 0°). No ellipsoid math is done here.

use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};

use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// An angle, stored in degrees.
#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Angle(f64);

impl Angle {
    /// The zero angle.
    pub const ZERO: Angle = Angle(0.0);

    /// Create an angle from degrees.
    #[must_use]
    pub const fn from_degrees(degrees: f64) -> Self {
        Self(degrees)
    }

    /// Create an angle from radians.
    #[must_use]
    pub fn from_radians(radians: f64) -> Self {
        Self(radians.to_degrees())
    }

    /// The angle in degrees.
    #[must_use]
    pub const fn degrees(self) -> f64 {
        self.0
    }

    /// The angle in radians.
    #[must_use]
    pub fn radians(self) -> f64 {
        self.0.to_radians()
    }

    /// Halfway between two angles.
    #[must_use]
    pub fn midpoint(a: Angle, b: Angle) -> Angle {
        Angle(0.5 * (a.0 + b.0))
    }

    #[must_use]
    pub fn min(self, other: Angle) -> Angle {
        Angle(self.0.min(other.0))
    }

    #[must_use]
    pub fn max(self, other: Angle) -> Angle {
        Angle(self.0.max(other.0))
    }
}

impl Add for Angle {
    type Output = Angle;

    fn add(self, rhs: Angle) -> Angle {
        Angle(self.0 + rhs.0)
    }
}

impl Sub for Angle {
    type Output = Angle;

    fn sub(self, rhs: Angle) -> Angle {
        Angle(self.0 - rhs.0)
    }
}

impl Neg for Angle {
    type Output = Angle;

    fn neg(self) -> Angle {
        Angle(-self.0)
    }
}

impl Mul<f64> for Angle {
    type Output = Angle;

    fn mul(self, rhs: f64) -> Angle {
        Angle(self.0 * rhs)
    }
}

impl Div<f64> for Angle {
    type Output = Angle;

    fn div(self, rhs: f64) -> Angle {
        Angle(self.0 / rhs)
    }
}

impl fmt::Display for Angle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}°", self.0)
    }
}

/// A geographic location, or an angular extent when used as a tile delta.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LatLon {
    pub latitude: Angle,
    pub longitude: Angle,
}

impl LatLon {
    #[must_use]
    pub const fn new(latitude: Angle, longitude: Angle) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    #[must_use]
    pub const fn from_degrees(latitude: f64, longitude: f64) -> Self {
        Self::new(Angle::from_degrees(latitude), Angle::from_degrees(longitude))
    }

    /// Position of this location on a sphere of the given radius.
    #[must_use]
    pub fn to_cartesian(self, radius: f64) -> DVec3 {
        let (sin_lat, cos_lat) = self.latitude.radians().sin_cos();
        let (sin_lon, cos_lon) = self.longitude.radians().sin_cos();
        DVec3::new(
            radius * cos_lat * sin_lon,
            radius * sin_lat,
            radius * cos_lat * cos_lon,
        )
    }
}

/// A latitude/longitude aligned rectangle.
///
/// Containment and intersection tests treat the boundaries as closed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sector {
    pub min_latitude: Angle,
    pub max_latitude: Angle,
    pub min_longitude: Angle,
    pub max_longitude: Angle,
}

impl Sector {
    /// The whole globe.
    pub const FULL_SPHERE: Sector = Sector::from_degrees(-90.0, 90.0, -180.0, 180.0);

    /// Create a sector from degrees without validation.
    #[must_use]
    pub const fn from_degrees(min_lat: f64, max_lat: f64, min_lon: f64, max_lon: f64) -> Self {
        Self {
            min_latitude: Angle::from_degrees(min_lat),
            max_latitude: Angle::from_degrees(max_lat),
            min_longitude: Angle::from_degrees(min_lon),
            max_longitude: Angle::from_degrees(max_lon),
        }
    }

    /// Create a sector, rejecting inverted or out-of-range bounds.
    pub fn try_from_degrees(min_lat: f64, max_lat: f64, min_lon: f64, max_lon: f64) -> Result<Self> {
        let sector = Self::from_degrees(min_lat, max_lat, min_lon, max_lon);
        sector.validate()?;
        Ok(sector)
    }

    /// Check that the bounds are ordered and lie on the globe.
    pub fn validate(&self) -> Result<()> {
        let values = [
            self.min_latitude.degrees(),
            self.max_latitude.degrees(),
            self.min_longitude.degrees(),
            self.max_longitude.degrees(),
        ];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(Error::invalid_argument("sector", "bounds must be finite"));
        }
        if self.min_latitude > self.max_latitude || self.min_longitude > self.max_longitude {
            return Err(Error::invalid_argument(
                "sector",
                format!("inverted bounds {self}"),
            ));
        }
        if self.min_latitude.degrees() < -90.0
            || self.max_latitude.degrees() > 90.0
            || self.min_longitude.degrees() < -180.0
            || self.max_longitude.degrees() > 180.0
        {
            return Err(Error::invalid_argument(
                "sector",
                format!("bounds outside the globe {self}"),
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn delta_lat(&self) -> Angle {
        self.max_latitude - self.min_latitude
    }

    #[must_use]
    pub fn delta_lon(&self) -> Angle {
        self.max_longitude - self.min_longitude
    }

    #[must_use]
    pub fn centroid(&self) -> LatLon {
        LatLon::new(
            Angle::midpoint(self.min_latitude, self.max_latitude),
            Angle::midpoint(self.min_longitude, self.max_longitude),
        )
    }

    #[must_use]
    pub fn contains(&self, location: LatLon) -> bool {
        location.latitude >= self.min_latitude
            && location.latitude <= self.max_latitude
            && location.longitude >= self.min_longitude
            && location.longitude <= self.max_longitude
    }

    #[must_use]
    pub fn contains_sector(&self, other: &Sector) -> bool {
        other.min_latitude >= self.min_latitude
            && other.max_latitude <= self.max_latitude
            && other.min_longitude >= self.min_longitude
            && other.max_longitude <= self.max_longitude
    }

    #[must_use]
    pub fn intersects(&self, other: &Sector) -> bool {
        !(other.max_longitude < self.min_longitude
            || other.min_longitude > self.max_longitude
            || other.max_latitude < self.min_latitude
            || other.min_latitude > self.max_latitude)
    }

    /// The overlap of two sectors, if they overlap with non-zero area.
    #[must_use]
    pub fn intersection(&self, other: &Sector) -> Option<Sector> {
        let sector = Sector {
            min_latitude: self.min_latitude.max(other.min_latitude),
            max_latitude: self.max_latitude.min(other.max_latitude),
            min_longitude: self.min_longitude.max(other.min_longitude),
            max_longitude: self.max_longitude.min(other.max_longitude),
        };
        (sector.min_latitude < sector.max_latitude && sector.min_longitude < sector.max_longitude)
            .then_some(sector)
    }

    #[must_use]
    pub fn union(&self, other: &Sector) -> Sector {
        Sector {
            min_latitude: self.min_latitude.min(other.min_latitude),
            max_latitude: self.max_latitude.max(other.max_latitude),
            min_longitude: self.min_longitude.min(other.min_longitude),
            max_longitude: self.max_longitude.max(other.max_longitude),
        }
    }

    /// Bisect latitude and longitude, returning the SW, SE, NW and NE quadrants.
    #[must_use]
    pub fn subdivide(&self) -> [Sector; 4] {
        let mid_lat = Angle::midpoint(self.min_latitude, self.max_latitude);
        let mid_lon = Angle::midpoint(self.min_longitude, self.max_longitude);
        let quadrant = |min_latitude, max_latitude, min_longitude, max_longitude| Sector {
            min_latitude,
            max_latitude,
            min_longitude,
            max_longitude,
        };
        [
            quadrant(self.min_latitude, mid_lat, self.min_longitude, mid_lon),
            quadrant(self.min_latitude, mid_lat, mid_lon, self.max_longitude),
            quadrant(mid_lat, self.max_latitude, self.min_longitude, mid_lon),
            quadrant(mid_lat, self.max_latitude, mid_lon, self.max_longitude),
        ]
    }

    /// Corner points (SW, SE, NE, NW) on a sphere of the given radius.
    #[must_use]
    pub fn corner_points(&self, radius: f64) -> [DVec3; 4] {
        [
            LatLon::new(self.min_latitude, self.min_longitude).to_cartesian(radius),
            LatLon::new(self.min_latitude, self.max_longitude).to_cartesian(radius),
            LatLon::new(self.max_latitude, self.max_longitude).to_cartesian(radius),
            LatLon::new(self.max_latitude, self.min_longitude).to_cartesian(radius),
        ]
    }

    #[must_use]
    pub fn center_point(&self, radius: f64) -> DVec3 {
        self.centroid().to_cartesian(radius)
    }
}

impl fmt::Display for Sector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {}] x [{}, {}]",
            self.min_latitude, self.max_latitude, self.min_longitude, self.max_longitude
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_angle_conversions() {
        let angle = Angle::from_radians(std::f64::consts::PI);
        assert!((angle.degrees() - 180.0).abs() < 1e-12);
        assert!((Angle::from_degrees(90.0).radians() - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
    }

    #[test]
    fn test_sector_validate() {
        assert!(Sector::try_from_degrees(0.0, 10.0, 0.0, 10.0).is_ok());
        assert!(Sector::try_from_degrees(10.0, 0.0, 0.0, 10.0).is_err());
        assert!(Sector::try_from_degrees(-91.0, 0.0, 0.0, 10.0).is_err());
        assert!(Sector::try_from_degrees(0.0, f64::NAN, 0.0, 10.0).is_err());
    }

    #[test]
    fn test_sector_subdivide_covers_parent() {
        let sector = Sector::from_degrees(0.0, 36.0, -180.0, -144.0);
        let quadrants = sector.subdivide();

        assert_eq!(quadrants[0], Sector::from_degrees(0.0, 18.0, -180.0, -162.0));
        assert_eq!(quadrants[3], Sector::from_degrees(18.0, 36.0, -162.0, -144.0));

        let union = quadrants
            .iter()
            .fold(quadrants[0], |acc, q| acc.union(q));
        assert_eq!(union, sector);
    }

    #[test]
    fn test_sector_intersection() {
        let a = Sector::from_degrees(0.0, 10.0, 0.0, 10.0);
        let b = Sector::from_degrees(5.0, 15.0, 5.0, 15.0);
        let c = Sector::from_degrees(10.0, 20.0, 10.0, 20.0);

        assert_eq!(
            a.intersection(&b),
            Some(Sector::from_degrees(5.0, 10.0, 5.0, 10.0))
        );
        // Touching edges intersect but have no overlapping area.
        assert!(a.intersects(&c));
        assert_eq!(a.intersection(&c), None);
    }

    #[test]
    fn test_to_cartesian_axes() {
        let radius = 10.0;
        let origin = LatLon::from_degrees(0.0, 0.0).to_cartesian(radius);
        let north = LatLon::from_degrees(90.0, 0.0).to_cartesian(radius);
        let east = LatLon::from_degrees(0.0, 90.0).to_cartesian(radius);

        assert!(origin.distance(DVec3::new(0.0, 0.0, radius)) < 1e-9);
        assert!(north.distance(DVec3::new(0.0, radius, 0.0)) < 1e-9);
        assert!(east.distance(DVec3::new(radius, 0.0, 0.0)) < 1e-9);
    }
}
