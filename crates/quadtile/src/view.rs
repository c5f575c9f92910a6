//! What the assembler needs to know about the current view.

use glam::{DMat4, DVec3};

use crate::geo::Sector;
use crate::tile::Globe;

/// A frustum for culling tiles by their bounding spheres.
#[derive(Debug, Clone, Copy)]
pub struct Frustum {
    /// Left, right, bottom, top, near and far planes as (normal, distance).
    planes: [(DVec3, f64); 6],
}

impl Frustum {
    /// Create a frustum from a view-projection matrix.
    #[must_use]
    pub fn from_matrix(vp: DMat4) -> Self {
        let m = vp.to_cols_array_2d();
        let plane = |axis: usize, sign: f64| {
            Self::normalize_plane(
                m[0][3] + sign * m[0][axis],
                m[1][3] + sign * m[1][axis],
                m[2][3] + sign * m[2][axis],
                m[3][3] + sign * m[3][axis],
            )
        };

        Self {
            planes: [
                plane(0, 1.0),
                plane(0, -1.0),
                plane(1, 1.0),
                plane(1, -1.0),
                plane(2, 1.0),
                plane(2, -1.0),
            ],
        }
    }

    /// A frustum that contains everything.
    #[must_use]
    pub fn unbounded() -> Self {
        Self {
            planes: [(DVec3::ZERO, 0.0); 6],
        }
    }

    fn normalize_plane(a: f64, b: f64, c: f64, d: f64) -> (DVec3, f64) {
        let normal = DVec3::new(a, b, c);
        let length = normal.length();
        if length > 0.0 {
            (normal / length, d / length)
        } else {
            (DVec3::ZERO, 0.0)
        }
    }

    /// Test if a sphere intersects the frustum.
    #[must_use]
    pub fn intersects_sphere(&self, center: DVec3, radius: f64) -> bool {
        self.planes
            .iter()
            .all(|&(normal, distance)| normal.dot(center) + distance >= -radius)
    }
}

/// Eye, frustum and visible region for one frame.
#[derive(Debug, Clone, Copy)]
pub struct ViewState {
    pub eye: DVec3,
    pub frustum: Frustum,
    /// Region of the globe that can be seen, if the caller knows it.
    pub visible_sector: Option<Sector>,
    pub globe: Globe,
}

impl ViewState {
    #[must_use]
    pub fn new(eye: DVec3, frustum: Frustum, globe: Globe) -> Self {
        Self {
            eye,
            frustum,
            visible_sector: None,
            globe,
        }
    }

    /// A perspective view from `eye` towards `target`, Y up.
    #[must_use]
    pub fn look_at(eye: DVec3, target: DVec3, fov_y: f64, aspect: f64, globe: Globe) -> Self {
        let up = if eye.cross(DVec3::Y).length_squared() > 0.0 {
            DVec3::Y
        } else {
            DVec3::Z
        };
        let view = DMat4::look_at_rh(eye, target, up);
        let far = eye.length() + globe.radius * 2.0;
        let projection = DMat4::perspective_rh(fov_y, aspect, 1.0, far);
        Self::new(eye, Frustum::from_matrix(projection * view), globe)
    }

    #[must_use]
    pub fn with_visible_sector(mut self, sector: Sector) -> Self {
        self.visible_sector = Some(sector);
        self
    }

    /// Whether a sector can be seen at all, by the visible-region bound.
    #[must_use]
    pub fn is_sector_visible(&self, sector: &Sector) -> bool {
        self.visible_sector
            .is_none_or(|visible| visible.intersects(sector))
    }

    /// Smallest distance from the eye to the sector's corners and center.
    #[must_use]
    pub fn min_distance(&self, sector: &Sector) -> f64 {
        let radius = self.globe.radius;
        sector
            .corner_points(radius)
            .into_iter()
            .chain(std::iter::once(sector.center_point(radius)))
            .map(|point| point.distance(self.eye))
            .fold(f64::INFINITY, f64::min)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::LatLon;

    #[test]
    fn test_sphere_culling() {
        let view = ViewState::look_at(
            DVec3::new(0.0, 0.0, 10.0),
            DVec3::ZERO,
            std::f64::consts::FRAC_PI_2,
            1.0,
            Globe::new(1.0),
        );

        // In front of the camera.
        assert!(view.frustum.intersects_sphere(DVec3::ZERO, 1.0));
        // Behind the camera.
        assert!(!view.frustum.intersects_sphere(DVec3::new(0.0, 0.0, 20.0), 1.0));
        // Far off to the side.
        assert!(!view.frustum.intersects_sphere(DVec3::new(100.0, 0.0, 0.0), 1.0));
        // Straddling the side plane.
        assert!(view.frustum.intersects_sphere(DVec3::new(10.5, 0.0, 0.0), 1.0));
    }

    #[test]
    fn test_unbounded_frustum() {
        let frustum = Frustum::unbounded();
        assert!(frustum.intersects_sphere(DVec3::splat(1e12), 0.0));
    }

    #[test]
    fn test_min_distance_uses_closest_sample() {
        let globe = Globe::new(1000.0);
        let sector = Sector::from_degrees(-10.0, 10.0, -10.0, 10.0);
        let eye = LatLon::from_degrees(0.0, 0.0).to_cartesian(1100.0);
        let view = ViewState::new(eye, Frustum::unbounded(), globe);
        assert!((view.min_distance(&sector) - 100.0).abs() < 1e-6);
    }

    #[test]
    fn test_visible_sector_bound() {
        let view = ViewState::new(DVec3::ZERO, Frustum::unbounded(), Globe::default())
            .with_visible_sector(Sector::from_degrees(0.0, 10.0, 0.0, 10.0));
        assert!(view.is_sector_visible(&Sector::from_degrees(5.0, 20.0, 5.0, 20.0)));
        assert!(!view.is_sector_visible(&Sector::from_degrees(20.0, 30.0, 20.0, 30.0)));
    }
}
