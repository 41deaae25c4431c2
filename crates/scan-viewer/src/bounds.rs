use glam::{Mat4, Vec3};
use rayon::prelude::*;

/// Axis-aligned bounding box. An empty box has `min > max` on every axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Default for Aabb {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl Aabb {
    pub const EMPTY: Self = Self {
        min: Vec3::INFINITY,
        max: Vec3::NEG_INFINITY,
    };

    /// Bounds of every finite point in `points`, reduced in parallel.
    pub fn from_points(points: &[Vec3]) -> Self {
        points
            .par_iter()
            .fold(
                || Self::EMPTY,
                |mut acc, p| {
                    acc.expand(*p);
                    acc
                },
            )
            .reduce(|| Self::EMPTY, Self::union)
    }

    #[inline]
    pub fn expand(&mut self, p: Vec3) {
        if p.is_finite() {
            self.min = self.min.min(p);
            self.max = self.max.max(p);
        }
    }

    #[inline]
    pub fn union(self, other: Self) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.min.cmpgt(self.max).any()
    }

    pub fn size(&self) -> Vec3 {
        if self.is_empty() {
            Vec3::ZERO
        } else {
            self.max - self.min
        }
    }

    pub fn center(&self) -> Vec3 {
        if self.is_empty() {
            Vec3::ZERO
        } else {
            (self.min + self.max) * 0.5
        }
    }

    /// Length of the min→max diagonal; 0 for an empty box.
    pub fn diagonal(&self) -> f32 {
        self.size().length()
    }

    /// Box enclosing the eight transformed corners.
    pub fn transformed(&self, m: &Mat4) -> Self {
        if self.is_empty() {
            return Self::EMPTY;
        }
        let mut out = Self::EMPTY;
        for i in 0..8 {
            let corner = Vec3::new(
                if i & 1 == 0 { self.min.x } else { self.max.x },
                if i & 2 == 0 { self.min.y } else { self.max.y },
                if i & 4 == 0 { self.min.z } else { self.max.z },
            );
            out.expand(m.transform_point3(corner));
        }
        out
    }
}

/// Box plus its diagonal, as measured in scene space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingMetrics {
    pub bounds: Aabb,
    pub diagonal: f32,
}

impl From<Aabb> for BoundingMetrics {
    fn from(bounds: Aabb) -> Self {
        Self {
            bounds,
            diagonal: bounds.diagonal(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_box_reports_zero_extent() {
        let b = Aabb::from_points(&[]);
        assert!(b.is_empty());
        assert_eq!(b.size(), Vec3::ZERO);
        assert_eq!(b.center(), Vec3::ZERO);
        assert_eq!(b.diagonal(), 0.0);
    }

    #[test]
    fn bounds_skip_non_finite_points() {
        let pts = [
            Vec3::new(-1.0, 0.0, 2.0),
            Vec3::new(f32::NAN, 5.0, 5.0),
            Vec3::new(3.0, 4.0, -2.0),
            Vec3::new(0.0, f32::INFINITY, 0.0),
        ];
        let b = Aabb::from_points(&pts);
        assert_eq!(b.min, Vec3::new(-1.0, 0.0, -2.0));
        assert_eq!(b.max, Vec3::new(3.0, 4.0, 2.0));
        assert_eq!(b.center(), Vec3::new(1.0, 2.0, 0.0));
    }

    #[test]
    fn single_point_is_not_empty() {
        let b = Aabb::from_points(&[Vec3::splat(2.0)]);
        assert!(!b.is_empty());
        assert_eq!(b.diagonal(), 0.0);
    }

    #[test]
    fn parallel_reduction_matches_serial() {
        let pts: Vec<Vec3> = (0..10_000)
            .map(|i| {
                let t = i as f32 * 0.37;
                Vec3::new(t.sin() * 10.0, t.cos() * 3.0, (t * 0.1).sin())
            })
            .collect();
        let mut serial = Aabb::EMPTY;
        pts.iter().for_each(|p| serial.expand(*p));
        assert_eq!(Aabb::from_points(&pts), serial);
    }

    #[test]
    fn transform_encloses_rotated_corners() {
        let b = Aabb {
            min: Vec3::new(0.0, 0.0, 0.0),
            max: Vec3::new(2.0, 1.0, 1.0),
        };
        let rot = Mat4::from_rotation_y(std::f32::consts::FRAC_PI_2);
        let t = b.transformed(&rot);
        assert!((t.size() - Vec3::new(1.0, 1.0, 2.0)).length() < 1e-5);
        assert!((t.diagonal() - b.diagonal()).abs() < 1e-5);
        assert!(Aabb::EMPTY.transformed(&rot).is_empty());
    }
}
