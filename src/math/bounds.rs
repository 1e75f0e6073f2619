use glam::Vec3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn new(point1: Vec3, point2: Vec3) -> Aabb {
        let min = point1.min(point2);
        let max = point1.max(point2);
        Aabb { min, max }
    }

    /// Returns `None` for an empty point set.
    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Option<Aabb> {
        let mut points = points.into_iter();
        let first = points.next()?;

        Some(points.fold(Aabb::new(first, first), |aabb, point| Aabb {
            min: aabb.min.min(point),
            max: aabb.max.max(point),
        }))
    }

    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_of_points() {
        let aabb = Aabb::from_points([
            Vec3::new(1.0, -2.0, 0.5),
            Vec3::new(-1.0, 4.0, 0.0),
            Vec3::new(0.0, 0.0, 3.0),
        ])
        .unwrap();

        assert_eq!(aabb.min, Vec3::new(-1.0, -2.0, 0.0));
        assert_eq!(aabb.max, Vec3::new(1.0, 4.0, 3.0));
        assert_eq!(aabb.center(), Vec3::new(0.0, 1.0, 1.5));
        assert_eq!(aabb.size(), Vec3::new(2.0, 6.0, 3.0));
    }

    #[test]
    fn empty_point_set_has_no_bounds() {
        assert!(Aabb::from_points(std::iter::empty()).is_none());
    }

    #[test]
    fn union_covers_both() {
        let a = Aabb::new(Vec3::ZERO, Vec3::ONE);
        let b = Aabb::new(Vec3::splat(-1.0), Vec3::splat(0.5));
        assert_eq!(a.union(&b), Aabb::new(Vec3::splat(-1.0), Vec3::ONE));
    }
}
