use glam::{Mat4, Vec3};

/// Axis-aligned bounding box in local space.
///
/// A location's bound must enclose its own object and every child's bound
/// transformed into the location's space. [`Bound3::EMPTY`] is the identity
/// of [`union`](Self::union) and is contained by every bound.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bound3 {
    pub min: Vec3,
    pub max: Vec3,
}

impl Bound3 {
    /// The empty bound. Unions as the identity, transforms to itself.
    pub const EMPTY: Self = Self {
        min: Vec3::INFINITY,
        max: Vec3::NEG_INFINITY,
    };

    #[must_use]
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Bound enclosing a set of points.
    #[must_use]
    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Self {
        let mut bound = Self::EMPTY;
        for p in points {
            bound.min = bound.min.min(p);
            bound.max = bound.max.max(p);
        }
        bound
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    /// Smallest bound enclosing both inputs.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// True if `other` lies entirely inside this bound.
    ///
    /// The empty bound is contained by everything.
    #[must_use]
    pub fn contains(&self, other: &Self) -> bool {
        if other.is_empty() {
            return true;
        }
        if self.is_empty() {
            return false;
        }
        self.min.x <= other.min.x
            && self.min.y <= other.min.y
            && self.min.z <= other.min.z
            && self.max.x >= other.max.x
            && self.max.y >= other.max.y
            && self.max.z >= other.max.z
    }

    /// Bound of the eight transformed corners.
    #[must_use]
    pub fn transform(&self, matrix: &Mat4) -> Self {
        if self.is_empty() {
            return *self;
        }
        let corners = [
            Vec3::new(self.min.x, self.min.y, self.min.z),
            Vec3::new(self.max.x, self.min.y, self.min.z),
            Vec3::new(self.min.x, self.max.y, self.min.z),
            Vec3::new(self.max.x, self.max.y, self.min.z),
            Vec3::new(self.min.x, self.min.y, self.max.z),
            Vec3::new(self.max.x, self.min.y, self.max.z),
            Vec3::new(self.min.x, self.max.y, self.max.z),
            Vec3::new(self.max.x, self.max.y, self.max.z),
        ];
        Self::from_points(corners.iter().map(|c| matrix.transform_point3(*c)))
    }

    #[must_use]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    #[must_use]
    pub fn size(&self) -> Vec3 {
        if self.is_empty() {
            Vec3::ZERO
        } else {
            self.max - self.min
        }
    }
}

impl Default for Bound3 {
    fn default() -> Self {
        Self::EMPTY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn union_with_empty_is_identity() {
        let b = Bound3::new(Vec3::splat(-1.0), Vec3::splat(1.0));
        assert_eq!(b.union(&Bound3::EMPTY), b);
        assert_eq!(Bound3::EMPTY.union(&b), b);
    }

    #[test]
    fn contains_handles_empty() {
        let b = Bound3::new(Vec3::ZERO, Vec3::ONE);
        assert!(b.contains(&Bound3::EMPTY));
        assert!(!Bound3::EMPTY.contains(&b));
        assert!(b.contains(&b));
    }

    #[test]
    fn transform_translates_corners() {
        let b = Bound3::new(Vec3::splat(-0.5), Vec3::splat(0.5));
        let m = Mat4::from_translation(Vec3::new(10.0, 0.0, 0.0));
        let t = b.transform(&m);
        assert_eq!(t.min, Vec3::new(9.5, -0.5, -0.5));
        assert_eq!(t.max, Vec3::new(10.5, 0.5, 0.5));
    }
}
