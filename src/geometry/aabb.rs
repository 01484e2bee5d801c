use super::{LaneVector as _, SIMD_LANES, WorldBox, WorldBox8, WorldPoint, WorldVector, WorldVector8};

#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct AABB<Point> {
    pub min: Point,
    pub max: Point,
}

impl<Point> AABB<Point> {
    pub fn new(min: Point, max: Point) -> AABB<Point> {
        AABB { min, max }
    }

    pub fn map<Point2, F: FnMut(&Point) -> Point2>(&self, mut f: F) -> AABB<Point2> {
        AABB {
            min: f(&self.min),
            max: f(&self.max),
        }
    }
}

impl<Point> From<[Point; 2]> for AABB<Point> {
    fn from(value: [Point; 2]) -> Self {
        let [min, max] = value;
        AABB { min, max }
    }
}

impl<Point> From<(Point, Point)> for AABB<Point> {
    fn from(value: (Point, Point)) -> Self {
        let (min, max) = value;
        AABB { min, max }
    }
}

impl WorldBox {
    /// Smallest box containing all the points, None if there are no points.
    pub fn from_points(points: impl IntoIterator<Item = WorldPoint>) -> Option<WorldBox> {
        let mut points = points.into_iter();
        let first = points.next()?;
        Some(points.fold(AABB::new(first, first), |b, p| b.including(&p)))
    }

    /// Returns this box grown to contain the point.
    pub fn including(&self, p: &WorldPoint) -> WorldBox {
        AABB {
            min: self.min.coords.inf(&p.coords).into(),
            max: self.max.coords.sup(&p.coords).into(),
        }
    }

    pub fn size(&self) -> WorldVector {
        self.max - self.min
    }
}

#[cfg(test)]
impl WorldBox {
    pub fn union(&self, other: &WorldBox) -> WorldBox {
        self.including(&other.min).including(&other.max)
    }

    pub fn center(&self) -> WorldPoint {
        nalgebra::center(&self.min, &self.max)
    }

    pub fn contains(&self, p: &WorldPoint) -> bool {
        (0..3).all(|i| self.min[i] <= p[i] && p[i] <= self.max[i])
    }
}

impl WorldBox8 {
    /// Packs up to eight boxes lane-wise. Missing lanes are filled with an empty box at origin.
    pub fn from_boxes(boxes: &[WorldBox]) -> WorldBox8 {
        debug_assert!(boxes.len() <= SIMD_LANES);
        let lane = |i: usize| boxes.get(i).copied().unwrap_or_default();
        AABB {
            min: WorldVector8::from_lanes(|i| lane(i).min.coords),
            max: WorldVector8::from_lanes(|i| lane(i).max.coords),
        }
    }
}

#[cfg(test)]
impl WorldBox8 {
    pub fn extract(&self, i: usize) -> WorldBox {
        AABB {
            min: self.min.lane(i).into(),
            max: self.max.lane(i).into(),
        }
    }
}
