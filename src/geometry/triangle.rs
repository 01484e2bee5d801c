use std::ops::Index;

use simba::simd::SimdValue as _;

use super::{SimdFloatType, WorldPoint};

#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Triangle<Point>([Point; 3]);

impl<Point> Triangle<Point> {
    pub fn new(a: Point, b: Point, c: Point) -> Triangle<Point> {
        Triangle([a, b, c])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Point> {
        self.0.iter()
    }

    pub fn map<Point2, F: FnMut(&Point) -> Point2>(&self, mut f: F) -> Triangle<Point2> {
        Triangle([f(&self[0]), f(&self[1]), f(&self[2])])
    }
}

impl<Point> From<[Point; 3]> for Triangle<Point> {
    fn from(value: [Point; 3]) -> Self {
        Triangle(value)
    }
}

impl<Point> Index<usize> for Triangle<Point> {
    type Output = Point;

    fn index(&self, index: usize) -> &Self::Output {
        &self.0[index]
    }
}

impl Triangle<WorldPoint> {
    pub fn centroid(&self) -> WorldPoint {
        WorldPoint::from((self[0].coords + self[1].coords + self[2].coords) / 3.0)
    }
}

/// Position on a triangle relative to its vertices: `(1 - u - v) * p0 + u * p1 + v * p2`.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct BarycentricCoordinates<T> {
    pub u: T,
    pub v: T,
}

impl BarycentricCoordinates<SimdFloatType> {
    pub fn extract(&self, i: usize) -> BarycentricCoordinates<f32> {
        BarycentricCoordinates {
            u: self.u.extract(i),
            v: self.v.extract(i),
        }
    }
}

#[cfg(test)]
impl BarycentricCoordinates<f32> {
    pub fn interpolate(&self, triangle: &Triangle<WorldPoint>) -> WorldPoint {
        let w = 1.0 - self.u - self.v;
        WorldPoint::from(
            triangle[0].coords * w + triangle[1].coords * self.u + triangle[2].coords * self.v,
        )
    }
}
