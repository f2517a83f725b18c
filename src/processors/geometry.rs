//! Geometric utilities for OCR processing.
//!
//! This module provides the geometric primitives shared by every stage: points,
//! four-corner text boxes ([`Quad`]), contour polygons with their minimum-area
//! rectangles, reading-order sorting, and scanline scoring of polygons against a
//! probability map.

use imageproc::contours::Contour;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::f32::consts::PI;

/// A 2D point with floating-point coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// X-coordinate of the point.
    pub x: f32,
    /// Y-coordinate of the point.
    pub y: f32,
}

impl Point {
    /// Creates a new point with the given coordinates.
    #[inline]
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    #[inline]
    pub fn distance(&self, other: &Point) -> f32 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

fn cmp_f32(a: f32, b: f32) -> Ordering {
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}

/// Twice the signed area of the triangle `p1 p2 p3`.
///
/// Positive values mean a clockwise turn in image coordinates (y pointing down).
fn cross_product(p1: &Point, p2: &Point, p3: &Point) -> f32 {
    (p2.x - p1.x) * (p3.y - p1.y) - (p2.y - p1.y) * (p3.x - p1.x)
}

/// A text region: four corners ordered top-left, top-right, bottom-right, bottom-left.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quad {
    /// The four corners.
    pub points: [Point; 4],
}

impl Quad {
    /// Wraps four points as they are, without reordering.
    pub fn new(points: [Point; 4]) -> Self {
        Self { points }
    }

    /// Builds an axis-aligned quad from two corners.
    pub fn from_rect(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self::new([
            Point::new(x1, y1),
            Point::new(x2, y1),
            Point::new(x2, y2),
            Point::new(x1, y2),
        ])
    }

    /// The corners as `[x, y]` pairs.
    pub fn to_coords(&self) -> [[f32; 2]; 4] {
        self.points.map(|p| [p.x, p.y])
    }

    /// The first corner, top-left once the quad is ordered.
    pub fn top_left(&self) -> Point {
        self.points[0]
    }

    pub fn x_min(&self) -> f32 {
        self.points.iter().map(|p| p.x).fold(f32::INFINITY, f32::min)
    }

    pub fn x_max(&self) -> f32 {
        self.points.iter().map(|p| p.x).fold(f32::NEG_INFINITY, f32::max)
    }

    pub fn y_min(&self) -> f32 {
        self.points.iter().map(|p| p.y).fold(f32::INFINITY, f32::min)
    }

    pub fn y_max(&self) -> f32 {
        self.points.iter().map(|p| p.y).fold(f32::NEG_INFINITY, f32::max)
    }

    /// Length of the longer horizontal edge.
    pub fn edge_width(&self) -> f32 {
        let [tl, tr, br, bl] = self.points;
        tl.distance(&tr).max(bl.distance(&br))
    }

    /// Length of the longer vertical edge.
    pub fn edge_height(&self) -> f32 {
        let [tl, tr, br, bl] = self.points;
        tl.distance(&bl).max(tr.distance(&br))
    }

    /// Returns a copy with every coordinate clamped to `[0, max_x] x [0, max_y]`.
    pub fn clip(&self, max_x: f32, max_y: f32) -> Self {
        Self::new(
            self.points
                .map(|p| Point::new(p.x.clamp(0.0, max_x.max(0.0)), p.y.clamp(0.0, max_y.max(0.0)))),
        )
    }

    /// Returns the same corners in canonical order.
    pub fn ordered(&self) -> Self {
        order_points_clockwise(self.points)
    }

    /// Shoelace area.
    pub fn area(&self) -> f32 {
        BoundingBox::new(self.points.to_vec()).area()
    }

    /// True if walking the corners turns clockwise at every vertex.
    pub fn is_clockwise_convex(&self) -> bool {
        (0..4).all(|i| {
            let a = &self.points[i];
            let b = &self.points[(i + 1) % 4];
            let c = &self.points[(i + 2) % 4];
            cross_product(a, b, c) >= 0.0
        })
    }
}

/// Orders four points clockwise starting at the top-left.
///
/// Points are sorted by x (then y); the left pair supplies top-left and
/// bottom-left, the right pair top-right and bottom-right. When that split does
/// not give a convex clockwise walk, which happens for boxes rotated close to
/// 45 degrees, the points are ordered by angle around their centroid instead,
/// starting from the one with the smallest `x + y`. The result depends only on
/// the set of points, so any permutation of the input gives the same quad and
/// reordering an ordered quad is a no-op.
pub fn order_points_clockwise(points: [Point; 4]) -> Quad {
    let mut sorted = points;
    sorted.sort_by(|a, b| cmp_f32(a.x, b.x).then_with(|| cmp_f32(a.y, b.y)));

    let mut left = [sorted[0], sorted[1]];
    let mut right = [sorted[2], sorted[3]];
    left.sort_by(|a, b| cmp_f32(a.y, b.y).then_with(|| cmp_f32(a.x, b.x)));
    right.sort_by(|a, b| cmp_f32(a.y, b.y).then_with(|| cmp_f32(a.x, b.x)));

    let quad = Quad::new([left[0], right[0], right[1], left[1]]);
    if quad.is_clockwise_convex() {
        return quad;
    }

    let cx = points.iter().map(|p| p.x).sum::<f32>() / 4.0;
    let cy = points.iter().map(|p| p.y).sum::<f32>() / 4.0;
    let mut by_angle = sorted;
    by_angle.sort_by(|a, b| {
        cmp_f32((a.y - cy).atan2(a.x - cx), (b.y - cy).atan2(b.x - cx))
            .then_with(|| cmp_f32(a.x, b.x))
    });
    let start = by_angle
        .iter()
        .position_min_by(|a, b| cmp_f32(a.x + a.y, b.x + b.y).then_with(|| cmp_f32(a.y, b.y)))
        .unwrap_or(0);
    by_angle.rotate_left(start);
    Quad::new(by_angle)
}

/// Returns indices that put quads in reading order.
///
/// Quads are sorted by the top-left corner's y then x. A single bubbling pass
/// then moves a quad in front of its predecessor while their top edges differ by
/// less than `row_tolerance` pixels and it starts further left, so words on the
/// same row read left to right.
pub fn reading_order(quads: &[Quad], row_tolerance: f32) -> Vec<usize> {
    let mut order: Vec<usize> = (0..quads.len()).collect();
    order.sort_by(|&a, &b| {
        let pa = quads[a].top_left();
        let pb = quads[b].top_left();
        cmp_f32(pa.y, pb.y).then_with(|| cmp_f32(pa.x, pb.x))
    });

    for i in 0..order.len().saturating_sub(1) {
        for j in (0..=i).rev() {
            let curr = quads[order[j]].top_left();
            let next = quads[order[j + 1]].top_left();
            if (next.y - curr.y).abs() < row_tolerance && next.x < curr.x {
                order.swap(j, j + 1);
            } else {
                break;
            }
        }
    }
    order
}

/// Sorts quads into reading order; see [`reading_order`].
pub fn sort_quads(quads: &[Quad], row_tolerance: f32) -> Vec<Quad> {
    reading_order(quads, row_tolerance)
        .into_iter()
        .map(|i| quads[i])
        .collect()
}

/// A polygon represented by a collection of points.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundingBox {
    /// The points that define the polygon.
    pub points: Vec<Point>,
}

impl BoundingBox {
    /// Creates a new polygon from a vector of points.
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    /// Creates a polygon from a contour.
    pub fn from_contour(contour: &Contour<u32>) -> Self {
        let points = contour
            .points
            .iter()
            .map(|p| Point::new(p.x as f32, p.y as f32))
            .collect();
        Self { points }
    }

    /// Calculates the area of the polygon using the shoelace formula.
    ///
    /// Returns 0.0 if the polygon has fewer than 3 points.
    pub fn area(&self) -> f32 {
        if self.points.len() < 3 {
            return 0.0;
        }

        let mut area = 0.0;
        let n = self.points.len();
        for i in 0..n {
            let j = (i + 1) % n;
            area += self.points[i].x * self.points[j].y;
            area -= self.points[j].x * self.points[i].y;
        }
        area.abs() / 2.0
    }

    /// Calculates the perimeter of the polygon.
    pub fn perimeter(&self) -> f32 {
        let n = self.points.len();
        (0..n)
            .map(|i| self.points[i].distance(&self.points[(i + 1) % n]))
            .sum()
    }

    /// Computes the convex hull using Graham's scan.
    fn convex_hull(&self) -> BoundingBox {
        if self.points.len() < 3 {
            return self.clone();
        }

        let mut points = self.points.clone();

        // Lowest y, then leftmost, is always on the hull.
        let start_idx = points
            .iter()
            .position_min_by(|a, b| cmp_f32(a.y, b.y).then_with(|| cmp_f32(a.x, b.x)))
            .unwrap_or(0);
        points.swap(0, start_idx);
        let start_point = points[0];

        points[1..].sort_by(|a, b| {
            let cross = cross_product(&start_point, a, b);
            if cross == 0.0 {
                let dist_a = (a.x - start_point.x).powi(2) + (a.y - start_point.y).powi(2);
                let dist_b = (b.x - start_point.x).powi(2) + (b.y - start_point.y).powi(2);
                cmp_f32(dist_a, dist_b)
            } else if cross > 0.0 {
                Ordering::Less
            } else {
                Ordering::Greater
            }
        });

        let mut hull: Vec<Point> = Vec::new();
        for point in points {
            while hull.len() > 1
                && cross_product(&hull[hull.len() - 2], &hull[hull.len() - 1], &point) <= 0.0
            {
                hull.pop();
            }
            hull.push(point);
        }

        BoundingBox::new(hull)
    }

    /// Computes the minimum-area enclosing rectangle with rotating calipers over
    /// the convex hull.
    pub fn get_min_area_rect(&self) -> MinAreaRect {
        let empty = MinAreaRect {
            center: Point::new(0.0, 0.0),
            width: 0.0,
            height: 0.0,
            angle: 0.0,
        };
        if self.points.len() < 3 {
            return empty;
        }

        let hull = self.convex_hull();
        let hull_points = &hull.points;

        if hull_points.len() < 3 {
            let Some((min_x, max_x)) = self.points.iter().map(|p| p.x).minmax().into_option()
            else {
                return empty;
            };
            let Some((min_y, max_y)) = self.points.iter().map(|p| p.y).minmax().into_option()
            else {
                return empty;
            };
            return MinAreaRect {
                center: Point::new((min_x + max_x) / 2.0, (min_y + max_y) / 2.0),
                width: max_x - min_x,
                height: max_y - min_y,
                angle: 0.0,
            };
        }

        let mut min_area = f32::MAX;
        let mut min_rect = empty;

        let n = hull_points.len();
        for i in 0..n {
            let j = (i + 1) % n;
            let edge_x = hull_points[j].x - hull_points[i].x;
            let edge_y = hull_points[j].y - hull_points[i].y;
            let edge_length = edge_x.hypot(edge_y);
            if edge_length < f32::EPSILON {
                continue;
            }

            let nx = edge_x / edge_length;
            let ny = edge_y / edge_length;
            let px = -ny;
            let py = nx;

            let mut min_n = f32::MAX;
            let mut max_n = f32::MIN;
            let mut min_p = f32::MAX;
            let mut max_p = f32::MIN;
            for point in hull_points {
                let dx = point.x - hull_points[i].x;
                let dy = point.y - hull_points[i].y;
                let proj_n = nx * dx + ny * dy;
                let proj_p = px * dx + py * dy;
                min_n = min_n.min(proj_n);
                max_n = max_n.max(proj_n);
                min_p = min_p.min(proj_p);
                max_p = max_p.max(proj_p);
            }

            let width = max_n - min_n;
            let height = max_p - min_p;
            let area = width * height;
            if area < min_area {
                min_area = area;
                let center_n = (min_n + max_n) / 2.0;
                let center_p = (min_p + max_p) / 2.0;
                min_rect = MinAreaRect {
                    center: Point::new(
                        hull_points[i].x + center_n * nx + center_p * px,
                        hull_points[i].y + center_n * ny + center_p * py,
                    ),
                    width,
                    height,
                    angle: ny.atan2(nx) * 180.0 / PI,
                };
            }
        }

        min_rect
    }
}

/// A rectangle with minimum area that encloses a shape.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MinAreaRect {
    /// The center point of the rectangle.
    pub center: Point,
    /// The width of the rectangle.
    pub width: f32,
    /// The height of the rectangle.
    pub height: f32,
    /// The rotation angle of the rectangle in degrees.
    pub angle: f32,
}

impl MinAreaRect {
    /// The four corners, in rotation order and not yet canonically ordered.
    pub fn corner_points(&self) -> [Point; 4] {
        let (sin_a, cos_a) = (self.angle * PI / 180.0).sin_cos();
        let w_2 = self.width / 2.0;
        let h_2 = self.height / 2.0;
        [(-w_2, -h_2), (w_2, -h_2), (w_2, h_2), (-w_2, h_2)].map(|(x, y)| {
            Point::new(
                x * cos_a - y * sin_a + self.center.x,
                x * sin_a + y * cos_a + self.center.y,
            )
        })
    }

    /// Gets the length of the shorter side of the rectangle.
    pub fn min_side(&self) -> f32 {
        self.width.min(self.height)
    }

    /// Gets the length of the longer side of the rectangle.
    pub fn max_side(&self) -> f32 {
        self.width.max(self.height)
    }
}

/// A buffer for processing scanlines in polygon rasterization.
pub(crate) struct ScanlineBuffer {
    intersections: Vec<f32>,
}

impl ScanlineBuffer {
    pub(crate) fn new(max_polygon_points: usize) -> Self {
        Self {
            intersections: Vec::with_capacity(max_polygon_points),
        }
    }

    /// Sums `pred` over the pixels of row `y` that lie inside `polygon`,
    /// restricted to columns `start_x..end_x`.
    ///
    /// Returns the accumulated score and the number of pixels visited.
    pub(crate) fn process_scanline(
        &mut self,
        y: f32,
        polygon: &[Point],
        start_x: usize,
        end_x: usize,
        pred: &ndarray::ArrayView2<f32>,
    ) -> (f32, usize) {
        self.intersections.clear();

        let n = polygon.len();
        for i in 0..n {
            let p1 = &polygon[i];
            let p2 = &polygon[(i + 1) % n];
            if ((p1.y <= y && y < p2.y) || (p2.y <= y && y < p1.y))
                && (p2.y - p1.y).abs() > f32::EPSILON
            {
                self.intersections
                    .push(p1.x + (y - p1.y) * (p2.x - p1.x) / (p2.y - p1.y));
            }
        }
        self.intersections.sort_by(|a, b| cmp_f32(*a, *b));

        let row = y as usize;
        if row >= pred.shape()[0] {
            return (0.0, 0);
        }

        let mut line_score = 0.0;
        let mut line_pixels = 0;
        for chunk in self.intersections.chunks(2) {
            if let [x1, x2] = chunk {
                let x1 = x1.max(start_x as f32).round().max(0.0) as usize;
                let x2 = (x2.min(end_x as f32).round().max(0.0) as usize).min(pred.shape()[1]);
                for x in x1..x2 {
                    line_score += pred[[row, x]];
                    line_pixels += 1;
                }
            }
        }

        (line_score, line_pixels)
    }
}
