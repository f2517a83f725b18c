use crate::core::config::ScoreMode;
use crate::processors::geometry::{BoundingBox, Point, Quad, order_points_clockwise};
use clipper2::{EndType, JoinType, Path as ClipperPath};
use image::GrayImage;
use imageproc::contours::find_contours;

use super::DBPostProcess;

impl DBPostProcess {
    pub(super) fn boxes_from_bitmap(
        &self,
        pred: &ndarray::ArrayView2<f32>,
        bitmap: &GrayImage,
        dest_width: u32,
        dest_height: u32,
        box_thresh: f32,
        unclip_ratio: f32,
    ) -> (Vec<Quad>, Vec<f32>) {
        let width_scale = dest_width as f32 / bitmap.width() as f32;
        let height_scale = dest_height as f32 / bitmap.height() as f32;

        let contours = find_contours::<u32>(bitmap);
        let mut boxes = Vec::new();
        let mut scores = Vec::new();

        for contour in contours.into_iter().take(self.max_candidates) {
            let points: Vec<Point> = contour
                .points
                .iter()
                .map(|p| Point::new(p.x as f32, p.y as f32))
                .collect();
            let Some((mini_box, min_side)) = Self::get_mini_box(&points) else {
                continue;
            };
            if min_side < self.min_size {
                continue;
            }

            let score = match self.score_mode {
                ScoreMode::Fast => Self::box_score_fast(pred, &mini_box.points),
                ScoreMode::Slow => Self::box_score_fast(pred, &points),
            };
            if score < box_thresh {
                continue;
            }

            let unclipped = Self::unclip(&mini_box.points, unclip_ratio);
            if unclipped.is_empty() {
                continue;
            }

            let Some((expanded, sside)) = Self::get_mini_box(&unclipped) else {
                continue;
            };
            if sside < self.min_size + 2.0 {
                continue;
            }

            let scaled = expanded.points.map(|point| {
                Point::new(
                    (point.x * width_scale).round().clamp(0.0, dest_width as f32),
                    (point.y * height_scale).round().clamp(0.0, dest_height as f32),
                )
            });

            boxes.push(Quad::new(scaled));
            scores.push(score);
        }

        (boxes, scores)
    }

    /// Minimum-area rectangle of a point set, ordered, with its shorter side.
    fn get_mini_box(points: &[Point]) -> Option<(Quad, f32)> {
        if points.len() < 3 {
            return None;
        }

        let simplified = Self::simplify_chain_points(points);
        let min_rect = BoundingBox::new(simplified).get_min_area_rect();
        let min_side = min_rect.min_side();
        if !min_side.is_finite() || min_side <= 0.0 {
            return None;
        }

        Some((order_points_clockwise(min_rect.corner_points()), min_side))
    }

    /// Keeps only the turning points of a pixel chain.
    fn simplify_chain_points(points: &[Point]) -> Vec<Point> {
        if points.len() <= 3 {
            return points.to_vec();
        }

        let n = points.len();
        let simplified: Vec<Point> = (0..n)
            .filter_map(|i| {
                let prev = points[(i + n - 1) % n];
                let curr = points[i];
                let next = points[(i + 1) % n];
                let dir_prev = (Self::sign_step(curr.x - prev.x), Self::sign_step(curr.y - prev.y));
                let dir_next = (Self::sign_step(next.x - curr.x), Self::sign_step(next.y - curr.y));
                (dir_prev != dir_next).then_some(curr)
            })
            .collect();

        if simplified.len() < 3 {
            points.to_vec()
        } else {
            simplified
        }
    }

    fn sign_step(v: f32) -> i8 {
        if v > 0.0 {
            1
        } else if v < 0.0 {
            -1
        } else {
            0
        }
    }

    /// Offsets a polygon outwards by `area * unclip_ratio / perimeter`.
    ///
    /// Returns an empty vector when the polygon is degenerate or the offset
    /// does not produce exactly one path.
    fn unclip(points: &[Point], unclip_ratio: f32) -> Vec<Point> {
        if points.len() < 3 {
            return Vec::new();
        }

        let coords: Vec<(f64, f64)> = points.iter().map(|p| (p.x as f64, p.y as f64)).collect();
        let perimeter: f64 = (0..coords.len())
            .map(|i| {
                let (x1, y1) = coords[i];
                let (x2, y2) = coords[(i + 1) % coords.len()];
                (x2 - x1).hypot(y2 - y1)
            })
            .sum();
        let clipper_path: ClipperPath = coords.into();

        let area = clipper_path.signed_area().abs();
        if area <= f64::EPSILON || perimeter <= f64::EPSILON {
            return Vec::new();
        }

        let delta = area * unclip_ratio as f64 / perimeter;
        let offset_paths = clipper_path.inflate(delta, JoinType::Round, EndType::Polygon, 2.0);
        if offset_paths.len() != 1 {
            return Vec::new();
        }
        let Some(path) = offset_paths.into_iter().next() else {
            return Vec::new();
        };

        let mut expanded: Vec<Point> = path
            .iter()
            .map(|pt| Point::new(pt.x() as f32, pt.y() as f32))
            .collect();

        // Drop the closing point if the path repeats its start.
        if let (Some(first), Some(last)) = (expanded.first(), expanded.last())
            && expanded.len() > 1
            && (first.x - last.x).abs() < f32::EPSILON
            && (first.y - last.y).abs() < f32::EPSILON
        {
            expanded.pop();
        }

        if expanded.len() < 3 {
            return Vec::new();
        }
        expanded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_mini_box_returns_min_side() {
        let points = vec![
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 5.0),
            Point::new(0.0, 5.0),
        ];
        let (quad, min_side) = DBPostProcess::get_mini_box(&points).expect("expected mini box");
        assert!((min_side - 5.0).abs() < 1e-3);
        assert!((quad.points[0].x).abs() < 1e-3 && (quad.points[0].y).abs() < 1e-3);
    }

    #[test]
    fn test_simplify_chain_points_removes_straight_segment_points() {
        let points = vec![
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.0),
            Point::new(2.0, 0.0),
            Point::new(2.0, 1.0),
            Point::new(2.0, 2.0),
            Point::new(1.0, 2.0),
            Point::new(0.0, 2.0),
            Point::new(0.0, 1.0),
        ];
        assert_eq!(DBPostProcess::simplify_chain_points(&points).len(), 4);
    }

    #[test]
    fn test_unclip_grows_rectangle() {
        let square = Quad::from_rect(10.0, 10.0, 30.0, 20.0).points;
        let grown = DBPostProcess::unclip(&square, 1.5);
        assert!(grown.len() >= 4);
        // delta = 200 * 1.5 / 60 = 5
        let x_min = grown.iter().map(|p| p.x).fold(f32::INFINITY, f32::min);
        let y_max = grown.iter().map(|p| p.y).fold(f32::NEG_INFINITY, f32::max);
        assert!((x_min - 5.0).abs() < 0.5);
        assert!((y_max - 25.0).abs() < 0.5);
    }

    #[test]
    fn test_unclip_rejects_degenerate_polygon() {
        let line = [Point::new(0.0, 0.0), Point::new(5.0, 0.0), Point::new(10.0, 0.0)];
        assert!(DBPostProcess::unclip(&line, 1.6).is_empty());
    }
}
