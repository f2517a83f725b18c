use super::DBPostProcess;
use crate::processors::geometry::{Point, ScanlineBuffer};
use itertools::Itertools;
use rayon::prelude::*;

/// Regions with more pixels than this are scored on the rayon pool.
const PARALLEL_PIXEL_THRESHOLD: usize = 8_000;

#[derive(Debug, Clone, Copy)]
struct Region {
    start_y: usize,
    end_y: usize,
    start_x: usize,
    end_x: usize,
}

impl Region {
    fn height(&self) -> usize {
        self.end_y - self.start_y
    }

    fn width(&self) -> usize {
        self.end_x - self.start_x
    }
}

impl DBPostProcess {
    /// Mean probability inside `polygon`.
    ///
    /// Only the polygon's bounding rectangle, clipped to the map, is visited.
    /// Returns 0.0 when no pixel falls inside.
    pub(super) fn box_score_fast(pred: &ndarray::ArrayView2<f32>, polygon: &[Point]) -> f32 {
        let (height, width) = pred.dim();
        if height == 0 || width == 0 {
            return 0.0;
        }

        let Some((min_x, max_x)) = polygon.iter().map(|p| p.x).minmax().into_option() else {
            return 0.0;
        };
        let Some((min_y, max_y)) = polygon.iter().map(|p| p.y).minmax().into_option() else {
            return 0.0;
        };

        let clamp_x = |v: f32| v.clamp(0.0, width as f32 - 1.0);
        let clamp_y = |v: f32| v.clamp(0.0, height as f32 - 1.0);
        let region = Region {
            start_y: clamp_y(min_y.floor()) as usize,
            end_y: clamp_y(max_y.ceil()) as usize + 1,
            start_x: clamp_x(min_x.floor()) as usize,
            end_x: clamp_x(max_x.ceil()) as usize + 1,
        };

        let score_row = |buffer: &mut ScanlineBuffer, y: usize| {
            buffer.process_scanline(y as f32 + 0.5, polygon, region.start_x, region.end_x, pred)
        };

        let (total_score, total_pixels) =
            if region.height() * region.width() < PARALLEL_PIXEL_THRESHOLD {
                let mut buffer = ScanlineBuffer::new(polygon.len());
                (region.start_y..region.end_y)
                    .map(|y| score_row(&mut buffer, y))
                    .fold((0.0, 0), |(s, n), (ls, ln)| (s + ls, n + ln))
            } else {
                (region.start_y..region.end_y)
                    .into_par_iter()
                    .map(|y| score_row(&mut ScanlineBuffer::new(polygon.len()), y))
                    .reduce(|| (0.0, 0), |(s, n), (ls, ln)| (s + ls, n + ln))
            };

        if total_pixels > 0 {
            total_score / total_pixels as f32
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processors::geometry::Quad;
    use ndarray::Array2;

    #[test]
    fn test_score_inside_uniform_region() {
        let pred = Array2::<f32>::from_elem((20, 20), 0.75);
        let quad = Quad::from_rect(2.0, 2.0, 12.0, 8.0);
        let score = DBPostProcess::box_score_fast(&pred.view(), &quad.points);
        assert!((score - 0.75).abs() < 1e-6);
    }

    #[test]
    fn test_score_ignores_outside_pixels() {
        let mut pred = Array2::<f32>::zeros((20, 20));
        for y in 4..8 {
            for x in 4..10 {
                pred[[y, x]] = 1.0;
            }
        }
        let inner = Quad::from_rect(4.0, 4.0, 10.0, 8.0);
        assert!((DBPostProcess::box_score_fast(&pred.view(), &inner.points) - 1.0).abs() < 1e-6);

        let outer = Quad::from_rect(0.0, 0.0, 20.0, 20.0);
        let partial = DBPostProcess::box_score_fast(&pred.view(), &outer.points);
        assert!(partial > 0.0 && partial < 0.5);
    }

    #[test]
    fn test_large_region_uses_parallel_path_consistently() {
        let pred = Array2::<f32>::from_elem((200, 200), 0.5);
        let quad = Quad::from_rect(0.0, 0.0, 199.0, 199.0);
        let score = DBPostProcess::box_score_fast(&pred.view(), &quad.points);
        assert!((score - 0.5).abs() < 1e-5);
    }
}
