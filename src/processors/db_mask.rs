use image::{GrayImage, Luma};
use imageproc::morphology::{Mask, grayscale_dilate};

use super::DBPostProcess;

impl DBPostProcess {
    /// Dilates a binary mask with a 2x2 kernel anchored at its bottom-right cell.
    ///
    /// A pixel is set when it or its left, upper or upper-left neighbour is set.
    pub(super) fn dilate_mask(&self, mask: &GrayImage) -> GrayImage {
        let kernel = Mask::from_image(&GrayImage::from_pixel(2, 2, Luma([255])), 1, 1);
        grayscale_dilate(mask, &kernel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dilation_grows_right_and_down() {
        let mut mask = GrayImage::new(5, 5);
        mask.put_pixel(2, 2, Luma([255]));
        let dilated = DBPostProcess::default().dilate_mask(&mask);
        let set: Vec<(u32, u32)> = dilated
            .enumerate_pixels()
            .filter(|(_, _, p)| p[0] > 0)
            .map(|(x, y, _)| (x, y))
            .collect();
        assert_eq!(set, vec![(2, 2), (3, 2), (2, 3), (3, 3)]);
    }

    #[test]
    fn test_dilation_matches_neighbour_rule() {
        let seeds = [(0, 0), (3, 1), (6, 2), (2, 5), (5, 5)];
        let mut mask = GrayImage::new(7, 6);
        for &(x, y) in &seeds {
            mask.put_pixel(x, y, Luma([255]));
        }
        let dilated = DBPostProcess::default().dilate_mask(&mask);
        assert_eq!(dilated.dimensions(), (7, 6));
        for (x, y, p) in dilated.enumerate_pixels() {
            let expected = [(0, 0), (1, 0), (0, 1), (1, 1)].iter().any(|&(dx, dy)| {
                x >= dx && y >= dy && seeds.contains(&(x - dx, y - dy))
            });
            assert_eq!(p[0] > 0, expected, "pixel ({x}, {y})");
        }
    }
}
