//! Image transformation utilities for OCR processing.
//!
//! This module provides perspective cropping of text regions into upright
//! rectangles, and the inverse mapping from crop coordinates back to the
//! source image.

use crate::core::{OCRError, SimpleError};
use crate::core::constants::DEFAULT_VERTICAL_RATIO;
use crate::processors::{Point, Quad};
use image::{Rgb, RgbImage, imageops};
use nalgebra::{Matrix3, Vector3};
use rayon::prelude::*;
use tracing::{debug, trace};

/// Maps points in a crop back into the image the crop was taken from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerspectiveMap {
    /// Crop space (before any rotation) to source space.
    inverse: Matrix3<f32>,
    /// Width of the warped crop before rotation.
    width: u32,
    /// Height of the warped crop before rotation.
    height: u32,
    /// Whether the crop was rotated 90 degrees counter-clockwise.
    vertical: bool,
    /// Whether the crop was later turned upside down.
    flipped: bool,
}

impl PerspectiveMap {
    /// The map of a crop that is the whole `width x height` image.
    pub fn identity(width: u32, height: u32) -> Self {
        Self {
            inverse: Matrix3::identity(),
            width,
            height,
            vertical: false,
            flipped: false,
        }
    }

    /// Whether the crop was rotated because the region is taller than wide.
    pub fn is_vertical(&self) -> bool {
        self.vertical
    }

    /// The same map for the crop after a 180 degree rotation.
    pub fn rotated_180(self) -> Self {
        Self {
            flipped: !self.flipped,
            ..self
        }
    }

    /// Maps a point of the returned crop to source-image coordinates.
    ///
    /// A 180 degree turn is undone first, then the counter-clockwise rotation
    /// of vertical crops.
    pub fn inverse_point(&self, point: Point) -> Point {
        let point = if self.flipped {
            let (crop_w, crop_h) = if self.vertical {
                (self.height, self.width)
            } else {
                (self.width, self.height)
            };
            Point::new(crop_w as f32 - point.x, crop_h as f32 - point.y)
        } else {
            point
        };
        let (x, y) = if self.vertical {
            (self.width as f32 - point.y, point.x)
        } else {
            (point.x, point.y)
        };
        let mapped = self.inverse * Vector3::new(x, y, 1.0);
        if mapped.z.abs() <= f32::EPSILON {
            return Point::new(mapped.x, mapped.y);
        }
        Point::new(mapped.x / mapped.z, mapped.y / mapped.z)
    }
}

/// An upright crop of a text region.
#[derive(Debug, Clone)]
pub struct RegionCrop {
    /// The rectified pixels.
    pub image: RgbImage,
    /// The mapping back to the source image.
    pub map: PerspectiveMap,
}

/// Extracts a rectified crop of `quad` from `src_image`.
///
/// The crop size comes from the quad's longer horizontal and vertical edges.
/// Crops whose height is at least 1.5 times their width are rotated 90 degrees
/// counter-clockwise so text reads left to right. Degenerate quads yield
/// `Ok(None)`.
///
/// # Errors
///
/// Returns an error if the source image is empty.
pub fn rotate_crop_with_map(
    src_image: &RgbImage,
    quad: &Quad,
) -> Result<Option<RegionCrop>, OCRError> {
    if src_image.width() == 0 || src_image.height() == 0 {
        return Err(OCRError::cropping(
            "cannot crop from an empty image",
            SimpleError::new(format!(
                "source size {}x{}",
                src_image.width(),
                src_image.height()
            )),
        ));
    }

    let img_crop_width = quad.edge_width() as u32;
    let img_crop_height = quad.edge_height() as u32;
    if img_crop_width == 0 || img_crop_height == 0 || quad.area() <= f32::EPSILON {
        trace!("skipping degenerate region {:?}", quad.to_coords());
        return Ok(None);
    }

    let pts_std = Quad::from_rect(0.0, 0.0, img_crop_width as f32, img_crop_height as f32);
    let Some(transform_matrix) = get_perspective_transform(&quad.points, &pts_std.points) else {
        trace!("skipping region with singular transform {:?}", quad.to_coords());
        return Ok(None);
    };
    let Some(inverse) = transform_matrix.try_inverse() else {
        return Ok(None);
    };

    let dst_img = warp_perspective(src_image, &inverse, img_crop_width, img_crop_height);

    let vertical = img_crop_height as f32 / img_crop_width as f32 >= DEFAULT_VERTICAL_RATIO;
    let image = if vertical {
        debug!(
            "Rotating crop due to aspect ratio: {}x{}",
            img_crop_width, img_crop_height
        );
        imageops::rotate270(&dst_img)
    } else {
        dst_img
    };

    Ok(Some(RegionCrop {
        image,
        map: PerspectiveMap {
            inverse,
            width: img_crop_width,
            height: img_crop_height,
            vertical,
            flipped: false,
        },
    }))
}

/// Extracts a rectified crop of `quad`, discarding the inverse mapping.
pub fn get_rotate_crop_image(
    src_image: &RgbImage,
    quad: &Quad,
) -> Result<Option<RgbImage>, OCRError> {
    Ok(rotate_crop_with_map(src_image, quad)?.map(|crop| crop.image))
}

/// Solves for the homography mapping `src_points` onto `dst_points`.
///
/// Returns `None` when the points are degenerate and the system is singular.
fn get_perspective_transform(
    src_points: &[Point; 4],
    dst_points: &[Point; 4],
) -> Option<Matrix3<f32>> {
    let mut a = nalgebra::SMatrix::<f32, 8, 8>::zeros();
    let mut b = nalgebra::SVector::<f32, 8>::zeros();

    for (i, (src, dst)) in src_points.iter().zip(dst_points).enumerate() {
        let rows = [
            [src.x, src.y, 1.0, 0.0, 0.0, 0.0, -src.x * dst.x, -src.y * dst.x],
            [0.0, 0.0, 0.0, src.x, src.y, 1.0, -src.x * dst.y, -src.y * dst.y],
        ];
        for (offset, row) in rows.iter().enumerate() {
            for (col, &value) in row.iter().enumerate() {
                a[(i * 2 + offset, col)] = value;
            }
        }
        b[i * 2] = dst.x;
        b[i * 2 + 1] = dst.y;
    }

    let solution = a.lu().solve(&b)?;
    let matrix = Matrix3::new(
        solution[0],
        solution[1],
        solution[2],
        solution[3],
        solution[4],
        solution[5],
        solution[6],
        solution[7],
        1.0,
    );
    matrix.iter().all(|v| v.is_finite()).then_some(matrix)
}

/// Fills a `dst_width x dst_height` image by sampling `src_image` through `inv_matrix`.
///
/// Samples outside the source replicate the nearest border pixel.
fn warp_perspective(
    src_image: &RgbImage,
    inv_matrix: &Matrix3<f32>,
    dst_width: u32,
    dst_height: u32,
) -> RgbImage {
    let mut dst_image = RgbImage::new(dst_width, dst_height);
    let max_x = (src_image.width() - 1) as f32;
    let max_y = (src_image.height() - 1) as f32;
    let buffer: &mut [u8] = dst_image.as_mut();

    buffer
        .par_chunks_mut((dst_width * 3) as usize)
        .enumerate()
        .for_each(|(dst_y, row_buffer)| {
            for dst_x in 0..dst_width {
                let src_point = inv_matrix * Vector3::new(dst_x as f32, dst_y as f32, 1.0);

                let mut final_pixel = Rgb([0, 0, 0]);
                if src_point.z.abs() > f32::EPSILON {
                    let src_x = (src_point.x / src_point.z).clamp(0.0, max_x);
                    let src_y = (src_point.y / src_point.z).clamp(0.0, max_y);
                    if src_x.is_finite() && src_y.is_finite() {
                        final_pixel = bilinear_interpolate(src_image, src_x, src_y);
                    }
                }

                let index = (dst_x * 3) as usize;
                row_buffer[index..index + 3].copy_from_slice(&final_pixel.0);
            }
        });

    dst_image
}

/// Performs bilinear interpolation to get a pixel value at non-integer coordinates.
fn bilinear_interpolate(image: &RgbImage, x: f32, y: f32) -> Rgb<u8> {
    let x1 = x.floor() as u32;
    let y1 = y.floor() as u32;
    let x2 = (x1 + 1).min(image.width() - 1);
    let y2 = (y1 + 1).min(image.height() - 1);

    let dx = x - x1 as f32;
    let dy = y - y1 as f32;

    let p11 = image.get_pixel(x1, y1);
    let p12 = image.get_pixel(x1, y2);
    let p21 = image.get_pixel(x2, y1);
    let p22 = image.get_pixel(x2, y2);

    let mut result = [0u8; 3];
    for (i, result_channel) in result.iter_mut().enumerate() {
        let val = (1.0 - dx) * (1.0 - dy) * p11.0[i] as f32
            + dx * (1.0 - dy) * p21.0[i] as f32
            + (1.0 - dx) * dy * p12.0[i] as f32
            + dx * dy * p22.0[i] as f32;
        *result_channel = val.round().clamp(0.0, 255.0) as u8;
    }

    Rgb(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ProcessingStage;

    fn gradient(w: u32, h: u32) -> RgbImage {
        RgbImage::from_fn(w, h, |x, y| Rgb([(x * 8) as u8, (y * 8) as u8, 0]))
    }

    #[test]
    fn test_axis_aligned_crop_copies_pixels() {
        let image = gradient(20, 20);
        let quad = Quad::from_rect(4.0, 2.0, 14.0, 8.0);
        let crop = get_rotate_crop_image(&image, &quad).unwrap().unwrap();
        assert_eq!(crop.dimensions(), (10, 6));
        assert_eq!(crop.get_pixel(0, 0), image.get_pixel(4, 2));
        assert_eq!(crop.get_pixel(3, 2), image.get_pixel(7, 4));
    }

    #[test]
    fn test_degenerate_quad_yields_none() {
        let image = gradient(20, 20);
        let flat = Quad::from_rect(4.0, 5.0, 14.0, 5.0);
        assert!(get_rotate_crop_image(&image, &flat).unwrap().is_none());

        let collinear = Quad::new([
            Point::new(0.0, 0.0),
            Point::new(5.0, 5.0),
            Point::new(10.0, 10.0),
            Point::new(15.0, 15.0),
        ]);
        assert!(get_rotate_crop_image(&image, &collinear).unwrap().is_none());
    }

    #[test]
    fn test_empty_source_is_error() {
        let quad = Quad::from_rect(0.0, 0.0, 4.0, 4.0);
        let err = get_rotate_crop_image(&RgbImage::new(0, 0), &quad).unwrap_err();
        assert!(matches!(
            err,
            OCRError::Processing {
                kind: ProcessingStage::Cropping,
                ..
            }
        ));
    }

    #[test]
    fn test_tall_crop_is_rotated_and_maps_back() {
        let image = gradient(30, 30);
        let quad = Quad::from_rect(5.0, 2.0, 11.0, 22.0);
        let crop = rotate_crop_with_map(&image, &quad).unwrap().unwrap();
        assert!(crop.map.is_vertical());
        assert_eq!(crop.image.dimensions(), (20, 6));

        // The rotated crop's top-left corner is the region's top-right corner.
        let corner = crop.map.inverse_point(Point::new(0.0, 0.0));
        assert!((corner.x - 11.0).abs() < 1e-3 && (corner.y - 2.0).abs() < 1e-3);
        let far = crop.map.inverse_point(Point::new(20.0, 6.0));
        assert!((far.x - 5.0).abs() < 1e-3 && (far.y - 22.0).abs() < 1e-3);
    }

    #[test]
    fn test_inverse_point_of_rotated_quad() {
        let image = gradient(40, 40);
        let quad = Quad::new([
            Point::new(5.0, 10.0),
            Point::new(25.0, 5.0),
            Point::new(27.0, 13.0),
            Point::new(7.0, 18.0),
        ]);
        let crop = rotate_crop_with_map(&image, &quad).unwrap().unwrap();
        assert!(!crop.map.is_vertical());
        let (w, h) = crop.image.dimensions();
        let mapped = crop.map.inverse_point(Point::new(w as f32, h as f32));
        assert!((mapped.x - 27.0).abs() < 1e-2 && (mapped.y - 13.0).abs() < 1e-2);
        let origin = crop.map.inverse_point(Point::new(0.0, 0.0));
        assert!((origin.x - 5.0).abs() < 1e-2 && (origin.y - 10.0).abs() < 1e-2);
    }

    #[test]
    fn test_flipped_map_swaps_corners() {
        let image = gradient(30, 30);
        let quad = Quad::from_rect(2.0, 4.0, 22.0, 10.0);
        let crop = rotate_crop_with_map(&image, &quad).unwrap().unwrap();
        let flipped = crop.map.rotated_180();
        let p = flipped.inverse_point(Point::new(0.0, 0.0));
        assert!((p.x - 22.0).abs() < 1e-3 && (p.y - 10.0).abs() < 1e-3);
        assert_eq!(flipped.rotated_180(), crop.map);
    }

    #[test]
    fn test_identity_map() {
        let map = PerspectiveMap::identity(50, 20);
        assert_eq!(map.inverse_point(Point::new(7.0, 3.0)), Point::new(7.0, 3.0));
    }

    #[test]
    fn test_bilinear_interpolate() {
        let mut image = RgbImage::new(2, 2);
        image.put_pixel(0, 0, Rgb([255, 0, 0]));
        image.put_pixel(1, 0, Rgb([0, 255, 0]));
        image.put_pixel(0, 1, Rgb([0, 0, 255]));
        image.put_pixel(1, 1, Rgb([255, 255, 0]));

        let pixel = bilinear_interpolate(&image, 0.5, 0.5);
        assert_eq!(pixel.0, [128, 128, 64]);
    }
}
