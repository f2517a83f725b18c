//! Image ingestion.
//!
//! Every pipeline input goes through [`load_image_input`], which turns one of the
//! [`ImageInput`] variants into a canonical 8-bit RGB image. Inputs that cannot be
//! interpreted fail with [`LoadImageError`] before any model sees them.

use crate::core::config::LoaderConfig;
use crate::core::errors::{LoadImageError, OCRError};
use image::{DynamicImage, Rgb, RgbImage, RgbaImage};
use ndarray::{Array2, Array3, ArrayD, ArrayView2, ArrayView3, Ix2, Ix3};
use std::path::{Path, PathBuf};
use tracing::debug;

/// An image handed to the pipeline, in any of the accepted forms.
#[derive(Debug, Clone)]
pub enum ImageInput {
    /// A file on disk, decoded by the `image` crate.
    Path(PathBuf),
    /// An encoded buffer (PNG, JPEG, ...); the format is sniffed.
    Bytes(Vec<u8>),
    /// A `H x W` or `H x W x C` array with `C` in 1..=4.
    Array(ArrayD<u8>),
    /// An already decoded RGB image.
    Rgb(RgbImage),
    /// An already decoded image of any color type.
    Dynamic(DynamicImage),
}

impl From<&str> for ImageInput {
    fn from(path: &str) -> Self {
        Self::Path(PathBuf::from(path))
    }
}

impl From<String> for ImageInput {
    fn from(path: String) -> Self {
        Self::Path(PathBuf::from(path))
    }
}

impl From<&Path> for ImageInput {
    fn from(path: &Path) -> Self {
        Self::Path(path.to_path_buf())
    }
}

impl From<PathBuf> for ImageInput {
    fn from(path: PathBuf) -> Self {
        Self::Path(path)
    }
}

impl From<&PathBuf> for ImageInput {
    fn from(path: &PathBuf) -> Self {
        Self::Path(path.clone())
    }
}

impl From<Vec<u8>> for ImageInput {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(bytes)
    }
}

impl From<&[u8]> for ImageInput {
    fn from(bytes: &[u8]) -> Self {
        Self::Bytes(bytes.to_vec())
    }
}

impl From<ArrayD<u8>> for ImageInput {
    fn from(array: ArrayD<u8>) -> Self {
        Self::Array(array)
    }
}

impl From<Array2<u8>> for ImageInput {
    fn from(array: Array2<u8>) -> Self {
        Self::Array(array.into_dyn())
    }
}

impl From<Array3<u8>> for ImageInput {
    fn from(array: Array3<u8>) -> Self {
        Self::Array(array.into_dyn())
    }
}

impl From<RgbImage> for ImageInput {
    fn from(image: RgbImage) -> Self {
        Self::Rgb(image)
    }
}

impl From<DynamicImage> for ImageInput {
    fn from(image: DynamicImage) -> Self {
        Self::Dynamic(image)
    }
}

/// A missing input is treated as an empty one.
impl<T: Into<ImageInput>> From<Option<T>> for ImageInput {
    fn from(input: Option<T>) -> Self {
        match input {
            Some(inner) => inner.into(),
            None => Self::Bytes(Vec::new()),
        }
    }
}

/// Converts any accepted input into an RGB image.
///
/// # Errors
///
/// Returns [`OCRError::LoadImage`] when the input is empty, the path cannot be
/// read, the bytes cannot be decoded, or the array shape is not an image.
pub fn load_image_input(
    input: impl Into<ImageInput>,
    config: &LoaderConfig,
) -> Result<RgbImage, OCRError> {
    let image = match input.into() {
        ImageInput::Path(path) => load_path(&path, config)?,
        ImageInput::Bytes(bytes) => load_bytes(&bytes, config)?,
        ImageInput::Array(array) => load_array(&array, config)?,
        ImageInput::Rgb(image) => image,
        ImageInput::Dynamic(image) => dynamic_to_rgb(image, config),
    };

    if image.width() == 0 || image.height() == 0 {
        return Err(LoadImageError::Empty.into());
    }
    Ok(image)
}

/// Loads an image from a file path.
pub fn load_image(path: &Path) -> Result<RgbImage, OCRError> {
    load_path(path, &LoaderConfig::default())
}

fn load_path(path: &Path, config: &LoaderConfig) -> Result<RgbImage, OCRError> {
    if path.as_os_str().is_empty() {
        return Err(LoadImageError::Empty.into());
    }
    let img = image::open(path).map_err(|source| LoadImageError::Unreadable {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(dynamic_to_rgb(img, config))
}

fn load_bytes(bytes: &[u8], config: &LoaderConfig) -> Result<RgbImage, OCRError> {
    if bytes.is_empty() {
        return Err(LoadImageError::Empty.into());
    }
    let img = image::load_from_memory(bytes).map_err(|source| LoadImageError::Undecodable {
        len: bytes.len(),
        source,
    })?;
    Ok(dynamic_to_rgb(img, config))
}

fn load_array(array: &ArrayD<u8>, config: &LoaderConfig) -> Result<RgbImage, OCRError> {
    let shape = array.shape().to_vec();
    if array.is_empty() {
        return Err(LoadImageError::Empty.into());
    }
    let unsupported = || LoadImageError::UnsupportedShape {
        shape: shape.clone(),
    };

    match shape.len() {
        2 => {
            let view = array
                .view()
                .into_dimensionality::<Ix2>()
                .map_err(|_| unsupported())?;
            Ok(gray_view_to_rgb(view))
        }
        3 => {
            let view = array
                .view()
                .into_dimensionality::<Ix3>()
                .map_err(|_| unsupported())?;
            match shape[2] {
                1 => Ok(gray_view_to_rgb(view.index_axis_move(ndarray::Axis(2), 0))),
                2 => Ok(composite_gray_alpha(&view, config.alpha_background)),
                3 => Ok(RgbImage::from_fn(shape[1] as u32, shape[0] as u32, |x, y| {
                    let (x, y) = (x as usize, y as usize);
                    Rgb([view[[y, x, 0]], view[[y, x, 1]], view[[y, x, 2]]])
                })),
                4 => {
                    let rgba = RgbaImage::from_fn(shape[1] as u32, shape[0] as u32, |x, y| {
                        let (x, y) = (x as usize, y as usize);
                        image::Rgba([
                            view[[y, x, 0]],
                            view[[y, x, 1]],
                            view[[y, x, 2]],
                            view[[y, x, 3]],
                        ])
                    });
                    Ok(composite_rgba(&rgba, config.alpha_background))
                }
                _ => Err(unsupported().into()),
            }
        }
        _ => Err(unsupported().into()),
    }
}

/// Converts a decoded image to RGB, compositing any alpha channel.
pub fn dynamic_to_rgb(img: DynamicImage, config: &LoaderConfig) -> RgbImage {
    match img {
        DynamicImage::ImageRgb8(rgb) => rgb,
        DynamicImage::ImageLumaA8(luma_alpha) => {
            let (w, h) = luma_alpha.dimensions();
            let array = Array3::from_shape_fn((h as usize, w as usize, 2), |(y, x, c)| {
                luma_alpha.get_pixel(x as u32, y as u32)[c]
            });
            composite_gray_alpha(&array.view(), config.alpha_background)
        }
        other if other.color().has_alpha() => {
            composite_rgba(&other.to_rgba8(), config.alpha_background)
        }
        other => other.to_rgb8(),
    }
}

fn gray_view_to_rgb(view: ArrayView2<u8>) -> RgbImage {
    let (h, w) = view.dim();
    RgbImage::from_fn(w as u32, h as u32, |x, y| {
        let v = view[[y as usize, x as usize]];
        Rgb([v, v, v])
    })
}

/// Blends the background into `value` in proportion to transparency, saturating.
#[inline]
fn add_background(value: u8, alpha: u8, background: u8) -> u8 {
    let fill = (255 - alpha) as u16 * background as u16 / 255;
    (value as u16 + fill).min(255) as u8
}

/// Gray + alpha: gray is kept wherever alpha is non-zero, then transparency is
/// filled with the background color.
fn composite_gray_alpha(view: &ArrayView3<u8>, background: [u8; 3]) -> RgbImage {
    let (h, w, _) = view.dim();
    RgbImage::from_fn(w as u32, h as u32, |x, y| {
        let (x, y) = (x as usize, y as usize);
        let gray = view[[y, x, 0]];
        let alpha = view[[y, x, 1]];
        let masked = if alpha > 0 { gray } else { 0 };
        Rgb([
            add_background(masked, alpha, background[0]),
            add_background(masked, alpha, background[1]),
            add_background(masked, alpha, background[2]),
        ])
    })
}

/// RGBA: color is kept only where alpha is non-zero.
///
/// Dark glyphs on a transparent canvas mask to an all-black image; those get
/// the background added under transparency. Anything else is light content on
/// a transparent canvas and is inverted, so text always ends up dark on light.
fn composite_rgba(rgba: &RgbaImage, background: [u8; 3]) -> RgbImage {
    let (w, h) = rgba.dimensions();
    let masked = RgbImage::from_fn(w, h, |x, y| {
        let p = rgba.get_pixel(x, y);
        if p[3] == 0 {
            Rgb([0, 0, 0])
        } else {
            Rgb([p[0], p[1], p[2]])
        }
    });

    let all_black = masked.as_raw().iter().all(|&v| v == 0);
    debug!(
        "Compositing {}x{} RGBA input ({})",
        w,
        h,
        if all_black { "fill" } else { "invert" }
    );

    RgbImage::from_fn(w, h, |x, y| {
        let alpha = rgba.get_pixel(x, y)[3];
        let p = masked.get_pixel(x, y);
        if all_black {
            Rgb([
                add_background(p[0], alpha, background[0]),
                add_background(p[1], alpha, background[1]),
                add_background(p[2], alpha, background[2]),
            ])
        } else if alpha == 0 {
            Rgb(background)
        } else {
            Rgb([255 - p[0], 255 - p[1], 255 - p[2]])
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array, IxDyn};

    fn cfg() -> LoaderConfig {
        LoaderConfig::default()
    }

    #[test]
    fn test_empty_inputs_fail_with_load_image_error() {
        let cases: Vec<ImageInput> = vec![
            ImageInput::Bytes(Vec::new()),
            ImageInput::Path(PathBuf::new()),
            ImageInput::Array(Array::zeros(IxDyn(&[0, 10, 3]))),
            ImageInput::from(None::<Vec<u8>>),
        ];
        for input in cases {
            let err = load_image_input(input, &cfg()).unwrap_err();
            assert!(err.is_load_image_error(), "unexpected error: {err}");
        }
    }

    #[test]
    fn test_undecodable_bytes_and_missing_path() {
        let err = load_image_input(vec![1u8, 2, 3, 4], &cfg()).unwrap_err();
        assert!(matches!(
            err,
            OCRError::LoadImage(LoadImageError::Undecodable { len: 4, .. })
        ));

        let err = load_image_input("no/such/image.png", &cfg()).unwrap_err();
        assert!(matches!(
            err,
            OCRError::LoadImage(LoadImageError::Unreadable { .. })
        ));
    }

    #[test]
    fn test_unsupported_shapes() {
        for shape in [vec![4usize], vec![4, 4, 5], vec![2, 2, 2, 2]] {
            let err = load_image_input(Array::<u8, _>::zeros(IxDyn(&shape)), &cfg()).unwrap_err();
            assert!(matches!(
                err,
                OCRError::LoadImage(LoadImageError::UnsupportedShape { .. })
            ));
        }
    }

    #[test]
    fn test_gray_arrays_broadcast_to_three_channels() {
        let mut gray = Array2::<u8>::zeros((2, 3));
        gray[[1, 2]] = 200;
        let rgb = load_image_input(gray.clone(), &cfg()).unwrap();
        assert_eq!(rgb.dimensions(), (3, 2));
        assert_eq!(rgb.get_pixel(2, 1).0, [200, 200, 200]);

        let squeezed = gray.insert_axis(ndarray::Axis(2));
        let rgb = load_image_input(squeezed, &cfg()).unwrap();
        assert_eq!(rgb.get_pixel(2, 1).0, [200, 200, 200]);
        assert_eq!(rgb.get_pixel(0, 0).0, [0, 0, 0]);
    }

    #[test]
    fn test_rgb_array_keeps_channel_order() {
        let mut arr = Array3::<u8>::zeros((1, 2, 3));
        arr[[0, 1, 0]] = 10;
        arr[[0, 1, 1]] = 20;
        arr[[0, 1, 2]] = 30;
        let rgb = load_image_input(arr, &cfg()).unwrap();
        assert_eq!(rgb.get_pixel(1, 0).0, [10, 20, 30]);
    }

    #[test]
    fn test_all_black_frame_is_valid() {
        let rgb = load_image_input(Array3::<u8>::zeros((640, 640, 3)), &cfg()).unwrap();
        assert_eq!(rgb.dimensions(), (640, 640));
    }

    fn glyph_rgba(color: [u8; 3]) -> Array3<u8> {
        // 4x4 transparent canvas with an opaque 2x2 glyph in the middle.
        let mut arr = Array3::<u8>::zeros((4, 4, 4));
        for y in 1..3 {
            for x in 1..3 {
                arr[[y, x, 0]] = color[0];
                arr[[y, x, 1]] = color[1];
                arr[[y, x, 2]] = color[2];
                arr[[y, x, 3]] = 255;
            }
        }
        arr
    }

    #[test]
    fn test_transparent_dark_and_light_glyphs_end_up_dark_on_white() {
        for color in [[0, 0, 0], [255, 255, 255]] {
            let rgb = load_image_input(glyph_rgba(color), &cfg()).unwrap();
            assert_eq!(rgb.get_pixel(0, 0).0, [255, 255, 255], "glyph {color:?}");
            assert_eq!(rgb.get_pixel(1, 1).0, [0, 0, 0], "glyph {color:?}");
        }
    }

    #[test]
    fn test_alpha_background_is_configurable() {
        let config = LoaderConfig {
            alpha_background: [0, 128, 0],
        };
        let rgb = load_image_input(glyph_rgba([0, 0, 0]), &config).unwrap();
        assert_eq!(rgb.get_pixel(0, 0).0, [0, 128, 0]);
    }

    #[test]
    fn test_gray_alpha_composite() {
        let mut arr = Array3::<u8>::zeros((1, 2, 2));
        arr[[0, 0, 0]] = 40;
        arr[[0, 0, 1]] = 255;
        arr[[0, 1, 0]] = 40;
        arr[[0, 1, 1]] = 0;
        let rgb = load_image_input(arr, &cfg()).unwrap();
        assert_eq!(rgb.get_pixel(0, 0).0, [40, 40, 40]);
        assert_eq!(rgb.get_pixel(1, 0).0, [255, 255, 255]);
    }

    #[test]
    fn test_gray_alpha_partial_transparency_is_monotonic() {
        let mut arr = Array3::<u8>::zeros((1, 3, 2));
        arr[[0, 0, 0]] = 40;
        arr[[0, 0, 1]] = 200;
        arr[[0, 1, 0]] = 127;
        arr[[0, 1, 1]] = 128;
        arr[[0, 2, 0]] = 127;
        arr[[0, 2, 1]] = 127;
        let rgb = load_image_input(arr, &cfg()).unwrap();
        // 40 + (255 - 200) of white background.
        assert_eq!(rgb.get_pixel(0, 0).0, [95, 95, 95]);
        assert_eq!(rgb.get_pixel(1, 0).0, [254, 254, 254]);
        assert_eq!(rgb.get_pixel(2, 0).0, [255, 255, 255]);

        let mut ramp = Array3::<u8>::zeros((1, 256, 2));
        for a in 0..256 {
            ramp[[0, a, 0]] = 127;
            ramp[[0, a, 1]] = a as u8;
        }
        let rgb = load_image_input(ramp, &cfg()).unwrap();
        let values: Vec<u8> = (0..256).map(|x| rgb.get_pixel(x, 0)[0]).collect();
        assert!(values.windows(2).all(|w| w[1] <= w[0]));
        assert_eq!(values[255], 127);
    }

    #[test]
    fn test_encoded_png_roundtrip_through_bytes_and_path() {
        let mut img = RgbImage::new(5, 4);
        img.put_pixel(3, 2, Rgb([1, 2, 3]));
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(img.clone())
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();

        let decoded = load_image_input(bytes.clone(), &cfg()).unwrap();
        assert_eq!(decoded, img);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.png");
        std::fs::write(&path, &bytes).unwrap();
        let loaded = load_image_input(path.as_path(), &cfg()).unwrap();
        assert_eq!(loaded, img);
    }

    #[test]
    fn test_dynamic_rgba_goes_through_compositing() {
        let mut rgba = RgbaImage::new(2, 1);
        rgba.put_pixel(1, 0, image::Rgba([0, 0, 0, 255]));
        let rgb = load_image_input(DynamicImage::ImageRgba8(rgba), &cfg()).unwrap();
        assert_eq!(rgb.get_pixel(0, 0).0, [255, 255, 255]);
        assert_eq!(rgb.get_pixel(1, 0).0, [0, 0, 0]);
    }
}
