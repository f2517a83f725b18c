//! Utility functions for the OCR pipeline.
//!
//! This module provides image ingestion, perspective cropping and character
//! dictionary loading.

pub mod dict;
pub mod image;
pub mod transform;

pub use dict::{parse_character_dict, read_character_dict};
pub use image::{ImageInput, dynamic_to_rgb, load_image, load_image_input};
pub use transform::{PerspectiveMap, RegionCrop, get_rotate_crop_image, rotate_crop_with_map};
