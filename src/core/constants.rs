//! Constants used throughout the OCR pipeline.

/// Minimum recognition score for a region to be kept.
pub const DEFAULT_TEXT_SCORE: f32 = 0.5;

/// Images shorter than this are letterboxed before detection.
pub const DEFAULT_MIN_HEIGHT: u32 = 30;

/// Images wider than `height * ratio` are letterboxed before detection.
pub const DEFAULT_WIDTH_HEIGHT_RATIO: f32 = 8.0;

/// Shorter side lower bound applied before detection.
pub const DEFAULT_MIN_SIDE_LEN: u32 = 30;

/// Longer side upper bound applied before detection.
pub const DEFAULT_MAX_SIDE_LEN: u32 = 2000;

/// Side length targeted by the detection resize.
pub const DEFAULT_LIMIT_SIDE_LEN: u32 = 736;

/// Hard cap on either side of the detection input.
pub const DEFAULT_MAX_SIDE_LIMIT: u32 = 4000;

/// Probability threshold used to binarize the detection map.
pub const DEFAULT_DET_THRESH: f32 = 0.3;

/// Minimum mean probability inside a candidate box.
pub const DEFAULT_BOX_THRESH: f32 = 0.5;

/// Maximum number of contours examined per image.
pub const DEFAULT_MAX_CANDIDATES: usize = 1000;

/// Expansion ratio applied to shrunk detection boxes.
pub const DEFAULT_UNCLIP_RATIO: f32 = 1.6;

/// Minimum short side of a candidate box in detection-map pixels.
pub const DEFAULT_DB_MIN_SIZE: f32 = 3.0;

/// Boxes whose top edges differ by less than this are treated as one text row.
pub const DEFAULT_SAME_ROW_TOLERANCE: f32 = 10.0;

/// Boxes whose width or height does not exceed this are discarded.
pub const DEFAULT_MIN_BOX_SIDE: f32 = 3.0;

/// Default classification image shape (channels, height, width).
pub const DEFAULT_CLS_IMAGE_SHAPE: [usize; 3] = [3, 48, 192];

/// Default classification batch size.
pub const DEFAULT_CLS_BATCH_NUM: usize = 6;

/// Orientation labels emitted by the classifier.
pub const DEFAULT_CLS_LABELS: [&str; 2] = ["0", "180"];

/// Minimum score for a "180" prediction to rotate a crop.
pub const DEFAULT_CLS_THRESH: f32 = 0.9;

/// Default recognition image shape (channels, height, width).
pub const DEFAULT_REC_IMAGE_SHAPE: [usize; 3] = [3, 48, 320];

/// Default recognition batch size.
pub const DEFAULT_REC_BATCH_NUM: usize = 6;

/// Default maximum recognition input width.
pub const DEFAULT_MAX_IMG_WIDTH: usize = 3200;

/// Crops whose height/width ratio reaches this are treated as vertical lines.
pub const DEFAULT_VERTICAL_RATIO: f32 = 1.5;

/// CTC column gap above which a non-CJK run is split into two words.
pub const DEFAULT_MAX_COL_GAP: usize = 4;

/// Number of crops above which per-region work is dispatched to rayon.
pub const DEFAULT_PARALLEL_THRESHOLD: usize = 4;
