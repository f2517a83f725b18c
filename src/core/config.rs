//! Pipeline configuration.
//!
//! [`OCRConfig`] is the immutable configuration a pipeline is built with. It is
//! split into one section per stage, each with serde defaults, so a JSON file only
//! needs to name the values it changes. [`RunOptions`] carries the per-call
//! overrides accepted by [`crate::oarocr::OCRPipeline::run`].

use crate::core::constants::*;
use crate::core::errors::OCRError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// How the detection resize interprets `limit_side_len`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LimitType {
    /// Enlarge until the shorter side reaches the limit.
    #[default]
    Min,
    /// Shrink until the longer side fits the limit.
    Max,
}

/// How detection candidates are scored against the probability map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ScoreMode {
    /// Mean probability inside the candidate's minimum-area rectangle.
    #[default]
    Fast,
    /// Mean probability inside the raw contour polygon.
    Slow,
}

/// Stage toggles and thresholds shared by the whole pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    /// Minimum recognition score for a region to be reported.
    pub text_score: f32,
    /// Run the detection stage.
    pub use_det: bool,
    /// Run the orientation classification stage.
    pub use_cls: bool,
    /// Run the recognition stage.
    pub use_rec: bool,
    /// Derive per-word boxes from recognition output.
    pub return_word_box: bool,
    /// Images shorter than this are letterboxed before detection.
    pub min_height: u32,
    /// Images wider than `height * ratio` are letterboxed; `None` disables the rule.
    pub width_height_ratio: Option<f32>,
    /// Shorter side lower bound applied before anything else.
    pub min_side_len: u32,
    /// Longer side upper bound applied before anything else.
    pub max_side_len: u32,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            text_score: DEFAULT_TEXT_SCORE,
            use_det: true,
            use_cls: true,
            use_rec: true,
            return_word_box: false,
            min_height: DEFAULT_MIN_HEIGHT,
            width_height_ratio: Some(DEFAULT_WIDTH_HEIGHT_RATIO),
            min_side_len: DEFAULT_MIN_SIDE_LEN,
            max_side_len: DEFAULT_MAX_SIDE_LEN,
        }
    }
}

/// Configuration for the text detection stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetConfig {
    /// Side length targeted by the resize (default: 736)
    pub limit_side_len: u32,
    /// Which side `limit_side_len` applies to (default: min)
    pub limit_type: LimitType,
    /// Hard cap on either side of the model input (default: 4000)
    pub max_side_limit: u32,
    /// Binarization threshold for the probability map (default: 0.3)
    pub thresh: f32,
    /// Box threshold for filtering (default: 0.5)
    pub box_thresh: f32,
    /// Maximum candidates to consider (default: 1000)
    pub max_candidates: usize,
    /// Unclip ratio for expanding detected regions (default: 1.6)
    pub unclip_ratio: f32,
    /// Dilate the bitmap with a 2x2 kernel before contour extraction (default: true)
    pub use_dilation: bool,
    /// Scoring mode for candidates (default: fast)
    pub score_mode: ScoreMode,
}

impl Default for DetConfig {
    fn default() -> Self {
        Self {
            limit_side_len: DEFAULT_LIMIT_SIDE_LEN,
            limit_type: LimitType::Min,
            max_side_limit: DEFAULT_MAX_SIDE_LIMIT,
            thresh: DEFAULT_DET_THRESH,
            box_thresh: DEFAULT_BOX_THRESH,
            max_candidates: DEFAULT_MAX_CANDIDATES,
            unclip_ratio: DEFAULT_UNCLIP_RATIO,
            use_dilation: true,
            score_mode: ScoreMode::Fast,
        }
    }
}

/// Configuration for the orientation classification stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClsConfig {
    /// Model input shape as (channels, height, width).
    pub image_shape: [usize; 3],
    /// Crops per engine call.
    pub batch_num: usize,
    /// Minimum score for a "180" prediction to rotate the crop.
    pub thresh: f32,
    /// Label for each output column of the model.
    pub labels: Vec<String>,
}

impl Default for ClsConfig {
    fn default() -> Self {
        Self {
            image_shape: DEFAULT_CLS_IMAGE_SHAPE,
            batch_num: DEFAULT_CLS_BATCH_NUM,
            thresh: DEFAULT_CLS_THRESH,
            labels: DEFAULT_CLS_LABELS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Configuration for the text recognition stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecConfig {
    /// Model input shape as (channels, height, width); width is the minimum batch width.
    pub image_shape: [usize; 3],
    /// Crops per engine call.
    pub batch_num: usize,
    /// Upper bound on the padded input width.
    pub max_img_width: usize,
    /// Append a space character to the dictionary.
    pub use_space_char: bool,
}

impl Default for RecConfig {
    fn default() -> Self {
        Self {
            image_shape: DEFAULT_REC_IMAGE_SHAPE,
            batch_num: DEFAULT_REC_BATCH_NUM,
            max_img_width: DEFAULT_MAX_IMG_WIDTH,
            use_space_char: true,
        }
    }
}

/// Configuration for image ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Color that transparent pixels are composited onto.
    pub alpha_background: [u8; 3],
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            alpha_background: [255, 255, 255],
        }
    }
}

/// Configuration for word segmentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WordSegmentConfig {
    /// Column gap above which a run of non-CJK characters is split.
    pub max_col_gap: usize,
}

impl Default for WordSegmentConfig {
    fn default() -> Self {
        Self {
            max_col_gap: DEFAULT_MAX_COL_GAP,
        }
    }
}

/// Complete pipeline configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OCRConfig {
    /// Toggles and global thresholds.
    pub global: GlobalConfig,
    /// Detection settings.
    pub det: DetConfig,
    /// Classification settings.
    pub cls: ClsConfig,
    /// Recognition settings.
    pub rec: RecConfig,
    /// Ingestion settings.
    pub loader: LoaderConfig,
    /// Word segmentation settings.
    pub words: WordSegmentConfig,
}

impl OCRConfig {
    /// Parses a configuration from JSON and validates it.
    pub fn from_json_str(json: &str) -> Result<Self, OCRError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a JSON configuration file and validates it.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, OCRError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&content)
    }

    /// Checks that every value is usable.
    pub fn validate(&self) -> Result<(), OCRError> {
        check_unit("global.text_score", self.global.text_score)?;
        check_unit("det.thresh", self.det.thresh)?;
        check_unit("det.box_thresh", self.det.box_thresh)?;
        check_unit("cls.thresh", self.cls.thresh)?;

        if let Some(ratio) = self.global.width_height_ratio
            && !(ratio > 0.0 && ratio.is_finite())
        {
            return Err(OCRError::config_error_with_context(
                "global.width_height_ratio",
                &ratio.to_string(),
                "must be a positive finite number",
            ));
        }
        if self.global.min_side_len > self.global.max_side_len {
            return Err(OCRError::config_error_with_context(
                "global.min_side_len",
                &self.global.min_side_len.to_string(),
                "must not exceed global.max_side_len",
            ));
        }
        if self.det.limit_side_len == 0 || self.det.max_side_limit == 0 {
            return Err(OCRError::config_error(
                "det.limit_side_len and det.max_side_limit must be positive",
            ));
        }
        if !(self.det.unclip_ratio > 0.0 && self.det.unclip_ratio.is_finite()) {
            return Err(OCRError::config_error_with_context(
                "det.unclip_ratio",
                &self.det.unclip_ratio.to_string(),
                "must be a positive finite number",
            ));
        }
        if self.cls.labels.is_empty() {
            return Err(OCRError::config_error("cls.labels must not be empty"));
        }
        for (name, shape) in [("cls", self.cls.image_shape), ("rec", self.rec.image_shape)] {
            if shape[0] != 3 || shape[1] == 0 || shape[2] == 0 {
                return Err(OCRError::config_error_with_context(
                    &format!("{name}.image_shape"),
                    &format!("{shape:?}"),
                    "expected [3, height > 0, width > 0]",
                ));
            }
        }
        if self.rec.max_img_width < self.rec.image_shape[2] {
            return Err(OCRError::config_error_with_context(
                "rec.max_img_width",
                &self.rec.max_img_width.to_string(),
                "must be at least rec.image_shape width",
            ));
        }
        Ok(())
    }
}

fn check_unit(field: &str, value: f32) -> Result<(), OCRError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(OCRError::config_error_with_context(
            field,
            &value.to_string(),
            "must be within [0, 1]",
        ))
    }
}

/// Settings for ONNX Runtime sessions created by the pipeline builder.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrtSessionConfig {
    /// Number of threads used to parallelize execution within nodes
    pub intra_threads: Option<usize>,
    /// Number of threads used to parallelize execution across nodes
    pub inter_threads: Option<usize>,
    /// Number of sessions kept per model for concurrent calls
    pub session_pool_size: Option<usize>,
}

impl OrtSessionConfig {
    /// Creates a new OrtSessionConfig with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of intra-op threads.
    pub fn with_intra_threads(mut self, threads: usize) -> Self {
        self.intra_threads = Some(threads);
        self
    }

    /// Sets the number of inter-op threads.
    pub fn with_inter_threads(mut self, threads: usize) -> Self {
        self.inter_threads = Some(threads);
        self
    }

    /// Sets how many sessions are pooled per model.
    pub fn with_session_pool_size(mut self, size: usize) -> Self {
        self.session_pool_size = Some(size);
        self
    }
}

/// Per-call overrides. Unset fields fall back to the pipeline's [`OCRConfig`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunOptions {
    /// Override for `global.use_det`.
    pub use_det: Option<bool>,
    /// Override for `global.use_cls`.
    pub use_cls: Option<bool>,
    /// Override for `global.use_rec`.
    pub use_rec: Option<bool>,
    /// Override for `global.text_score`.
    pub text_score: Option<f32>,
    /// Override for `global.return_word_box`.
    pub return_word_box: Option<bool>,
    /// Override for `det.box_thresh`.
    pub box_thresh: Option<f32>,
    /// Override for `det.unclip_ratio`.
    pub unclip_ratio: Option<f32>,
}

impl RunOptions {
    /// Creates options that change nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables or disables detection for this call.
    pub fn use_det(mut self, enable: bool) -> Self {
        self.use_det = Some(enable);
        self
    }

    /// Enables or disables orientation classification for this call.
    pub fn use_cls(mut self, enable: bool) -> Self {
        self.use_cls = Some(enable);
        self
    }

    /// Enables or disables recognition for this call.
    pub fn use_rec(mut self, enable: bool) -> Self {
        self.use_rec = Some(enable);
        self
    }

    /// Sets the recognition score threshold for this call.
    pub fn text_score(mut self, score: f32) -> Self {
        self.text_score = Some(score);
        self
    }

    /// Requests word boxes for this call.
    pub fn return_word_box(mut self, enable: bool) -> Self {
        self.return_word_box = Some(enable);
        self
    }

    /// Sets the detection box threshold for this call.
    pub fn box_thresh(mut self, thresh: f32) -> Self {
        self.box_thresh = Some(thresh);
        self
    }

    /// Sets the detection unclip ratio for this call.
    pub fn unclip_ratio(mut self, ratio: f32) -> Self {
        self.unclip_ratio = Some(ratio);
        self
    }

    /// Merges these overrides onto a configuration.
    pub fn resolve(&self, config: &OCRConfig) -> Result<ResolvedOptions, OCRError> {
        let resolved = ResolvedOptions {
            use_det: self.use_det.unwrap_or(config.global.use_det),
            use_cls: self.use_cls.unwrap_or(config.global.use_cls),
            use_rec: self.use_rec.unwrap_or(config.global.use_rec),
            text_score: self.text_score.unwrap_or(config.global.text_score),
            return_word_box: self.return_word_box.unwrap_or(config.global.return_word_box),
            box_thresh: self.box_thresh.unwrap_or(config.det.box_thresh),
            unclip_ratio: self.unclip_ratio.unwrap_or(config.det.unclip_ratio),
        };
        check_unit("text_score", resolved.text_score)?;
        check_unit("box_thresh", resolved.box_thresh)?;
        if !(resolved.unclip_ratio > 0.0 && resolved.unclip_ratio.is_finite()) {
            return Err(OCRError::config_error_with_context(
                "unclip_ratio",
                &resolved.unclip_ratio.to_string(),
                "must be a positive finite number",
            ));
        }
        Ok(resolved)
    }
}

/// The effective settings of one pipeline call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedOptions {
    pub use_det: bool,
    pub use_cls: bool,
    pub use_rec: bool,
    pub text_score: f32,
    pub return_word_box: bool,
    pub box_thresh: f32,
    pub unclip_ratio: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = OCRConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.global.text_score, 0.5);
        assert_eq!(config.det.limit_side_len, 736);
        assert_eq!(config.cls.labels, vec!["0".to_string(), "180".to_string()]);
        assert_eq!(config.rec.image_shape, [3, 48, 320]);
        assert_eq!(config.loader.alpha_background, [255, 255, 255]);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = OCRConfig::from_json_str(
            r#"{"global": {"text_score": 0.7, "width_height_ratio": null}, "det": {"limit_type": "max"}}"#,
        )
        .unwrap();
        assert_eq!(config.global.text_score, 0.7);
        assert_eq!(config.global.width_height_ratio, None);
        assert!(config.global.use_det);
        assert_eq!(config.det.limit_type, LimitType::Max);
        assert_eq!(config.det.unclip_ratio, 1.6);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = OCRConfig::from_json_str(r#"{"global": {"text_score": 1.5}}"#).unwrap_err();
        assert!(matches!(err, OCRError::ConfigError { .. }));

        let mut config = OCRConfig::default();
        config.cls.labels.clear();
        assert!(config.validate().is_err());

        let mut config = OCRConfig::default();
        config.rec.image_shape = [1, 48, 320];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_malformed_json_is_json_error() {
        let err = OCRConfig::from_json_str("{not json").unwrap_err();
        assert!(matches!(err, OCRError::Json(_)));
    }

    #[test]
    fn test_run_options_override() {
        let config = OCRConfig::default();
        let resolved = RunOptions::new()
            .use_det(false)
            .text_score(1.0)
            .return_word_box(true)
            .resolve(&config)
            .unwrap();
        assert!(!resolved.use_det);
        assert!(resolved.use_cls);
        assert!(resolved.use_rec);
        assert_eq!(resolved.text_score, 1.0);
        assert!(resolved.return_word_box);
        assert_eq!(resolved.box_thresh, config.det.box_thresh);
    }

    #[test]
    fn test_run_options_rejects_bad_threshold() {
        let config = OCRConfig::default();
        assert!(RunOptions::new().text_score(-0.1).resolve(&config).is_err());
        assert!(RunOptions::new().unclip_ratio(0.0).resolve(&config).is_err());
    }
}
