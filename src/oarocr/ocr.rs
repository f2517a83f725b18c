//! High-level OCR pipeline API.
//!
//! [`OCRPipelineBuilder`] wires inference engines (or ONNX model paths) and a
//! character dictionary into an [`OCRPipeline`]. A pipeline is immutable once
//! built; every [`OCRPipeline::run`] call takes its own [`RunOptions`], so one
//! pipeline can serve concurrent callers with different settings.

use crate::core::config::{OCRConfig, OrtSessionConfig, ResolvedOptions, RunOptions};
use crate::core::constants::DEFAULT_PARALLEL_THRESHOLD;
use crate::core::{InferenceEngine, OCRError};
use crate::oarocr::preprocess::{OpRecord, maybe_add_letterbox, resize_within_bounds};
use crate::oarocr::result::{Elapse, OCROutput};
use crate::oarocr::word_boxes::segment_words;
use crate::predictor::{RecognitionOutput, TextClassifier, TextDetector, TextRecognizer};
use crate::processors::Quad;
use crate::utils::{
    ImageInput, PerspectiveMap, load_image_input, read_character_dict, rotate_crop_with_map,
};
use image::RgbImage;
use rayon::prelude::*;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, trace};

/// Working record of one region during a pipeline call.
#[derive(Debug)]
pub(crate) struct TextRegion {
    quad: Quad,
    map: PerspectiveMap,
    crop_size: (u32, u32),
    cls: Option<(String, f32)>,
    rec: Option<RecognitionOutput>,
}

impl TextRegion {
    fn new(quad: Quad, map: PerspectiveMap, crop: &RgbImage) -> Self {
        Self {
            quad,
            map,
            crop_size: crop.dimensions(),
            cls: None,
            rec: None,
        }
    }
}

/// Builder for [`OCRPipeline`].
///
/// Every stage takes either a ready [`InferenceEngine`] or, with the
/// `ort-backend` feature, a model path. Stages without an engine can still be
/// built; running them fails with a configuration error.
///
/// # Example
///
/// ```no_run
/// use rapid_ocr::oarocr::OCRPipelineBuilder;
/// use rapid_ocr::core::RunOptions;
///
/// let ocr = OCRPipelineBuilder::new()
///     .det_model("models/det.onnx")
///     .cls_model("models/cls.onnx")
///     .rec_model("models/rec.onnx")
///     .character_dict_path("models/dict.txt")
///     .build()?;
/// let output = ocr.run("page.png", &RunOptions::new())?;
/// for item in output.iter() {
///     println!("{:?}", item.text);
/// }
/// # Ok::<(), rapid_ocr::core::OCRError>(())
/// ```
#[derive(Debug, Default)]
pub struct OCRPipelineBuilder {
    config: OCRConfig,

    det_engine: Option<Arc<dyn InferenceEngine>>,
    cls_engine: Option<Arc<dyn InferenceEngine>>,
    rec_engine: Option<Arc<dyn InferenceEngine>>,

    det_model: Option<PathBuf>,
    cls_model: Option<PathBuf>,
    rec_model: Option<PathBuf>,
    ort_session_config: Option<OrtSessionConfig>,

    character_dict: Option<Vec<String>>,
    character_dict_path: Option<PathBuf>,
}

impl OCRPipelineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the pipeline configuration.
    pub fn config(mut self, config: OCRConfig) -> Self {
        self.config = config;
        self
    }

    /// Uses `engine` for text detection.
    pub fn det_engine(mut self, engine: impl InferenceEngine + 'static) -> Self {
        self.det_engine = Some(Arc::new(engine));
        self
    }

    /// Uses `engine` for orientation classification.
    pub fn cls_engine(mut self, engine: impl InferenceEngine + 'static) -> Self {
        self.cls_engine = Some(Arc::new(engine));
        self
    }

    /// Uses `engine` for text recognition.
    pub fn rec_engine(mut self, engine: impl InferenceEngine + 'static) -> Self {
        self.rec_engine = Some(Arc::new(engine));
        self
    }

    /// Loads the detection model from an ONNX file.
    pub fn det_model(mut self, path: impl Into<PathBuf>) -> Self {
        self.det_model = Some(path.into());
        self
    }

    /// Loads the classification model from an ONNX file.
    pub fn cls_model(mut self, path: impl Into<PathBuf>) -> Self {
        self.cls_model = Some(path.into());
        self
    }

    /// Loads the recognition model from an ONNX file.
    pub fn rec_model(mut self, path: impl Into<PathBuf>) -> Self {
        self.rec_model = Some(path.into());
        self
    }

    /// Sets the ONNX Runtime session configuration.
    ///
    /// This configuration will be applied to all models loaded from paths.
    pub fn ort_session(mut self, config: OrtSessionConfig) -> Self {
        self.ort_session_config = Some(config);
        self
    }

    /// Sets the recognition dictionary, one entry per class after the blank.
    pub fn character_dict(mut self, dict: Vec<String>) -> Self {
        self.character_dict = Some(dict);
        self
    }

    /// Reads the recognition dictionary from a file, one entry per line.
    pub fn character_dict_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.character_dict_path = Some(path.into());
        self
    }

    fn resolve_engine(
        &self,
        engine: Option<Arc<dyn InferenceEngine>>,
        model: Option<&PathBuf>,
        stage: &str,
    ) -> Result<Option<Arc<dyn InferenceEngine>>, OCRError> {
        if engine.is_some() {
            return Ok(engine);
        }
        let Some(path) = model else {
            return Ok(None);
        };

        #[cfg(feature = "ort-backend")]
        {
            let config = self.ort_session_config.clone().unwrap_or_default();
            let engine = crate::core::OrtInfer::from_config(&config, path)?;
            debug!("Loaded {} model from {}", stage, path.display());
            Ok(Some(Arc::new(engine)))
        }

        #[cfg(not(feature = "ort-backend"))]
        {
            Err(OCRError::config_error(format!(
                "cannot load {} model '{}': built without the ort-backend feature",
                stage,
                path.display()
            )))
        }
    }

    /// Builds the pipeline.
    ///
    /// # Errors
    ///
    /// Fails if the configuration is invalid, a model cannot be loaded, or a
    /// recognition engine is given without a character dictionary.
    pub fn build(mut self) -> Result<OCRPipeline, OCRError> {
        self.config.validate()?;

        let det_engine = self.det_engine.take();
        let cls_engine = self.cls_engine.take();
        let rec_engine = self.rec_engine.take();
        let det = self.resolve_engine(det_engine, self.det_model.as_ref(), "detection")?;
        let cls = self.resolve_engine(cls_engine, self.cls_model.as_ref(), "classification")?;
        let rec = self.resolve_engine(rec_engine, self.rec_model.as_ref(), "recognition")?;

        let recognizer = match rec {
            Some(engine) => {
                let dict = match (self.character_dict.take(), &self.character_dict_path) {
                    (Some(dict), _) => dict,
                    (None, Some(path)) => read_character_dict(path)?,
                    (None, None) => {
                        return Err(OCRError::config_error(
                            "a recognition engine needs a character dictionary",
                        ));
                    }
                };
                Some(TextRecognizer::new(engine, &self.config.rec, &dict))
            }
            None => None,
        };

        let pipeline = OCRPipeline {
            detector: det.map(|e| TextDetector::new(e, &self.config.det)),
            classifier: cls.map(|e| TextClassifier::new(e, &self.config.cls)),
            recognizer,
            config: self.config,
        };
        info!(
            "OCR pipeline ready: det={}, cls={}, rec={}",
            pipeline.detector.is_some(),
            pipeline.classifier.is_some(),
            pipeline.recognizer.is_some()
        );
        Ok(pipeline)
    }
}

/// Detection, orientation classification and recognition over one image.
#[derive(Debug, Clone)]
pub struct OCRPipeline {
    config: OCRConfig,
    detector: Option<TextDetector>,
    classifier: Option<TextClassifier>,
    recognizer: Option<TextRecognizer>,
}

fn enabled_stage<'a, T>(
    enabled: bool,
    slot: &'a Option<T>,
    stage: &str,
) -> Result<Option<&'a T>, OCRError> {
    if !enabled {
        return Ok(None);
    }
    slot.as_ref().map(Some).ok_or_else(|| OCRError::missing_engine(stage))
}

impl OCRPipeline {
    pub fn builder() -> OCRPipelineBuilder {
        OCRPipelineBuilder::new()
    }

    /// The configuration the pipeline was built with.
    pub fn config(&self) -> &OCRConfig {
        &self.config
    }

    /// Runs OCR on one image.
    ///
    /// Stages run in the fixed order detection, classification, recognition.
    /// Without detection the whole image is a single region. Regions whose
    /// recognized text is empty or scores below `text_score` are dropped;
    /// remaining boxes are mapped back to the input image's coordinates.
    ///
    /// # Errors
    ///
    /// Fails with [`OCRError::LoadImage`] for unusable input, with a
    /// configuration error when an enabled stage has no engine, and with the
    /// engine's error if inference fails.
    pub fn run(
        &self,
        input: impl Into<ImageInput>,
        options: &RunOptions,
    ) -> Result<OCROutput, OCRError> {
        let opts = options.resolve(&self.config)?;
        let detector = enabled_stage(opts.use_det, &self.detector, "detection")?;
        let classifier = enabled_stage(opts.use_cls, &self.classifier, "classification")?;
        let recognizer = enabled_stage(opts.use_rec, &self.recognizer, "recognition")?;

        let image = load_image_input(input, &self.config.loader)?;
        let (raw_w, raw_h) = image.dimensions();
        let global = &self.config.global;
        let mut record = OpRecord::new(raw_w, raw_h);
        let image =
            resize_within_bounds(image, global.min_side_len, global.max_side_len, &mut record)?;

        let mut elapse = Elapse::default();

        let (image, quads) = match detector {
            Some(detector) => {
                let image = maybe_add_letterbox(
                    image,
                    global.width_height_ratio,
                    global.min_height,
                    &mut record,
                );
                let start = Instant::now();
                let detection = detector.detect(&image, opts.box_thresh, opts.unclip_ratio)?;
                elapse.det = start.elapsed().as_secs_f64();
                debug!("Detection took {:.3}s", elapse.det);

                if detection.is_empty() {
                    debug!("No text regions detected");
                    return Ok(OCROutput {
                        elapse,
                        ..OCROutput::default()
                    });
                }
                (image, detection.boxes)
            }
            None => {
                let (w, h) = image.dimensions();
                (image, vec![Quad::from_rect(0.0, 0.0, w as f32, h as f32)])
            }
        };

        if classifier.is_none() && recognizer.is_none() {
            return Ok(OCROutput {
                boxes: Some(record.restore_points(&quads)),
                elapse,
                ..OCROutput::default()
            });
        }

        let (mut regions, mut crops) = if opts.use_det {
            Self::crop_regions(&image, quads)?
        } else {
            let (w, h) = image.dimensions();
            let region = TextRegion::new(quads[0], PerspectiveMap::identity(w, h), &image);
            (vec![region], vec![image])
        };

        if let Some(classifier) = classifier {
            let start = Instant::now();
            let results = classifier.classify(&mut crops)?;
            elapse.cls = start.elapsed().as_secs_f64();
            debug!("Classification took {:.3}s", elapse.cls);

            for (region, (label, score)) in regions.iter_mut().zip(results) {
                if classifier.rotates(&label, score) {
                    region.map = region.map.rotated_180();
                }
                region.cls = Some((label, score));
            }
        }

        if let Some(recognizer) = recognizer {
            let start = Instant::now();
            let results = recognizer.recognize(&crops)?;
            elapse.rec = start.elapsed().as_secs_f64();
            debug!("Recognition took {:.3}s", elapse.rec);

            for (region, rec) in regions.iter_mut().zip(results) {
                region.rec = Some(rec);
            }
            Self::filter_by_score(&mut regions, opts.text_score);
        }

        if regions.is_empty() {
            return Ok(OCROutput {
                elapse,
                ..OCROutput::default()
            });
        }

        Ok(self.assemble(regions, &record, &opts, elapse))
    }

    /// Crops every detected quad, dropping degenerate ones.
    fn crop_regions(
        image: &RgbImage,
        quads: Vec<Quad>,
    ) -> Result<(Vec<TextRegion>, Vec<RgbImage>), OCRError> {
        let crops = if quads.len() > DEFAULT_PARALLEL_THRESHOLD {
            quads
                .par_iter()
                .map(|quad| rotate_crop_with_map(image, quad))
                .collect::<Result<Vec<_>, _>>()?
        } else {
            quads
                .iter()
                .map(|quad| rotate_crop_with_map(image, quad))
                .collect::<Result<Vec<_>, _>>()?
        };

        let mut regions = Vec::with_capacity(quads.len());
        let mut images = Vec::with_capacity(quads.len());
        for (quad, crop) in quads.into_iter().zip(crops) {
            match crop {
                Some(crop) => {
                    regions.push(TextRegion::new(quad, crop.map, &crop.image));
                    images.push(crop.image);
                }
                None => trace!("dropping region without a usable crop: {:?}", quad.to_coords()),
            }
        }
        Ok((regions, images))
    }

    fn filter_by_score(regions: &mut Vec<TextRegion>, text_score: f32) {
        let before = regions.len();
        regions.retain(|region| {
            region
                .rec
                .as_ref()
                .is_some_and(|rec| !rec.text.is_empty() && rec.score >= text_score)
        });
        debug!(
            "Kept {} of {} regions at text_score {}",
            regions.len(),
            before,
            text_score
        );
    }

    fn assemble(
        &self,
        regions: Vec<TextRegion>,
        record: &OpRecord,
        opts: &ResolvedOptions,
        elapse: Elapse,
    ) -> OCROutput {
        let with_rec = opts.use_rec;
        let mut boxes = Vec::with_capacity(regions.len());
        let mut txts = Vec::with_capacity(regions.len());
        let mut scores = Vec::with_capacity(regions.len());
        let mut cls_res = Vec::with_capacity(regions.len());
        let mut words = Vec::new();

        for region in regions {
            boxes.push(record.restore_quad(&region.quad));
            if let Some(cls) = region.cls {
                cls_res.push(cls);
            }
            if let Some(rec) = region.rec {
                if opts.return_word_box {
                    let (crop_w, crop_h) = region.crop_size;
                    let segmented =
                        segment_words(&rec, crop_w, crop_h, &region.map, &self.config.words);
                    words.extend(
                        segmented
                            .into_iter()
                            .map(|w| (w.text, w.score, record.restore_quad(&w.quad))),
                    );
                }
                scores.push(rec.score);
                txts.push(rec.text);
            }
        }

        OCROutput {
            boxes: opts.use_det.then_some(boxes),
            txts: with_rec.then_some(txts),
            scores: with_rec.then_some(scores),
            cls_res: opts.use_cls.then_some(cls_res),
            word_results: (with_rec && opts.return_word_box).then_some(words),
            elapse,
        }
    }
}

#[cfg(test)]
#[path = "ocr_tests.rs"]
mod ocr_tests;
