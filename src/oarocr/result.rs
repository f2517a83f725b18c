//! Results of one OCR pipeline call.

use crate::core::OCRError;
use crate::processors::Quad;
use serde::Serialize;

/// Wall-clock time spent in each stage, in seconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Elapse {
    pub det: f64,
    pub cls: f64,
    pub rec: f64,
}

impl Elapse {
    /// Sum of all stages.
    pub fn total(&self) -> f64 {
        self.det + self.cls + self.rec
    }
}

/// Output of [`OCRPipeline::run`](crate::oarocr::OCRPipeline::run).
///
/// Each field is `None` when its stage did not run or nothing survived
/// filtering. Present fields are aligned: entry `i` of `boxes`, `txts`,
/// `scores` and `cls_res` describes the same region.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OCROutput {
    /// Region quads in original-image coordinates, in reading order.
    pub boxes: Option<Vec<Quad>>,
    /// Recognized text per region.
    pub txts: Option<Vec<String>>,
    /// Recognition score per region.
    pub scores: Option<Vec<f32>>,
    /// Orientation label and score per region.
    pub cls_res: Option<Vec<(String, f32)>>,
    /// Word text, score and quad, flattened across regions in region order.
    pub word_results: Option<Vec<(String, f32, Quad)>>,
    /// Time spent per stage.
    pub elapse: Elapse,
}

/// A view of one entry of an [`OCROutput`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OCRItem<'a> {
    pub quad: Option<&'a Quad>,
    pub text: Option<&'a str>,
    pub score: Option<f32>,
    pub cls: Option<(&'a str, f32)>,
}

impl OCROutput {
    /// Number of entries of the most downstream stage that produced output.
    pub fn len(&self) -> usize {
        if let Some(txts) = &self.txts {
            txts.len()
        } else if let Some(cls) = &self.cls_res {
            cls.len()
        } else if let Some(boxes) = &self.boxes {
            boxes.len()
        } else {
            0
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns entry `index`, or `None` past the end.
    pub fn get(&self, index: usize) -> Option<OCRItem<'_>> {
        if index >= self.len() {
            return None;
        }
        Some(OCRItem {
            quad: self.boxes.as_ref().and_then(|b| b.get(index)),
            text: self
                .txts
                .as_ref()
                .and_then(|t| t.get(index))
                .map(String::as_str),
            score: self.scores.as_ref().and_then(|s| s.get(index)).copied(),
            cls: self
                .cls_res
                .as_ref()
                .and_then(|c| c.get(index))
                .map(|(label, score)| (label.as_str(), *score)),
        })
    }

    /// Iterates entries in reading order.
    pub fn iter(&self) -> impl Iterator<Item = OCRItem<'_>> {
        (0..self.len()).filter_map(|i| self.get(i))
    }

    /// Serializes the output as JSON.
    pub fn to_json(&self) -> Result<String, OCRError> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> OCROutput {
        OCROutput {
            boxes: Some(vec![
                Quad::from_rect(0.0, 0.0, 10.0, 5.0),
                Quad::from_rect(0.0, 10.0, 10.0, 15.0),
            ]),
            txts: Some(vec!["ab".to_string(), "cd".to_string()]),
            scores: Some(vec![0.9, 0.8]),
            cls_res: None,
            word_results: None,
            elapse: Elapse {
                det: 0.5,
                cls: 0.0,
                rec: 0.25,
            },
        }
    }

    #[test]
    fn test_len_follows_most_downstream_stage() {
        assert_eq!(OCROutput::default().len(), 0);
        assert!(OCROutput::default().is_empty());

        let det_only = OCROutput {
            boxes: Some(vec![Quad::from_rect(0.0, 0.0, 1.0, 1.0); 3]),
            ..OCROutput::default()
        };
        assert_eq!(det_only.len(), 3);

        let cls = OCROutput {
            cls_res: Some(vec![("0".to_string(), 0.99)]),
            ..det_only.clone()
        };
        assert_eq!(cls.len(), 1);

        assert_eq!(sample().len(), 2);
    }

    #[test]
    fn test_items() {
        let output = sample();
        let item = output.get(1).unwrap();
        assert_eq!(item.text, Some("cd"));
        assert_eq!(item.score, Some(0.8));
        assert_eq!(item.cls, None);
        assert!(output.get(2).is_none());

        let texts: Vec<&str> = output.iter().filter_map(|i| i.text).collect();
        assert_eq!(texts, vec!["ab", "cd"]);
        assert!((output.elapse.total() - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_to_json() {
        let json = sample().to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["txts"][1], "cd");
        assert!(value["cls_res"].is_null());
        assert_eq!(value["boxes"].as_array().unwrap().len(), 2);
    }
}
