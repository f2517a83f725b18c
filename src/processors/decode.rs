//! CTC decoding of recognition model output.
//!
//! The recognition model emits, for every sample, a `T x C` matrix of class
//! probabilities over `T` horizontal columns. [`CTCLabelDecode`] takes the best
//! class per column, collapses repeats, drops the blank class and keeps, for
//! each surviving character, its probability and the column it came from.

use ndarray::ArrayView3;

/// One decoded text line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedText {
    /// The recognized characters.
    pub text: String,
    /// Probability of each character, aligned with `text.chars()`.
    pub char_scores: Vec<f32>,
    /// Output column each character was read from, aligned with `text.chars()`.
    pub char_cols: Vec<usize>,
    /// Number of columns in the model output.
    pub seq_len: usize,
}

impl DecodedText {
    /// Mean character probability; 0 for empty text.
    pub fn score(&self) -> f32 {
        if self.char_scores.is_empty() {
            0.0
        } else {
            self.char_scores.iter().sum::<f32>() / self.char_scores.len() as f32
        }
    }
}

/// A decoder for CTC (Connectionist Temporal Classification) based text recognition models.
///
/// Class 0 is the blank; class `i > 0` maps to the `i - 1`th dictionary entry.
pub struct CTCLabelDecode {
    character: Vec<char>,
}

impl std::fmt::Debug for CTCLabelDecode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CTCLabelDecode")
            .field("character_count", &self.character.len())
            .finish()
    }
}

impl CTCLabelDecode {
    /// Creates a decoder from dictionary entries.
    ///
    /// Only the first character of each entry is used; empty entries are
    /// skipped. A space is appended when `use_space_char` is set.
    pub fn from_string_list(character_list: &[String], use_space_char: bool) -> Self {
        // Null char for blank, so it never collides with a real space.
        let mut character = vec!['\0'];
        character.extend(character_list.iter().filter_map(|s| s.chars().next()));
        if use_space_char {
            character.push(' ');
        }
        Self { character }
    }

    /// Number of classes including the blank.
    pub fn num_classes(&self) -> usize {
        self.character.len()
    }

    /// Decodes one sample from its per-column best classes and probabilities.
    pub fn decode(&self, indices: &[usize], probs: &[f32]) -> DecodedText {
        let mut decoded = DecodedText {
            seq_len: indices.len(),
            ..Default::default()
        };

        for (col, (&idx, &prob)) in indices.iter().zip(probs).enumerate() {
            if idx == 0 || (col > 0 && indices[col - 1] == idx) {
                continue;
            }
            if let Some(&ch) = self.character.get(idx) {
                decoded.text.push(ch);
                decoded.char_scores.push(prob);
                decoded.char_cols.push(col);
            }
        }

        decoded
    }

    /// Decodes a `N x T x C` probability tensor, one result per sample.
    pub fn apply(&self, pred: &ArrayView3<f32>) -> Vec<DecodedText> {
        pred.outer_iter()
            .map(|sample| {
                let (indices, probs): (Vec<usize>, Vec<f32>) = sample
                    .outer_iter()
                    .map(|row| {
                        row.iter()
                            .enumerate()
                            .max_by(|(_, a), (_, b)| {
                                a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal)
                            })
                            .map(|(idx, &prob)| (idx, prob))
                            .unwrap_or((0, 0.0))
                    })
                    .unzip();
                self.decode(&indices, &probs)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    fn decoder() -> CTCLabelDecode {
        let chars: Vec<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
        CTCLabelDecode::from_string_list(&chars, true)
    }

    #[test]
    fn test_classes_include_blank_and_space() {
        assert_eq!(decoder().num_classes(), 5);
    }

    #[test]
    fn test_decode_collapses_repeats_and_blanks() {
        let decoded = decoder().decode(&[1, 1, 0, 1, 2, 2, 4, 3], &[0.9, 0.8, 0.99, 0.7, 0.6, 0.5, 0.95, 0.4]);
        assert_eq!(decoded.text, "aab c");
        assert_eq!(decoded.char_cols, vec![0, 3, 4, 6, 7]);
        assert_eq!(decoded.char_scores, vec![0.9, 0.7, 0.6, 0.95, 0.4]);
        assert_eq!(decoded.seq_len, 8);
        assert!((decoded.score() - 0.71).abs() < 1e-5);
    }

    #[test]
    fn test_all_blank_is_empty_with_zero_score() {
        let decoded = decoder().decode(&[0, 0, 0], &[0.9, 0.9, 0.9]);
        assert!(decoded.text.is_empty());
        assert_eq!(decoded.score(), 0.0);
    }

    #[test]
    fn test_apply_takes_argmax_per_column() {
        let mut pred = Array3::<f32>::zeros((1, 3, 5));
        pred[[0, 0, 2]] = 0.8;
        pred[[0, 1, 0]] = 0.9;
        pred[[0, 2, 3]] = 0.6;
        let decoded = decoder().apply(&pred.view());
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].text, "bc");
        assert_eq!(decoded[0].char_cols, vec![0, 2]);
    }

    #[test]
    fn test_out_of_range_class_is_skipped() {
        let decoded = decoder().decode(&[9, 1], &[0.9, 0.8]);
        assert_eq!(decoded.text, "a");
        assert_eq!(decoded.char_scores.len(), 1);
    }
}
