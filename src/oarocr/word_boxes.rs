//! Word-level boxes derived from CTC column positions.
//!
//! The recognizer reports, for every character, the output column it was read
//! from. Columns are evenly spaced across the padded model input, so the part
//! of the crop a character occupies follows from its column and the number of
//! columns covering the crop itself.

use crate::core::config::WordSegmentConfig;
use crate::predictor::RecognitionOutput;
use crate::processors::{Point, Quad, order_points_clockwise};
use crate::utils::PerspectiveMap;
use serde::Serialize;
use std::ops::Range;

/// A word (or single CJK character) of a recognized line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WordBox {
    /// The word text.
    pub text: String,
    /// Mean confidence of the word's characters.
    pub score: f32,
    /// The word's quad in the coordinates of the image the crop came from.
    pub quad: Quad,
    /// Character indices of the word within the line text.
    pub char_range: Range<usize>,
}

/// Whether a character belongs to the CJK unified ideograph blocks.
pub fn is_cjk(c: char) -> bool {
    let u = c as u32;
    (0x4E00..=0x9FFF).contains(&u)
        || (0x3400..=0x4DBF).contains(&u)
        || (0x20000..=0x2A6DF).contains(&u)
        || (0x2A700..=0x2B73F).contains(&u)
        || (0x2B740..=0x2B81F).contains(&u)
}

/// A run of characters that becomes one box.
#[derive(Debug)]
struct Unit {
    range: Range<usize>,
    first_col: usize,
    last_col: usize,
    cjk: bool,
}

fn group_units(chars: &[char], cols: &[usize], max_col_gap: usize) -> Vec<Unit> {
    let mut units: Vec<Unit> = Vec::new();
    let mut open = false;

    for (i, (&ch, &col)) in chars.iter().zip(cols).enumerate() {
        if ch.is_whitespace() {
            open = false;
            continue;
        }
        let cjk = is_cjk(ch);
        if !cjk
            && open
            && let Some(last) = units.last_mut()
            && col.saturating_sub(last.last_col) <= max_col_gap
        {
            last.range.end = i + 1;
            last.last_col = col;
            continue;
        }
        units.push(Unit {
            range: i..i + 1,
            first_col: col,
            last_col: col,
            cjk,
        });
        open = !cjk;
    }

    units
}

/// Mean column pitch between adjacent CJK characters, in pixels.
fn cjk_pitch(chars: &[char], cols: &[usize], cell: f32) -> Option<f32> {
    let gaps: Vec<f32> = chars
        .windows(2)
        .zip(cols.windows(2))
        .filter(|(c, _)| is_cjk(c[0]) && is_cjk(c[1]))
        .map(|(_, col)| col[1].saturating_sub(col[0]) as f32 * cell)
        .collect();
    if gaps.is_empty() {
        None
    } else {
        Some(gaps.iter().sum::<f32>() / gaps.len() as f32)
    }
}

/// Splits a recognized line into word boxes.
///
/// Contiguous non-CJK characters form one word unless their columns are more
/// than `max_col_gap` apart; every CJK character is its own word; whitespace
/// separates words and gets no box. Boxes are computed along the crop's width
/// and mapped back through `map` into the source image.
pub fn segment_words(
    rec: &RecognitionOutput,
    crop_w: u32,
    crop_h: u32,
    map: &PerspectiveMap,
    config: &WordSegmentConfig,
) -> Vec<WordBox> {
    let chars: Vec<char> = rec.text.chars().collect();
    if chars.is_empty()
        || chars.len() != rec.char_cols.len()
        || rec.col_count <= f32::EPSILON
        || crop_w == 0
    {
        return Vec::new();
    }

    let width = crop_w as f32;
    let cell = width / rec.col_count;
    let pitch = cjk_pitch(&chars, &rec.char_cols, cell).unwrap_or(width / chars.len() as f32);
    let units = group_units(&chars, &rec.char_cols, config.max_col_gap);

    let mut spans: Vec<(f32, f32)> = units
        .iter()
        .map(|unit| {
            let (x0, x1) = if unit.cjk {
                let center = (unit.first_col as f32 + 0.5) * cell;
                (center - pitch / 2.0, center + pitch / 2.0)
            } else {
                (
                    unit.first_col as f32 * cell,
                    (unit.last_col + 1) as f32 * cell,
                )
            };
            (x0.clamp(0.0, width), x1.clamp(0.0, width))
        })
        .collect();

    for i in 1..spans.len() {
        if spans[i - 1].1 > spans[i].0 {
            let mid = (spans[i - 1].1 + spans[i].0) / 2.0;
            spans[i - 1].1 = mid.max(spans[i - 1].0);
            spans[i].0 = mid.min(spans[i].1);
        }
    }

    let height = crop_h as f32;
    units
        .into_iter()
        .zip(spans)
        .map(|(unit, (x0, x1))| {
            let corners = [
                Point::new(x0, 0.0),
                Point::new(x1, 0.0),
                Point::new(x1, height),
                Point::new(x0, height),
            ]
            .map(|p| map.inverse_point(p));
            let scores = &rec.char_scores[unit.range.clone()];
            WordBox {
                text: chars[unit.range.clone()].iter().collect(),
                score: scores.iter().sum::<f32>() / scores.len().max(1) as f32,
                quad: order_points_clockwise(corners),
                char_range: unit.range,
            }
        })
        .collect()
}
