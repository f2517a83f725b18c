//! Character dictionary loading.

use crate::core::OCRError;
use std::path::Path;

/// Reads a character dictionary file, one entry per line.
///
/// # Errors
///
/// Returns an `OCRError::ConfigError` if the file cannot be read.
pub fn read_character_dict(path: &Path) -> Result<Vec<String>, OCRError> {
    let content = std::fs::read_to_string(path).map_err(|e| OCRError::ConfigError {
        message: format!(
            "Failed to read character dictionary from '{}': {}",
            path.display(),
            e
        ),
    })?;
    Ok(parse_character_dict(&content))
}

/// Splits dictionary text into entries, one per line.
pub fn parse_character_dict(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::to_string)
        .collect()
}
