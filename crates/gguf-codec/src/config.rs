//! Reader limits.

use serde::{Deserialize, Serialize};

/// Maximum allowed string length in GGUF metadata (10 MB).
pub const MAX_STRING_LENGTH: u64 = 10 * 1024 * 1024;

/// Maximum allowed array length in GGUF metadata (1 million elements).
pub const MAX_ARRAY_LENGTH: u64 = 1_000_000;

/// Maximum allowed tensor count (100,000 tensors).
/// Modern LLMs typically have < 10,000 tensors.
pub const MAX_TENSOR_COUNT: u64 = 100_000;

/// Maximum allowed metadata count (100,000 entries).
pub const MAX_METADATA_COUNT: u64 = 100_000;

/// Maximum tensor rank, matching GGML.
pub const MAX_DIMENSIONS: u32 = 4;

/// Resource limits applied while parsing.
///
/// Declared sizes are checked against these before anything proportional to
/// them is allocated, so a hostile header cannot exhaust memory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReaderConfig {
    /// Longest accepted string, in bytes.
    #[serde(default = "default_max_string_length")]
    pub max_string_length: u64,

    /// Longest accepted metadata array, in elements.
    #[serde(default = "default_max_array_length")]
    pub max_array_length: u64,

    /// Most tensor descriptors accepted.
    #[serde(default = "default_max_tensor_count")]
    pub max_tensor_count: u64,

    /// Most metadata entries accepted.
    #[serde(default = "default_max_metadata_count")]
    pub max_metadata_count: u64,

    /// Highest tensor rank accepted.
    #[serde(default = "default_max_dimensions")]
    pub max_dimensions: u32,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            max_string_length: default_max_string_length(),
            max_array_length: default_max_array_length(),
            max_tensor_count: default_max_tensor_count(),
            max_metadata_count: default_max_metadata_count(),
            max_dimensions: default_max_dimensions(),
        }
    }
}

fn default_max_string_length() -> u64 {
    MAX_STRING_LENGTH
}

fn default_max_array_length() -> u64 {
    MAX_ARRAY_LENGTH
}

fn default_max_tensor_count() -> u64 {
    MAX_TENSOR_COUNT
}

fn default_max_metadata_count() -> u64 {
    MAX_METADATA_COUNT
}

fn default_max_dimensions() -> u32 {
    MAX_DIMENSIONS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ReaderConfig::default();
        assert_eq!(config.max_string_length, 10 * 1024 * 1024);
        assert_eq!(config.max_array_length, 1_000_000);
        assert_eq!(config.max_dimensions, 4);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: ReaderConfig = serde_json::from_str(r#"{"max_tensor_count": 16}"#).unwrap();
        assert_eq!(config.max_tensor_count, 16);
        assert_eq!(config.max_metadata_count, MAX_METADATA_COUNT);
        assert_eq!(config.max_string_length, MAX_STRING_LENGTH);
    }

    #[test]
    fn test_serde_roundtrip() {
        let config = ReaderConfig {
            max_dimensions: 8,
            ..ReaderConfig::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        let back: ReaderConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
