//! Error types for GGUF encoding and decoding.

use thiserror::Error;

use crate::MetadataValueType;

/// Result type alias for codec operations.
pub type Result<T> = std::result::Result<T, GgufError>;

/// Error type for every GGUF codec operation.
///
/// Reader and writer fail on the first violation they meet; the builder
/// reports violations from [`GgufBuilder::build`](crate::GgufBuilder::build).
#[derive(Error, Debug)]
pub enum GgufError {
    /// I/O error from the underlying byte channel (other than end of input).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Fewer bytes remained than a primitive required.
    #[error("Truncated input at byte {position}")]
    TruncatedInput {
        /// Cursor position at which the read started.
        position: u64,
    },

    /// Invalid GGUF magic number.
    #[error("Invalid GGUF magic: expected 0x46554747, got 0x{0:08X}")]
    InvalidMagic(u32),

    /// Unsupported GGUF version.
    #[error("Unsupported GGUF version: {0}")]
    UnsupportedVersion(u32),

    /// Unknown metadata value type tag.
    #[error("Unknown metadata value type: {0}")]
    UnknownMetadataType(u32),

    /// Unknown GGML tensor type tag.
    #[error("Unknown tensor type: {0}")]
    UnknownTensorType(u32),

    /// An array whose element type is itself an array.
    #[error("Arrays of arrays are not supported")]
    UnsupportedNestedArray,

    /// A metadata key appeared twice.
    #[error("Duplicate metadata key: {0}")]
    DuplicateKey(String),

    /// A tensor name appeared twice.
    #[error("Duplicate tensor name: {0}")]
    DuplicateTensorName(String),

    /// Metadata key not present.
    #[error("Metadata key not found: {0}")]
    KeyNotFound(String),

    /// Tensor not present.
    #[error("Tensor not found: {0}")]
    TensorNotFound(String),

    /// Alignment is zero, not a power of two, or not an integer value.
    #[error("Invalid alignment: {0} (must be a power of two)")]
    InvalidAlignment(u64),

    /// A tensor offset is not aligned, or goes backwards.
    #[error("Tensor {name} has misaligned offset {offset} (alignment {alignment})")]
    MisalignedTensorOffset {
        /// Tensor name.
        name: String,
        /// Offset relative to the tensor data base.
        offset: u64,
        /// Container alignment.
        alignment: u64,
    },

    /// Two tensors' byte ranges overlap.
    #[error("Tensors {first} and {second} overlap")]
    OverlappingTensors {
        /// The earlier tensor.
        first: String,
        /// The tensor whose range starts inside `first`.
        second: String,
    },

    /// A size, offset, or length does not fit its field.
    #[error("Integer overflow computing {0}")]
    IntegerOverflow(&'static str),

    /// A value was requested as a type other than the one it holds.
    #[error("Type mismatch for {key}: expected {expected}, found {actual}")]
    TypeMismatch {
        /// Metadata key (empty when the value is not keyed).
        key: String,
        /// Requested type.
        expected: MetadataValueType,
        /// Stored type.
        actual: MetadataValueType,
    },

    /// String payload is not valid UTF-8.
    #[error("Invalid UTF-8 in string")]
    InvalidUtf8,

    /// Tensor shape is empty, has a zero dimension, or breaks block packing.
    #[error("Invalid shape {shape:?} for tensor {name}")]
    InvalidShape {
        /// Tensor name.
        name: String,
        /// Offending shape.
        shape: Vec<u64>,
    },

    /// String too large.
    #[error("String too large: {size} bytes exceeds maximum of {max} bytes")]
    StringTooLarge {
        /// Declared size in bytes.
        size: u64,
        /// Maximum allowed size.
        max: u64,
    },

    /// Array too large.
    #[error("Array too large: {len} elements exceeds maximum of {max} elements")]
    ArrayTooLarge {
        /// Declared length.
        len: u64,
        /// Maximum allowed length.
        max: u64,
    },

    /// Too many tensors.
    #[error("Too many tensors: {count} exceeds maximum of {max}")]
    TooManyTensors {
        /// Declared count.
        count: u64,
        /// Maximum allowed.
        max: u64,
    },

    /// Too many metadata entries.
    #[error("Too many metadata entries: {count} exceeds maximum of {max}")]
    TooManyMetadata {
        /// Declared count.
        count: u64,
        /// Maximum allowed.
        max: u64,
    },

    /// Too many tensor dimensions.
    #[error("Tensor {name} has {n_dims} dimensions, maximum is {max}")]
    TooManyDimensions {
        /// Tensor name.
        name: String,
        /// Declared dimension count.
        n_dims: u32,
        /// Maximum allowed.
        max: u32,
    },
}

impl GgufError {
    pub(crate) fn type_mismatch(
        key: impl Into<String>,
        expected: MetadataValueType,
        actual: MetadataValueType,
    ) -> Self {
        Self::TypeMismatch {
            key: key.into(),
            expected,
            actual,
        }
    }

    /// Attach a metadata key to a [`GgufError::TypeMismatch`] raised by an
    /// unkeyed accessor. Other variants pass through unchanged.
    pub(crate) fn with_key(self, key: &str) -> Self {
        match self {
            Self::TypeMismatch {
                expected, actual, ..
            } => Self::type_mismatch(key, expected, actual),
            other => other,
        }
    }
}
