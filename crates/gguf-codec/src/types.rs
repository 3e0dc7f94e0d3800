//! GGUF format types and constants.

use std::fmt;

use crate::{GgufError, Result};

/// GGUF magic number: "GGUF" in bytes.
pub const GGUF_MAGIC: u32 = 0x46554747; // "GGUF" little-endian

/// Current GGUF version.
pub const GGUF_VERSION: u32 = 3;

/// Oldest version this codec reads and writes (64-bit counts and lengths).
pub const GGUF_MIN_VERSION: u32 = 2;

/// Default alignment for tensor data.
pub const GGUF_DEFAULT_ALIGNMENT: u64 = 32;

/// Whether `version` is one this codec reads and writes.
pub fn is_supported_version(version: u32) -> bool {
    (GGUF_MIN_VERSION..=GGUF_VERSION).contains(&version)
}

/// GGML tensor data types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum GgmlType {
    /// 32-bit float
    F32 = 0,
    /// 16-bit float
    F16 = 1,
    /// 4-bit quantization (type 0)
    Q4_0 = 2,
    /// 4-bit quantization (type 1)
    Q4_1 = 3,
    /// 5-bit quantization (type 0)
    Q5_0 = 6,
    /// 5-bit quantization (type 1)
    Q5_1 = 7,
    /// 8-bit quantization (type 0)
    Q8_0 = 8,
    /// 8-bit quantization (type 1)
    Q8_1 = 9,
    /// K-quant 2-bit
    Q2K = 10,
    /// K-quant 3-bit
    Q3K = 11,
    /// K-quant 4-bit
    Q4K = 12,
    /// K-quant 5-bit
    Q5K = 13,
    /// K-quant 6-bit
    Q6K = 14,
    /// K-quant 8-bit
    Q8K = 15,
    /// IQ2 extra-extra-small
    Iq2Xxs = 16,
    /// IQ2 extra-small
    Iq2Xs = 17,
    /// IQ3 extra-extra-small
    Iq3Xxs = 18,
    /// IQ1 small
    Iq1S = 19,
    /// IQ4 non-linear
    Iq4Nl = 20,
    /// IQ3 small
    Iq3S = 21,
    /// IQ2 small
    Iq2S = 22,
    /// IQ4 extra-small
    Iq4Xs = 23,
    /// 8-bit integer
    I8 = 24,
    /// 16-bit integer
    I16 = 25,
    /// 32-bit integer
    I32 = 26,
    /// 64-bit integer
    I64 = 27,
    /// 64-bit float
    F64 = 28,
    /// IQ1 medium
    Iq1M = 29,
    /// BFloat16
    Bf16 = 30,
    /// Ternary, 1.69 bits per weight
    Tq1_0 = 34,
    /// Ternary, 2.06 bits per weight
    Tq2_0 = 35,
    /// Microscaling FP4
    Mxfp4 = 39,
}

impl GgmlType {
    /// Every type this codec understands, in tag order.
    pub const ALL: [GgmlType; 32] = [
        Self::F32,
        Self::F16,
        Self::Q4_0,
        Self::Q4_1,
        Self::Q5_0,
        Self::Q5_1,
        Self::Q8_0,
        Self::Q8_1,
        Self::Q2K,
        Self::Q3K,
        Self::Q4K,
        Self::Q5K,
        Self::Q6K,
        Self::Q8K,
        Self::Iq2Xxs,
        Self::Iq2Xs,
        Self::Iq3Xxs,
        Self::Iq1S,
        Self::Iq4Nl,
        Self::Iq3S,
        Self::Iq2S,
        Self::Iq4Xs,
        Self::I8,
        Self::I16,
        Self::I32,
        Self::I64,
        Self::F64,
        Self::Iq1M,
        Self::Bf16,
        Self::Tq1_0,
        Self::Tq2_0,
        Self::Mxfp4,
    ];

    /// Size in bytes of one block. For unquantized types a block is one element.
    pub fn type_size(&self) -> u64 {
        match self {
            Self::F32 => 4,
            Self::F16 | Self::Bf16 => 2,
            Self::Q4_0 => 18, // 32 values in 18 bytes (16 + 2 scale)
            Self::Q4_1 => 20,
            Self::Q5_0 => 22,
            Self::Q5_1 => 24,
            Self::Q8_0 => 34,
            Self::Q8_1 => 36,
            Self::Q2K => 84, // 256 values in 84 bytes
            Self::Q3K => 110,
            Self::Q4K => 144,
            Self::Q5K => 176,
            Self::Q6K => 210,
            Self::Q8K => 292,
            Self::Iq1S => 50,
            Self::Iq1M => 56,
            Self::Iq2Xxs => 66,
            Self::Iq2Xs => 74,
            Self::Iq2S => 82,
            Self::Iq3Xxs => 98,
            Self::Iq3S => 110,
            Self::Iq4Nl => 18,
            Self::Iq4Xs => 136,
            Self::Tq1_0 => 54,
            Self::Tq2_0 => 66,
            Self::Mxfp4 => 17, // 1 shared exponent + 16 bytes of nibbles
            Self::I8 => 1,
            Self::I16 => 2,
            Self::I32 => 4,
            Self::I64 | Self::F64 => 8,
        }
    }

    /// Number of elements per block.
    pub fn block_size(&self) -> u64 {
        match self {
            Self::F32 | Self::F16 | Self::Bf16 | Self::F64 => 1,
            Self::I8 | Self::I16 | Self::I32 | Self::I64 => 1,
            Self::Q4_0 | Self::Q4_1 | Self::Q5_0 | Self::Q5_1 | Self::Q8_0 | Self::Q8_1 => 32,
            Self::Iq4Nl | Self::Mxfp4 => 32,
            Self::Q2K | Self::Q3K | Self::Q4K | Self::Q5K | Self::Q6K | Self::Q8K => 256,
            Self::Iq1S
            | Self::Iq1M
            | Self::Iq2Xxs
            | Self::Iq2Xs
            | Self::Iq2S
            | Self::Iq3Xxs
            | Self::Iq3S
            | Self::Iq4Xs => 256,
            Self::Tq1_0 | Self::Tq2_0 => 256,
        }
    }

    /// Byte size of `n_elements` values, or `None` on overflow.
    ///
    /// A partial trailing block still occupies a full block.
    pub fn tensor_size_checked(&self, n_elements: u64) -> Option<u64> {
        let block_size = self.block_size();
        let n_blocks = n_elements.checked_add(block_size - 1)? / block_size;
        n_blocks.checked_mul(self.type_size())
    }

    /// GGML's canonical name for the type.
    pub fn name(&self) -> &'static str {
        match self {
            Self::F32 => "F32",
            Self::F16 => "F16",
            Self::Q4_0 => "Q4_0",
            Self::Q4_1 => "Q4_1",
            Self::Q5_0 => "Q5_0",
            Self::Q5_1 => "Q5_1",
            Self::Q8_0 => "Q8_0",
            Self::Q8_1 => "Q8_1",
            Self::Q2K => "Q2_K",
            Self::Q3K => "Q3_K",
            Self::Q4K => "Q4_K",
            Self::Q5K => "Q5_K",
            Self::Q6K => "Q6_K",
            Self::Q8K => "Q8_K",
            Self::Iq2Xxs => "IQ2_XXS",
            Self::Iq2Xs => "IQ2_XS",
            Self::Iq3Xxs => "IQ3_XXS",
            Self::Iq1S => "IQ1_S",
            Self::Iq4Nl => "IQ4_NL",
            Self::Iq3S => "IQ3_S",
            Self::Iq2S => "IQ2_S",
            Self::Iq4Xs => "IQ4_XS",
            Self::I8 => "I8",
            Self::I16 => "I16",
            Self::I32 => "I32",
            Self::I64 => "I64",
            Self::F64 => "F64",
            Self::Iq1M => "IQ1_M",
            Self::Bf16 => "BF16",
            Self::Tq1_0 => "TQ1_0",
            Self::Tq2_0 => "TQ2_0",
            Self::Mxfp4 => "MXFP4",
        }
    }
}

impl fmt::Display for GgmlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<u32> for GgmlType {
    type Error = GgufError;

    fn try_from(value: u32) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| *t as u32 == value)
            .ok_or(GgufError::UnknownTensorType(value))
    }
}

/// GGUF metadata value types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum MetadataValueType {
    /// 8-bit unsigned integer
    Uint8 = 0,
    /// 8-bit signed integer
    Int8 = 1,
    /// 16-bit unsigned integer
    Uint16 = 2,
    /// 16-bit signed integer
    Int16 = 3,
    /// 32-bit unsigned integer
    Uint32 = 4,
    /// 32-bit signed integer
    Int32 = 5,
    /// 32-bit float
    Float32 = 6,
    /// Boolean (1 byte)
    Bool = 7,
    /// UTF-8 string with length prefix
    String = 8,
    /// Array of values
    Array = 9,
    /// 64-bit unsigned integer
    Uint64 = 10,
    /// 64-bit signed integer
    Int64 = 11,
    /// 64-bit float
    Float64 = 12,
}

impl MetadataValueType {
    /// Fixed payload width in bytes; `None` for strings and arrays.
    pub fn fixed_size(&self) -> Option<u64> {
        match self {
            Self::Uint8 | Self::Int8 | Self::Bool => Some(1),
            Self::Uint16 | Self::Int16 => Some(2),
            Self::Uint32 | Self::Int32 | Self::Float32 => Some(4),
            Self::Uint64 | Self::Int64 | Self::Float64 => Some(8),
            Self::String | Self::Array => None,
        }
    }
}

impl fmt::Display for MetadataValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Uint8 => "UINT8",
            Self::Int8 => "INT8",
            Self::Uint16 => "UINT16",
            Self::Int16 => "INT16",
            Self::Uint32 => "UINT32",
            Self::Int32 => "INT32",
            Self::Float32 => "FLOAT32",
            Self::Bool => "BOOL",
            Self::String => "STRING",
            Self::Array => "ARRAY",
            Self::Uint64 => "UINT64",
            Self::Int64 => "INT64",
            Self::Float64 => "FLOAT64",
        };
        f.write_str(name)
    }
}

impl TryFrom<u32> for MetadataValueType {
    type Error = GgufError;

    fn try_from(value: u32) -> Result<Self> {
        Ok(match value {
            0 => Self::Uint8,
            1 => Self::Int8,
            2 => Self::Uint16,
            3 => Self::Int16,
            4 => Self::Uint32,
            5 => Self::Int32,
            6 => Self::Float32,
            7 => Self::Bool,
            8 => Self::String,
            9 => Self::Array,
            10 => Self::Uint64,
            11 => Self::Int64,
            12 => Self::Float64,
            t => return Err(GgufError::UnknownMetadataType(t)),
        })
    }
}

/// Standard metadata keys for GGUF files.
pub mod keys {
    /// Data alignment. Reserved: its value sets the container alignment.
    pub const GENERAL_ALIGNMENT: &str = "general.alignment";
    /// Model architecture name
    pub const GENERAL_ARCHITECTURE: &str = "general.architecture";
    /// Model name
    pub const GENERAL_NAME: &str = "general.name";
}
