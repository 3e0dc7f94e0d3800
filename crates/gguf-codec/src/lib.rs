//! GGUF container codec.
//!
//! GGUF (GGML Universal Format) is the single-file model format used by
//! llama.cpp and Ollama: a fixed header, an ordered table of typed metadata,
//! an ordered table of tensor descriptors, then an aligned region of raw
//! tensor bytes.
//!
//! This crate provides:
//! - A bounds-checked reader that parses the header into a [`GgufContainer`]
//! - A writer that emits the header, metadata, descriptors and padding
//! - A [`GgufBuilder`] for creating and editing containers with automatic
//!   tensor offset packing
//!
//! Tensor payloads are never loaded. A container tells you where each
//! tensor lives via [`GgufContainer::tensor_data_span`].
//!
//! # Example
//!
//! ```
//! use gguf_codec::{GgmlType, GgufBuilder};
//!
//! let mut builder = GgufBuilder::new();
//! builder
//!     .put_string("general.name", "m")
//!     .put_u32("n_layers", 32)
//!     .add_tensor("w", vec![4, 4], GgmlType::F32);
//! let container = builder.build()?;
//!
//! let bytes = gguf_codec::serialize(&container)?;
//! let parsed = gguf_codec::parse(&bytes)?;
//! assert_eq!(parsed.get_value::<u32>("n_layers")?, 32);
//! assert_eq!(parsed.tensor("w")?.byte_size()?, 64);
//! # Ok::<(), gguf_codec::GgufError>(())
//! ```

#![warn(missing_docs)]

pub mod builder;
pub mod config;
pub mod container;
pub mod cursor;
mod error;
mod ordered;
pub mod reader;
mod tensor;
mod types;
mod value;
pub mod writer;

pub use builder::{GgufBuilder, OffsetPolicy};
pub use config::{
    ReaderConfig, MAX_ARRAY_LENGTH, MAX_DIMENSIONS, MAX_METADATA_COUNT, MAX_STRING_LENGTH,
    MAX_TENSOR_COUNT,
};
pub use container::{GgufContainer, Metadata, TensorTable};
pub use error::{GgufError, Result};
pub use ordered::OrderedMap;
pub use reader::GgufReader;
pub use tensor::{validate_layout, TensorDescriptor};
pub use types::*;
pub use value::{FromMetadataValue, MetadataArray, MetadataScalar, MetadataValue};
pub use writer::write_container;

/// Parse a GGUF header from an in-memory buffer with default limits.
pub fn parse(bytes: &[u8]) -> Result<GgufContainer> {
    GgufContainer::from_bytes(bytes)
}

/// Serialize a container's header, padded up to the tensor-data base.
pub fn serialize(container: &GgufContainer) -> Result<Vec<u8>> {
    container.to_bytes()
}
