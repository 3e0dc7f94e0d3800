//! GGUF reader.
//!
//! Parses the header, metadata and tensor descriptors of a GGUF stream into
//! a [`GgufContainer`]. Tensor payloads are not read; use
//! [`GgufContainer::tensor_data_span`] to locate them.
//!
//! # Supported Versions
//!
//! - GGUF v2
//! - GGUF v3 (current)
//!
//! # Example
//!
//! ```ignore
//! use gguf_codec::GgufReader;
//!
//! let file = std::fs::File::open("model.gguf")?;
//! let container = GgufReader::default().read(std::io::BufReader::new(file))?;
//!
//! for (key, value) in container.metadata().iter() {
//!     println!("{key} = {value}");
//! }
//! let span = container.tensor_data_span("token_embd.weight")?;
//! ```

use std::io::Read;

use tracing::{debug, trace};

use crate::container::{alignment_from_metadata, Metadata, TensorTable};
use crate::cursor::{checked_align_offset, ByteReader};
use crate::tensor::validate_layout;
use crate::{
    is_supported_version, GgmlType, GgufContainer, GgufError, MetadataArray, MetadataValue,
    MetadataValueType, ReaderConfig, Result, TensorDescriptor, GGUF_MAGIC,
};

/// Parser for GGUF streams.
#[derive(Debug, Clone, Default)]
pub struct GgufReader {
    config: ReaderConfig,
}

impl GgufReader {
    /// Create a reader with custom limits.
    pub fn new(config: ReaderConfig) -> Self {
        Self { config }
    }

    /// Limits in effect.
    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    /// Parse a container from `source`.
    ///
    /// Fails on the first structural, type, identity or layout violation.
    /// The source is borrowed for the duration of the call only; pass
    /// `&mut file` to keep ownership of a file or socket.
    pub fn read<R: Read>(&self, source: R) -> Result<GgufContainer> {
        let mut cursor = ByteReader::new(source);

        let magic = cursor.read_u32()?;
        if magic != GGUF_MAGIC {
            return Err(GgufError::InvalidMagic(magic));
        }

        let version = cursor.read_u32()?;
        if !is_supported_version(version) {
            return Err(GgufError::UnsupportedVersion(version));
        }

        let tensor_count = cursor.read_u64()?;
        let metadata_kv_count = cursor.read_u64()?;
        if tensor_count > self.config.max_tensor_count {
            return Err(GgufError::TooManyTensors {
                count: tensor_count,
                max: self.config.max_tensor_count,
            });
        }
        if metadata_kv_count > self.config.max_metadata_count {
            return Err(GgufError::TooManyMetadata {
                count: metadata_kv_count,
                max: self.config.max_metadata_count,
            });
        }
        debug!(version, tensor_count, metadata_kv_count, "reading GGUF header");

        let metadata = self.read_metadata(&mut cursor, metadata_kv_count)?;
        let alignment = alignment_from_metadata(&metadata)?;
        let tensors = self.read_tensor_infos(&mut cursor, tensor_count)?;

        let tensor_data_offset = checked_align_offset(cursor.position(), alignment)
            .ok_or(GgufError::IntegerOverflow("tensor data offset"))?;
        let tensor_data_size = validate_layout(tensors.values(), alignment)?;

        debug!(
            alignment,
            tensor_data_offset, tensor_data_size, "parsed GGUF container"
        );

        Ok(GgufContainer::from_parts(
            version,
            alignment,
            metadata,
            tensors,
            tensor_data_offset,
            tensor_data_size,
        ))
    }

    fn read_metadata<R: Read>(&self, cursor: &mut ByteReader<R>, count: u64) -> Result<Metadata> {
        // Counts are bounded by the config, so they fit in usize on any
        // supported target; capacity is further capped for hostile headers.
        let mut metadata = Metadata::with_capacity(count.min(1024) as usize);
        for _ in 0..count {
            let key = cursor.read_string(self.config.max_string_length)?;
            let value_type = MetadataValueType::try_from(cursor.read_u32()?)?;
            let value = self.read_value(cursor, value_type)?;
            trace!(key = %key, value_type = %value_type, "metadata entry");
            metadata
                .try_insert(key, value)
                .map_err(|(key, _)| GgufError::DuplicateKey(key))?;
        }
        Ok(metadata)
    }

    fn read_tensor_infos<R: Read>(
        &self,
        cursor: &mut ByteReader<R>,
        count: u64,
    ) -> Result<TensorTable> {
        let mut tensors = TensorTable::with_capacity(count.min(1024) as usize);
        for _ in 0..count {
            let name = cursor.read_string(self.config.max_string_length)?;
            let n_dims = cursor.read_u32()?;
            if n_dims > self.config.max_dimensions {
                return Err(GgufError::TooManyDimensions {
                    name,
                    n_dims,
                    max: self.config.max_dimensions,
                });
            }
            let shape = (0..n_dims)
                .map(|_| cursor.read_u64())
                .collect::<Result<Vec<_>>>()?;
            let dtype = GgmlType::try_from(cursor.read_u32()?)?;
            let offset = cursor.read_u64()?;

            let info = TensorDescriptor {
                name,
                shape,
                dtype,
                offset,
            };
            info.validate_shape()?;
            trace!(
                name = %info.name,
                shape = ?info.shape,
                dtype = %info.dtype,
                offset,
                "tensor info"
            );

            tensors
                .try_insert(info.name.clone(), info)
                .map_err(|(name, _)| GgufError::DuplicateTensorName(name))?;
        }
        Ok(tensors)
    }

    /// Read a metadata value with size validation.
    fn read_value<R: Read>(
        &self,
        cursor: &mut ByteReader<R>,
        value_type: MetadataValueType,
    ) -> Result<MetadataValue> {
        let value = match value_type {
            MetadataValueType::Uint8 => MetadataValue::Uint8(cursor.read_u8()?),
            MetadataValueType::Int8 => MetadataValue::Int8(cursor.read_i8()?),
            MetadataValueType::Uint16 => MetadataValue::Uint16(cursor.read_u16()?),
            MetadataValueType::Int16 => MetadataValue::Int16(cursor.read_i16()?),
            MetadataValueType::Uint32 => MetadataValue::Uint32(cursor.read_u32()?),
            MetadataValueType::Int32 => MetadataValue::Int32(cursor.read_i32()?),
            MetadataValueType::Float32 => MetadataValue::Float32(cursor.read_f32()?),
            MetadataValueType::Bool => MetadataValue::Bool(cursor.read_bool()?),
            MetadataValueType::String => {
                MetadataValue::String(cursor.read_string(self.config.max_string_length)?)
            }
            MetadataValueType::Array => MetadataValue::Array(self.read_array(cursor)?),
            MetadataValueType::Uint64 => MetadataValue::Uint64(cursor.read_u64()?),
            MetadataValueType::Int64 => MetadataValue::Int64(cursor.read_i64()?),
            MetadataValueType::Float64 => MetadataValue::Float64(cursor.read_f64()?),
        };
        Ok(value)
    }

    /// Array: element type + length + elements, no per-element tags.
    fn read_array<R: Read>(&self, cursor: &mut ByteReader<R>) -> Result<MetadataArray> {
        let element_type = MetadataValueType::try_from(cursor.read_u32()?)?;
        if element_type == MetadataValueType::Array {
            return Err(GgufError::UnsupportedNestedArray);
        }

        let len = cursor.read_u64()?;
        if len > self.config.max_array_length {
            return Err(GgufError::ArrayTooLarge {
                len,
                max: self.config.max_array_length,
            });
        }

        // Preallocate for at most 64 KiB of declared payload.
        let cap = match element_type.fixed_size() {
            Some(width) => len.min(64 * 1024 / width),
            None => len.min(1024),
        };
        let mut values = Vec::with_capacity(cap as usize);
        for _ in 0..len {
            values.push(self.read_value(cursor, element_type)?);
        }
        Ok(MetadataArray::unchecked(element_type, values))
    }
}
