//! In-memory GGUF container: metadata plus tensor descriptors.

use std::io::{Read, Write};
use std::ops::Range;

use crate::ordered::OrderedMap;
use crate::{
    keys, FromMetadataValue, GgufBuilder, GgufError, GgufReader, MetadataValue, Result,
    TensorDescriptor, GGUF_DEFAULT_ALIGNMENT,
};

/// Ordered metadata mapping.
pub type Metadata = OrderedMap<MetadataValue>;

/// Ordered tensor table keyed by tensor name.
pub type TensorTable = OrderedMap<TensorDescriptor>;

/// A parsed or built GGUF container.
///
/// Holds every header field of a GGUF file but none of the tensor payload.
/// Instances are immutable; edit through [`GgufContainer::to_builder`].
/// Metadata and tensors keep the order in which they appear in the file.
#[derive(Debug, Clone, PartialEq)]
pub struct GgufContainer {
    version: u32,
    alignment: u64,
    metadata: Metadata,
    tensors: TensorTable,
    tensor_data_offset: u64,
    tensor_data_size: u64,
}

impl GgufContainer {
    /// Assemble a container from parts that have already been validated.
    pub(crate) fn from_parts(
        version: u32,
        alignment: u64,
        metadata: Metadata,
        tensors: TensorTable,
        tensor_data_offset: u64,
        tensor_data_size: u64,
    ) -> Self {
        Self {
            version,
            alignment,
            metadata,
            tensors,
            tensor_data_offset,
            tensor_data_size,
        }
    }

    /// Parse a container from a byte channel with default limits.
    ///
    /// Reads the header only; the channel is left positioned somewhere
    /// before [`tensor_data_offset`](Self::tensor_data_offset).
    pub fn read<R: Read>(reader: R) -> Result<Self> {
        GgufReader::default().read(reader)
    }

    /// Parse a container from an in-memory buffer.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::read(bytes)
    }

    /// Serialize the header, metadata, tensor descriptors and alignment
    /// padding. Returns the bytes written, which equals
    /// [`tensor_data_offset`](Self::tensor_data_offset).
    pub fn write<W: Write>(&self, writer: W) -> Result<u64> {
        crate::writer::write_container(self, writer)
    }

    /// Serialize to a byte vector.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        self.write(&mut buffer)?;
        Ok(buffer)
    }

    /// Start an editable copy of this container.
    pub fn to_builder(&self) -> GgufBuilder {
        GgufBuilder::from_container(self)
    }

    /// GGUF version.
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Alignment of the tensor-data region and of every tensor offset.
    pub fn alignment(&self) -> u64 {
        self.alignment
    }

    /// Absolute byte position where tensor payloads begin. Always a
    /// multiple of [`alignment`](Self::alignment).
    pub fn tensor_data_offset(&self) -> u64 {
        self.tensor_data_offset
    }

    /// Length of the tensor-data region: end of the last tensor relative to
    /// the base.
    pub fn tensor_data_size(&self) -> u64 {
        self.tensor_data_size
    }

    /// Metadata entries in file order.
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Tensor descriptors in file order.
    pub fn tensors(&self) -> impl ExactSizeIterator<Item = &TensorDescriptor> {
        self.tensors.values()
    }

    /// Get all tensor names.
    pub fn tensor_names(&self) -> impl ExactSizeIterator<Item = &str> {
        self.tensors.keys()
    }

    /// Get the total number of tensors.
    pub fn num_tensors(&self) -> usize {
        self.tensors.len()
    }

    /// Get tensor info by name.
    pub fn tensor(&self, name: &str) -> Result<&TensorDescriptor> {
        self.tensors
            .get(name)
            .ok_or_else(|| GgufError::TensorNotFound(name.to_string()))
    }

    /// Absolute byte range of a tensor's payload in the file.
    pub fn tensor_data_span(&self, name: &str) -> Result<Range<u64>> {
        let info = self.tensor(name)?;
        let start = self
            .tensor_data_offset
            .checked_add(info.offset)
            .ok_or(GgufError::IntegerOverflow("tensor start"))?;
        let end = start
            .checked_add(info.byte_size()?)
            .ok_or(GgufError::IntegerOverflow("tensor end"))?;
        Ok(start..end)
    }

    /// Get a metadata value by key.
    pub fn get_metadata(&self, key: &str) -> Option<&MetadataValue> {
        self.metadata.get(key)
    }

    /// Get a metadata value as `T`.
    ///
    /// Fails with `KeyNotFound` if absent and `TypeMismatch` if stored under
    /// another type.
    pub fn get_value<T: FromMetadataValue>(&self, key: &str) -> Result<T> {
        let value = self
            .metadata
            .get(key)
            .ok_or_else(|| GgufError::KeyNotFound(key.to_string()))?;
        T::from_value(value).map_err(|e| e.with_key(key))
    }

    /// Like [`get_value`](Self::get_value), but a missing key yields
    /// `default`. A present key of the wrong type is still an error.
    pub fn get_value_or_default<T: FromMetadataValue>(&self, key: &str, default: T) -> Result<T> {
        match self.get_value(key) {
            Err(GgufError::KeyNotFound(_)) => Ok(default),
            other => other,
        }
    }

    /// Get the model architecture from metadata.
    pub fn architecture(&self) -> Option<&str> {
        self.metadata
            .get(keys::GENERAL_ARCHITECTURE)?
            .as_str()
            .ok()
    }
}

/// Alignment declared by the reserved alignment key, or the default.
///
/// Any integer variant is accepted; the value must be a positive power of two
/// no larger than `u32::MAX`.
pub(crate) fn alignment_from_metadata(metadata: &Metadata) -> Result<u64> {
    let Some(value) = metadata.get(keys::GENERAL_ALIGNMENT) else {
        return Ok(GGUF_DEFAULT_ALIGNMENT);
    };
    match value.as_unsigned_integer() {
        Some(a) if a.is_power_of_two() && a <= u64::from(u32::MAX) => Ok(a),
        Some(a) => Err(GgufError::InvalidAlignment(a)),
        None => Err(GgufError::InvalidAlignment(0)),
    }
}
