//! Builder for creating and editing GGUF containers.
//!
//! # Example
//!
//! ```
//! use gguf_codec::{GgmlType, GgufBuilder};
//!
//! let mut builder = GgufBuilder::with_model("llama", "tiny");
//! builder
//!     .put_u32("llama.block_count", 2)
//!     .add_tensor("token_embd.weight", vec![64, 100], GgmlType::F16)
//!     .add_tensor("output_norm.weight", vec![64], GgmlType::F32);
//! let container = builder.build()?;
//!
//! assert_eq!(container.tensor("output_norm.weight")?.offset, 64 * 100 * 2);
//! let header = container.to_bytes()?;
//! assert_eq!(header.len() as u64, container.tensor_data_offset());
//! # Ok::<(), gguf_codec::GgufError>(())
//! ```

use tracing::debug;

use crate::container::{alignment_from_metadata, Metadata, TensorTable};
use crate::cursor::checked_align_offset;
use crate::tensor::validate_layout;
use crate::{
    is_supported_version, keys, GgmlType, GgufContainer, GgufError, MetadataArray, MetadataScalar,
    MetadataValue, MetadataValueType, Result, TensorDescriptor, GGUF_VERSION, MAX_DIMENSIONS,
};

/// How [`GgufBuilder::build_with`] treats staged tensor offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OffsetPolicy {
    /// Pack tensors in order, each at the previous end rounded up to the
    /// alignment, starting from 0.
    #[default]
    Recompute,
    /// Keep offsets as staged. They must still be aligned and non-overlapping.
    Preserve,
}

/// Mutable staging area for a [`GgufContainer`].
///
/// Edits are not validated until [`build`](Self::build), so intermediate
/// states may be invalid. `put` on an existing key or tensor name replaces it
/// in place; `remove` closes the gap.
#[derive(Debug, Clone)]
pub struct GgufBuilder {
    version: u32,
    metadata: Metadata,
    tensors: TensorTable,
}

impl Default for GgufBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl GgufBuilder {
    /// Create an empty builder for the current GGUF version.
    pub fn new() -> Self {
        Self {
            version: GGUF_VERSION,
            metadata: Metadata::new(),
            tensors: TensorTable::new(),
        }
    }

    /// Create a builder with basic model info.
    pub fn with_model(architecture: &str, name: &str) -> Self {
        let mut builder = Self::new();
        builder
            .put_string(keys::GENERAL_ARCHITECTURE, architecture)
            .put_string(keys::GENERAL_NAME, name);
        builder
    }

    /// Seed a builder with a copy of every entry of `container`, in order.
    pub fn from_container(container: &GgufContainer) -> Self {
        let mut tensors = TensorTable::with_capacity(container.num_tensors());
        for tensor in container.tensors() {
            tensors.insert(tensor.name.clone(), tensor.clone());
        }
        Self {
            version: container.version(),
            metadata: container.metadata().clone(),
            tensors,
        }
    }

    /// Staged version.
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Set the GGUF version. Checked at build time.
    pub fn set_version(&mut self, version: u32) -> &mut Self {
        self.version = version;
        self
    }

    /// Alignment the staged metadata declares.
    pub fn alignment(&self) -> Result<u64> {
        alignment_from_metadata(&self.metadata)
    }

    /// Set the alignment for tensor data.
    ///
    /// Stored as the `general.alignment` UINT32 entry so that it round-trips.
    /// Must be a power of two that fits in 32 bits.
    pub fn set_alignment(&mut self, alignment: u64) -> Result<&mut Self> {
        let value = u32::try_from(alignment)
            .ok()
            .filter(|a| a.is_power_of_two())
            .ok_or(GgufError::InvalidAlignment(alignment))?;
        Ok(self.put_u32(keys::GENERAL_ALIGNMENT, value))
    }

    /// Staged metadata.
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Staged tensor descriptors.
    pub fn tensors(&self) -> impl ExactSizeIterator<Item = &TensorDescriptor> {
        self.tensors.values()
    }

    /// Add or replace a metadata key-value pair.
    pub fn put_value(
        &mut self,
        key: impl Into<String>,
        value: impl Into<MetadataValue>,
    ) -> &mut Self {
        self.metadata.insert(key, value.into());
        self
    }

    /// Remove a metadata entry.
    pub fn remove_value(&mut self, key: &str) -> Result<MetadataValue> {
        self.metadata
            .remove(key)
            .ok_or_else(|| GgufError::KeyNotFound(key.to_string()))
    }

    /// Add a u8 metadata value.
    pub fn put_u8(&mut self, key: impl Into<String>, value: u8) -> &mut Self {
        self.put_value(key, value)
    }

    /// Add an i8 metadata value.
    pub fn put_i8(&mut self, key: impl Into<String>, value: i8) -> &mut Self {
        self.put_value(key, value)
    }

    /// Add a u16 metadata value.
    pub fn put_u16(&mut self, key: impl Into<String>, value: u16) -> &mut Self {
        self.put_value(key, value)
    }

    /// Add an i16 metadata value.
    pub fn put_i16(&mut self, key: impl Into<String>, value: i16) -> &mut Self {
        self.put_value(key, value)
    }

    /// Add a u32 metadata value.
    pub fn put_u32(&mut self, key: impl Into<String>, value: u32) -> &mut Self {
        self.put_value(key, value)
    }

    /// Add an i32 metadata value.
    pub fn put_i32(&mut self, key: impl Into<String>, value: i32) -> &mut Self {
        self.put_value(key, value)
    }

    /// Add a u64 metadata value.
    pub fn put_u64(&mut self, key: impl Into<String>, value: u64) -> &mut Self {
        self.put_value(key, value)
    }

    /// Add an i64 metadata value.
    pub fn put_i64(&mut self, key: impl Into<String>, value: i64) -> &mut Self {
        self.put_value(key, value)
    }

    /// Add a f32 metadata value.
    pub fn put_f32(&mut self, key: impl Into<String>, value: f32) -> &mut Self {
        self.put_value(key, value)
    }

    /// Add a f64 metadata value.
    pub fn put_f64(&mut self, key: impl Into<String>, value: f64) -> &mut Self {
        self.put_value(key, value)
    }

    /// Add a bool metadata value.
    pub fn put_bool(&mut self, key: impl Into<String>, value: bool) -> &mut Self {
        self.put_value(key, value)
    }

    /// Add a string metadata value.
    pub fn put_string(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.put_value(key, MetadataValue::String(value.into()))
    }

    /// Stage an array with an explicit element type.
    ///
    /// Nothing is checked until build, which rejects an `Array` element type
    /// with `UnsupportedNestedArray` and any element of another type with
    /// `TypeMismatch`.
    pub fn put_array(
        &mut self,
        key: impl Into<String>,
        element_type: MetadataValueType,
        values: Vec<MetadataValue>,
    ) -> &mut Self {
        self.put_value(key, MetadataArray::unchecked(element_type, values))
    }

    /// Add an array of native values, e.g. `Vec<f32>` or `Vec<String>`.
    pub fn put_scalar_array<T: MetadataScalar>(
        &mut self,
        key: impl Into<String>,
        values: impl IntoIterator<Item = T>,
    ) -> &mut Self {
        self.put_value(key, MetadataArray::of(values))
    }

    /// Add an array of strings metadata value.
    pub fn put_string_array(
        &mut self,
        key: impl Into<String>,
        values: impl IntoIterator<Item = impl Into<String>>,
    ) -> &mut Self {
        self.put_scalar_array(key, values.into_iter().map(Into::<String>::into))
    }

    /// Add or replace a tensor descriptor, keyed by its name.
    pub fn put_tensor(&mut self, tensor: TensorDescriptor) -> &mut Self {
        self.tensors.insert(tensor.name.clone(), tensor);
        self
    }

    /// Add or replace a tensor at offset 0, to be placed by [`build`](Self::build).
    pub fn add_tensor(
        &mut self,
        name: impl Into<String>,
        shape: Vec<u64>,
        dtype: GgmlType,
    ) -> &mut Self {
        self.put_tensor(TensorDescriptor::new(name, shape, dtype))
    }

    /// Remove a tensor descriptor.
    pub fn remove_tensor(&mut self, name: &str) -> Result<TensorDescriptor> {
        self.tensors
            .remove(name)
            .ok_or_else(|| GgufError::TensorNotFound(name.to_string()))
    }

    /// Validate and produce a container with freshly packed tensor offsets.
    pub fn build(&self) -> Result<GgufContainer> {
        self.build_with(OffsetPolicy::Recompute)
    }

    /// Validate and produce a container.
    ///
    /// Layout checks (alignment, ordering, overlap) run under both policies.
    pub fn build_with(&self, policy: OffsetPolicy) -> Result<GgufContainer> {
        if !is_supported_version(self.version) {
            return Err(GgufError::UnsupportedVersion(self.version));
        }

        let alignment = alignment_from_metadata(&self.metadata)?;
        for (key, value) in self.metadata.iter() {
            if let MetadataValue::Array(arr) = value {
                arr.validate().map_err(|e| e.with_key(key))?;
            }
        }

        let mut tensors = self.tensors.clone();
        for tensor in tensors.values() {
            if tensor.n_dimensions() > MAX_DIMENSIONS as usize {
                return Err(GgufError::TooManyDimensions {
                    name: tensor.name.clone(),
                    n_dims: u32::try_from(tensor.n_dimensions()).unwrap_or(u32::MAX),
                    max: MAX_DIMENSIONS,
                });
            }
            tensor.validate_shape()?;
        }
        if policy == OffsetPolicy::Recompute {
            pack_offsets(&mut tensors, alignment)?;
        }
        let tensor_data_size = validate_layout(tensors.values(), alignment)?;

        let header_len = crate::writer::header_len(self.version, &self.metadata, &tensors)?;
        let tensor_data_offset = checked_align_offset(header_len, alignment)
            .ok_or(GgufError::IntegerOverflow("tensor data offset"))?;

        debug!(
            version = self.version,
            alignment,
            metadata = self.metadata.len(),
            tensors = tensors.len(),
            tensor_data_offset,
            ?policy,
            "built GGUF container"
        );

        Ok(GgufContainer::from_parts(
            self.version,
            alignment,
            self.metadata.clone(),
            tensors,
            tensor_data_offset,
            tensor_data_size,
        ))
    }
}

impl From<&GgufContainer> for GgufBuilder {
    fn from(container: &GgufContainer) -> Self {
        Self::from_container(container)
    }
}

/// Assign each tensor the running end of the previous one, rounded up to
/// `alignment`.
fn pack_offsets(tensors: &mut TensorTable, alignment: u64) -> Result<()> {
    let mut next: u64 = 0;
    for tensor in tensors.values_mut() {
        tensor.offset = next;
        let end = next
            .checked_add(tensor.byte_size()?)
            .ok_or(GgufError::IntegerOverflow("tensor end offset"))?;
        next = checked_align_offset(end, alignment)
            .ok_or(GgufError::IntegerOverflow("tensor offset"))?;
    }
    Ok(())
}
