//! GGUF file writer.
//!
//! Emits everything up to the tensor-data region. Tensor payloads are the
//! caller's job: after [`write_container`] returns, the sink sits exactly at
//! [`GgufContainer::tensor_data_offset`], and each tensor goes at
//! `tensor_data_offset + descriptor.offset`.

use std::io::{self, Write};

use tracing::debug;

use crate::container::{Metadata, TensorTable};
use crate::cursor::ByteWriter;
use crate::{GgufContainer, GgufError, MetadataValue, Result, TensorDescriptor, GGUF_MAGIC};

/// Serialize a container's header, metadata, tensor descriptors and the
/// zero padding that precedes tensor data.
///
/// Returns the number of bytes written. Business invariants are not
/// re-checked here; only fields that cannot be encoded fail.
pub fn write_container<W: Write>(container: &GgufContainer, sink: W) -> Result<u64> {
    let mut writer = ByteWriter::new(sink);
    write_header(
        &mut writer,
        container.version(),
        container.metadata(),
        container.tensors(),
    )?;
    let padding = writer.pad_to_alignment(container.alignment())?;
    writer.flush()?;

    let written = writer.position();
    debug!(
        written,
        padding,
        alignment = container.alignment(),
        "wrote GGUF header"
    );
    Ok(written)
}

/// Size in bytes of the header, metadata and tensor descriptors, before
/// alignment padding.
pub(crate) fn header_len(version: u32, metadata: &Metadata, tensors: &TensorTable) -> Result<u64> {
    let mut counter = ByteWriter::new(io::sink());
    write_header(&mut counter, version, metadata, tensors.values())?;
    Ok(counter.position())
}

fn write_header<'a, W: Write>(
    writer: &mut ByteWriter<W>,
    version: u32,
    metadata: &Metadata,
    tensors: impl ExactSizeIterator<Item = &'a TensorDescriptor>,
) -> Result<()> {
    let tensor_count =
        u64::try_from(tensors.len()).map_err(|_| GgufError::IntegerOverflow("tensor count"))?;
    let kv_count =
        u64::try_from(metadata.len()).map_err(|_| GgufError::IntegerOverflow("metadata count"))?;

    writer.write_u32(GGUF_MAGIC)?;
    writer.write_u32(version)?;
    writer.write_u64(tensor_count)?;
    writer.write_u64(kv_count)?;

    for (key, value) in metadata.iter() {
        writer.write_string(key)?;
        write_metadata_value(writer, value).map_err(|e| e.with_key(key))?;
    }

    for info in tensors {
        write_tensor_info(writer, info)?;
    }
    Ok(())
}

/// Write a metadata value: type tag followed by payload.
fn write_metadata_value<W: Write>(
    writer: &mut ByteWriter<W>,
    value: &MetadataValue,
) -> Result<()> {
    writer.write_u32(value.value_type() as u32)?;
    write_metadata_value_data(writer, value)
}

/// Write just the data portion of a metadata value (no type prefix).
fn write_metadata_value_data<W: Write>(
    writer: &mut ByteWriter<W>,
    value: &MetadataValue,
) -> Result<()> {
    match value {
        MetadataValue::Uint8(v) => writer.write_u8(*v),
        MetadataValue::Int8(v) => writer.write_i8(*v),
        MetadataValue::Uint16(v) => writer.write_u16(*v),
        MetadataValue::Int16(v) => writer.write_i16(*v),
        MetadataValue::Uint32(v) => writer.write_u32(*v),
        MetadataValue::Int32(v) => writer.write_i32(*v),
        MetadataValue::Float32(v) => writer.write_f32(*v),
        MetadataValue::Bool(v) => writer.write_bool(*v),
        MetadataValue::String(s) => writer.write_string(s),
        MetadataValue::Uint64(v) => writer.write_u64(*v),
        MetadataValue::Int64(v) => writer.write_i64(*v),
        MetadataValue::Float64(v) => writer.write_f64(*v),
        MetadataValue::Array(arr) => {
            // An array that cannot be read back must not be emitted.
            arr.validate()?;
            let len = u64::try_from(arr.len())
                .map_err(|_| GgufError::IntegerOverflow("array length"))?;
            writer.write_u32(arr.element_type() as u32)?;
            writer.write_u64(len)?;
            for elem in arr {
                write_metadata_value_data(writer, elem)?;
            }
            Ok(())
        }
    }
}

/// Write tensor info.
fn write_tensor_info<W: Write>(writer: &mut ByteWriter<W>, info: &TensorDescriptor) -> Result<()> {
    let n_dims = u32::try_from(info.shape.len())
        .map_err(|_| GgufError::IntegerOverflow("tensor dimension count"))?;
    writer.write_string(&info.name)?;
    writer.write_u32(n_dims)?;
    for dim in &info.shape {
        writer.write_u64(*dim)?;
    }
    writer.write_u32(info.dtype as u32)?;
    writer.write_u64(info.offset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{GgmlType, GgufBuilder, MetadataArray, MetadataValueType, GGUF_VERSION};

    #[test]
    fn test_gguf_header() {
        let container = GgufBuilder::new().build().unwrap();
        let bytes = container.to_bytes().unwrap();

        // Check magic number
        assert_eq!(&bytes[0..4], &GGUF_MAGIC.to_le_bytes());
        assert_eq!(&bytes[0..4], b"GGUF");
        // Check version
        assert_eq!(&bytes[4..8], &GGUF_VERSION.to_le_bytes());
        // Counts
        assert_eq!(&bytes[8..16], &0u64.to_le_bytes());
        assert_eq!(&bytes[16..24], &0u64.to_le_bytes());
        // Padded to the default alignment
        assert_eq!(bytes.len(), 32);
        assert!(bytes[24..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_written_length_matches_tensor_data_offset() {
        let mut builder = GgufBuilder::new();
        builder
            .put_string("general.name", "m")
            .put_u32("n_layers", 32)
            .add_tensor("w", vec![4, 4], GgmlType::F32);
        let container = builder.build().unwrap();

        let mut sink = Vec::new();
        let written = container.write(&mut sink).unwrap();
        assert_eq!(written, sink.len() as u64);
        assert_eq!(written, container.tensor_data_offset());
        assert_eq!(written % 32, 0);
    }

    #[test]
    fn test_tensor_info_layout() {
        let mut builder = GgufBuilder::new();
        builder.add_tensor("t", vec![2, 3], GgmlType::F16);
        let bytes = builder.build().unwrap().to_bytes().unwrap();

        let mut expected = Vec::new();
        expected.extend_from_slice(&1u64.to_le_bytes()); // name length
        expected.extend_from_slice(b"t");
        expected.extend_from_slice(&2u32.to_le_bytes()); // n_dims
        expected.extend_from_slice(&2u64.to_le_bytes());
        expected.extend_from_slice(&3u64.to_le_bytes());
        expected.extend_from_slice(&(GgmlType::F16 as u32).to_le_bytes());
        expected.extend_from_slice(&0u64.to_le_bytes()); // offset
        assert_eq!(&bytes[24..24 + expected.len()], expected.as_slice());
    }

    #[test]
    fn test_empty_array_keeps_element_type() {
        let mut builder = GgufBuilder::new();
        builder.put_value("e", MetadataArray::empty(MetadataValueType::Int16).unwrap());
        let bytes = builder.build().unwrap().to_bytes().unwrap();

        // key(8 + 1) then value tag, element tag, length
        let at = 24 + 9;
        assert_eq!(&bytes[at..at + 4], &(MetadataValueType::Array as u32).to_le_bytes());
        assert_eq!(&bytes[at + 4..at + 8], &(MetadataValueType::Int16 as u32).to_le_bytes());
        assert_eq!(&bytes[at + 8..at + 16], &0u64.to_le_bytes());
    }

    #[test]
    fn test_nested_array_not_encodable() {
        let nested = MetadataArray::unchecked(MetadataValueType::Array, Vec::new());
        let mut writer = ByteWriter::new(Vec::new());
        assert!(matches!(
            write_metadata_value(&mut writer, &MetadataValue::Array(nested)),
            Err(GgufError::UnsupportedNestedArray)
        ));
    }

    #[test]
    fn test_header_len_counts_without_padding() {
        let metadata = Metadata::new();
        let tensors = TensorTable::new();
        assert_eq!(header_len(GGUF_VERSION, &metadata, &tensors).unwrap(), 24);
    }
}
