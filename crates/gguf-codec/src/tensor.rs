//! Tensor descriptors and tensor-data layout checks.

use crate::{GgmlType, GgufError, Result};

/// Description of one tensor's payload: where it is and how to read it.
///
/// The payload bytes themselves are never held here. `offset` is relative
/// to the container's tensor-data base.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TensorDescriptor {
    /// Name of the tensor, unique within a container.
    pub name: String,
    /// Dimensions in file order (innermost first, as GGML stores them).
    pub shape: Vec<u64>,
    /// Element type.
    pub dtype: GgmlType,
    /// Offset of tensor data relative to the tensor-data base.
    pub offset: u64,
}

impl TensorDescriptor {
    /// Create a descriptor at offset 0. Offsets are normally assigned by
    /// [`GgufBuilder::build`](crate::GgufBuilder::build).
    pub fn new(name: impl Into<String>, shape: Vec<u64>, dtype: GgmlType) -> Self {
        Self {
            name: name.into(),
            shape,
            dtype,
            offset: 0,
        }
    }

    /// Same descriptor at an explicit offset.
    pub fn with_offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }

    /// Number of dimensions.
    pub fn n_dimensions(&self) -> usize {
        self.shape.len()
    }

    /// Get the number of elements in the tensor with checked arithmetic.
    pub fn n_elements(&self) -> Result<u64> {
        self.shape
            .iter()
            .try_fold(1u64, |acc, &dim| acc.checked_mul(dim))
            .ok_or(GgufError::IntegerOverflow("tensor element count"))
    }

    /// Get the byte size of the tensor data with checked arithmetic.
    pub fn byte_size(&self) -> Result<u64> {
        let n_elements = self.n_elements()?;
        self.dtype
            .tensor_size_checked(n_elements)
            .ok_or(GgufError::IntegerOverflow("tensor byte size"))
    }

    /// Check that the shape has at least one dimension, no zero dimensions,
    /// and an innermost dimension that fills whole blocks of the element type.
    pub fn validate_shape(&self) -> Result<()> {
        let invalid = || GgufError::InvalidShape {
            name: self.name.clone(),
            shape: self.shape.clone(),
        };
        let first = *self.shape.first().ok_or_else(invalid)?;
        if self.shape.contains(&0) || first % self.dtype.block_size() != 0 {
            return Err(invalid());
        }
        Ok(())
    }
}

/// Check the layout invariants of a tensor table.
///
/// Offsets must be multiples of `alignment` and non-decreasing in declared
/// order, and no tensor may start before the previous one ends. Returns the
/// end of the last tensor relative to the tensor-data base.
pub fn validate_layout<'a>(
    tensors: impl IntoIterator<Item = &'a TensorDescriptor>,
    alignment: u64,
) -> Result<u64> {
    let mut previous: Option<(&TensorDescriptor, u64)> = None;
    for tensor in tensors {
        let misaligned = tensor.offset % alignment != 0
            || previous.is_some_and(|(prev, _)| tensor.offset < prev.offset);
        if misaligned {
            return Err(GgufError::MisalignedTensorOffset {
                name: tensor.name.clone(),
                offset: tensor.offset,
                alignment,
            });
        }
        if let Some((prev, prev_end)) = previous {
            if tensor.offset < prev_end {
                return Err(GgufError::OverlappingTensors {
                    first: prev.name.clone(),
                    second: tensor.name.clone(),
                });
            }
        }
        let end = tensor
            .offset
            .checked_add(tensor.byte_size()?)
            .ok_or(GgufError::IntegerOverflow("tensor end offset"))?;
        previous = Some((tensor, end));
    }
    Ok(previous.map_or(0, |(_, end)| end))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn f32_tensor(name: &str, n: u64, offset: u64) -> TensorDescriptor {
        TensorDescriptor::new(name, vec![n], GgmlType::F32).with_offset(offset)
    }

    #[test]
    fn test_sizes() {
        let t = TensorDescriptor::new("w", vec![4, 4], GgmlType::F32);
        assert_eq!(t.n_elements().unwrap(), 16);
        assert_eq!(t.byte_size().unwrap(), 64);

        let q = TensorDescriptor::new("q", vec![256, 2], GgmlType::Q4K);
        assert_eq!(q.byte_size().unwrap(), 288);

        let huge = TensorDescriptor::new("h", vec![u64::MAX, 2], GgmlType::F32);
        assert!(matches!(huge.n_elements(), Err(GgufError::IntegerOverflow(_))));
    }

    #[test]
    fn test_shape_validation() {
        assert!(TensorDescriptor::new("a", vec![32, 3], GgmlType::Q8_0)
            .validate_shape()
            .is_ok());
        for shape in [vec![], vec![4, 0], vec![16, 2]] {
            let t = TensorDescriptor::new("b", shape, GgmlType::Q8_0);
            assert!(matches!(t.validate_shape(), Err(GgufError::InvalidShape { .. })));
        }
        assert!(TensorDescriptor::new("c", vec![3], GgmlType::F32)
            .validate_shape()
            .is_ok());
    }

    #[test]
    fn test_layout_ok() {
        let tensors = vec![f32_tensor("a", 8, 0), f32_tensor("b", 1, 32), f32_tensor("c", 1, 64)];
        assert_eq!(validate_layout(&tensors, 32).unwrap(), 68);
        assert_eq!(validate_layout(&Vec::<TensorDescriptor>::new(), 32).unwrap(), 0);
    }

    #[test]
    fn test_layout_misaligned() {
        let tensors = vec![f32_tensor("a", 1, 0), f32_tensor("b", 1, 16)];
        assert!(matches!(
            validate_layout(&tensors, 32),
            Err(GgufError::MisalignedTensorOffset {
                ref name,
                offset: 16,
                alignment: 32,
            }) if name == "b"
        ));
    }

    #[test]
    fn test_layout_decreasing_offsets() {
        let tensors = vec![f32_tensor("a", 1, 64), f32_tensor("b", 1, 0)];
        assert!(matches!(
            validate_layout(&tensors, 32),
            Err(GgufError::MisalignedTensorOffset { .. })
        ));
    }

    #[test]
    fn test_layout_overlap() {
        // "a" is 64 bytes, so "b" at 32 starts inside it.
        let tensors = vec![f32_tensor("a", 16, 0), f32_tensor("b", 1, 32)];
        assert!(matches!(
            validate_layout(&tensors, 32),
            Err(GgufError::OverlappingTensors { ref first, ref second })
                if first == "a" && second == "b"
        ));
    }
}
