//! Metadata value model.
//!
//! [`MetadataValue`] is a closed sum type with one variant per GGUF value
//! type. Arrays carry an explicit element type that is fixed at creation;
//! arrays of arrays cannot be encoded and are rejected.
//!
//! Unsigned variants hold Rust's unsigned integers of the same width as
//! their signed counterparts. The codec moves their bits verbatim and never
//! reinterprets magnitude, so `Uint64(u64::MAX)` survives a round trip
//! exactly.

use std::fmt;

use crate::{GgufError, MetadataValueType, Result};

/// A metadata value in GGUF format.
///
/// Equality is bitwise for floats, so a NaN equals an identical NaN and a
/// parsed container compares equal to the one it was serialized from.
#[derive(Debug, Clone)]
pub enum MetadataValue {
    /// 8-bit unsigned integer
    Uint8(u8),
    /// 8-bit signed integer
    Int8(i8),
    /// 16-bit unsigned integer
    Uint16(u16),
    /// 16-bit signed integer
    Int16(i16),
    /// 32-bit unsigned integer
    Uint32(u32),
    /// 32-bit signed integer
    Int32(i32),
    /// 32-bit float
    Float32(f32),
    /// Boolean
    Bool(bool),
    /// UTF-8 string
    String(String),
    /// One-dimensional homogeneous array
    Array(MetadataArray),
    /// 64-bit unsigned integer
    Uint64(u64),
    /// 64-bit signed integer
    Int64(i64),
    /// 64-bit float
    Float64(f64),
}

impl PartialEq for MetadataValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Uint8(a), Self::Uint8(b)) => a == b,
            (Self::Int8(a), Self::Int8(b)) => a == b,
            (Self::Uint16(a), Self::Uint16(b)) => a == b,
            (Self::Int16(a), Self::Int16(b)) => a == b,
            (Self::Uint32(a), Self::Uint32(b)) => a == b,
            (Self::Int32(a), Self::Int32(b)) => a == b,
            (Self::Float32(a), Self::Float32(b)) => a.to_bits() == b.to_bits(),
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Array(a), Self::Array(b)) => a == b,
            (Self::Uint64(a), Self::Uint64(b)) => a == b,
            (Self::Int64(a), Self::Int64(b)) => a == b,
            (Self::Float64(a), Self::Float64(b)) => a.to_bits() == b.to_bits(),
            _ => false,
        }
    }
}

impl MetadataValue {
    /// Get the type of this value.
    pub fn value_type(&self) -> MetadataValueType {
        match self {
            Self::Uint8(_) => MetadataValueType::Uint8,
            Self::Int8(_) => MetadataValueType::Int8,
            Self::Uint16(_) => MetadataValueType::Uint16,
            Self::Int16(_) => MetadataValueType::Int16,
            Self::Uint32(_) => MetadataValueType::Uint32,
            Self::Int32(_) => MetadataValueType::Int32,
            Self::Float32(_) => MetadataValueType::Float32,
            Self::Bool(_) => MetadataValueType::Bool,
            Self::String(_) => MetadataValueType::String,
            Self::Array(_) => MetadataValueType::Array,
            Self::Uint64(_) => MetadataValueType::Uint64,
            Self::Int64(_) => MetadataValueType::Int64,
            Self::Float64(_) => MetadataValueType::Float64,
        }
    }

    /// Element type for arrays, `None` for scalars.
    pub fn array_element_type(&self) -> Option<MetadataValueType> {
        match self {
            Self::Array(arr) => Some(arr.element_type()),
            _ => None,
        }
    }

    /// Convert to `T`, failing with `TypeMismatch` unless the stored tag is
    /// exactly `T`'s tag.
    pub fn get<T: FromMetadataValue>(&self) -> Result<T> {
        T::from_value(self)
    }

    fn mismatch(&self, expected: MetadataValueType) -> GgufError {
        GgufError::type_mismatch("", expected, self.value_type())
    }

    /// Borrow the string payload.
    pub fn as_str(&self) -> Result<&str> {
        match self {
            Self::String(s) => Ok(s),
            other => Err(other.mismatch(MetadataValueType::String)),
        }
    }

    /// Borrow the array payload.
    pub fn as_array(&self) -> Result<&MetadataArray> {
        match self {
            Self::Array(arr) => Ok(arr),
            other => Err(other.mismatch(MetadataValueType::Array)),
        }
    }

    /// Integer value widened to `u64`, for fields such as alignment that
    /// accept any integer width. Negative values yield `None`.
    pub(crate) fn as_unsigned_integer(&self) -> Option<u64> {
        match *self {
            Self::Uint8(v) => Some(v.into()),
            Self::Uint16(v) => Some(v.into()),
            Self::Uint32(v) => Some(v.into()),
            Self::Uint64(v) => Some(v),
            Self::Int8(v) => u64::try_from(v).ok(),
            Self::Int16(v) => u64::try_from(v).ok(),
            Self::Int32(v) => u64::try_from(v).ok(),
            Self::Int64(v) => u64::try_from(v).ok(),
            _ => None,
        }
    }
}

macro_rules! scalar_accessors {
    ($($fn_name:ident => $variant:ident($ty:ty)),* $(,)?) => {
        impl MetadataValue {
            $(
                #[doc = concat!("Read a `", stringify!($variant), "` value.")]
                pub fn $fn_name(&self) -> Result<$ty> {
                    match self {
                        Self::$variant(v) => Ok(*v),
                        other => Err(other.mismatch(MetadataValueType::$variant)),
                    }
                }
            )*
        }
    };
}

scalar_accessors! {
    as_u8 => Uint8(u8),
    as_i8 => Int8(i8),
    as_u16 => Uint16(u16),
    as_i16 => Int16(i16),
    as_u32 => Uint32(u32),
    as_i32 => Int32(i32),
    as_f32 => Float32(f32),
    as_bool => Bool(bool),
    as_u64 => Uint64(u64),
    as_i64 => Int64(i64),
    as_f64 => Float64(f64),
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uint8(v) => write!(f, "{v}"),
            Self::Int8(v) => write!(f, "{v}"),
            Self::Uint16(v) => write!(f, "{v}"),
            Self::Int16(v) => write!(f, "{v}"),
            Self::Uint32(v) => write!(f, "{v}"),
            Self::Int32(v) => write!(f, "{v}"),
            Self::Float32(v) => write!(f, "{v}"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::String(s) => write!(f, "{s:?}"),
            Self::Array(arr) => {
                f.write_str("[")?;
                for (i, v) in arr.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{v}")?;
                }
                f.write_str("]")
            }
            Self::Uint64(v) => write!(f, "{v}"),
            Self::Int64(v) => write!(f, "{v}"),
            Self::Float64(v) => write!(f, "{v}"),
        }
    }
}

/// A one-dimensional array of metadata values sharing one element type.
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataArray {
    element_type: MetadataValueType,
    values: Vec<MetadataValue>,
}

impl MetadataArray {
    /// Create an array, checking that `element_type` is not `Array` and that
    /// every value carries `element_type`.
    pub fn new(element_type: MetadataValueType, values: Vec<MetadataValue>) -> Result<Self> {
        let array = Self::unchecked(element_type, values);
        array.validate()?;
        Ok(array)
    }

    /// Create an empty array with a declared element type.
    pub fn empty(element_type: MetadataValueType) -> Result<Self> {
        Self::new(element_type, Vec::new())
    }

    /// Create an array from native Rust values. Always valid.
    pub fn of<T: MetadataScalar>(values: impl IntoIterator<Item = T>) -> Self {
        Self {
            element_type: T::VALUE_TYPE,
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Stage an array without checking it; [`MetadataArray::validate`] must
    /// pass before it is encoded.
    pub(crate) fn unchecked(element_type: MetadataValueType, values: Vec<MetadataValue>) -> Self {
        Self {
            element_type,
            values,
        }
    }

    /// Check the element type and every element against it.
    pub fn validate(&self) -> Result<()> {
        if self.element_type == MetadataValueType::Array {
            return Err(GgufError::UnsupportedNestedArray);
        }
        for value in &self.values {
            let actual = value.value_type();
            if actual == MetadataValueType::Array {
                return Err(GgufError::UnsupportedNestedArray);
            }
            if actual != self.element_type {
                return Err(GgufError::type_mismatch("", self.element_type, actual));
            }
        }
        Ok(())
    }

    /// Declared element type.
    pub fn element_type(&self) -> MetadataValueType {
        self.element_type
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the array has no elements.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate over the elements.
    pub fn iter(&self) -> std::slice::Iter<'_, MetadataValue> {
        self.values.iter()
    }

    /// Borrow the elements.
    pub fn values(&self) -> &[MetadataValue] {
        &self.values
    }
}

impl<'a> IntoIterator for &'a MetadataArray {
    type Item = &'a MetadataValue;
    type IntoIter = std::slice::Iter<'a, MetadataValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.iter()
    }
}

/// Types that can be read out of a [`MetadataValue`].
pub trait FromMetadataValue: Sized {
    /// The value type tag this Rust type corresponds to.
    const VALUE_TYPE: MetadataValueType;

    /// Convert, failing with `TypeMismatch` on any other tag.
    fn from_value(value: &MetadataValue) -> Result<Self>;
}

/// Rust types that map to exactly one non-array GGUF value type.
pub trait MetadataScalar: FromMetadataValue + Into<MetadataValue> {}

macro_rules! impl_scalar {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl FromMetadataValue for $ty {
                const VALUE_TYPE: MetadataValueType = MetadataValueType::$variant;

                fn from_value(value: &MetadataValue) -> Result<Self> {
                    match value {
                        MetadataValue::$variant(v) => Ok(*v),
                        other => Err(other.mismatch(Self::VALUE_TYPE)),
                    }
                }
            }

            impl From<$ty> for MetadataValue {
                fn from(v: $ty) -> Self {
                    MetadataValue::$variant(v)
                }
            }

            impl MetadataScalar for $ty {}
        )*
    };
}

impl_scalar! {
    u8 => Uint8,
    i8 => Int8,
    u16 => Uint16,
    i16 => Int16,
    u32 => Uint32,
    i32 => Int32,
    f32 => Float32,
    bool => Bool,
    u64 => Uint64,
    i64 => Int64,
    f64 => Float64,
}

impl FromMetadataValue for String {
    const VALUE_TYPE: MetadataValueType = MetadataValueType::String;

    fn from_value(value: &MetadataValue) -> Result<Self> {
        value.as_str().map(str::to_owned)
    }
}

impl MetadataScalar for String {}

impl<T: MetadataScalar> FromMetadataValue for Vec<T> {
    const VALUE_TYPE: MetadataValueType = MetadataValueType::Array;

    fn from_value(value: &MetadataValue) -> Result<Self> {
        let arr = value.as_array()?;
        if arr.element_type() != T::VALUE_TYPE {
            return Err(GgufError::type_mismatch(
                "",
                T::VALUE_TYPE,
                arr.element_type(),
            ));
        }
        arr.iter().map(T::from_value).collect()
    }
}

impl From<String> for MetadataValue {
    fn from(v: String) -> Self {
        MetadataValue::String(v)
    }
}

impl From<&str> for MetadataValue {
    fn from(v: &str) -> Self {
        MetadataValue::String(v.to_owned())
    }
}

impl From<MetadataArray> for MetadataValue {
    fn from(v: MetadataArray) -> Self {
        MetadataValue::Array(v)
    }
}

impl<T: MetadataScalar> From<Vec<T>> for MetadataValue {
    fn from(values: Vec<T>) -> Self {
        MetadataValue::Array(MetadataArray::of(values))
    }
}
