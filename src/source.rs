use std::fs;
use std::path::Path;

use crate::attribute::AttributeValue;
use crate::datatype::Datatype;
use crate::error::{Hdf5Error, Result, SUPPORTED_ELEMENT_KINDS};

/// Source-side adapter interfaces. The writer core consumes these; the
/// in-memory implementations below exist for tests and the demo binary.

/// Element kind an array source reports; maps onto a concrete datatype.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementKind {
    Int { bits: u32, signed: bool },
    Float { bits: u32 },
    Bool,
    FixedString { length: u32 },
}

impl ElementKind {
    pub fn datatype(&self) -> Result<Datatype> {
        match self {
            ElementKind::Int { bits, signed } => match bits {
                8 | 16 | 32 | 64 => Ok(Datatype::Integer {
                    size: bits / 8,
                    signed: *signed,
                    order: crate::writer::Endian::Little,
                }),
                _ => Err(unsupported(format!("{bits}-bit integer"))),
            },
            ElementKind::Float { bits } => match bits {
                32 => Ok(Datatype::float32()),
                64 => Ok(Datatype::float64()),
                _ => Err(unsupported(format!("{bits}-bit float"))),
            },
            ElementKind::Bool => Ok(Datatype::boolean()),
            ElementKind::FixedString { length } => Ok(Datatype::fixed_utf8(*length)),
        }
    }

    pub fn byte_size(&self) -> u32 {
        match self {
            ElementKind::Int { bits, .. } | ElementKind::Float { bits } => bits / 8,
            ElementKind::Bool => 1,
            ElementKind::FixedString { length } => *length,
        }
    }
}

fn unsupported(description: String) -> Hdf5Error {
    Hdf5Error::UnsupportedWriteDatatype { description, supported: SUPPORTED_ELEMENT_KINDS }
}

/// N-dimensional array seen as a flat row-major byte stream.
pub trait ArraySource {
    fn rank(&self) -> u8 {
        self.dims().len() as u8
    }
    fn dims(&self) -> Vec<u64>;
    fn element_kind(&self) -> ElementKind;
    /// encoded fill value for cells past the dataset bounds; empty means
    /// all-zero
    fn fill_value(&self) -> Vec<u8> {
        Vec::new()
    }
    /// append raw bytes of `n_elems` elements starting at `offset_elems`
    fn read_row_major(&self, offset_elems: u64, n_elems: u64, out: &mut Vec<u8>);
    fn attributes(&self) -> Vec<(String, AttributeValue)> {
        Vec::new()
    }
}

/// Rust scalar types an in-memory array can hold.
pub trait Element: sealed::Sealed + Copy {
    fn kind() -> ElementKind;
    fn write_bytes(&self, out: &mut Vec<u8>);
}

mod sealed {
    pub trait Sealed {}
    impl Sealed for i8 {}
    impl Sealed for i16 {}
    impl Sealed for i32 {}
    impl Sealed for i64 {}
    impl Sealed for u8 {}
    impl Sealed for u16 {}
    impl Sealed for u32 {}
    impl Sealed for u64 {}
    impl Sealed for f32 {}
    impl Sealed for f64 {}
    impl Sealed for bool {}
}

macro_rules! impl_element {
    ($ty:ty, $bits:expr, $signed:expr) => {
        impl Element for $ty {
            fn kind() -> ElementKind {
                ElementKind::Int { bits: $bits, signed: $signed }
            }
            fn write_bytes(&self, out: &mut Vec<u8>) {
                out.extend_from_slice(&self.to_le_bytes());
            }
        }
    };
}

impl_element!(i8, 8, true);
impl_element!(i16, 16, true);
impl_element!(i32, 32, true);
impl_element!(i64, 64, true);
impl_element!(u8, 8, false);
impl_element!(u16, 16, false);
impl_element!(u32, 32, false);
impl_element!(u64, 64, false);

impl Element for f32 {
    fn kind() -> ElementKind {
        ElementKind::Float { bits: 32 }
    }
    fn write_bytes(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_le_bytes());
    }
}

impl Element for f64 {
    fn kind() -> ElementKind {
        ElementKind::Float { bits: 64 }
    }
    fn write_bytes(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_le_bytes());
    }
}

impl Element for bool {
    fn kind() -> ElementKind {
        ElementKind::Bool
    }
    fn write_bytes(&self, out: &mut Vec<u8>) {
        out.push(u8::from(*self));
    }
}

/// Owned row-major array, the bread-and-butter `ArraySource`.
#[derive(Debug, Clone)]
pub struct MemArray<T> {
    dims: Vec<u64>,
    data: Vec<T>,
    fill: Option<T>,
    attributes: Vec<(String, AttributeValue)>,
}

impl<T: Element> MemArray<T> {
    pub fn new(dims: Vec<u64>, data: Vec<T>) -> MemArray<T> {
        debug_assert_eq!(dims.iter().product::<u64>(), data.len() as u64);
        MemArray { dims, data, fill: None, attributes: Vec::new() }
    }

    /// rank-0 array holding exactly one element
    pub fn scalar(value: T) -> MemArray<T> {
        MemArray { dims: Vec::new(), data: vec![value], fill: None, attributes: Vec::new() }
    }

    /// fill value for cells outside the data, e.g. edge-chunk padding
    pub fn with_fill(mut self, fill: T) -> Self {
        self.fill = Some(fill);
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: AttributeValue) -> Self {
        self.attributes.push((name.into(), value));
        self
    }
}

impl<T: Element> ArraySource for MemArray<T> {
    fn dims(&self) -> Vec<u64> {
        self.dims.clone()
    }

    fn element_kind(&self) -> ElementKind {
        T::kind()
    }

    fn fill_value(&self) -> Vec<u8> {
        let mut out = Vec::new();
        if let Some(fill) = &self.fill {
            fill.write_bytes(&mut out);
        }
        out
    }

    fn read_row_major(&self, offset_elems: u64, n_elems: u64, out: &mut Vec<u8>) {
        let start = offset_elems as usize;
        let end = start + n_elems as usize;
        for v in &self.data[start..end] {
            v.write_bytes(out);
        }
    }

    fn attributes(&self) -> Vec<(String, AttributeValue)> {
        self.attributes.clone()
    }
}

/// One cell of a tabular source.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    Null,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Int,
    Float,
    Str,
    Bool,
    Null,
}

/// Row/column table; the tabular encoder scans it once for type inference
/// and once more per row while encoding.
pub trait TabularSource {
    fn row_count(&self) -> u64;
    fn column_names(&self) -> Vec<String>;
    fn column_kind(&self, column: usize) -> ColumnKind;
    fn row_values(&self, row: u64) -> Vec<CellValue>;
}

/// Column-major in-memory table.
#[derive(Debug, Clone, Default)]
pub struct MemTable {
    names: Vec<String>,
    columns: Vec<Vec<CellValue>>,
}

impl MemTable {
    pub fn new(names: Vec<String>) -> MemTable {
        let columns = names.iter().map(|_| Vec::new()).collect();
        MemTable { names, columns }
    }

    pub fn push_row(&mut self, row: Vec<CellValue>) {
        debug_assert_eq!(row.len(), self.columns.len());
        for (column, value) in self.columns.iter_mut().zip(row) {
            column.push(value);
        }
    }
}

impl TabularSource for MemTable {
    fn row_count(&self) -> u64 {
        self.columns.first().map(|c| c.len() as u64).unwrap_or(0)
    }

    fn column_names(&self) -> Vec<String> {
        self.names.clone()
    }

    fn column_kind(&self, column: usize) -> ColumnKind {
        for value in &self.columns[column] {
            match value {
                CellValue::Int(_) => return ColumnKind::Int,
                CellValue::Float(_) => return ColumnKind::Float,
                CellValue::Str(_) => return ColumnKind::Str,
                CellValue::Bool(_) => return ColumnKind::Bool,
                CellValue::Null => continue,
            }
        }
        ColumnKind::Null
    }

    fn row_values(&self, row: u64) -> Vec<CellValue> {
        self.columns.iter().map(|c| c[row as usize].clone()).collect()
    }
}

/// Destination for the finished image. Atomicity is the sink's business,
/// not the writer core's.
pub trait FileSink {
    fn write_all(&mut self, bytes: &[u8]) -> Result<()>;
}

/// Test sink collecting bytes in memory.
#[derive(Debug, Default)]
pub struct VecSink(pub Vec<u8>);

impl FileSink for VecSink {
    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        self.0.extend_from_slice(bytes);
        Ok(())
    }
}

/// Write-to-temp then rename, so readers never observe a half-written file.
pub fn write_to_path(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    tmp.push(".tmp");
    let tmp_path = dir.join(tmp);
    fs::write(&tmp_path, bytes)?;
    fs::rename(&tmp_path, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mem_array_reads_ranges() {
        let arr = MemArray::new(vec![2, 3], vec![1.0f64, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(arr.rank(), 2);
        let mut out = Vec::new();
        arr.read_row_major(2, 2, &mut out);
        assert_eq!(out.len(), 16);
        assert_eq!(&out[..8], &3.0f64.to_le_bytes());
    }

    #[test]
    fn column_kind_skips_nulls() {
        let mut table = MemTable::new(vec!["a".into(), "b".into()]);
        table.push_row(vec![CellValue::Null, CellValue::Int(1)]);
        table.push_row(vec![CellValue::Float(2.5), CellValue::Null]);
        assert_eq!(table.column_kind(0), ColumnKind::Float);
        assert_eq!(table.column_kind(1), ColumnKind::Int);
        assert_eq!(table.row_count(), 2);
    }

    #[test]
    fn atomic_write_helper() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("image.h5");
        write_to_path(&path, b"payload").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"payload");
        assert!(!dir.path().join("image.h5.tmp").exists());
    }
}
