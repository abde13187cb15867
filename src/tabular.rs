use log::debug;

use crate::datatype::{self, compound_layout, CompoundField, Datatype, StrPad};
use crate::error::{Hdf5Error, Result, SUPPORTED_ELEMENT_KINDS};
use crate::source::{CellValue, TabularSource};
use crate::writer::Endian;

/// Tabular (DataFrame-shaped) sources become either one compound-record
/// dataset or one dataset per column. Column types are inferred from the
/// data: integers widen to int64, mixed numerics to float64, any string
/// turns the column into fixed UTF-8 sized to the longest rendered value
/// (rounded up to 8), booleans become the boolean enum, and all-null
/// columns fall back to float64.

#[derive(Debug, Clone)]
pub struct FieldPlan {
    pub name: String,
    pub dtype: Datatype,
    pub size: u32,
    pub offset: u32,
}

/// The inspection record for a planned compound encoding.
#[derive(Debug, Clone)]
pub struct TablePlan {
    pub datatype: Datatype,
    pub fields: Vec<FieldPlan>,
    pub record_size: u32,
    pub row_count: u64,
    pub column_names: Vec<String>,
}

fn render(value: &CellValue) -> String {
    match value {
        CellValue::Str(s) => s.clone(),
        CellValue::Int(v) => v.to_string(),
        CellValue::Float(v) => v.to_string(),
        CellValue::Bool(v) => v.to_string(),
        CellValue::Null => String::new(),
    }
}

fn infer_column(table: &dyn TabularSource, column: usize) -> Result<Datatype> {
    let mut saw_int = false;
    let mut saw_float = false;
    let mut saw_bool = false;
    let mut saw_str = false;
    let mut max_len = 0usize;
    for row in 0..table.row_count() {
        let values = table.row_values(row);
        match values.get(column) {
            Some(CellValue::Int(_)) => saw_int = true,
            Some(CellValue::Float(_)) => saw_float = true,
            Some(CellValue::Bool(_)) => saw_bool = true,
            Some(CellValue::Str(_)) => saw_str = true,
            Some(CellValue::Null) | None => {}
        }
    }
    if saw_str {
        // strings absorb the column; every value is rendered as text
        for row in 0..table.row_count() {
            if let Some(value) = table.row_values(row).get(column) {
                if !matches!(value, CellValue::Null) {
                    max_len = max_len.max(render(value).len());
                }
            }
        }
        let length = crate::format::pad8(max_len.max(1)) as u32;
        return Ok(Datatype::FixedString {
            length,
            pad: StrPad::NullPad,
            charset: datatype::CharSet::Utf8,
        });
    }
    if saw_bool {
        if saw_int || saw_float {
            return Err(Hdf5Error::UnsupportedWriteDatatype {
                description: format!(
                    "column {column} mixes boolean and numeric values"
                ),
                supported: SUPPORTED_ELEMENT_KINDS,
            });
        }
        return Ok(Datatype::boolean());
    }
    if saw_float {
        return Ok(Datatype::float64());
    }
    if saw_int {
        return Ok(Datatype::int64());
    }
    // all-null columns default to float64 and encode as NaN
    Ok(Datatype::float64())
}

/// Infer a compound datatype over all columns in declaration order.
pub fn plan_compound(table: &dyn TabularSource) -> Result<TablePlan> {
    let names = table.column_names();
    if names.is_empty() {
        return Err(Hdf5Error::UnsupportedWriteDatatype {
            description: "tabular source has no columns".to_string(),
            supported: SUPPORTED_ELEMENT_KINDS,
        });
    }
    let mut fields = Vec::with_capacity(names.len());
    for (column, name) in names.iter().enumerate() {
        fields.push(CompoundField::new(name.clone(), infer_column(table, column)?));
    }
    let layout = compound_layout(&fields);
    let plans: Vec<FieldPlan> = fields
        .iter()
        .zip(&layout.offsets)
        .map(|(field, offset)| FieldPlan {
            name: field.name.clone(),
            dtype: field.dtype.clone(),
            size: field.dtype.element_size(),
            offset: *offset,
        })
        .collect();
    debug!(
        "compound plan: {} fields, {} byte records, {} rows",
        plans.len(),
        layout.size,
        table.row_count()
    );
    Ok(TablePlan {
        datatype: Datatype::Compound { fields },
        fields: plans,
        record_size: layout.size,
        row_count: table.row_count(),
        column_names: names,
    })
}

fn encode_cell(field: &FieldPlan, value: &CellValue, record: &mut [u8]) -> Result<()> {
    let offset = field.offset as usize;
    let size = field.size as usize;
    let slot = &mut record[offset..offset + size];
    let mut bytes = Vec::with_capacity(size);
    match (&field.dtype, value) {
        (Datatype::Integer { .. }, CellValue::Int(v)) => {
            datatype::push_int(&mut bytes, *v, 8, Endian::Little)
        }
        (Datatype::Integer { .. }, CellValue::Null) => bytes.resize(size, 0),
        (Datatype::Float { .. }, CellValue::Float(v)) => {
            datatype::push_float(&mut bytes, *v, 8, Endian::Little)
        }
        (Datatype::Float { .. }, CellValue::Int(v)) => {
            datatype::push_float(&mut bytes, *v as f64, 8, Endian::Little)
        }
        (Datatype::Float { .. }, CellValue::Null) => {
            datatype::push_float(&mut bytes, f64::NAN, 8, Endian::Little)
        }
        (Datatype::FixedString { length, pad, .. }, value) => match value {
            CellValue::Null => bytes.resize(size, 0),
            other => datatype::encode_fixed_string(&render(other), *length as usize, *pad, &mut bytes),
        },
        (Datatype::Enum { .. }, CellValue::Bool(v)) => bytes.push(datatype::encode_bool(*v)),
        (Datatype::Enum { .. }, CellValue::Null) => bytes.push(0),
        (dtype, value) => {
            return Err(Hdf5Error::DataValidation {
                dims: Vec::new(),
                reason: format!(
                    "cell {value:?} does not fit inferred field {:?} ({dtype:?})",
                    field.name
                ),
            })
        }
    }
    slot.copy_from_slice(&bytes);
    Ok(())
}

/// Encode one record per row at the planned offsets; padding bytes stay
/// zero. A row shorter than the column list is a missing field.
pub fn encode_compound_records(table: &dyn TabularSource, plan: &TablePlan) -> Result<Vec<u8>> {
    let record_size = plan.record_size as usize;
    let mut out = vec![0u8; record_size * plan.row_count as usize];
    for row in 0..plan.row_count {
        let values = table.row_values(row);
        let record = &mut out[row as usize * record_size..(row as usize + 1) * record_size];
        for (column, field) in plan.fields.iter().enumerate() {
            let value = values.get(column).ok_or_else(|| Hdf5Error::DataValidation {
                dims: vec![plan.row_count],
                reason: format!("row {row} is missing field {:?}", field.name),
            })?;
            encode_cell(field, value, record)?;
        }
    }
    Ok(out)
}

/// One column rendered as a standalone dataset.
#[derive(Debug, Clone)]
pub struct ColumnData {
    pub name: String,
    pub dtype: Datatype,
    pub bytes: Vec<u8>,
}

/// Column-wise strategy: each column keeps its inferred type and becomes a
/// rank-1 dataset in declaration order.
pub fn encode_columns(table: &dyn TabularSource) -> Result<Vec<ColumnData>> {
    let names = table.column_names();
    if names.is_empty() {
        return Err(Hdf5Error::UnsupportedWriteDatatype {
            description: "tabular source has no columns".to_string(),
            supported: SUPPORTED_ELEMENT_KINDS,
        });
    }
    let mut columns = Vec::with_capacity(names.len());
    for (column, name) in names.iter().enumerate() {
        let dtype = infer_column(table, column)?;
        let size = dtype.element_size();
        let field = FieldPlan {
            name: name.clone(),
            dtype: dtype.clone(),
            size,
            offset: 0,
        };
        let mut bytes = vec![0u8; size as usize * table.row_count() as usize];
        for row in 0..table.row_count() {
            let values = table.row_values(row);
            let value = values.get(column).cloned().unwrap_or(CellValue::Null);
            let record =
                &mut bytes[row as usize * size as usize..(row as usize + 1) * size as usize];
            encode_cell(&field, &value, record)?;
        }
        columns.push(ColumnData { name: name.clone(), dtype, bytes });
    }
    Ok(columns)
}
