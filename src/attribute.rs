use crate::datatype::{self, Datatype, StrPad};
use crate::dataspace::Dataspace;
use crate::error::{Hdf5Error, Result};
use crate::format::pad8;
use crate::writer::Endian;

/// Attribute values are scalars only; list- or map-shaped values are
/// rejected before emission.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl AttributeValue {
    /// String values become fixed-length UTF-8 with a terminating NUL so the
    /// value needs no global heap traffic.
    pub fn datatype(&self) -> Datatype {
        match self {
            AttributeValue::String(s) => Datatype::FixedString {
                length: s.len() as u32 + 1,
                pad: StrPad::NullTerminate,
                charset: datatype::CharSet::Utf8,
            },
            AttributeValue::Int(_) => Datatype::int64(),
            AttributeValue::Float(_) => Datatype::float64(),
            AttributeValue::Bool(_) => Datatype::boolean(),
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        match self {
            AttributeValue::String(s) => {
                datatype::encode_fixed_string(s, s.len() + 1, StrPad::NullTerminate, &mut out)
            }
            AttributeValue::Int(v) => datatype::push_int(&mut out, *v, 8, Endian::Little),
            AttributeValue::Float(v) => datatype::push_float(&mut out, *v, 8, Endian::Little),
            AttributeValue::Bool(v) => out.push(datatype::encode_bool(*v)),
        }
        out
    }
}

pub fn validate(name: &str, value: &AttributeValue) -> Result<()> {
    if name.is_empty() {
        return Err(Hdf5Error::AttributeValidation {
            name: name.to_string(),
            reason: "attribute names must not be empty".to_string(),
        });
    }
    if name.len() > 255 {
        return Err(Hdf5Error::AttributeValidation {
            name: name.to_string(),
            reason: format!("name is {} bytes, maximum is 255", name.len()),
        });
    }
    if let AttributeValue::String(s) = value {
        if s.len() > 65535 {
            return Err(Hdf5Error::AttributeValidation {
                name: name.to_string(),
                reason: format!("string value is {} bytes, maximum is 65535", s.len()),
            });
        }
    }
    Ok(())
}

/// version 1 attribute message: sizes, then NUL-terminated name, datatype
/// and dataspace messages (each padded to 8 bytes), then the value
pub fn encode_message(name: &str, value: &AttributeValue) -> Result<Vec<u8>> {
    validate(name, value)?;
    let dt_msg = value.datatype().encode_message();
    let ds_msg = Dataspace::scalar().encode_message();
    let name_size = name.len() + 1;

    let mut out = Vec::new();
    out.push(1); // version
    out.push(0);
    out.extend_from_slice(&(name_size as u16).to_le_bytes());
    out.extend_from_slice(&(dt_msg.len() as u16).to_le_bytes());
    out.extend_from_slice(&(ds_msg.len() as u16).to_le_bytes());
    out.extend_from_slice(name.as_bytes());
    out.resize(out.len() + pad8(name_size) - name.len(), 0);
    out.extend_from_slice(&dt_msg);
    out.resize(out.len() + pad8(dt_msg.len()) - dt_msg.len(), 0);
    out.extend_from_slice(&ds_msg);
    out.resize(out.len() + pad8(ds_msg.len()) - ds_msg.len(), 0);
    out.extend_from_slice(&value.encode());
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_attribute_message() {
        let msg = encode_message("answer", &AttributeValue::Int(42)).unwrap();
        assert_eq!(msg[0], 1);
        assert_eq!(u16::from_le_bytes([msg[2], msg[3]]), 7); // "answer\0"
        assert_eq!(&msg[8..14], b"answer");
        // name padded to 8, datatype message (12 bytes) padded to 16,
        // dataspace (8), then the value
        let value_off = 8 + 8 + 16 + 8;
        assert_eq!(&msg[value_off..value_off + 8], &42i64.to_le_bytes());
    }

    #[test]
    fn string_attribute_roundtrip_bytes() {
        let msg = encode_message("unit", &AttributeValue::String("meters".into())).unwrap();
        let tail = &msg[msg.len() - 7..];
        assert_eq!(tail, b"meters\0");
    }

    #[test]
    fn rejects_bad_names_and_oversized_values() {
        assert!(validate("", &AttributeValue::Int(0)).is_err());
        assert!(validate(&"n".repeat(256), &AttributeValue::Int(0)).is_err());
        assert!(validate("big", &AttributeValue::String("x".repeat(65536))).is_err());
        assert!(validate("ok", &AttributeValue::String("x".repeat(65535))).is_ok());
    }
}
