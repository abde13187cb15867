mod common;

use common::*;
use hdf5_kit::{AttributeValue, FileBuilder, Hdf5Error, MemArray, VecSink};
use more_asserts::*;

#[test]
fn dataset_attributes_merge_source_and_options() {
    let data = MemArray::new(vec![2], vec![1.0f64, 2.0])
        .with_attribute("unit", AttributeValue::String("kelvin".to_string()))
        .with_attribute("calibrated", AttributeValue::Bool(true));
    let mut builder = FileBuilder::new();
    builder.add_dataset("/temps", &data).unwrap();
    let image = builder.finish().unwrap();

    let oh = image.ledger.dataset("/temps").unwrap();
    let attrs: Vec<Vec<u8>> = v1_messages(&image.bytes, oh)
        .into_iter()
        .filter(|(t, _)| *t == 0x000C)
        .map(|(_, body)| body)
        .collect();
    assert_eq!(attrs.len(), 2);
    assert_eq!(&attrs[0][8..12], b"unit");
    // value follows the padded name, datatype and dataspace parts
    let name_part = (read_u16(&attrs[0], 2) as usize + 7) & !7;
    let dt_part = (read_u16(&attrs[0], 4) as usize + 7) & !7;
    let ds_part = (read_u16(&attrs[0], 6) as usize + 7) & !7;
    let value_off = 8 + name_part + dt_part + ds_part;
    assert_eq!(&attrs[0][value_off..value_off + 7], b"kelvin\0");
}

#[test]
fn attribute_validation_rules() {
    let mut builder = FileBuilder::new();
    assert!(matches!(
        builder.set_root_attributes(vec![("".to_string(), AttributeValue::Int(1))]),
        Err(Hdf5Error::AttributeValidation { .. })
    ));
    assert!(matches!(
        builder.set_root_attributes(vec![(
            "big".to_string(),
            AttributeValue::String("x".repeat(70_000))
        )]),
        Err(Hdf5Error::AttributeValidation { .. })
    ));
    builder
        .set_root_attributes(vec![("ok".to_string(), AttributeValue::Float(2.5))])
        .unwrap();
    let image = builder.finish().unwrap();
    let root = image.ledger.get("rootGroup").unwrap();
    let attrs = find_message(&image.bytes, root, 0x000C).unwrap();
    assert_eq!(&attrs[8..10], b"ok");
}

#[test]
fn vlen_strings_go_through_the_global_heap() {
    let mut builder = FileBuilder::new();
    builder
        .add_vlen_strings(
            "/words",
            vec!["alpha".to_string(), "be".to_string(), "gamma!".to_string()],
        )
        .unwrap();
    let image = builder.finish().unwrap();
    let bytes = &image.bytes;

    assert_ge!(count_sig(bytes, b"GCOL"), 1);
    let oh = image.ledger.dataset("/words").unwrap();
    let (addr, size) = contiguous_layout(bytes, oh);
    // three 16-byte references
    assert_eq!(size, 48);

    // each reference: length, collection address, index; follow the first
    let len0 = read_u32(bytes, addr as usize);
    let heap = read_u64(bytes, addr as usize + 4);
    let index0 = read_u32(bytes, addr as usize + 12);
    assert_eq!(len0, 5);
    assert_eq!(index0, 1);
    assert_eq!(&bytes[heap as usize..heap as usize + 4], b"GCOL");
    // first heap object: index 1, the bytes of "alpha"
    let obj = heap as usize + 16;
    assert_eq!(read_u16(bytes, obj), 1);
    assert_eq!(read_u64(bytes, obj + 8), 5);
    assert_eq!(&bytes[obj + 16..obj + 21], b"alpha");

    // the datatype message advertises a variable-length string
    let dtype = find_message(bytes, oh, 0x0003).unwrap();
    assert_eq!(dtype[0] & 0x0F, 3);
    assert_eq!(&dtype[4..8], &[0xFF, 0xFF, 0xFF, 0xFF]);
}

#[test]
fn compact_vlen_strings_inline_their_references() {
    let mut options = hdf5_kit::WriteOptions::default();
    options.layout = hdf5_kit::LayoutKind::Compact;
    let mut builder = FileBuilder::with_options(options).unwrap();
    builder
        .add_vlen_strings("/notes", vec!["hi".to_string(), "there".to_string()])
        .unwrap();
    let image = builder.finish().unwrap();
    let bytes = &image.bytes;

    // the requested compact layout is honored: refs live in the header
    let oh = image.ledger.dataset("/notes").unwrap();
    let body = find_message(bytes, oh, 0x0008).unwrap();
    assert_eq!(&body[..2], &[3, 0]);
    assert_eq!(read_u16(&body, 2), 32); // two 16-byte references
    // the first inline reference resolves into the collection
    assert_eq!(read_u32(&body, 4), 2);
    let heap = read_u64(&body, 8);
    assert_eq!(&bytes[heap as usize..heap as usize + 4], b"GCOL");
    assert_eq!(read_u32(&body, 16), 1); // object index 1
}

#[test]
fn image_flows_through_a_sink() {
    let data = MemArray::new(vec![2], vec![7i64, 8]);
    let mut builder = FileBuilder::new();
    builder.add_dataset("/d", &data).unwrap();
    let image = builder.finish().unwrap();
    let mut sink = VecSink::default();
    image.write_to_sink(&mut sink).unwrap();
    assert_eq!(sink.0, image.bytes);
}
