use crate::checksum::lookup3;
use crate::format::{pad8, MSG_NIL, SIG_OHDR};
use crate::writer::{ByteWriter, Endian};

/// A single typed message destined for an object header. Bodies are padded
/// to 8 bytes at emission time.
#[derive(Debug, Clone)]
pub struct HeaderMessage {
    pub type_id: u16,
    pub flags: u8,
    pub body: Vec<u8>,
}

impl HeaderMessage {
    pub fn new(type_id: u16, body: Vec<u8>) -> HeaderMessage {
        HeaderMessage { type_id, flags: 0, body }
    }
}

/// Version chosen by the build-wide format version: 0 and 1 produce
/// prefix-style v1 headers, 2 produces signed `OHDR` headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderVersion {
    V1,
    V2,
}

pub fn write_object_header(
    w: &mut ByteWriter,
    version: HeaderVersion,
    messages: &[HeaderMessage],
) -> u64 {
    match version {
        HeaderVersion::V1 => write_v1(w, messages),
        HeaderVersion::V2 => write_v2(w, messages),
    }
}

/// v1: 12-byte prefix, 4 alignment bytes, 8-byte message headers, and a
/// trailing NIL message closing the block
fn write_v1(w: &mut ByteWriter, messages: &[HeaderMessage]) -> u64 {
    let addr = w.len();
    let body_size: usize = messages
        .iter()
        .map(|m| 8 + pad8(m.body.len()))
        .sum::<usize>()
        + 8; // NIL
    w.write_u8(1); // version
    w.write_u8(0);
    w.write_u16(messages.len() as u16 + 1, Endian::Little);
    w.write_u32(1, Endian::Little); // reference count
    w.write_u32(body_size as u32, Endian::Little);
    w.pad_zeros(4);
    for msg in messages {
        write_message_v1(w, msg);
    }
    // NIL fills the declared header size exactly
    w.write_u16(MSG_NIL, Endian::Little);
    w.write_u16(0, Endian::Little);
    w.pad_zeros(4);
    addr
}

fn write_message_v1(w: &mut ByteWriter, msg: &HeaderMessage) {
    let padded = pad8(msg.body.len());
    w.write_u16(msg.type_id, Endian::Little);
    w.write_u16(padded as u16, Endian::Little);
    w.write_u8(msg.flags);
    w.pad_zeros(3);
    w.write_bytes(&msg.body);
    w.pad_zeros(padded - msg.body.len());
}

/// v2: `OHDR` signature, one-byte message types, lookup3 checksum over the
/// whole header
fn write_v2(w: &mut ByteWriter, messages: &[HeaderMessage]) -> u64 {
    let addr = w.len();
    let body_size: usize = messages.iter().map(|m| 4 + pad8(m.body.len())).sum();

    let mut header = Vec::with_capacity(10 + body_size);
    header.extend_from_slice(&SIG_OHDR);
    header.push(2); // version
    header.push(0x02); // flags: size-of-chunk-0 field is 4 bytes
    header.extend_from_slice(&(body_size as u32).to_le_bytes());
    for msg in messages {
        let padded = pad8(msg.body.len());
        header.push(msg.type_id as u8);
        header.extend_from_slice(&(padded as u16).to_le_bytes());
        header.push(msg.flags);
        header.extend_from_slice(&msg.body);
        header.resize(header.len() + padded - msg.body.len(), 0);
    }
    let checksum = lookup3(&header);
    w.write_bytes(&header);
    w.write_u32(checksum, Endian::Little);
    addr
}
