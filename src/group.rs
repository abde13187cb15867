use log::debug;

use crate::btree_v1::{self, SnodRef};
use crate::btree_v2;
use crate::checksum::name_hash;
use crate::format::{
    BTREE_V2_TYPE_LINK_NAME, MSG_GROUP_INFO, MSG_LINK_INFO, MSG_SYMBOL_TABLE, SNOD_MAX_ENTRIES,
};
use crate::fractal_heap::FractalHeap;
use crate::local_heap::{self, LocalHeapBuilder, SymbolEntry};
use crate::object_header::HeaderMessage;
use crate::writer::ByteWriter;

/// Cross-format group writer: one `write_children` capability with a v1 and
/// a v2 variant, dispatched on the build-wide format version. Leaf writers
/// below this point know nothing about format versions.

#[derive(Debug, Clone)]
pub struct ChildLink {
    pub name: String,
    pub object_header_addr: u64,
    pub creation_order: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupFormat {
    V1,
    V2,
}

/// What the parent group's object header needs to reference its index.
#[derive(Debug)]
pub struct GroupIndex {
    pub messages: Vec<HeaderMessage>,
    pub btree_addr: u64,
    pub heap_addr: u64,
}

pub fn write_children(
    w: &mut ByteWriter,
    format: GroupFormat,
    children: &[ChildLink],
) -> GroupIndex {
    match format {
        GroupFormat::V1 => write_children_v1(w, children),
        GroupFormat::V2 => write_children_v2(w, children),
    }
}

/// v1: local heap for names, symbol table nodes of up to 16 entries, and a
/// type-0 B-tree keyed by the name hash (zero-extended to the 64-bit slot).
/// Children are ordered by (hash, insertion order).
fn write_children_v1(w: &mut ByteWriter, children: &[ChildLink]) -> GroupIndex {
    let mut ordered: Vec<&ChildLink> = children.iter().collect();
    ordered.sort_by_key(|c| (name_hash(&c.name), c.creation_order));

    let mut heap = LocalHeapBuilder::new();
    let entries: Vec<(u64, SymbolEntry)> = ordered
        .iter()
        .map(|c| {
            let offset = heap.alloc(&c.name);
            (
                u64::from(name_hash(&c.name)),
                SymbolEntry {
                    link_name_offset: offset,
                    object_header_addr: c.object_header_addr,
                },
            )
        })
        .collect();

    let (heap_addr, _) = heap.write(w);

    let mut snods = Vec::new();
    for group in entries.chunks(SNOD_MAX_ENTRIES) {
        let symbols: Vec<SymbolEntry> = group.iter().map(|(_, e)| *e).collect();
        let addr = local_heap::write_snod(w, &symbols);
        snods.push(SnodRef {
            min_key: group[0].0,
            max_key: group[group.len() - 1].0,
            addr,
        });
    }

    let btree_addr = btree_v1::write_group_tree(w, &snods);
    debug!(
        "v1 group index: {} children in {} symbol nodes, b-tree at {}",
        children.len(),
        snods.len(),
        btree_addr
    );

    let mut body = Vec::with_capacity(16);
    body.extend_from_slice(&btree_addr.to_le_bytes());
    body.extend_from_slice(&heap_addr.to_le_bytes());
    GroupIndex {
        messages: vec![HeaderMessage::new(MSG_SYMBOL_TABLE, body)],
        btree_addr,
        heap_addr,
    }
}

/// v2: link messages live in a fractal heap; a type-5 B-tree indexes them
/// by name hash. The object header gets LinkInfo + GroupInfo messages.
fn write_children_v2(w: &mut ByteWriter, children: &[ChildLink]) -> GroupIndex {
    let mut heap = FractalHeap::new();
    let mut records: Vec<(u32, u64, [u8; 8])> = children
        .iter()
        .map(|c| {
            let id = heap.alloc(&encode_link_message(c));
            (name_hash(&c.name), c.creation_order, id)
        })
        .collect();
    records.sort_by_key(|(hash, order, _)| (*hash, *order));

    let heap_addr = heap.write(w);

    // record: hash, heap id, creation order
    let encoded: Vec<Vec<u8>> = records
        .iter()
        .map(|(hash, order, id)| {
            let mut r = Vec::with_capacity(20);
            r.extend_from_slice(&hash.to_le_bytes());
            r.extend_from_slice(id);
            r.extend_from_slice(&order.to_le_bytes());
            r
        })
        .collect();
    let btree_addr = btree_v2::write_btree_v2(w, BTREE_V2_TYPE_LINK_NAME, 20, &encoded);
    debug!(
        "v2 group index: {} links, fractal heap at {}, b-tree at {}",
        children.len(),
        heap_addr,
        btree_addr
    );

    // LinkInfo with creation order tracked
    let mut link_info = Vec::with_capacity(26);
    link_info.push(0); // version
    link_info.push(0x01); // flags: creation order tracked
    link_info.extend_from_slice(&(children.len() as u64).to_le_bytes());
    link_info.extend_from_slice(&heap_addr.to_le_bytes());
    link_info.extend_from_slice(&btree_addr.to_le_bytes());

    let group_info = vec![0u8, 0]; // version, flags

    GroupIndex {
        messages: vec![
            HeaderMessage::new(MSG_LINK_INFO, link_info),
            HeaderMessage::new(MSG_GROUP_INFO, group_info),
        ],
        btree_addr,
        heap_addr,
    }
}

/// Hard-link message: version, flags (creation order present, name length
/// field sized to the name), creation order, name, object header address.
fn encode_link_message(child: &ChildLink) -> Vec<u8> {
    let name = child.name.as_bytes();
    let mut out = Vec::with_capacity(name.len() + 20);
    out.push(1); // version
    let size_code: u8 = if name.len() > 255 { 1 } else { 0 };
    out.push(0x04 | size_code);
    out.extend_from_slice(&child.creation_order.to_le_bytes());
    if size_code == 0 {
        out.push(name.len() as u8);
    } else {
        out.extend_from_slice(&(name.len() as u16).to_le_bytes());
    }
    out.extend_from_slice(name);
    out.extend_from_slice(&child.object_header_addr.to_le_bytes());
    out
}
