//! Byte-level helpers for poking at finished images.
#![allow(dead_code)]

pub fn read_u16(bytes: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes(bytes[offset..offset + 2].try_into().unwrap())
}

pub fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap())
}

pub fn read_u64(bytes: &[u8], offset: usize) -> u64 {
    u64::from_le_bytes(bytes[offset..offset + 8].try_into().unwrap())
}

pub fn count_sig(bytes: &[u8], sig: &[u8; 4]) -> usize {
    bytes.windows(4).filter(|win| win[..] == sig[..]).count()
}

/// (type, body) pairs of a version-1 object header.
pub fn v1_messages(bytes: &[u8], oh_addr: u64) -> Vec<(u16, Vec<u8>)> {
    let base = oh_addr as usize;
    assert_eq!(bytes[base], 1, "not a v1 object header");
    let count = read_u16(bytes, base + 2);
    let mut offset = base + 16;
    let mut messages = Vec::new();
    for _ in 0..count {
        let type_id = read_u16(bytes, offset);
        let size = read_u16(bytes, offset + 2) as usize;
        messages.push((type_id, bytes[offset + 8..offset + 8 + size].to_vec()));
        offset += 8 + size;
    }
    messages
}

pub fn find_message(bytes: &[u8], oh_addr: u64, type_id: u16) -> Option<Vec<u8>> {
    v1_messages(bytes, oh_addr)
        .into_iter()
        .find(|(t, _)| *t == type_id)
        .map(|(_, body)| body)
}

/// (b-tree address, heap address) from a group's symbol table message.
pub fn symbol_table_addrs(bytes: &[u8], group_oh: u64) -> (u64, u64) {
    let body = find_message(bytes, group_oh, 0x0011).expect("no symbol table message");
    (read_u64(&body, 0), read_u64(&body, 8))
}

/// (address, size) from a contiguous data layout message.
pub fn contiguous_layout(bytes: &[u8], oh_addr: u64) -> (u64, u64) {
    let body = find_message(bytes, oh_addr, 0x0008).expect("no data layout message");
    assert_eq!(body[0], 3, "layout message version");
    assert_eq!(body[1], 1, "not a contiguous layout");
    (read_u64(&body, 2), read_u64(&body, 10))
}

#[derive(Debug, Clone)]
pub struct ChunkRecord {
    pub size: u32,
    pub filter_mask: u32,
    pub coords: Vec<u64>,
    pub addr: u64,
}

/// Walk a v1 chunk index: descend the leftmost spine to level 0, then
/// follow right-sibling pointers, collecting every leaf entry in order.
pub fn walk_chunk_tree(bytes: &[u8], root: u64, rank: usize) -> Vec<ChunkRecord> {
    const UNDEF: u64 = u64::MAX;
    let key_size = 8 + (rank + 1) * 8;
    let mut node = root;
    loop {
        assert_eq!(&bytes[node as usize..node as usize + 4], b"TREE");
        assert_eq!(bytes[node as usize + 4], 1, "not a chunk node");
        if bytes[node as usize + 5] == 0 {
            break;
        }
        // first child pointer sits after the first key
        node = read_u64(bytes, node as usize + 24 + key_size);
    }

    let mut records = Vec::new();
    while node != UNDEF {
        let base = node as usize;
        let entries = read_u16(bytes, base + 6) as usize;
        let mut offset = base + 24;
        for _ in 0..entries {
            let size = read_u32(bytes, offset);
            let filter_mask = read_u32(bytes, offset + 4);
            let coords: Vec<u64> = (0..rank)
                .map(|axis| read_u64(bytes, offset + 8 + axis * 8))
                .collect();
            let addr = read_u64(bytes, offset + key_size);
            records.push(ChunkRecord { size, filter_mask, coords, addr });
            offset += key_size + 8;
        }
        node = read_u64(bytes, base + 16);
    }
    records
}
