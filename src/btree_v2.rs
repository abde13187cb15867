use crate::address::UNDEFINED_ADDRESS;
use crate::checksum::lookup3;
use crate::format::{
    BTREE_V2_MERGE_PERCENT, BTREE_V2_NODE_SIZE, BTREE_V2_SPLIT_PERCENT, SIG_BTHD, SIG_BTIN,
    SIG_BTLF,
};
use crate::writer::{ByteWriter, Endian};

/// Version-2 B-trees: `BTHD` header, `BTLF` leaves, `BTIN` internal nodes,
/// every node closed by a lookup3 checksum. Records are pre-encoded
/// fixed-size byte strings; the record comparator lives with the callers,
/// which hand records over already sorted.

/// signature + version + type
const NODE_PREFIX: usize = 6;
const CHECKSUM_LEN: usize = 4;
/// child pointer: address + record count + subtree total
const CHILD_PTR_LEN: usize = 18;

enum V2Node {
    Leaf { records: Vec<Vec<u8>> },
    Internal { separators: Vec<Vec<u8>>, children: Vec<V2Node> },
}

impl V2Node {
    fn own_records(&self) -> usize {
        match self {
            V2Node::Leaf { records } => records.len(),
            V2Node::Internal { separators, .. } => separators.len(),
        }
    }

    fn subtree_records(&self) -> u64 {
        match self {
            V2Node::Leaf { records } => records.len() as u64,
            V2Node::Internal { separators, children } => {
                separators.len() as u64
                    + children.iter().map(V2Node::subtree_records).sum::<u64>()
            }
        }
    }
}

fn leaf_capacity(record_size: usize) -> usize {
    (BTREE_V2_NODE_SIZE as usize - NODE_PREFIX - CHECKSUM_LEN) / record_size
}

fn internal_capacity(record_size: usize) -> usize {
    (BTREE_V2_NODE_SIZE as usize - NODE_PREFIX - CHECKSUM_LEN - CHILD_PTR_LEN)
        / (record_size + CHILD_PTR_LEN)
}

fn subtree_capacity(record_size: usize, depth: u16) -> u64 {
    if depth == 0 {
        leaf_capacity(record_size) as u64
    } else {
        let r = internal_capacity(record_size) as u64;
        r + (r + 1) * subtree_capacity(record_size, depth - 1)
    }
}

fn build(records: &[Vec<u8>], record_size: usize, depth: u16) -> V2Node {
    if depth == 0 {
        return V2Node::Leaf { records: records.to_vec() };
    }
    let child_cap = subtree_capacity(record_size, depth - 1);
    // smallest child count k with k*cap + (k-1) separators >= len
    let len = records.len() as u64;
    let mut k = 2u64;
    while k * child_cap + (k - 1) < len {
        k += 1;
    }
    let per_child = (len - (k - 1)) / k;
    let extra = (len - (k - 1)) % k;

    let mut separators = Vec::new();
    let mut children = Vec::new();
    let mut cursor = 0usize;
    for i in 0..k {
        let take = per_child + u64::from(i < extra);
        let child = &records[cursor..cursor + take as usize];
        children.push(build(child, record_size, depth - 1));
        cursor += take as usize;
        if i + 1 < k {
            separators.push(records[cursor].clone());
            cursor += 1;
        }
    }
    V2Node::Internal { separators, children }
}

fn emit_node(w: &mut ByteWriter, node: &V2Node, record_type: u8) -> u64 {
    let mut child_ptrs = Vec::new();
    if let V2Node::Internal { children, .. } = node {
        for child in children {
            let addr = emit_node(w, child, record_type);
            child_ptrs.push((addr, child.own_records() as u16, child.subtree_records()));
        }
    }

    let addr = w.len();
    let mut bytes = Vec::new();
    match node {
        V2Node::Leaf { records } => {
            bytes.extend_from_slice(&SIG_BTLF);
            bytes.push(0); // version
            bytes.push(record_type);
            for record in records {
                bytes.extend_from_slice(record);
            }
        }
        V2Node::Internal { separators, .. } => {
            bytes.extend_from_slice(&SIG_BTIN);
            bytes.push(0);
            bytes.push(record_type);
            // child pointer 0, record 0, child pointer 1, ...
            for (i, (caddr, nrec, total)) in child_ptrs.iter().enumerate() {
                bytes.extend_from_slice(&caddr.to_le_bytes());
                bytes.extend_from_slice(&nrec.to_le_bytes());
                bytes.extend_from_slice(&total.to_le_bytes());
                if let Some(sep) = separators.get(i) {
                    bytes.extend_from_slice(sep);
                }
            }
        }
    }
    let checksum = lookup3(&bytes);
    w.write_bytes(&bytes);
    w.write_u32(checksum, Endian::Little);
    addr
}

/// Write a whole tree over already-sorted records and return the address of
/// the `BTHD` header.
pub fn write_btree_v2(
    w: &mut ByteWriter,
    record_type: u8,
    record_size: usize,
    records: &[Vec<u8>],
) -> u64 {
    debug_assert!(records.iter().all(|r| r.len() == record_size));

    let (root_addr, root_records, depth) = if records.is_empty() {
        (UNDEFINED_ADDRESS, 0u16, 0u16)
    } else {
        let mut depth = 0u16;
        while subtree_capacity(record_size, depth) < records.len() as u64 {
            depth += 1;
        }
        let root = build(records, record_size, depth);
        let addr = emit_node(w, &root, record_type);
        (addr, root.own_records() as u16, depth)
    };

    let header_addr = w.len();
    let mut header = Vec::new();
    header.extend_from_slice(&SIG_BTHD);
    header.push(0); // version
    header.push(record_type);
    header.extend_from_slice(&BTREE_V2_NODE_SIZE.to_le_bytes());
    header.extend_from_slice(&(record_size as u16).to_le_bytes());
    header.extend_from_slice(&depth.to_le_bytes());
    header.push(BTREE_V2_SPLIT_PERCENT);
    header.push(BTREE_V2_MERGE_PERCENT);
    header.extend_from_slice(&root_addr.to_le_bytes());
    header.extend_from_slice(&root_records.to_le_bytes());
    header.extend_from_slice(&(records.len() as u64).to_le_bytes());
    let checksum = lookup3(&header);
    w.write_bytes(&header);
    w.write_u32(checksum, Endian::Little);
    header_addr
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(i: u64, size: usize) -> Vec<u8> {
        let mut r = i.to_le_bytes().to_vec();
        r.resize(size, 0xAB);
        r
    }

    #[test]
    fn empty_tree_has_undefined_root() {
        let mut w = ByteWriter::new();
        let header = write_btree_v2(&mut w, 5, 20, &[]);
        assert_eq!(header, 0);
        let bytes = w.as_slice();
        assert_eq!(&bytes[..4], b"BTHD");
        assert_eq!(bytes[5], 5);
        let root = u64::from_le_bytes(bytes[16..24].try_into().unwrap());
        assert_eq!(root, UNDEFINED_ADDRESS);
    }

    #[test]
    fn single_leaf_tree() {
        let mut w = ByteWriter::new();
        let records: Vec<Vec<u8>> = (0..5).map(|i| record(i, 16)).collect();
        let header = write_btree_v2(&mut w, 1, 16, &records);
        let bytes = w.as_slice();
        assert_eq!(&bytes[..4], b"BTLF");
        let header_bytes = &bytes[header as usize..];
        // depth 0, root at offset 0, 5 records in root and in total
        assert_eq!(u16::from_le_bytes(header_bytes[12..14].try_into().unwrap()), 0);
        assert_eq!(u64::from_le_bytes(header_bytes[16..24].try_into().unwrap()), 0);
        assert_eq!(u16::from_le_bytes(header_bytes[24..26].try_into().unwrap()), 5);
        assert_eq!(u64::from_le_bytes(header_bytes[26..34].try_into().unwrap()), 5);
        // node checksum verifies
        let leaf_len = 6 + 5 * 16;
        let stored = u32::from_le_bytes(bytes[leaf_len..leaf_len + 4].try_into().unwrap());
        assert_eq!(stored, lookup3(&bytes[..leaf_len]));
    }

    #[test]
    fn overflowing_records_grow_depth() {
        let record_size = 1000; // 4 records per leaf
        assert_eq!(leaf_capacity(record_size), 4);
        let records: Vec<Vec<u8>> = (0..10).map(|i| record(i, record_size)).collect();
        let mut w = ByteWriter::new();
        let header = write_btree_v2(&mut w, 1, record_size, &records);
        let bytes = w.as_slice();
        let header_bytes = &bytes[header as usize..];
        let depth = u16::from_le_bytes(header_bytes[12..14].try_into().unwrap());
        assert_eq!(depth, 1);
        let root = u64::from_le_bytes(header_bytes[16..24].try_into().unwrap());
        assert_eq!(&bytes[root as usize..root as usize + 4], b"BTIN");
        let total = u64::from_le_bytes(header_bytes[26..34].try_into().unwrap());
        assert_eq!(total, 10);
        // header checksum verifies
        let hdr_len = 34;
        let stored = u32::from_le_bytes(
            bytes[header as usize + hdr_len..header as usize + hdr_len + 4]
                .try_into()
                .unwrap(),
        );
        assert_eq!(stored, lookup3(&bytes[header as usize..header as usize + hdr_len]));
    }
}
