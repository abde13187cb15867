use crate::address::UNDEFINED_ADDRESS;
use crate::format::{BTREE_V1_MAX_ENTRIES, BTREE_V1_NODE_HEADER_SIZE, SIG_TREE};
use crate::writer::{ByteWriter, Endian};

/// Version-1 B-trees for both group indexes (type 0, keys are 64-bit
/// name-hash slots) and chunk indexes (type 1, keys are size/mask/coords).
///
/// Nodes are planned first so every child and sibling address is known, then
/// serialized level by level; a node holds at most 16 entries and carries
/// one more key than children.

/// One symbol-table node from the group writer's point of view: the key
/// range it covers and where it was written.
#[derive(Debug, Clone, Copy)]
pub struct SnodRef {
    pub min_key: u64,
    pub max_key: u64,
    pub addr: u64,
}

/// Type 1 key: stored chunk byte count, filter mask, then element-space
/// coordinates with a trailing zero slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkKey {
    pub size: u32,
    pub filter_mask: u32,
    pub offsets: Vec<u64>,
}

impl ChunkKey {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(8 + self.offsets.len() * 8);
        out.extend_from_slice(&self.size.to_le_bytes());
        out.extend_from_slice(&self.filter_mask.to_le_bytes());
        for o in &self.offsets {
            out.extend_from_slice(&o.to_le_bytes());
        }
        out
    }
}

#[derive(Debug, Clone)]
pub struct ChunkEntry {
    pub key: ChunkKey,
    pub addr: u64,
}

enum Child {
    External(u64),
    Lower(usize),
}

struct PlanNode {
    first_key: Vec<u8>,
    last_key: Vec<u8>,
    entries: Vec<(Vec<u8>, Child)>,
}

/// Group index over symbol-table nodes. A single SNOD collapses to one
/// level-0 leaf whose address is the tree base; with more SNODs each leaf
/// references one SNOD and internal levels are stacked above, so a group
/// with more than 16 children always gets a root of level >= 1.
pub fn write_group_tree(w: &mut ByteWriter, snods: &[SnodRef]) -> u64 {
    let leaves: Vec<PlanNode> = snods
        .iter()
        .map(|s| PlanNode {
            first_key: s.min_key.to_le_bytes().to_vec(),
            last_key: s.max_key.to_le_bytes().to_vec(),
            entries: vec![(s.min_key.to_le_bytes().to_vec(), Child::External(s.addr))],
        })
        .collect();
    emit_levels(w, 0, 8, leaves)
}

/// Chunk index. `entries` must already be in lexicographic coordinate
/// order; `end_key` bounds the final node (one past the last chunk).
pub fn write_chunk_tree(w: &mut ByteWriter, entries: &[ChunkEntry], end_key: &ChunkKey) -> u64 {
    let key_size = 8 + end_key.offsets.len() * 8;
    let groups: Vec<&[ChunkEntry]> = entries.chunks(BTREE_V1_MAX_ENTRIES).collect();
    let mut leaves = Vec::with_capacity(groups.len());
    for (i, group) in groups.iter().enumerate() {
        let last_key = match groups.get(i + 1) {
            Some(next) => next[0].key.encode(),
            None => end_key.encode(),
        };
        leaves.push(PlanNode {
            first_key: group[0].key.encode(),
            last_key,
            entries: group
                .iter()
                .map(|e| (e.key.encode(), Child::External(e.addr)))
                .collect(),
        });
    }
    emit_levels(w, 1, key_size, leaves)
}

fn node_size(key_size: usize, entries: usize) -> u64 {
    (BTREE_V1_NODE_HEADER_SIZE + entries * (key_size + 8) + key_size) as u64
}

fn emit_levels(w: &mut ByteWriter, node_type: u8, key_size: usize, level0: Vec<PlanNode>) -> u64 {
    let mut levels = vec![level0];
    while levels.last().map(|l| l.len()).unwrap_or(0) > 1 {
        let prev_len = levels.len() - 1;
        let mut base_index = 0;
        let mut next = Vec::new();
        for group in levels[prev_len].chunks(BTREE_V1_MAX_ENTRIES) {
            let entries = group
                .iter()
                .enumerate()
                .map(|(i, child)| (child.first_key.clone(), Child::Lower(base_index + i)))
                .collect();
            next.push(PlanNode {
                first_key: group[0].first_key.clone(),
                last_key: group[group.len() - 1].last_key.clone(),
                entries,
            });
            base_index += group.len();
        }
        levels.push(next);
    }

    // assign addresses in emission order: level 0 first, root last
    let base = w.len();
    let mut addrs: Vec<Vec<u64>> = Vec::with_capacity(levels.len());
    let mut cursor = base;
    for level in &levels {
        let mut level_addrs = Vec::with_capacity(level.len());
        for node in level {
            level_addrs.push(cursor);
            cursor += node_size(key_size, node.entries.len());
        }
        addrs.push(level_addrs);
    }

    for (level_no, level) in levels.iter().enumerate() {
        for (i, node) in level.iter().enumerate() {
            let left = if i > 0 { addrs[level_no][i - 1] } else { UNDEFINED_ADDRESS };
            let right = addrs[level_no].get(i + 1).copied().unwrap_or(UNDEFINED_ADDRESS);
            w.write_bytes(&SIG_TREE);
            w.write_u8(node_type);
            w.write_u8(level_no as u8);
            w.write_u16(node.entries.len() as u16, Endian::Little);
            w.write_u64(left, Endian::Little);
            w.write_u64(right, Endian::Little);
            for (key, child) in &node.entries {
                w.write_bytes(key);
                let child_addr = match child {
                    Child::External(addr) => *addr,
                    Child::Lower(index) => addrs[level_no - 1][*index],
                };
                w.write_u64(child_addr, Endian::Little);
            }
            w.write_bytes(&node.last_key);
        }
    }

    *addrs
        .last()
        .and_then(|l| l.first())
        .unwrap_or(&UNDEFINED_ADDRESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use more_asserts::*;

    fn read_u16(bytes: &[u8], off: usize) -> u16 {
        u16::from_le_bytes(bytes[off..off + 2].try_into().unwrap())
    }

    fn read_u64(bytes: &[u8], off: usize) -> u64 {
        u64::from_le_bytes(bytes[off..off + 8].try_into().unwrap())
    }

    #[test]
    fn single_snod_gives_level_zero_root_at_base() {
        let mut w = ByteWriter::new();
        let root = write_group_tree(
            &mut w,
            &[SnodRef { min_key: 5, max_key: 99, addr: 0x40 }],
        );
        assert_eq!(root, 0);
        let bytes = w.as_slice();
        assert_eq!(&bytes[..4], b"TREE");
        assert_eq!(bytes[4], 0); // type 0
        assert_eq!(bytes[5], 0); // level 0
        assert_eq!(read_u16(bytes, 6), 1);
        assert_eq!(read_u64(bytes, 8), UNDEFINED_ADDRESS);
        assert_eq!(read_u64(bytes, 16), UNDEFINED_ADDRESS);
        assert_eq!(read_u64(bytes, 24), 5); // K0
        assert_eq!(read_u64(bytes, 32), 0x40); // SNOD address
        assert_eq!(read_u64(bytes, 40), 99); // bounding key
        assert_eq!(w.len(), node_size(8, 1));
    }

    #[test]
    fn multiple_snods_promote_an_internal_root() {
        let mut w = ByteWriter::new();
        let snods = [
            SnodRef { min_key: 1, max_key: 10, addr: 0x100 },
            SnodRef { min_key: 11, max_key: 20, addr: 0x200 },
        ];
        let root = write_group_tree(&mut w, &snods);
        let bytes = w.as_slice();
        // two leaves then the root
        assert_eq!(root, 2 * node_size(8, 1));
        assert_eq!(bytes[root as usize + 5], 1); // root level
        assert_eq!(read_u16(bytes, root as usize + 6), 2);
        // leaves link to each other
        let leaf1_right = read_u64(bytes, 16);
        assert_eq!(leaf1_right, node_size(8, 1));
        let leaf2_left = read_u64(bytes, node_size(8, 1) as usize + 8);
        assert_eq!(leaf2_left, 0);
    }

    #[test]
    fn twenty_chunks_split_into_linked_leaves() {
        let mut w = ByteWriter::new();
        let entries: Vec<ChunkEntry> = (0..20)
            .map(|i| ChunkEntry {
                key: ChunkKey {
                    size: 64,
                    filter_mask: 0,
                    offsets: vec![i * 4, 0, 0],
                },
                addr: 0x1000 + i * 64,
            })
            .collect();
        let end_key = ChunkKey { size: 0, filter_mask: 0, offsets: vec![80, 0, 0] };
        let root = write_chunk_tree(&mut w, &entries, &end_key);
        let bytes = w.as_slice();
        let key_size = 8 + 3 * 8;

        // root is internal with two children
        assert_gt!(bytes[root as usize + 5], 0);
        assert_eq!(read_u16(bytes, root as usize + 6), 2);

        // first leaf holds 16 entries at the buffer base and is a TREE node
        assert_eq!(&bytes[..4], b"TREE");
        assert_eq!(bytes[4], 1);
        assert_eq!(read_u16(bytes, 6), 16);
        // its bounding key equals the second leaf's first key
        let leaf2_addr = node_size(key_size, 16) as usize;
        let bound_off = 24 + 16 * (key_size + 8);
        let leaf2_first_key_off = leaf2_addr + 24;
        assert_eq!(
            &bytes[bound_off..bound_off + key_size],
            &bytes[leaf2_first_key_off..leaf2_first_key_off + key_size]
        );

        // all 20 coordinates are recoverable in sorted order
        let mut coords = Vec::new();
        for (leaf_addr, count) in [(0usize, 16usize), (leaf2_addr, 4)] {
            for i in 0..count {
                let off = leaf_addr + 24 + i * (key_size + 8) + 8;
                coords.push(read_u64(bytes, off));
            }
        }
        let expected: Vec<u64> = (0..20).map(|i| i * 4).collect();
        assert_eq!(coords, expected);
    }
}
