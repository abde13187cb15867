use crate::address::UNDEFINED_ADDRESS;
use crate::checksum::lookup3;
use crate::format::{
    FRACTAL_DIRECT_HEADER_SIZE, FRACTAL_HEAP_ID_LEN, FRACTAL_MAX_DIRECT_BLOCK_SIZE,
    FRACTAL_MAX_HEAP_BITS, FRACTAL_STARTING_BLOCK_SIZE, FRACTAL_TABLE_WIDTH, SIG_FHDB, SIG_FHIB,
    SIG_FRHP,
};
use crate::writer::{ByteWriter, Endian};

/// Fractal heap with the fixed configuration the group writer uses:
/// starting block 512, doubling rows of width 4 up to 64 KiB direct blocks.
/// Heap IDs are 8 bytes: `(version<<4)|type` in byte 0, a zero byte, then
/// the little-endian managed-space offset.
///
/// The managed address space covers whole blocks (headers included); object
/// offsets point directly at their first data byte. Blocks are emitted right
/// after the header, followed by a root indirect block when more than one
/// direct block is in play.

const DIRECT_OVERHEAD: u64 = FRACTAL_DIRECT_HEADER_SIZE + 4; // trailing checksum

fn block_size(index: usize) -> u64 {
    let row = index / FRACTAL_TABLE_WIDTH as usize;
    if row < 2 {
        FRACTAL_STARTING_BLOCK_SIZE
    } else {
        (FRACTAL_STARTING_BLOCK_SIZE << (row - 1)).min(FRACTAL_MAX_DIRECT_BLOCK_SIZE)
    }
}

#[derive(Debug)]
struct DirectBlock {
    managed_offset: u64,
    size: u64,
    data: Vec<u8>,
}

#[derive(Debug, Default)]
pub struct FractalHeap {
    blocks: Vec<DirectBlock>,
    object_count: u64,
}

impl FractalHeap {
    pub fn new() -> FractalHeap {
        FractalHeap::default()
    }

    /// Copy one object into the managed space and hand back its heap ID.
    pub fn alloc(&mut self, data: &[u8]) -> [u8; 8] {
        debug_assert!(
            (data.len() as u64) <= FRACTAL_MAX_DIRECT_BLOCK_SIZE - DIRECT_OVERHEAD,
            "object exceeds the largest direct block"
        );
        loop {
            if let Some(block) = self.blocks.last() {
                let capacity = block.size - DIRECT_OVERHEAD;
                if block.data.len() as u64 + data.len() as u64 <= capacity {
                    break;
                }
            }
            let managed_offset = self
                .blocks
                .last()
                .map(|b| b.managed_offset + b.size)
                .unwrap_or(0);
            let size = block_size(self.blocks.len());
            self.blocks.push(DirectBlock { managed_offset, size, data: Vec::new() });
        }
        let block = self.blocks.last_mut().expect("block just ensured");
        let offset =
            block.managed_offset + FRACTAL_DIRECT_HEADER_SIZE + block.data.len() as u64;
        block.data.extend_from_slice(data);
        self.object_count += 1;

        let mut id = [0u8; 8];
        id[0] = 0; // version 0, managed type
        id[2..8].copy_from_slice(&offset.to_le_bytes()[..6]);
        id
    }

    pub fn managed_space(&self) -> u64 {
        self.blocks.last().map(|b| b.managed_offset + b.size).unwrap_or(0)
    }

    /// Emit header, direct blocks, and (for multi-block heaps) the root
    /// indirect block; returns the header address.
    pub fn write(&self, w: &mut ByteWriter) -> u64 {
        let header_addr = w.len();
        let header_len = Self::header_len();
        let blocks_len: u64 = self.blocks.iter().map(|b| b.size).sum();
        let nrows = self.blocks.len().div_ceil(FRACTAL_TABLE_WIDTH as usize);

        let (root_addr, cur_rows) = match self.blocks.len() {
            0 => (UNDEFINED_ADDRESS, 0u16),
            1 => (header_addr + header_len, 0),
            _ => (header_addr + header_len + blocks_len, nrows as u16),
        };

        let mut header = Vec::with_capacity(header_len as usize);
        header.extend_from_slice(&SIG_FRHP);
        header.push(0); // version
        header.extend_from_slice(&FRACTAL_HEAP_ID_LEN.to_le_bytes());
        header.extend_from_slice(&0u16.to_le_bytes()); // io filter length
        header.push(0x02); // flags: direct blocks are checksummed
        let max_obj = (FRACTAL_MAX_DIRECT_BLOCK_SIZE - DIRECT_OVERHEAD) as u32;
        header.extend_from_slice(&max_obj.to_le_bytes());
        header.extend_from_slice(&0u64.to_le_bytes()); // next huge id
        header.extend_from_slice(&UNDEFINED_ADDRESS.to_le_bytes()); // huge b-tree
        header.extend_from_slice(&0u64.to_le_bytes()); // free space
        header.extend_from_slice(&UNDEFINED_ADDRESS.to_le_bytes()); // space manager
        header.extend_from_slice(&self.managed_space().to_le_bytes());
        header.extend_from_slice(&self.managed_space().to_le_bytes()); // allocated
        header.extend_from_slice(&self.next_offset().to_le_bytes()); // iterator
        header.extend_from_slice(&self.object_count.to_le_bytes());
        header.extend_from_slice(&0u64.to_le_bytes()); // huge bytes
        header.extend_from_slice(&0u64.to_le_bytes()); // huge count
        header.extend_from_slice(&0u64.to_le_bytes()); // tiny bytes
        header.extend_from_slice(&0u64.to_le_bytes()); // tiny count
        header.extend_from_slice(&FRACTAL_TABLE_WIDTH.to_le_bytes());
        header.extend_from_slice(&FRACTAL_STARTING_BLOCK_SIZE.to_le_bytes());
        header.extend_from_slice(&FRACTAL_MAX_DIRECT_BLOCK_SIZE.to_le_bytes());
        header.extend_from_slice(&FRACTAL_MAX_HEAP_BITS.to_le_bytes());
        header.extend_from_slice(&1u16.to_le_bytes()); // starting rows in root
        header.extend_from_slice(&root_addr.to_le_bytes());
        header.extend_from_slice(&cur_rows.to_le_bytes());
        let checksum = lookup3(&header);
        w.write_bytes(&header);
        w.write_u32(checksum, Endian::Little);

        let mut block_addrs = Vec::with_capacity(self.blocks.len());
        for block in &self.blocks {
            block_addrs.push(w.len());
            let mut bytes = Vec::with_capacity(block.size as usize);
            bytes.extend_from_slice(&SIG_FHDB);
            bytes.push(0); // version
            bytes.extend_from_slice(&header_addr.to_le_bytes());
            bytes.extend_from_slice(&block.managed_offset.to_le_bytes()[..6]);
            bytes.extend_from_slice(&block.data);
            bytes.resize((block.size - 4) as usize, 0);
            let checksum = lookup3(&bytes);
            w.write_bytes(&bytes);
            w.write_u32(checksum, Endian::Little);
        }

        if self.blocks.len() > 1 {
            let mut bytes = Vec::new();
            bytes.extend_from_slice(&SIG_FHIB);
            bytes.push(0);
            bytes.extend_from_slice(&header_addr.to_le_bytes());
            bytes.extend_from_slice(&0u64.to_le_bytes()[..6]); // block offset
            for slot in 0..nrows * FRACTAL_TABLE_WIDTH as usize {
                let addr = block_addrs.get(slot).copied().unwrap_or(UNDEFINED_ADDRESS);
                bytes.extend_from_slice(&addr.to_le_bytes());
            }
            let checksum = lookup3(&bytes);
            w.write_bytes(&bytes);
            w.write_u32(checksum, Endian::Little);
        }

        header_addr
    }

    fn next_offset(&self) -> u64 {
        self.blocks
            .last()
            .map(|b| b.managed_offset + FRACTAL_DIRECT_HEADER_SIZE + b.data.len() as u64)
            .unwrap_or(0)
    }

    fn header_len() -> u64 {
        // all fields including the trailing checksum
        4 + 1 + 2 + 2 + 1 + 4 + 8 * 12 + 2 + 8 + 8 + 2 + 2 + 8 + 2 + 4
    }
}

/// Managed-space offset packed into an ID by `alloc`.
pub fn heap_id_offset(id: &[u8; 8]) -> u64 {
    let mut bytes = [0u8; 8];
    bytes[..6].copy_from_slice(&id[2..8]);
    u64::from_le_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_encode_increasing_offsets() {
        let mut heap = FractalHeap::new();
        let a = heap.alloc(&[1; 10]);
        let b = heap.alloc(&[2; 10]);
        assert_eq!(a[0], 0);
        assert_eq!(a[1], 0);
        assert_eq!(heap_id_offset(&a), FRACTAL_DIRECT_HEADER_SIZE);
        assert_eq!(heap_id_offset(&b), FRACTAL_DIRECT_HEADER_SIZE + 10);
    }

    #[test]
    fn single_block_heap_layout() {
        let mut heap = FractalHeap::new();
        heap.alloc(b"link record");
        let mut w = ByteWriter::new();
        let header_addr = heap.write(&mut w);
        assert_eq!(header_addr, 0);
        let bytes = w.as_slice();
        assert_eq!(&bytes[..4], b"FRHP");
        let root_block = FractalHeap::header_len() as usize;
        assert_eq!(&bytes[root_block..root_block + 4], b"FHDB");
        // direct block occupies exactly the starting block size
        assert_eq!(w.len(), FractalHeap::header_len() + FRACTAL_STARTING_BLOCK_SIZE);
        // header checksum verifies (the last 4 header bytes)
        let hl = FractalHeap::header_len() as usize;
        let stored = u32::from_le_bytes(bytes[hl - 4..hl].try_into().unwrap());
        assert_eq!(stored, lookup3(&bytes[..hl - 4]));
    }

    #[test]
    fn overflow_to_indirect_root() {
        let mut heap = FractalHeap::new();
        // each object nearly fills a starting-size block
        for _ in 0..5 {
            heap.alloc(&[0x55; 480]);
        }
        assert_eq!(heap.blocks.len(), 5);
        let mut w = ByteWriter::new();
        heap.write(&mut w);
        let bytes = w.as_slice();
        let blocks_len: u64 = heap.blocks.iter().map(|b| b.size).sum();
        let root = FractalHeap::header_len() + blocks_len;
        assert_eq!(&bytes[root as usize..root as usize + 4], b"FHIB");
        // row-structured pointer table: 2 rows of 4, three empty slots
        let ptr0_off = root as usize + 4 + 1 + 8 + 6;
        let first = u64::from_le_bytes(bytes[ptr0_off..ptr0_off + 8].try_into().unwrap());
        assert_eq!(first, FractalHeap::header_len());
        let last_off = ptr0_off + 7 * 8;
        let last = u64::from_le_bytes(bytes[last_off..last_off + 8].try_into().unwrap());
        assert_eq!(last, UNDEFINED_ADDRESS);
    }
}
