use crate::writer::ByteWriter;

/// Data layout messages, all version 3.

pub fn encode_compact(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + data.len());
    out.push(3); // version
    out.push(0); // compact
    out.extend_from_slice(&(data.len() as u16).to_le_bytes());
    out.extend_from_slice(data);
    out
}

/// class 1: address + byte count, an 18-byte body
pub fn encode_contiguous(addr: u64, size: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(18);
    out.push(3);
    out.push(1); // contiguous
    out.extend_from_slice(&addr.to_le_bytes());
    out.extend_from_slice(&size.to_le_bytes());
    out
}

/// class 2: the dimensionality is rank+1 and the trailing dimension is the
/// element size in bytes
pub fn encode_chunked(btree_addr: u64, chunk_dims: &[u64], element_size: u32) -> Vec<u8> {
    let mut out = Vec::new();
    out.push(3);
    out.push(2); // chunked
    out.push(chunk_dims.len() as u8 + 1);
    out.extend_from_slice(&btree_addr.to_le_bytes());
    for d in chunk_dims {
        out.extend_from_slice(&(*d as u32).to_le_bytes());
    }
    out.extend_from_slice(&element_size.to_le_bytes());
    out
}

/// Stream a data region into the image in bounded slabs; returns the start
/// address and total byte count. `read` appends raw element bytes for
/// `(offset_elems, n_elems)` requests.
pub fn write_contiguous(
    w: &mut ByteWriter,
    element_count: u64,
    element_size: u32,
    read: &mut dyn FnMut(u64, u64, &mut Vec<u8>),
) -> (u64, u64) {
    // roughly 1 MiB of elements at a time
    let slab_elems = ((1u64 << 20) / u64::from(element_size.max(1))).max(1);
    let addr = w.len();
    let mut buf = Vec::new();
    let mut done = 0;
    while done < element_count {
        let n = slab_elems.min(element_count - done);
        buf.clear();
        read(done, n, &mut buf);
        w.write_bytes(&buf);
        done += n;
    }
    (addr, w.len() - addr)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contiguous_body_is_18_bytes() {
        let msg = encode_contiguous(96, 48);
        assert_eq!(msg.len(), 18);
        assert_eq!(&msg[..2], &[3, 1]);
        assert_eq!(&msg[2..10], &96u64.to_le_bytes());
        assert_eq!(&msg[10..18], &48u64.to_le_bytes());
    }

    #[test]
    fn chunked_body_has_trailing_element_size_dim() {
        let msg = encode_chunked(1024, &[10, 20], 8);
        assert_eq!(&msg[..3], &[3, 2, 3]);
        assert_eq!(&msg[3..11], &1024u64.to_le_bytes());
        assert_eq!(&msg[11..15], &10u32.to_le_bytes());
        assert_eq!(&msg[15..19], &20u32.to_le_bytes());
        assert_eq!(&msg[19..23], &8u32.to_le_bytes());
    }

    #[test]
    fn compact_inlines_data() {
        let msg = encode_compact(&[1, 2, 3]);
        assert_eq!(&msg[..2], &[3, 0]);
        assert_eq!(u16::from_le_bytes([msg[2], msg[3]]), 3);
        assert_eq!(&msg[4..], &[1, 2, 3]);
    }

    #[test]
    fn contiguous_writer_streams_in_slabs() {
        let mut w = ByteWriter::new();
        let data: Vec<u8> = (0..=255).collect();
        let mut reads = 0;
        let (addr, size) = write_contiguous(&mut w, 256, 1, &mut |off, n, out| {
            reads += 1;
            out.extend_from_slice(&data[off as usize..(off + n) as usize]);
        });
        assert_eq!((addr, size), (0, 256));
        assert_eq!(reads, 1);
        assert_eq!(w.as_slice(), &data[..]);
    }
}
