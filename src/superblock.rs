use crate::address::UNDEFINED_ADDRESS;
use crate::format::{
    GROUP_INTERNAL_NODE_K, GROUP_LEAF_NODE_K, HDF5_MAGIC, SUPERBLOCK_EOF_OFFSET,
    SUPERBLOCK_ROOT_OH_OFFSET, SUPERBLOCK_SIZE,
};
use crate::writer::{ByteWriter, Endian};

/// Version-0 superblock. The 96 bytes are laid down first with undefined
/// end-of-file and root addresses; `patch` fills both in once the image is
/// complete — the only backward writes in a build.

pub fn reserve(w: &mut ByteWriter) {
    debug_assert!(w.is_empty(), "superblock must sit at offset 0");
    w.write_bytes(&HDF5_MAGIC);
    w.write_u8(0); // superblock version
    w.write_u8(0); // free space storage version
    w.write_u8(0); // root group symbol table entry version
    w.write_u8(0);
    w.write_u8(0); // shared header message format version
    w.write_u8(8); // offset size
    w.write_u8(8); // length size
    w.write_u8(0);
    w.write_u16(GROUP_LEAF_NODE_K, Endian::Little);
    w.write_u16(GROUP_INTERNAL_NODE_K, Endian::Little);
    w.write_u32(0, Endian::Little); // file consistency flags
    w.write_u64(0, Endian::Little); // base address
    w.write_u64(UNDEFINED_ADDRESS, Endian::Little); // free space info
    w.write_u64(UNDEFINED_ADDRESS, Endian::Little); // end of file, patched
    w.write_u64(UNDEFINED_ADDRESS, Endian::Little); // driver information

    // root group symbol table entry: link name offset 0, object header
    // address patched later, cache type 0, zeroed scratch-pad
    w.write_u64(0, Endian::Little);
    w.write_u64(UNDEFINED_ADDRESS, Endian::Little);
    w.write_u32(0, Endian::Little);
    w.write_u32(0, Endian::Little);
    w.pad_zeros(16);
    debug_assert_eq!(w.len(), SUPERBLOCK_SIZE as u64);
}

pub fn patch(w: &mut ByteWriter, end_of_file: u64, root_object_header: u64) {
    w.patch_u64_at(SUPERBLOCK_EOF_OFFSET, end_of_file);
    w.patch_u64_at(SUPERBLOCK_ROOT_OH_OFFSET, root_object_header);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_block_is_96_bytes_with_magic() {
        let mut w = ByteWriter::new();
        reserve(&mut w);
        assert_eq!(w.len(), 96);
        let bytes = w.as_slice();
        assert_eq!(&bytes[..8], &[0x89, 0x48, 0x44, 0x46, 0x0D, 0x0A, 0x1A, 0x0A]);
        assert_eq!(bytes[13], 8); // offset size
        assert_eq!(bytes[14], 8); // length size
        assert_eq!(u16::from_le_bytes([bytes[16], bytes[17]]), 4);
        assert_eq!(u16::from_le_bytes([bytes[18], bytes[19]]), 16);
    }

    #[test]
    fn patch_targets_fixed_offsets() {
        let mut w = ByteWriter::new();
        reserve(&mut w);
        patch(&mut w, 4096, 96);
        let bytes = w.as_slice();
        assert_eq!(u64::from_le_bytes(bytes[40..48].try_into().unwrap()), 4096);
        assert_eq!(u64::from_le_bytes(bytes[64..72].try_into().unwrap()), 96);
        // base address stays zero, free space stays undefined
        assert_eq!(u64::from_le_bytes(bytes[24..32].try_into().unwrap()), 0);
        assert_eq!(
            u64::from_le_bytes(bytes[32..40].try_into().unwrap()),
            UNDEFINED_ADDRESS
        );
    }
}
