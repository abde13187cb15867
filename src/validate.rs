use std::fmt::Write as _;

use crate::address::{KEY_END_OF_FILE, KEY_ROOT_GROUP};
use crate::builder::FileImage;
use crate::error::{Hdf5Error, Result};
use crate::format::{HDF5_MAGIC, SIG_BTHD, SIG_TREE, SUPERBLOCK_EOF_OFFSET, SUPERBLOCK_SIZE};

/// Post-build checks behind `validate_on_write`, plus a printable summary
/// for debugging. These re-read the raw image bytes rather than trusting
/// the writer's bookkeeping.

fn invalid(reason: String) -> Hdf5Error {
    Hdf5Error::DataValidation { dims: Vec::new(), reason }
}

pub fn validate_image(image: &FileImage) -> Result<()> {
    let bytes = &image.bytes;
    let len = image.len();
    if bytes.len() < SUPERBLOCK_SIZE {
        return Err(invalid(format!(
            "image is {} bytes, smaller than the {SUPERBLOCK_SIZE}-byte superblock",
            bytes.len()
        )));
    }
    if bytes[..8] != HDF5_MAGIC {
        return Err(invalid(format!(
            "superblock magic mismatch: found {}",
            hex::encode(&bytes[..8])
        )));
    }

    for (name, addr) in image.ledger.iter() {
        if addr > len || (addr == len && name != KEY_END_OF_FILE) {
            return Err(invalid(format!(
                "ledger entry {name} points at {addr}, past the {len}-byte image"
            )));
        }
    }

    let eof = read_u64(bytes, SUPERBLOCK_EOF_OFFSET as usize);
    if eof != len {
        return Err(invalid(format!(
            "superblock records end-of-file {eof} but the image is {len} bytes"
        )));
    }
    match image.ledger.get(KEY_END_OF_FILE) {
        Some(recorded) if recorded == len => {}
        other => {
            return Err(invalid(format!(
                "ledger endOfFile is {other:?}, expected {len}"
            )))
        }
    }

    let root = image
        .ledger
        .get(KEY_ROOT_GROUP)
        .ok_or_else(|| invalid("ledger has no rootGroup entry".to_string()))?;
    if root < SUPERBLOCK_SIZE as u64 {
        return Err(invalid(format!(
            "root group object header at {root} overlaps the superblock"
        )));
    }
    let root_field = read_u64(bytes, 64);
    if root_field != root {
        return Err(invalid(format!(
            "superblock root address {root_field} disagrees with the ledger ({root})"
        )));
    }

    for (name, addr) in image.ledger.iter() {
        if let Some(path) = name.strip_prefix("chunkindex_") {
            if addr + 4 > len {
                return Err(invalid(format!(
                    "chunk index for {path} at {addr} runs past the image"
                )));
            }
            let sig = &bytes[addr as usize..addr as usize + 4];
            if sig != &SIG_TREE[..] && sig != &SIG_BTHD[..] {
                return Err(invalid(format!(
                    "chunk index for {path} at {addr} starts with {} instead of TREE/BTHD",
                    hex::encode(sig)
                )));
            }
        }
    }

    Ok(())
}

/// One line per ledger entry, for eyeballing a finished image.
pub fn dump_summary(image: &FileImage) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "image: {} bytes, magic {}",
        image.len(),
        hex::encode(&image.bytes[..8])
    );
    for (name, addr) in image.ledger.iter() {
        let _ = writeln!(out, "{name}: offset {addr} (0x{addr:x})");
    }
    out
}

fn read_u64(bytes: &[u8], offset: usize) -> u64 {
    u64::from_le_bytes(bytes[offset..offset + 8].try_into().expect("bounds checked"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::FileBuilder;
    use crate::source::MemArray;

    #[test]
    fn valid_image_passes_and_dumps() {
        let data = MemArray::new(vec![4], vec![1i32, 2, 3, 4]);
        let mut builder = FileBuilder::new();
        builder.add_dataset("/v", &data).unwrap();
        let image = builder.finish().unwrap();
        validate_image(&image).unwrap();
        let summary = dump_summary(&image);
        assert!(summary.contains("superblock"));
        assert!(summary.contains("dataset_/v"));
    }

    #[test]
    fn corrupted_magic_is_caught() {
        let data = MemArray::new(vec![1], vec![1i32]);
        let mut builder = FileBuilder::new();
        builder.add_dataset("/v", &data).unwrap();
        let mut image = builder.finish().unwrap();
        image.bytes[0] ^= 0xFF;
        assert!(validate_image(&image).is_err());
    }

    #[test]
    fn truncated_image_is_caught() {
        let data = MemArray::new(vec![1], vec![1i32]);
        let mut builder = FileBuilder::new();
        builder.add_dataset("/v", &data).unwrap();
        let mut image = builder.finish().unwrap();
        image.bytes.truncate(image.bytes.len() - 8);
        assert!(validate_image(&image).is_err());
    }
}
