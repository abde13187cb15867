use crate::format::{pad8, SIG_GCOL, VLEN_REF_SIZE};
use crate::writer::{ByteWriter, Endian};

/// One `GCOL` collection of variable-length objects. Indices are handed out
/// from 1; index 0 is the end marker. Datasets embed the returned index in a
/// 16-byte reference once the collection address is known.
#[derive(Debug, Default)]
pub struct GlobalHeapBuilder {
    objects: Vec<Vec<u8>>,
}

impl GlobalHeapBuilder {
    pub fn new() -> GlobalHeapBuilder {
        GlobalHeapBuilder::default()
    }

    pub fn alloc(&mut self, data: &[u8]) -> u16 {
        self.objects.push(data.to_vec());
        self.objects.len() as u16
    }

    pub fn object_len(&self, index: u16) -> u64 {
        self.objects[index as usize - 1].len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Emit the collection; returns its address.
    pub fn write(&self, w: &mut ByteWriter) -> u64 {
        let addr = w.len();
        let mut size: u64 = 16; // header
        for obj in &self.objects {
            size += 16 + pad8(obj.len()) as u64;
        }
        size += 16; // end marker

        w.write_bytes(&SIG_GCOL);
        w.write_u8(1); // the only version
        w.pad_zeros(3);
        w.write_u64(size, Endian::Little);
        for (i, obj) in self.objects.iter().enumerate() {
            w.write_u16(i as u16 + 1, Endian::Little);
            w.write_u16(1, Endian::Little); // reference count
            w.pad_zeros(4);
            w.write_u64(obj.len() as u64, Endian::Little);
            w.write_bytes(obj);
            w.pad_zeros(pad8(obj.len()) - obj.len());
        }
        // end marker object
        w.write_u16(0, Endian::Little);
        w.write_u16(0, Endian::Little);
        w.pad_zeros(4);
        w.write_u64(0, Endian::Little);
        addr
    }
}

/// 16-byte reference stored in a dataset element slot: length, collection
/// address, object index.
pub fn encode_vlen_ref(length: u32, heap_addr: u64, index: u16, out: &mut Vec<u8>) {
    out.extend_from_slice(&length.to_le_bytes());
    out.extend_from_slice(&heap_addr.to_le_bytes());
    out.extend_from_slice(&u32::from(index).to_le_bytes());
}
