use crate::format::MAX_RANK;

/// Shape of a dataset or attribute value. Scalar spaces have rank 0 and
/// exactly one element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dataspace {
    pub dims: Vec<u64>,
    pub max_dims: Option<Vec<u64>>,
}

impl Dataspace {
    pub fn scalar() -> Dataspace {
        Dataspace { dims: Vec::new(), max_dims: None }
    }

    pub fn simple(dims: Vec<u64>) -> Dataspace {
        debug_assert!(dims.len() <= MAX_RANK);
        Dataspace { dims, max_dims: None }
    }

    pub fn rank(&self) -> u8 {
        self.dims.len() as u8
    }

    pub fn element_count(&self) -> u64 {
        self.dims.iter().product()
    }

    /// version 1 dataspace message
    pub fn encode_message(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(8 + self.dims.len() * 8);
        out.push(1); // version
        out.push(self.rank());
        out.push(u8::from(self.max_dims.is_some())); // flags, bit 0 = max dims
        out.extend_from_slice(&[0; 5]);
        for d in &self.dims {
            out.extend_from_slice(&d.to_le_bytes());
        }
        if let Some(max_dims) = &self.max_dims {
            for d in max_dims {
                out.extend_from_slice(&d.to_le_bytes());
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_dataspace_message() {
        let msg = Dataspace::simple(vec![2, 3]).encode_message();
        assert_eq!(msg.len(), 24);
        assert_eq!(&msg[..3], &[1, 2, 0]);
        assert_eq!(&msg[8..16], &2u64.to_le_bytes());
        assert_eq!(&msg[16..24], &3u64.to_le_bytes());
    }

    #[test]
    fn scalar_dataspace() {
        let space = Dataspace::scalar();
        assert_eq!(space.rank(), 0);
        assert_eq!(space.element_count(), 1);
        assert_eq!(space.encode_message().len(), 8);
    }

    #[test]
    fn max_dims_flag() {
        let space = Dataspace {
            dims: vec![4],
            max_dims: Some(vec![8]),
        };
        let msg = space.encode_message();
        assert_eq!(msg[2], 1);
        assert_eq!(msg.len(), 24);
        assert_eq!(&msg[16..24], &8u64.to_le_bytes());
    }
}
