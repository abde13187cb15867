use log::trace;

use crate::error::{Hdf5Error, Result};
use crate::filter::FilterPipeline;
use crate::writer::ByteWriter;

/// Chunk partitioning and streaming emission. A coordinate iterator
/// produces chunk origins in lexicographic order and a consumer gathers one
/// chunk at a time, so at most one raw and one filtered buffer are alive no
/// matter how large the dataset is.

#[derive(Debug, Clone)]
pub struct ChunkGrid {
    pub dataset_dims: Vec<u64>,
    pub chunk_dims: Vec<u64>,
}

impl ChunkGrid {
    pub fn new(dataset_dims: Vec<u64>, chunk_dims: Vec<u64>) -> ChunkGrid {
        debug_assert_eq!(dataset_dims.len(), chunk_dims.len());
        ChunkGrid { dataset_dims, chunk_dims }
    }

    pub fn grid_dims(&self) -> Vec<u64> {
        self.dataset_dims
            .iter()
            .zip(&self.chunk_dims)
            .map(|(d, c)| d.div_ceil(*c))
            .collect()
    }

    pub fn chunk_count(&self) -> u64 {
        self.grid_dims().iter().product()
    }

    pub fn chunk_elements(&self) -> u64 {
        self.chunk_dims.iter().product()
    }

    /// chunk origins (element space) in lexicographic order
    pub fn coords(&self) -> CoordIter {
        CoordIter { grid: self, next: Some(vec![0; self.dataset_dims.len()]) }
    }

    /// the one-past-the-end bound used as the final key of a chunk index
    pub fn end_coords(&self) -> Vec<u64> {
        self.grid_dims()
            .iter()
            .zip(&self.chunk_dims)
            .map(|(g, c)| g * c)
            .collect()
    }
}

pub struct CoordIter<'a> {
    grid: &'a ChunkGrid,
    next: Option<Vec<u64>>,
}

impl Iterator for CoordIter<'_> {
    type Item = Vec<u64>;

    fn next(&mut self) -> Option<Vec<u64>> {
        let current = self.next.take()?;
        // odometer step, last axis fastest
        let mut bumped = current.clone();
        let mut axis = bumped.len();
        loop {
            if axis == 0 {
                // rank 0: the single scalar chunk has no successor
                break;
            }
            axis -= 1;
            bumped[axis] += self.grid.chunk_dims[axis];
            if bumped[axis] < self.grid.dataset_dims[axis] {
                self.next = Some(bumped);
                break;
            }
            bumped[axis] = 0;
        }
        Some(current)
    }
}

/// Reject chunk shapes that do not tile the dataset; the error names the
/// offending configuration and a clamped shape that would work.
pub fn validate_chunk_dims(dataset_dims: &[u64], chunk_dims: &[u64]) -> Result<()> {
    let suggestion: Vec<u64> = if chunk_dims.len() == dataset_dims.len() {
        chunk_dims
            .iter()
            .zip(dataset_dims)
            .map(|(c, d)| (*c).clamp(1, (*d).max(1)))
            .collect()
    } else {
        dataset_dims.to_vec()
    };
    let err = |reason: String| {
        Err(Hdf5Error::InvalidChunkDimensions {
            dataset_dims: dataset_dims.to_vec(),
            chunk_dims: chunk_dims.to_vec(),
            reason,
            suggestion: suggestion.clone(),
        })
    };
    if chunk_dims.is_empty() {
        return err("chunk dimension list is empty".to_string());
    }
    if chunk_dims.len() != dataset_dims.len() {
        return err(format!(
            "chunk rank {} does not match dataset rank {}",
            chunk_dims.len(),
            dataset_dims.len()
        ));
    }
    for (axis, (c, d)) in chunk_dims.iter().zip(dataset_dims).enumerate() {
        if *c == 0 {
            return err(format!("axis {axis} has non-positive chunk extent"));
        }
        if *c > *d {
            return err(format!("axis {axis} chunk extent {c} exceeds dataset extent {d}"));
        }
    }
    Ok(())
}

const AUTO_CHUNK_TARGET_BYTES: u64 = 1 << 20;
const AUTO_CHUNK_MIN_ELEMS: u64 = 1024;
const AUTO_CHUNK_MAX_ELEMS: u64 = 1 << 23;

/// Pick a chunk shape targeting about 1 MiB per chunk, spreading the
/// reduction across axes in proportion to their extents.
pub fn auto_chunk_dims(dataset_dims: &[u64], element_size: u32) -> Vec<u64> {
    let total: u64 = dataset_dims.iter().product();
    let target = (AUTO_CHUNK_TARGET_BYTES / u64::from(element_size.max(1)))
        .clamp(AUTO_CHUNK_MIN_ELEMS, AUTO_CHUNK_MAX_ELEMS);
    if total <= target {
        return dataset_dims.to_vec();
    }
    let scale = (target as f64 / total as f64).powf(1.0 / dataset_dims.len() as f64);
    let mut chunk: Vec<u64> = dataset_dims
        .iter()
        .map(|d| ((*d as f64 * scale).round() as u64).clamp(1, *d))
        .collect();
    // rounding can overshoot; shave the widest axis until we fit
    while chunk.iter().product::<u64>() > target {
        let widest = chunk
            .iter()
            .enumerate()
            .max_by_key(|(_, c)| **c)
            .map(|(i, _)| i)
            .unwrap_or(0);
        if chunk[widest] <= 1 {
            break;
        }
        chunk[widest] = (chunk[widest] + 1) / 2;
    }
    chunk
}

/// Gather one chunk's elements row-major into `buf`, padding cells beyond
/// the dataset bounds with the fill value. `read` appends raw bytes for
/// `(offset_elems, n_elems)` requests against the flat row-major source.
pub fn gather_chunk(
    dataset_dims: &[u64],
    chunk_dims: &[u64],
    coords: &[u64],
    element_size: usize,
    fill: &[u8],
    read: &mut dyn FnMut(u64, u64, &mut Vec<u8>),
    buf: &mut Vec<u8>,
) {
    buf.clear();
    let rank = dataset_dims.len();
    if rank == 0 {
        read(0, 1, buf);
        return;
    }

    let mut strides = vec![1u64; rank];
    for axis in (0..rank - 1).rev() {
        strides[axis] = strides[axis + 1] * dataset_dims[axis + 1];
    }

    let row_len = chunk_dims[rank - 1];
    let valid_row = dataset_dims[rank - 1]
        .saturating_sub(coords[rank - 1])
        .min(row_len);

    // odometer over the chunk-local indices of all axes but the last
    let mut local = vec![0u64; rank - 1];
    loop {
        let mut in_bounds = true;
        let mut offset = coords[rank - 1];
        for axis in 0..rank - 1 {
            let abs = coords[axis] + local[axis];
            if abs >= dataset_dims[axis] {
                in_bounds = false;
                break;
            }
            offset += abs * strides[axis];
        }

        if in_bounds && valid_row > 0 {
            read(offset, valid_row, buf);
            push_fill(buf, fill, (row_len - valid_row) as usize, element_size);
        } else {
            push_fill(buf, fill, row_len as usize, element_size);
        }

        // bump the odometer
        let mut axis = rank - 1;
        loop {
            if axis == 0 {
                return;
            }
            axis -= 1;
            local[axis] += 1;
            if local[axis] < chunk_dims[axis] {
                break;
            }
            local[axis] = 0;
        }
    }
}

fn push_fill(buf: &mut Vec<u8>, fill: &[u8], count: usize, element_size: usize) {
    if fill.len() == element_size {
        for _ in 0..count {
            buf.extend_from_slice(fill);
        }
    } else {
        buf.resize(buf.len() + count * element_size, 0);
    }
}

#[derive(Debug, Clone)]
pub struct WrittenChunk {
    pub coords: Vec<u64>,
    pub addr: u64,
    pub stored_size: u32,
    pub filter_mask: u32,
}

/// Emit every chunk in coordinate order, pushing each through the pipeline,
/// and return the records the chunk index is built from.
pub fn write_chunks(
    w: &mut ByteWriter,
    grid: &ChunkGrid,
    element_size: usize,
    fill: &[u8],
    read: &mut dyn FnMut(u64, u64, &mut Vec<u8>),
    pipeline: Option<&FilterPipeline>,
) -> Result<Vec<WrittenChunk>> {
    let mut written = Vec::with_capacity(grid.chunk_count() as usize);
    let mut raw = Vec::with_capacity(grid.chunk_elements() as usize * element_size);
    for coords in grid.coords() {
        gather_chunk(
            &grid.dataset_dims,
            &grid.chunk_dims,
            &coords,
            element_size,
            fill,
            read,
            &mut raw,
        );
        let (stored, filter_mask) = match pipeline {
            Some(pipeline) => {
                let (data, mask) = pipeline.apply(&raw)?;
                (data, mask)
            }
            None => (std::mem::take(&mut raw), 0),
        };
        let addr = w.len();
        w.write_bytes(&stored);
        trace!(
            "chunk {:?}: {} raw bytes, {} stored at {}",
            coords,
            grid.chunk_elements() as usize * element_size,
            stored.len(),
            addr
        );
        written.push(WrittenChunk {
            coords,
            addr,
            stored_size: stored.len() as u32,
            filter_mask,
        });
        if pipeline.is_none() {
            raw = stored; // reuse the buffer we took
        }
    }
    Ok(written)
}
