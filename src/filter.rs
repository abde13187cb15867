use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::error::{Hdf5Error, Result};
use crate::format::{pad8, FILTER_DEFLATE, FILTER_LZF};
use crate::lzf;
use crate::options::{Compression as CompressionOption, LayoutKind, WriteOptions};

/// A single transform in the chunk pipeline. Filters are plain values owned
/// by one build; `Custom` carries ids this writer cannot apply itself but
/// can still describe in the pipeline message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    Deflate { level: u32 },
    Lzf,
    Custom { id: u16, client_data: Vec<u32> },
}

impl Filter {
    fn id(&self) -> u16 {
        match self {
            Filter::Deflate { .. } => FILTER_DEFLATE,
            Filter::Lzf => FILTER_LZF,
            Filter::Custom { id, .. } => *id,
        }
    }

    fn name(&self) -> &'static [u8] {
        match self {
            Filter::Lzf => b"lzf\0",
            _ => b"",
        }
    }

    fn client_data(&self) -> Vec<u32> {
        match self {
            Filter::Deflate { level } => vec![*level],
            Filter::Lzf => Vec::new(),
            Filter::Custom { client_data, .. } => client_data.clone(),
        }
    }

    /// whether a chunk may be stored raw when the filter does not pay off
    fn optional(&self) -> bool {
        matches!(self, Filter::Lzf)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FilterPipeline {
    pub filters: Vec<Filter>,
}

impl FilterPipeline {
    /// Translate the write options into a pipeline; compression demands a
    /// chunked layout and a sane level.
    pub fn from_options(options: &WriteOptions) -> Result<Option<FilterPipeline>> {
        match options.compression {
            CompressionOption::None => Ok(None),
            _ if options.layout != LayoutKind::Chunked => Err(Hdf5Error::FilterPipelineConfig {
                reason: "compression requires a chunked layout; set layout=chunked or disable compression"
                    .to_string(),
            }),
            CompressionOption::Gzip => {
                if !(1..=9).contains(&options.compression_level) {
                    return Err(Hdf5Error::FilterPipelineConfig {
                        reason: format!(
                            "gzip level {} is outside 1..=9",
                            options.compression_level
                        ),
                    });
                }
                Ok(Some(FilterPipeline {
                    filters: vec![Filter::Deflate { level: options.compression_level }],
                }))
            }
            CompressionOption::Lzf => Ok(Some(FilterPipeline { filters: vec![Filter::Lzf] })),
        }
    }

    /// Run a chunk through the pipeline in declaration order. Returns the
    /// stored bytes and the mask of skipped filters.
    pub fn apply(&self, chunk: &[u8]) -> Result<(Vec<u8>, u32)> {
        let mut data = chunk.to_vec();
        let mut mask = 0u32;
        for (index, filter) in self.filters.iter().enumerate() {
            match filter {
                Filter::Deflate { level } => {
                    let mut encoder =
                        ZlibEncoder::new(Vec::with_capacity(data.len() / 2), Compression::new(*level));
                    encoder.write_all(&data)?;
                    data = encoder.finish()?;
                }
                Filter::Lzf => match lzf::compress(&data) {
                    Some(packed) => data = packed,
                    // incompressible: store raw, flag the filter as skipped
                    None => mask |= 1 << index,
                },
                Filter::Custom { id, .. } => {
                    return Err(Hdf5Error::FilterPipelineConfig {
                        reason: format!(
                            "filter id {id} has no client implementation in this writer; use gzip or lzf"
                        ),
                    });
                }
            }
        }
        debug_assert!(filter_mask_valid(mask, self.filters.len()));
        Ok((data, mask))
    }

    /// version 2 filter pipeline message
    pub fn encode_message(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.push(2); // version
        out.push(self.filters.len() as u8);
        out.extend_from_slice(&0u16.to_le_bytes());
        for filter in &self.filters {
            let name = filter.name();
            let client = filter.client_data();
            out.extend_from_slice(&filter.id().to_le_bytes());
            out.extend_from_slice(&(name.len() as u16).to_le_bytes());
            out.extend_from_slice(&u16::from(filter.optional()).to_le_bytes());
            out.extend_from_slice(&(client.len() as u16).to_le_bytes());
            out.extend_from_slice(name);
            out.resize(out.len() + pad8(name.len()) - name.len(), 0);
            let client_bytes = client.len() * 4;
            for v in &client {
                out.extend_from_slice(&v.to_le_bytes());
            }
            out.resize(out.len() + pad8(client_bytes) - client_bytes, 0);
        }
        out
    }
}

fn filter_mask_valid(mask: u32, filters: usize) -> bool {
    filters >= 32 || mask < (1u32 << filters)
}
