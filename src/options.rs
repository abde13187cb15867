use crate::attribute::AttributeValue;
use crate::error::{Hdf5Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LayoutKind {
    Compact,
    #[default]
    Contiguous,
    Chunked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    #[default]
    None,
    Gzip,
    Lzf,
}

/// How tabular sources are laid out on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DfStrategy {
    /// one dataset of compound records
    #[default]
    Compound,
    /// one dataset per column under a group
    Columnwise,
}

/// Per-write configuration. `format_version`, `create_intermediate_groups`
/// and `validate_on_write` are read from the builder's own options; the
/// rest may be overridden per dataset.
#[derive(Debug, Clone)]
pub struct WriteOptions {
    pub layout: LayoutKind,
    /// explicit chunk shape; None means auto-chunking when chunked
    pub chunk_dimensions: Option<Vec<u64>>,
    pub compression: Compression,
    /// gzip only, 1..=9
    pub compression_level: u32,
    /// 0 and 1 select v1 group structures, 2 selects v2
    pub format_version: u32,
    pub create_intermediate_groups: bool,
    pub df_strategy: DfStrategy,
    /// merged with attributes reported by the source
    pub attributes: Vec<(String, AttributeValue)>,
    pub validate_on_write: bool,
}

impl Default for WriteOptions {
    fn default() -> WriteOptions {
        WriteOptions {
            layout: LayoutKind::Contiguous,
            chunk_dimensions: None,
            compression: Compression::None,
            compression_level: 6,
            format_version: 0,
            create_intermediate_groups: true,
            df_strategy: DfStrategy::Compound,
            attributes: Vec::new(),
            validate_on_write: false,
        }
    }
}

impl WriteOptions {
    pub fn chunked() -> WriteOptions {
        WriteOptions { layout: LayoutKind::Chunked, ..WriteOptions::default() }
    }

    pub fn with_compression(mut self, compression: Compression) -> WriteOptions {
        self.compression = compression;
        self
    }

    pub fn with_chunk_dimensions(mut self, dims: Vec<u64>) -> WriteOptions {
        self.chunk_dimensions = Some(dims);
        self
    }

    pub fn with_format_version(mut self, version: u32) -> WriteOptions {
        self.format_version = version;
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: AttributeValue) -> WriteOptions {
        self.attributes.push((name.into(), value));
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.format_version > 2 {
            return Err(Hdf5Error::FormatVersionOutOfRange { requested: self.format_version });
        }
        if self.compression != Compression::None && self.layout != LayoutKind::Chunked {
            return Err(Hdf5Error::FilterPipelineConfig {
                reason: "compression requires a chunked layout; set layout=chunked or disable compression"
                    .to_string(),
            });
        }
        if self.compression == Compression::Gzip && !(1..=9).contains(&self.compression_level) {
            return Err(Hdf5Error::FilterPipelineConfig {
                reason: format!("gzip level {} is outside 1..=9", self.compression_level),
            });
        }
        Ok(())
    }

    pub fn uses_v2_groups(&self) -> bool {
        self.format_version == 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let options = WriteOptions::default();
        assert_eq!(options.layout, LayoutKind::Contiguous);
        assert_eq!(options.compression_level, 6);
        assert!(options.create_intermediate_groups);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn version_range() {
        let options = WriteOptions::default().with_format_version(3);
        assert!(matches!(
            options.validate(),
            Err(Hdf5Error::FormatVersionOutOfRange { requested: 3 })
        ));
        assert!(WriteOptions::default().with_format_version(2).validate().is_ok());
    }

    #[test]
    fn compression_demands_chunking() {
        let options = WriteOptions::default().with_compression(Compression::Lzf);
        assert!(options.validate().is_err());
        let options = WriteOptions::chunked().with_compression(Compression::Lzf);
        assert!(options.validate().is_ok());
    }
}
