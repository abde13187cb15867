//! A pure-Rust HDF5 writer.
//!
//! The crate assembles a complete byte image of an HDF5 file — version-0
//! superblock, object headers, group indexes (v1 symbol tables or v2
//! fractal heap + B-tree), contiguous or chunked dataset storage with an
//! optional gzip/lzf filter pipeline — and hands the finished bytes to a
//! sink. It does not read HDF5 files and never mutates an existing one.
//!
//! ```no_run
//! use hdf5_kit::{FileBuilder, MemArray};
//!
//! let data = MemArray::new(vec![2, 3], vec![1.0f64, 2.0, 3.0, 4.0, 5.0, 6.0]);
//! let mut builder = FileBuilder::new();
//! builder.add_dataset("/measurements/values", &data).unwrap();
//! let image = builder.finish().unwrap();
//! image.write_to_path(std::path::Path::new("out.h5")).unwrap();
//! ```

mod address;
mod attribute;
mod btree_v1;
mod btree_v2;
mod builder;
mod checksum;
mod chunk;
mod dataspace;
mod datatype;
mod error;
mod filter;
mod format;
mod fractal_heap;
mod global_heap;
mod group;
mod layout;
mod local_heap;
mod lzf;
mod object_header;
mod options;
mod source;
mod superblock;
mod tabular;
mod validate;
mod writer;

pub use address::{AddressLedger, KEY_END_OF_FILE, KEY_ROOT_GROUP, KEY_SUPERBLOCK, UNDEFINED_ADDRESS};
pub use attribute::AttributeValue;
pub use builder::{FileBuilder, FileImage};
pub use checksum::{lookup3, name_hash};
pub use datatype::{
    compound_layout, CharSet, CompoundField, CompoundLayout, Datatype, RefKind, StrPad,
};
pub use dataspace::Dataspace;
pub use error::{Hdf5Error, NodeKind, Result};
pub use filter::{Filter, FilterPipeline};
pub use options::{Compression, DfStrategy, LayoutKind, WriteOptions};
pub use source::{
    write_to_path, ArraySource, CellValue, ColumnKind, Element, ElementKind, FileSink, MemArray,
    MemTable, TabularSource, VecSink,
};
pub use tabular::{FieldPlan, TablePlan};
pub use validate::{dump_summary, validate_image};
pub use writer::Endian;
