use log::debug;

use crate::address::{AddressLedger, KEY_END_OF_FILE, KEY_ROOT_GROUP, KEY_SUPERBLOCK};
use crate::attribute::{self, AttributeValue};
use crate::btree_v1::{self, ChunkEntry, ChunkKey};
use crate::btree_v2;
use crate::chunk::{self, ChunkGrid};
use crate::dataspace::Dataspace;
use crate::datatype::Datatype;
use crate::error::{Hdf5Error, NodeKind, Result};
use crate::filter::FilterPipeline;
use crate::format::{
    BTREE_V2_TYPE_CHUNK, MAX_RANK, MSG_ATTRIBUTE, MSG_DATASPACE, MSG_DATATYPE, MSG_DATA_LAYOUT,
    MSG_FILL_VALUE, MSG_FILTER_PIPELINE,
};
use crate::global_heap::{self, GlobalHeapBuilder};
use crate::group::{self, ChildLink, GroupFormat};
use crate::layout;
use crate::object_header::{self, HeaderMessage, HeaderVersion};
use crate::options::{LayoutKind, WriteOptions};
use crate::source::{ArraySource, FileSink, TabularSource};
use crate::superblock;
use crate::tabular::{self, TablePlan};
use crate::validate;
use crate::writer::ByteWriter;

/// The finished byte image plus the ledger the tests (and the validator)
/// interrogate.
#[derive(Debug)]
pub struct FileImage {
    pub bytes: Vec<u8>,
    pub ledger: AddressLedger,
}

impl FileImage {
    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn write_to_sink(&self, sink: &mut dyn FileSink) -> Result<()> {
        sink.write_all(&self.bytes)
    }

    pub fn write_to_path(&self, path: &std::path::Path) -> Result<()> {
        crate::source::write_to_path(path, &self.bytes)
    }
}

enum PendingData<'a> {
    Array(&'a dyn ArraySource),
    Owned(Vec<u8>),
    VlenStrings(Vec<String>),
}

struct DatasetNode<'a> {
    dtype: Datatype,
    dims: Vec<u64>,
    fill: Vec<u8>,
    data: PendingData<'a>,
    options: WriteOptions,
    attributes: Vec<(String, AttributeValue)>,
}

#[derive(Default)]
struct GroupNode<'a> {
    children: Vec<(String, TreeNode<'a>)>,
    attributes: Vec<(String, AttributeValue)>,
}

enum TreeNode<'a> {
    Group(GroupNode<'a>),
    Dataset(Box<DatasetNode<'a>>),
}

impl TreeNode<'_> {
    fn kind(&self) -> NodeKind {
        match self {
            TreeNode::Group(_) => NodeKind::Group,
            TreeNode::Dataset(_) => NodeKind::Dataset,
        }
    }
}

/// Two-phase file assembly: `create_group`/`add_*` only validate and grow an
/// in-memory path trie, `finish` emits the image. Every validation error is
/// raised before the first byte of the failing call would have been
/// planned, so a failed call leaves the builder untouched.
pub struct FileBuilder<'a> {
    options: WriteOptions,
    root: GroupNode<'a>,
}

impl<'a> FileBuilder<'a> {
    pub fn new() -> FileBuilder<'a> {
        FileBuilder { options: WriteOptions::default(), root: GroupNode::default() }
    }

    pub fn with_options(options: WriteOptions) -> Result<FileBuilder<'a>> {
        options.validate()?;
        Ok(FileBuilder { options, root: GroupNode::default() })
    }

    pub fn options(&self) -> &WriteOptions {
        &self.options
    }

    pub fn set_root_attributes(
        &mut self,
        attributes: Vec<(String, AttributeValue)>,
    ) -> Result<()> {
        for (name, value) in &attributes {
            attribute::validate(name, value)?;
        }
        self.root.attributes = attributes;
        Ok(())
    }

    pub fn create_group(&mut self, path: &str) -> Result<()> {
        self.create_group_with(path, Vec::new())
    }

    pub fn create_group_with(
        &mut self,
        path: &str,
        attributes: Vec<(String, AttributeValue)>,
    ) -> Result<()> {
        for (name, value) in &attributes {
            attribute::validate(name, value)?;
        }
        let segments = split_path(path)?;
        if segments.is_empty() {
            return Err(Hdf5Error::GroupPathConflict {
                path: "/".to_string(),
                existing: NodeKind::Group,
                requested: NodeKind::Group,
            });
        }
        self.insert(
            &segments,
            TreeNode::Group(GroupNode { children: Vec::new(), attributes }),
        )
    }

    /// Plan a dataset fed from an array source with the builder's options.
    pub fn add_dataset(&mut self, path: &str, source: &'a dyn ArraySource) -> Result<()> {
        self.add_dataset_with(path, source, self.options.clone())
    }

    pub fn add_dataset_with(
        &mut self,
        path: &str,
        source: &'a dyn ArraySource,
        options: WriteOptions,
    ) -> Result<()> {
        options.validate()?;
        let segments = split_path_nonroot(path)?;
        let dims = source.dims();
        validate_dims(&dims)?;
        let dtype = source.element_kind().datatype()?;
        self.check_dataset_options(&dims, dtype.element_size(), &options)?;

        let mut attributes = options.attributes.clone();
        attributes.extend(source.attributes());
        for (name, value) in &attributes {
            attribute::validate(name, value)?;
        }

        let fill = source.fill_value();
        self.insert(
            &segments,
            TreeNode::Dataset(Box::new(DatasetNode {
                dtype,
                dims,
                fill,
                data: PendingData::Array(source),
                options,
                attributes,
            })),
        )
    }

    /// Variable-length UTF-8 strings: one global heap collection per
    /// dataset, with the 16-byte references stored contiguously or (when
    /// the builder asks for it) compact. Chunking and compression do not
    /// apply to heap references and are rejected.
    pub fn add_vlen_strings(&mut self, path: &str, values: Vec<String>) -> Result<()> {
        let segments = split_path_nonroot(path)?;
        let dims = vec![values.len() as u64];
        validate_dims(&dims)?;
        if self.options.layout == LayoutKind::Chunked
            || self.options.compression != crate::options::Compression::None
        {
            return Err(Hdf5Error::UnsupportedWriteDatatype {
                description: "variable-length strings cannot be chunked or compressed"
                    .to_string(),
                supported: crate::error::SUPPORTED_ELEMENT_KINDS,
            });
        }
        let dtype = Datatype::var_utf8();
        self.check_dataset_options(&dims, dtype.element_size(), &self.options)?;
        let mut options = self.options.clone();
        let attributes = options.attributes.split_off(0);
        for (name, value) in &attributes {
            attribute::validate(name, value)?;
        }
        self.insert(
            &segments,
            TreeNode::Dataset(Box::new(DatasetNode {
                dtype,
                dims,
                fill: Vec::new(),
                data: PendingData::VlenStrings(values),
                options,
                attributes,
            })),
        )
    }

    /// Plan a tabular source with the builder's options; returns the
    /// inspection record of the compound encoding (or of the per-column
    /// datatypes' parent plan when writing column-wise).
    pub fn add_table(&mut self, path: &str, table: &dyn TabularSource) -> Result<TablePlan> {
        self.add_table_with(path, table, self.options.clone())
    }

    pub fn add_table_with(
        &mut self,
        path: &str,
        table: &dyn TabularSource,
        options: WriteOptions,
    ) -> Result<TablePlan> {
        options.validate()?;
        if table.row_count() == 0 {
            return Err(Hdf5Error::DataValidation {
                dims: vec![0],
                reason: "tabular source has no rows".to_string(),
            });
        }
        let plan = tabular::plan_compound(table)?;
        match options.df_strategy {
            crate::options::DfStrategy::Compound => {
                let segments = split_path_nonroot(path)?;
                let dims = vec![plan.row_count];
                self.check_dataset_options(&dims, plan.record_size, &options)?;
                let attributes = options.attributes.clone();
                for (name, value) in &attributes {
                    attribute::validate(name, value)?;
                }
                let bytes = tabular::encode_compound_records(table, &plan)?;
                self.insert(
                    &segments,
                    TreeNode::Dataset(Box::new(DatasetNode {
                        dtype: plan.datatype.clone(),
                        dims,
                        fill: Vec::new(),
                        data: PendingData::Owned(bytes),
                        options,
                        attributes,
                    })),
                )?;
            }
            crate::options::DfStrategy::Columnwise => {
                let columns = tabular::encode_columns(table)?;
                // the synthesised group is the write target itself, so only
                // its ancestors are subject to createIntermediateGroups.
                // Everything trie-independent is validated before the first
                // mutation; once the group is in, each column is a direct
                // child of it and its insert cannot fail.
                let group_segments = split_path_nonroot(path)?;
                self.check_insert(&group_segments, NodeKind::Group)?;
                for (name, value) in &options.attributes {
                    attribute::validate(name, value)?;
                }
                let mut seen = std::collections::HashSet::new();
                let dims = vec![table.row_count()];
                for column in &columns {
                    let segments = split_path_nonroot(&format!("{path}/{}", column.name))?;
                    if segments.len() != group_segments.len() + 1 {
                        return Err(Hdf5Error::InvalidDatasetName {
                            path: format!("{path}/{}", column.name),
                            reason: format!(
                                "column name {:?} is not a single path segment",
                                column.name
                            ),
                        });
                    }
                    if !seen.insert(column.name.clone()) {
                        return Err(Hdf5Error::GroupPathConflict {
                            path: format!("{path}/{}", column.name),
                            existing: NodeKind::Dataset,
                            requested: NodeKind::Dataset,
                        });
                    }
                    self.check_dataset_options(&dims, column.dtype.element_size(), &options)?;
                }
                self.insert(
                    &group_segments,
                    TreeNode::Group(GroupNode {
                        children: Vec::new(),
                        attributes: options.attributes.clone(),
                    }),
                )?;
                for column in columns {
                    let segments = split_path_nonroot(&format!("{path}/{}", column.name))?;
                    let mut column_options = options.clone();
                    column_options.attributes = Vec::new();
                    self.insert(
                        &segments,
                        TreeNode::Dataset(Box::new(DatasetNode {
                            dtype: column.dtype,
                            dims: dims.clone(),
                            fill: Vec::new(),
                            data: PendingData::Owned(column.bytes),
                            options: column_options,
                            attributes: Vec::new(),
                        })),
                    )?;
                }
            }
        }
        Ok(plan)
    }

    fn check_dataset_options(
        &self,
        dims: &[u64],
        element_size: u32,
        options: &WriteOptions,
    ) -> Result<()> {
        match options.layout {
            LayoutKind::Chunked => {
                if dims.is_empty() {
                    return Err(Hdf5Error::DataValidation {
                        dims: dims.to_vec(),
                        reason: "scalar datasets cannot use a chunked layout".to_string(),
                    });
                }
                if let Some(chunk_dims) = &options.chunk_dimensions {
                    chunk::validate_chunk_dims(dims, chunk_dims)?;
                }
            }
            LayoutKind::Compact => {
                let total = dims.iter().product::<u64>() * u64::from(element_size);
                if total > u64::from(u16::MAX) {
                    return Err(Hdf5Error::DataValidation {
                        dims: dims.to_vec(),
                        reason: format!(
                            "{total} bytes exceed the 65535-byte compact layout limit"
                        ),
                    });
                }
            }
            LayoutKind::Contiguous => {}
        }
        Ok(())
    }

    /// read-only conflict walk, then the mutating insert; a failure never
    /// leaves half-created intermediate groups behind
    fn insert(&mut self, segments: &[String], node: TreeNode<'a>) -> Result<()> {
        self.check_insert(segments, node.kind())?;
        let create = self.options.create_intermediate_groups;
        let mut cursor = &mut self.root;
        for segment in &segments[..segments.len() - 1] {
            let position = cursor.children.iter().position(|(name, _)| name == segment);
            let position = match position {
                Some(position) => position,
                None => {
                    debug_assert!(create);
                    cursor
                        .children
                        .push((segment.clone(), TreeNode::Group(GroupNode::default())));
                    cursor.children.len() - 1
                }
            };
            cursor = match &mut cursor.children[position].1 {
                TreeNode::Group(group) => group,
                TreeNode::Dataset(_) => unreachable!("checked by check_insert"),
            };
        }
        let last = segments[segments.len() - 1].clone();
        cursor.children.push((last, node));
        Ok(())
    }

    fn check_insert(&self, segments: &[String], requested: NodeKind) -> Result<()> {
        let mut cursor = &self.root;
        let mut prefix = String::new();
        for (i, segment) in segments.iter().enumerate() {
            prefix.push('/');
            prefix.push_str(segment);
            let last = i == segments.len() - 1;
            match cursor.children.iter().find(|(name, _)| name == segment) {
                None => {
                    if !last && !self.options.create_intermediate_groups {
                        return Err(Hdf5Error::InvalidDatasetName {
                            path: prefix.clone(),
                            reason: format!(
                                "intermediate group {prefix:?} does not exist and createIntermediateGroups is disabled"
                            ),
                        });
                    }
                    // nothing deeper can exist either
                    return Ok(());
                }
                Some((_, existing)) => {
                    if last {
                        return Err(Hdf5Error::GroupPathConflict {
                            path: prefix,
                            existing: existing.kind(),
                            requested,
                        });
                    }
                    match existing {
                        TreeNode::Group(group) => cursor = group,
                        TreeNode::Dataset(_) => {
                            return Err(Hdf5Error::GroupPathConflict {
                                path: prefix,
                                existing: NodeKind::Dataset,
                                requested: NodeKind::Group,
                            })
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Emit the image: superblock reservation, post-order walk, then the
    /// two superblock backpatches.
    pub fn finish(&self) -> Result<FileImage> {
        let mut w = ByteWriter::new();
        let mut ledger = AddressLedger::new();
        superblock::reserve(&mut w);
        ledger.record(KEY_SUPERBLOCK, 0);

        let (format, header_version) = if self.options.uses_v2_groups() {
            (GroupFormat::V2, HeaderVersion::V2)
        } else {
            (GroupFormat::V1, HeaderVersion::V1)
        };

        let root_addr =
            self.emit_group(&mut w, &mut ledger, "", &self.root, format, header_version)?;
        ledger.record(KEY_ROOT_GROUP, root_addr);

        let end_of_file = w.len();
        superblock::patch(&mut w, end_of_file, root_addr);
        ledger.record(KEY_END_OF_FILE, end_of_file);
        debug!("image complete: {end_of_file} bytes, root group at {root_addr}");

        let image = FileImage { bytes: w.into_bytes(), ledger };
        if self.options.validate_on_write {
            validate::validate_image(&image)?;
        }
        Ok(image)
    }

    fn emit_group(
        &self,
        w: &mut ByteWriter,
        ledger: &mut AddressLedger,
        path: &str,
        node: &GroupNode<'a>,
        format: GroupFormat,
        header_version: HeaderVersion,
    ) -> Result<u64> {
        let mut links = Vec::with_capacity(node.children.len());
        for (order, (name, child)) in node.children.iter().enumerate() {
            let child_path = format!("{path}/{name}");
            let addr = match child {
                TreeNode::Group(group) => {
                    self.emit_group(w, ledger, &child_path, group, format, header_version)?
                }
                TreeNode::Dataset(dataset) => {
                    self.emit_dataset(w, ledger, &child_path, dataset, format, header_version)?
                }
            };
            links.push(ChildLink {
                name: name.clone(),
                object_header_addr: addr,
                creation_order: order as u64,
            });
        }

        let index = group::write_children(w, format, &links);
        let mut messages = index.messages;
        for (name, value) in &node.attributes {
            messages.push(HeaderMessage::new(
                MSG_ATTRIBUTE,
                attribute::encode_message(name, value)?,
            ));
        }
        let addr = object_header::write_object_header(w, header_version, &messages);
        let display = if path.is_empty() { "/" } else { path };
        ledger.record_group(display, addr);
        debug!("group {display}: {} children, object header at {addr}", links.len());
        Ok(addr)
    }

    fn emit_dataset(
        &self,
        w: &mut ByteWriter,
        ledger: &mut AddressLedger,
        path: &str,
        dataset: &DatasetNode<'a>,
        format: GroupFormat,
        header_version: HeaderVersion,
    ) -> Result<u64> {
        let space = if dataset.dims.is_empty() {
            Dataspace::scalar()
        } else {
            Dataspace::simple(dataset.dims.clone())
        };
        let element_size = dataset.dtype.element_size();
        let element_count = space.element_count();

        let pipeline = FilterPipeline::from_options(&dataset.options)?;

        let mut messages = vec![
            HeaderMessage::new(MSG_DATASPACE, space.encode_message()),
            HeaderMessage::new(MSG_DATATYPE, dataset.dtype.encode_message()),
            HeaderMessage::new(MSG_FILL_VALUE, encode_fill_value(&dataset.fill, element_size)),
        ];
        if let Some(pipeline) = &pipeline {
            messages.push(HeaderMessage::new(
                MSG_FILTER_PIPELINE,
                pipeline.encode_message(),
            ));
        }

        let layout_body = match &dataset.data {
            PendingData::VlenStrings(values) => {
                let mut heap = GlobalHeapBuilder::new();
                let indices: Vec<u16> = values.iter().map(|v| heap.alloc(v.as_bytes())).collect();
                let heap_addr = heap.write(w);
                let mut payload = Vec::with_capacity(values.len() * 16);
                for (value, index) in values.iter().zip(indices) {
                    global_heap::encode_vlen_ref(
                        value.len() as u32,
                        heap_addr,
                        index,
                        &mut payload,
                    );
                }
                match dataset.options.layout {
                    LayoutKind::Compact => layout::encode_compact(&payload),
                    _ => {
                        let addr = w.len();
                        w.write_bytes(&payload);
                        layout::encode_contiguous(addr, payload.len() as u64)
                    }
                }
            }
            data => {
                let mut read = data_reader(data, element_size as usize);
                match dataset.options.layout {
                    LayoutKind::Compact => {
                        let mut bytes = Vec::with_capacity(
                            element_count as usize * element_size as usize,
                        );
                        read(0, element_count, &mut bytes);
                        layout::encode_compact(&bytes)
                    }
                    LayoutKind::Contiguous => {
                        let (addr, size) =
                            layout::write_contiguous(w, element_count, element_size, &mut read);
                        layout::encode_contiguous(addr, size)
                    }
                    LayoutKind::Chunked => {
                        let chunk_dims = match &dataset.options.chunk_dimensions {
                            Some(dims) => dims.clone(),
                            None => chunk::auto_chunk_dims(&dataset.dims, element_size),
                        };
                        let grid = ChunkGrid::new(dataset.dims.clone(), chunk_dims.clone());
                        debug!(
                            "dataset {path}: {} chunks of {:?}",
                            grid.chunk_count(),
                            chunk_dims
                        );
                        let written = chunk::write_chunks(
                            w,
                            &grid,
                            element_size as usize,
                            &dataset.fill,
                            &mut read,
                            pipeline.as_ref(),
                        )?;
                        let btree_addr = match format {
                            GroupFormat::V1 => {
                                let entries: Vec<ChunkEntry> = written
                                    .iter()
                                    .map(|c| {
                                        let mut offsets = c.coords.clone();
                                        offsets.push(0);
                                        ChunkEntry {
                                            key: ChunkKey {
                                                size: c.stored_size,
                                                filter_mask: c.filter_mask,
                                                offsets,
                                            },
                                            addr: c.addr,
                                        }
                                    })
                                    .collect();
                                let mut end = grid.end_coords();
                                end.push(0);
                                let end_key =
                                    ChunkKey { size: 0, filter_mask: 0, offsets: end };
                                btree_v1::write_chunk_tree(w, &entries, &end_key)
                            }
                            GroupFormat::V2 => {
                                let rank = grid.dataset_dims.len();
                                let record_size = 16 + 8 * rank;
                                let records: Vec<Vec<u8>> = written
                                    .iter()
                                    .map(|c| {
                                        let mut r = Vec::with_capacity(record_size);
                                        r.extend_from_slice(
                                            &u64::from(c.stored_size).to_le_bytes(),
                                        );
                                        for coord in &c.coords {
                                            r.extend_from_slice(&coord.to_le_bytes());
                                        }
                                        r.extend_from_slice(&c.addr.to_le_bytes());
                                        r
                                    })
                                    .collect();
                                btree_v2::write_btree_v2(
                                    w,
                                    BTREE_V2_TYPE_CHUNK,
                                    record_size,
                                    &records,
                                )
                            }
                        };
                        ledger.record_chunk_index(path, btree_addr);
                        layout::encode_chunked(btree_addr, &grid.chunk_dims, element_size)
                    }
                }
            }
        };
        messages.push(HeaderMessage::new(MSG_DATA_LAYOUT, layout_body));

        for (name, value) in &dataset.attributes {
            messages.push(HeaderMessage::new(
                MSG_ATTRIBUTE,
                attribute::encode_message(name, value)?,
            ));
        }

        let addr = object_header::write_object_header(w, header_version, &messages);
        ledger.record_dataset(path, addr);
        debug!("dataset {path}: object header at {addr}");
        Ok(addr)
    }
}

impl Default for FileBuilder<'_> {
    fn default() -> Self {
        FileBuilder::new()
    }
}

fn data_reader<'b>(
    data: &'b PendingData<'b>,
    element_size: usize,
) -> impl FnMut(u64, u64, &mut Vec<u8>) + 'b {
    move |offset, n, out: &mut Vec<u8>| match data {
        PendingData::Array(source) => source.read_row_major(offset, n, out),
        PendingData::Owned(bytes) => {
            let start = offset as usize * element_size;
            let end = start + n as usize * element_size;
            out.extend_from_slice(&bytes[start..end]);
        }
        PendingData::VlenStrings(_) => unreachable!("vlen data has its own emission path"),
    }
}

/// version 2 fill value message; an empty fill encodes as undefined
fn encode_fill_value(fill: &[u8], element_size: u32) -> Vec<u8> {
    let mut out = Vec::with_capacity(8 + fill.len());
    out.push(2); // version
    out.push(1); // space allocation: early
    out.push(0); // write time: on allocation
    if fill.len() == element_size as usize && !fill.is_empty() {
        out.push(1);
        out.extend_from_slice(&(fill.len() as u32).to_le_bytes());
        out.extend_from_slice(fill);
    } else {
        out.push(0);
    }
    out
}

fn validate_dims(dims: &[u64]) -> Result<()> {
    if dims.len() > MAX_RANK {
        return Err(Hdf5Error::DataValidation {
            dims: dims.to_vec(),
            reason: format!("rank {} exceeds the implementation cap of {MAX_RANK}", dims.len()),
        });
    }
    if dims.iter().any(|d| *d == 0) {
        return Err(Hdf5Error::DataValidation {
            dims: dims.to_vec(),
            reason: "dataset shape contains a zero extent".to_string(),
        });
    }
    Ok(())
}

/// `path ::= "/" | "/" segment ("/" segment)*`; segments contain neither
/// '/' nor '.', so "." and ".." are ruled out with everything else dotted.
fn split_path(path: &str) -> Result<Vec<String>> {
    let err = |reason: &str| {
        Err(Hdf5Error::InvalidDatasetName { path: path.to_string(), reason: reason.to_string() })
    };
    if path.is_empty() {
        return err("path is empty");
    }
    if !path.starts_with('/') {
        return err("path does not start with '/'");
    }
    if path == "/" {
        return Ok(Vec::new());
    }
    if path.ends_with('/') {
        return err("trailing '/' is only allowed for the root");
    }
    let mut segments = Vec::new();
    for segment in path[1..].split('/') {
        if segment.is_empty() {
            return err("path contains an empty segment");
        }
        if segment.contains('.') {
            return err("path segments must not contain '.'");
        }
        segments.push(segment.to_string());
    }
    Ok(segments)
}

fn split_path_nonroot(path: &str) -> Result<Vec<String>> {
    let segments = split_path(path)?;
    if segments.is_empty() {
        return Err(Hdf5Error::InvalidDatasetName {
            path: path.to_string(),
            reason: "the root path cannot name a dataset".to_string(),
        });
    }
    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemArray;

    #[test]
    fn path_grammar() {
        assert!(split_path("/").unwrap().is_empty());
        assert_eq!(split_path("/a/b").unwrap(), vec!["a", "b"]);
        assert!(split_path("").is_err());
        assert!(split_path("a/b").is_err());
        assert!(split_path("/a/").is_err());
        assert!(split_path("/a//b").is_err());
        assert!(split_path("/a/./b").is_err());
        assert!(split_path("/a/../b").is_err());
        assert!(split_path("/data.set").is_err());
    }

    #[test]
    fn conflicts_are_symmetric() {
        let data = MemArray::new(vec![2], vec![1.0f64, 2.0]);

        let mut builder = FileBuilder::new();
        builder.add_dataset("/a", &data).unwrap();
        let err = builder.add_dataset("/a/b", &data).unwrap_err();
        assert!(matches!(
            err,
            Hdf5Error::GroupPathConflict {
                existing: NodeKind::Dataset,
                requested: NodeKind::Group,
                ..
            }
        ));

        let mut builder = FileBuilder::new();
        builder.add_dataset("/a/b", &data).unwrap();
        let err = builder.add_dataset("/a", &data).unwrap_err();
        assert!(matches!(
            err,
            Hdf5Error::GroupPathConflict {
                existing: NodeKind::Group,
                requested: NodeKind::Dataset,
                ..
            }
        ));
    }

    #[test]
    fn failed_validation_leaves_builder_untouched() {
        let data = MemArray::new(vec![100, 100], (0..10_000).map(|i| i as f64).collect());
        let mut builder = FileBuilder::new();
        let baseline = builder.finish().unwrap().len();

        let bad = WriteOptions::chunked().with_chunk_dimensions(vec![200, 200]);
        let err = builder.add_dataset_with("/grid", &data, bad).unwrap_err();
        match err {
            Hdf5Error::InvalidChunkDimensions { suggestion, .. } => {
                assert_eq!(suggestion, vec![100, 100]);
            }
            other => panic!("wrong error: {other:?}"),
        }
        // no bytes were planned: a rebuild yields the identical empty file
        assert_eq!(builder.finish().unwrap().len(), baseline);
    }

    #[test]
    fn missing_intermediates_respect_the_option() {
        let data = MemArray::new(vec![1], vec![1i64]);
        let mut options = WriteOptions::default();
        options.create_intermediate_groups = false;
        let mut builder = FileBuilder::with_options(options).unwrap();
        assert!(builder.add_dataset("/a/b", &data).is_err());
        builder.create_group("/a").unwrap();
        assert!(builder.add_dataset("/a/b", &data).is_ok());
    }
}
