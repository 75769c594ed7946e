//! Partitioned files
//!
//! A [`PartitionedFile`] materializes a file lazily, one requested byte
//! range at a time. Requesting a range parses only the parts no partition
//! covers yet and combines everything the request touches into a single
//! partition, so the partition set always consists of disjoint areas.
//!
//! Edits happen inside partitions. [`commit`](PartitionedFile::commit)
//! writes dirty partitions back in place, moving the rest of the file when
//! a partition changed length; [`rollback`](PartitionedFile::rollback)
//! re-reads them from disk.
//!
//! # Example
//!
//! ```no_run
//! use codeseam::engine::{FileConfig, LanguageRegistry, ParserConfig, PartitionedFile};
//!
//! let registry = LanguageRegistry::with_builtin();
//! let mut file = PartitionedFile::open_source(
//!     "main.py",
//!     &registry,
//!     ParserConfig::default(),
//!     FileConfig::default(),
//! )?;
//! let first = file.partition_for(0, 4096)?;
//! println!("{} holds {:?}", first.area, first.partition.code());
//! # Ok::<(), codeseam::engine::FileError>(())
//! ```

use super::area::Area;
use super::charset::{CharsetDetector, CharsetState, DefaultDetector};
use super::coded::TextEncoding;
use super::error::{FileError, FileResult};
use super::handle::FileHandles;
use super::language::LanguageRegistry;
use super::line_index::LineIndex;
use super::parser::{Parser, ParserConfig};
use super::partition::{Partition, PartitionFactory, PartitionParser};
use super::position::Position;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Bytes sampled from the file head for charset detection
const DETECTION_SAMPLE: usize = 8 * 1024;

/// Bytes sampled from the file head for language selection
const LANGUAGE_SAMPLE: usize = 256;

/// Default idle time before file handles close
pub const DEFAULT_IDLE_CLOSE: Duration = Duration::from_millis(50);

/// Default number of lines between line-index milestones
pub const DEFAULT_LINE_MILESTONE: usize = 1024;

/// File-layer configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileConfig {
    /// Idle time after which the OS handle is closed
    pub idle_close: Duration,

    /// Lines between line-index milestones
    pub line_milestone: usize,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            idle_close: DEFAULT_IDLE_CLOSE,
            line_milestone: DEFAULT_LINE_MILESTONE,
        }
    }
}

impl FileConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the idle-close delay
    pub fn with_idle_close(mut self, idle: Duration) -> Self {
        self.idle_close = idle;
        self
    }

    /// Set the line-index milestone distance
    pub fn with_line_milestone(mut self, lines: usize) -> Self {
        self.line_milestone = lines;
        self
    }
}

/// A partition together with the area it covers
#[derive(Debug)]
pub struct PartitionAtArea<'a, P> {
    /// Covered bytes
    pub area: Area,
    /// The partition
    pub partition: &'a mut P,
}

/// A file materialized as disjoint, lazily parsed partitions
pub struct PartitionedFile<F: PartitionFactory> {
    path: PathBuf,
    factory: F,
    handles: FileHandles,
    charset: CharsetState,
    detector: Box<dyn CharsetDetector>,
    lines: LineIndex,
    partitions: BTreeMap<Area, F::Partition>,
    config: FileConfig,
}

impl PartitionedFile<PartitionParser> {
    /// Open a source file, choosing the language from the registry
    pub fn open_source(
        path: impl Into<PathBuf>,
        registry: &LanguageRegistry,
        parser_config: ParserConfig,
        config: FileConfig,
    ) -> FileResult<Self> {
        let path = path.into();
        let handles = FileHandles::new(&path, config.idle_close)?;
        let head = handles.read_at(0, LANGUAGE_SAMPLE)?;
        let language = registry.select(&path, &head);
        let parser = Arc::new(Parser::with_config(language, parser_config));
        let factory = PartitionParser::new(parser, &path);
        Ok(Self::from_parts(path, factory, handles, config))
    }
}

impl<F: PartitionFactory> PartitionedFile<F> {
    /// Open `path` with the default configuration
    pub fn open(path: impl Into<PathBuf>, factory: F) -> FileResult<Self> {
        Self::open_with(path, factory, FileConfig::default())
    }

    /// Open `path` with an explicit configuration
    ///
    /// The file does not have to exist; a missing file reads as empty and is
    /// created by the first commit that writes to it.
    pub fn open_with(path: impl Into<PathBuf>, factory: F, config: FileConfig) -> FileResult<Self> {
        let path = path.into();
        let handles = FileHandles::new(&path, config.idle_close)?;
        Ok(Self::from_parts(path, factory, handles, config))
    }

    fn from_parts(path: PathBuf, factory: F, handles: FileHandles, config: FileConfig) -> Self {
        Self {
            path,
            factory,
            handles,
            charset: CharsetState::default(),
            detector: Box::new(DefaultDetector),
            lines: LineIndex::new(config.line_milestone),
            partitions: BTreeMap::new(),
            config,
        }
    }

    /// Replace the charset detector; only effective before the first read
    pub fn with_detector(mut self, detector: impl CharsetDetector + 'static) -> Self {
        self.detector = Box::new(detector);
        self
    }

    /// Path of the file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Configuration
    pub fn config(&self) -> FileConfig {
        self.config
    }

    /// Partition factory
    pub fn factory(&self) -> &F {
        &self.factory
    }

    /// Pinned encoding, once detection has happened
    pub fn charset(&self) -> Option<TextEncoding> {
        self.charset.pinned()
    }

    /// Current length of the file on disk
    pub fn len(&self) -> FileResult<u64> {
        Ok(self.handles.len()?)
    }

    /// Whether the file on disk is empty or missing
    pub fn is_empty(&self) -> FileResult<bool> {
        Ok(self.handles.is_empty()?)
    }

    /// Materialized partitions in file order
    pub fn partitions(&self) -> impl Iterator<Item = (Area, &F::Partition)> + '_ {
        self.partitions.iter().map(|(area, p)| (*area, p))
    }

    /// Number of materialized partitions
    pub fn partition_count(&self) -> usize {
        self.partitions.len()
    }

    /// Whether any partition has unsaved edits
    pub fn is_modified(&self) -> bool {
        self.partitions.values().any(Partition::is_modified)
    }

    /// Close the OS handle now instead of waiting for the idle timer
    pub fn close_handles(&self) {
        self.handles.close();
    }

    /// Whether the OS handle is currently open
    pub fn is_handle_open(&self) -> bool {
        self.handles.is_open()
    }

    fn encoding_for_read(&mut self) -> FileResult<TextEncoding> {
        if let Some(encoding) = self.charset.pinned() {
            return Ok(encoding);
        }
        let sample = self.handles.read_at(0, DETECTION_SAMPLE)?;
        Ok(self.charset.resolve(self.detector.as_mut(), &sample))
    }

    fn position_at(&mut self, offset: u64, encoding: TextEncoding) -> FileResult<Position> {
        let handles = &self.handles;
        Ok(self
            .lines
            .position_at(offset, encoding, |at, len| handles.read_at(at, len))?)
    }

    /// Bytes of `area` with their encoding and start position
    fn read(&mut self, area: Area) -> FileResult<(Vec<u8>, TextEncoding, Position)> {
        let encoding = self.encoding_for_read()?;
        let bytes = self.handles.read_at(area.offset, area.length as usize)?;
        let start = self.position_at(area.offset, encoding)?;
        Ok((bytes, encoding, start))
    }

    fn create(&mut self, area: Area) -> FileResult<()> {
        let (bytes, encoding, start) = self.read(area)?;
        log_debug!("materializing {} of {}", area, self.path.display());
        let partition = self.factory.create(&bytes, start, encoding);
        self.partitions.insert(area, partition);
        Ok(())
    }

    fn at_area(&mut self, area: Area) -> FileResult<PartitionAtArea<'_, F::Partition>> {
        let partition = self
            .partitions
            .get_mut(&area)
            .ok_or(FileError::NotCovered { area })?;
        Ok(PartitionAtArea { area, partition })
    }

    /// Partition covering `[offset, offset + length)`
    ///
    /// The request is clamped to the file length. Uncovered parts are read
    /// and parsed, then every partition the request overlaps or touches is
    /// combined into one. A zero-length request returns the partition at or
    /// touching `offset`, creating an empty one if there is none.
    pub fn partition_for(
        &mut self,
        offset: u64,
        length: u64,
    ) -> FileResult<PartitionAtArea<'_, F::Partition>> {
        let file_len = self.handles.len()?;
        let start = offset.min(file_len);
        let end = offset.saturating_add(length).min(file_len);
        let request = Area::from_bounds(start, end);

        if request.is_empty() {
            let existing = self
                .partitions
                .keys()
                .find(|a| a.offset <= start && start <= a.end())
                .copied();
            let area = match existing {
                Some(area) => area,
                None => {
                    let area = Area::new(start, 0);
                    self.create(area)?;
                    area
                }
            };
            return self.at_area(area);
        }

        for gap in self.gaps(request) {
            self.create(gap)?;
        }

        let members: Vec<Area> = self
            .partitions
            .keys()
            .filter(|a| a.offset <= end && start <= a.end())
            .copied()
            .collect();
        let Some((&first, rest)) = members.split_first() else {
            return Err(FileError::NotCovered { area: request });
        };
        if rest.is_empty() {
            return self.at_area(first);
        }

        // check the whole run before taking anything out of the map
        let combined = rest.iter().try_fold(first, |acc, next| acc.extend(next))?;
        log_debug!(
            "combining {} partitions into {} of {}",
            members.len(),
            combined,
            self.path.display()
        );

        let mut merged = self
            .partitions
            .remove(&first)
            .ok_or(FileError::NotCovered { area: first })?;
        for area in rest {
            let next = self
                .partitions
                .remove(area)
                .ok_or(FileError::NotCovered { area: *area })?;
            merged = self.factory.combine(merged, next);
        }
        self.partitions.insert(combined, merged);
        self.at_area(combined)
    }

    /// Parts of `request` no partition covers, split at empty partitions
    fn gaps(&self, request: Area) -> Vec<Area> {
        let mut gaps = vec![request];
        for area in self.partitions.keys() {
            if area.is_empty() {
                let at = area.offset;
                gaps = gaps
                    .into_iter()
                    .flat_map(|g| {
                        if g.offset < at && at < g.end() {
                            vec![Area::from_bounds(g.offset, at), Area::from_bounds(at, g.end())]
                        } else {
                            vec![g]
                        }
                    })
                    .collect();
            } else if area.overlaps(&request) {
                gaps = gaps.into_iter().flat_map(|g| g.cut(area)).collect();
            }
        }
        gaps
    }

    /// Write every dirty partition back to the file
    ///
    /// Partitions are processed in file order. When a partition's content
    /// changed length, the rest of the file moves with it and the areas of
    /// all later partitions shift by the same amount. Written partitions are
    /// rebuilt from the new bytes and are clean afterwards.
    ///
    /// On an I/O error the partitions already processed keep their new
    /// areas, the failing one and all later ones are keyed at their old
    /// areas shifted by the length change so far, and the error is returned.
    pub fn commit(&mut self) -> FileResult<()> {
        let encoding = self.charset.pinned().unwrap_or_else(TextEncoding::utf8);
        let mut pending = std::mem::take(&mut self.partitions).into_iter();
        let mut committed = BTreeMap::new();
        let mut delta: i64 = 0;
        let mut result = Ok(());

        for (area, mut partition) in pending.by_ref() {
            let shifted = area.shifted(delta);
            let dirty = partition.is_modified();
            match commit_partition(
                &self.handles,
                &mut self.lines,
                &mut partition,
                area,
                shifted,
                encoding,
            ) {
                Ok((written, change)) => {
                    if dirty {
                        log_debug!(
                            "committed {} of {} as {} bytes",
                            shifted,
                            self.path.display(),
                            written.length
                        );
                    }
                    delta += change;
                    committed.insert(written, partition);
                }
                Err(e) => {
                    log_error!("commit of {} failed at {}: {}", self.path.display(), shifted, e);
                    committed.insert(shifted, partition);
                    result = Err(e);
                    break;
                }
            }
        }

        committed.extend(pending.map(|(area, partition)| (area.shifted(delta), partition)));
        self.partitions = committed;
        result
    }

    /// Discard the edits of every dirty partition
    pub fn rollback(&mut self) -> FileResult<()> {
        let dirty: Vec<Area> = self
            .partitions
            .iter()
            .filter(|(_, p)| p.is_modified())
            .map(|(a, _)| *a)
            .collect();

        for area in dirty {
            let (bytes, encoding, start) = self.read(area)?;
            log_debug!("rolling back {} of {}", area, self.path.display());
            if let Some(partition) = self.partitions.get_mut(&area) {
                partition.reset_to(&bytes, start, encoding);
            }
        }
        Ok(())
    }
}

/// Bring one partition in line with the file
///
/// `shifted` is the partition's area after the length changes of earlier
/// partitions. A dirty partition is written there, moving the rest of the
/// file if its length changed; a clean one that moved is re-read. Returns
/// the area afterwards and the change in file length.
fn commit_partition<P: Partition>(
    handles: &FileHandles,
    lines: &mut LineIndex,
    partition: &mut P,
    area: Area,
    shifted: Area,
    encoding: TextEncoding,
) -> FileResult<(Area, i64)> {
    if !partition.is_modified() {
        if shifted != area {
            let bytes = handles.read_at(shifted.offset, shifted.length as usize)?;
            let start =
                lines.position_at(shifted.offset, encoding, |at, len| handles.read_at(at, len))?;
            partition.reset_to(&bytes, start, encoding);
        }
        return Ok((shifted, 0));
    }

    let content = partition.current_content();
    let change = content.len() as i64 - area.length as i64;
    if change == 0 {
        handles.write_at(shifted.offset, &content)?;
    } else {
        let tail_start = shifted.end();
        let file_len = handles.len()?;
        let tail = handles.read_at(tail_start, file_len.saturating_sub(tail_start) as usize)?;
        handles.write_at(shifted.offset, &content)?;
        let tail_at = shifted.offset + content.len() as u64;
        handles.write_at(tail_at, &tail)?;
        handles.set_len(tail_at + tail.len() as u64)?;
    }

    lines.invalidate_from(shifted.offset);
    let written = Area::new(shifted.offset, content.len() as u64);
    let bytes = handles.read_at(written.offset, written.length as usize)?;
    let start =
        lines.position_at(written.offset, encoding, |at, len| handles.read_at(at, len))?;
    partition.reset_to(&bytes, start, encoding);
    Ok((written, change))
}
