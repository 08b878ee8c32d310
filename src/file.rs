//! # Storage Engine
//!
//! `GrainFile` owns one database file: its layout, the primary index
//! (key → slot), the optional secondary index (sort key → ordered slots)
//! and the read-write stream used for mutation. Everything lives behind a
//! single engine-wide lock, because row rewrites are multi-step
//! seek/read/write sequences that must not interleave.
//!
//! ## On-Disk Layout
//!
//! ```text
//! offset 0            format version (1 byte)
//! offset 1            column count N (1 byte)
//! offset 2            index-column number (1 byte)
//! offset 3..3+N       column type ids (1 byte each)
//! offset 3+N          reserved backup slot (row_size bytes)
//! offset 3+N+row_size row 0, then row 1, ...
//! ```
//!
//! Each row is one flag byte followed by the fixed-width column payloads
//! in schema order. The backup slot has row width but is never a logical
//! record; it stages pre-images for the recovery protocol below.
//!
//! ## Backup & Recovery Protocol
//!
//! Every in-place mutation is bracketed:
//!
//! 1. copy the pre-image of the bytes about to change into the backup
//!    slot, tagged `Backup` (full row) or `BackupObject` (column index
//!    byte + single field);
//! 2. flag the live row `Corrupt`;
//! 3. rewrite the payload bytes;
//! 4. flag the live row `Active` again.
//!
//! A crash inside the bracket leaves the row flagged `Corrupt` and the
//! backup slot holding exactly the bytes needed to restore it.
//! [`GrainFile::initialize`] replays that image before reporting success,
//! then resets the slot.
//!
//! ## Lifecycle
//!
//! `initialize` (or `create_new`) → `load` → `bind` → CRUD → `unbind`.
//! Reads of materialized state (`get_line`, `keys`, `get_sorted_lines`)
//! never touch the stream.

use std::fs::{File, OpenOptions};
use std::io::{BufReader, ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use hashbrown::HashMap;
use parking_lot::Mutex;
use smallvec::SmallVec;
use tracing::{debug, info, warn};

use crate::constants::{FORMAT_VERSION, HEADER_FIXED_SIZE, MAX_LAYOUT_SIZE};
use crate::error::{GrainError, Result};
use crate::layout::Layout;
use crate::line::{Line, LineFlag};
use crate::types::{ElementRegistry, Value};

/// Slots per sort-key bucket held inline before spilling to the heap.
type Bucket = SmallVec<[u32; 4]>;

/// Outcome of a successful [`GrainFile::load`].
///
/// Duplicate keys do not fail the scan; the first occurrence wins and the
/// condition is reported here so callers can decide what to do about it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadReport {
    /// At least two active rows shared a key; only the first is indexed.
    pub has_duplicates: bool,
    /// Rows whose flag was anything other than `Active`.
    pub empty_slots: u32,
    /// Total rows scanned, active or not.
    pub total_slots: u32,
}

/// An embedded, single-file, fixed-row-width record store.
pub struct GrainFile {
    path: PathBuf,
    registry: ElementRegistry,
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    layout: Option<Layout>,
    recommended_index: usize,
    index_column: usize,
    sort_column: Option<usize>,
    /// Slot table: sole owner of every Line; indexes refer to entries by
    /// slot number. A `None` entry is an empty or unindexed slot.
    lines: Vec<Option<Line>>,
    primary: HashMap<String, u32>,
    groups: Option<HashMap<String, Bucket>>,
    empty_slots: u32,
    loaded: bool,
    stream: Option<File>,
}

impl GrainFile {
    /// Creates a handle for the file at `path`. No I/O happens until
    /// [`initialize`](Self::initialize) or [`create_new`](Self::create_new).
    pub fn new<P: AsRef<Path>>(path: P, registry: ElementRegistry) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            registry,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Opens an existing file and parses its header, replaying any
    /// interrupted update from the backup slot first. Returns the
    /// recommended index column recorded in the header.
    pub fn initialize(&self) -> Result<usize> {
        self.inner.lock().initialize(&self.path, &self.registry)
    }

    /// Creates (or truncates) the file with the given schema and writes a
    /// fresh header. The engine is immediately loaded and empty; only
    /// [`bind`](Self::bind) is still required before mutation.
    pub fn create_new(
        &self,
        layout: Layout,
        index_column: usize,
        sort_column: Option<usize>,
    ) -> Result<()> {
        self.inner
            .lock()
            .create_new(&self.path, layout, index_column, sort_column)
    }

    /// Scans every row, building the slot table and indexes.
    pub fn load(&self, index_column: usize, sort_column: Option<usize>) -> Result<LoadReport> {
        self.inner
            .lock()
            .load(&self.path, index_column, sort_column)
    }

    /// Acquires the read-write stream used by all mutating operations.
    pub fn bind(&self) -> Result<()> {
        self.inner.lock().bind(&self.path)
    }

    /// Releases the read-write stream.
    pub fn unbind(&self) -> Result<()> {
        self.inner.lock().unbind()
    }

    /// Appends a new row. Values must match the schema exactly and the key
    /// column value must be unique.
    pub fn add_line(&self, values: &[Value]) -> Result<Line> {
        self.inner.lock().add_line(values)
    }

    /// Primary-index lookup against materialized state; never touches the
    /// stream.
    pub fn get_line(&self, key: &str) -> Option<Line> {
        self.inner.lock().get_line(key)
    }

    /// Fetches a single materialized field of the line at `key`.
    pub fn get_object(&self, key: &str, column: usize) -> Result<Value> {
        self.inner.lock().get_object(key, column)
    }

    /// Rewrites a full row in place under the backup protocol. Returns
    /// whether the key-rename sub-step succeeded; all other valid columns
    /// are updated regardless.
    pub fn update_line(&self, key: &str, values: &[Value]) -> Result<bool> {
        self.inner.lock().update_line(key, values)
    }

    /// Rewrites a single field in place under the backup protocol.
    pub fn update_object(&self, key: &str, column: usize, value: &Value) -> Result<()> {
        self.inner.lock().update_object(key, column, value)
    }

    /// Tombstones the row at `key`: `Inactive` when `allow_recycle`,
    /// `NoRecycle` otherwise. The slot is never reused for a different
    /// identity.
    pub fn remove_line(&self, key: &str, allow_recycle: bool) -> Result<()> {
        self.inner.lock().remove_line(key, allow_recycle)
    }

    /// All keys currently present in the primary index, in no particular
    /// order.
    pub fn keys(&self) -> Vec<String> {
        self.inner.lock().primary.keys().cloned().collect()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.lock().primary.contains_key(key)
    }

    /// All lines sharing `sort_key`, in insertion order, as an independent
    /// collection. Empty when the key is absent; an error only when no
    /// sort column was configured.
    pub fn get_sorted_lines(&self, sort_key: &str) -> Result<Vec<Line>> {
        self.inner.lock().get_sorted_lines(sort_key)
    }

    /// Fraction of scanned slots holding no active record.
    pub fn storage_efficiency(&self) -> f64 {
        let inner = self.inner.lock();
        if inner.lines.is_empty() {
            0.0
        } else {
            inner.empty_slots as f64 / inner.lines.len() as f64
        }
    }

    /// The index column recorded in the header, once initialized.
    pub fn recommended_index(&self) -> Option<usize> {
        let inner = self.inner.lock();
        inner.layout.as_ref().map(|_| inner.recommended_index)
    }

    pub fn layout(&self) -> Option<Layout> {
        self.inner.lock().layout.clone()
    }

    /// True once initialized and bound, i.e. ready for mutation.
    pub fn accessible(&self) -> bool {
        let inner = self.inner.lock();
        inner.layout.is_some() && inner.stream.is_some()
    }
}

impl Inner {
    fn initialize(&mut self, path: &Path, registry: &ElementRegistry) -> Result<usize> {
        let mut file = File::open(path)?;
        let file_len = file.metadata()?.len();

        if file_len == 0 {
            return Err(GrainError::EmptyFile);
        }

        let mut fixed = [0u8; HEADER_FIXED_SIZE];
        read_header(&mut file, &mut fixed, "missing fixed header bytes")?;

        let version = fixed[0];
        if version != FORMAT_VERSION {
            return Err(GrainError::VersionMismatch {
                found: version,
                expected: FORMAT_VERSION,
            });
        }

        let count = fixed[1] as usize;
        if count == 0 {
            return Err(GrainError::CorruptHeader("column count is zero"));
        }

        let index_column = fixed[2] as usize;
        if index_column >= count {
            return Err(GrainError::CorruptHeader("index column out of range"));
        }

        let mut ids = vec![0u8; count];
        read_header(&mut file, &mut ids, "truncated type id list")?;

        let layout = Layout::from_ids(&ids, registry)?;

        if file_len < layout.header_size() as u64 {
            return Err(GrainError::CorruptHeader("reserved backup slot truncated"));
        }
        if (file_len - layout.header_size() as u64) % layout.row_size() as u64 != 0 {
            return Err(GrainError::FileCorrupt);
        }

        replay_backup(&mut file, path, &layout, file_len)?;

        self.layout = Some(layout);
        self.recommended_index = index_column;
        self.lines.clear();
        self.primary.clear();
        self.groups = None;
        self.empty_slots = 0;
        self.loaded = false;
        // A stream bound before the re-initialize belongs to the old state.
        self.stream = None;

        Ok(index_column)
    }

    fn create_new(
        &mut self,
        path: &Path,
        layout: Layout,
        index_column: usize,
        sort_column: Option<usize>,
    ) -> Result<()> {
        if layout.is_empty() || layout.len() > MAX_LAYOUT_SIZE {
            return Err(GrainError::InvalidLayout);
        }
        check_index_column(&layout, index_column)?;
        if let Some(sort) = sort_column {
            check_index_column(&layout, sort)?;
        }

        let mut header = vec![0u8; layout.header_size()];
        header[0] = FORMAT_VERSION;
        header[1] = layout.len() as u8;
        header[2] = index_column as u8;
        for (i, element) in layout.elements().iter().enumerate() {
            header[HEADER_FIXED_SIZE + i] = element.id();
        }
        header[HEADER_FIXED_SIZE + layout.len()] = LineFlag::Backup.as_byte();

        let mut file = File::create(path)?;
        file.write_all(&header)?;
        file.sync_all()?;

        self.recommended_index = index_column;
        self.index_column = index_column;
        self.sort_column = sort_column;
        self.lines.clear();
        self.primary.clear();
        self.groups = sort_column.map(|_| HashMap::new());
        self.empty_slots = 0;
        self.layout = Some(layout);
        self.loaded = true;
        self.stream = None;

        Ok(())
    }

    fn load(
        &mut self,
        path: &Path,
        index_column: usize,
        sort_column: Option<usize>,
    ) -> Result<LoadReport> {
        let layout = self.layout.as_ref().ok_or(GrainError::NotInitialized)?;

        check_index_column(layout, index_column)?;
        if let Some(sort) = sort_column {
            check_index_column(layout, sort)?;
        }

        let row_size = layout.row_size();
        let elements = layout.elements().to_vec();

        let mut reader = BufReader::new(File::open(path)?);
        reader.seek(SeekFrom::Start(layout.header_size() as u64))?;

        let mut lines: Vec<Option<Line>> = Vec::new();
        let mut primary: HashMap<String, u32> = HashMap::new();
        let mut groups: Option<HashMap<String, Bucket>> = sort_column.map(|_| HashMap::new());
        let mut empty_slots = 0u32;
        let mut has_duplicates = false;

        loop {
            let mut flag = [0u8; 1];
            match reader.read_exact(&mut flag) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e.into()),
            }

            let slot = lines.len() as u32;

            if flag[0] != LineFlag::Active.as_byte() {
                reader.seek_relative((row_size - 1) as i64)?;
                empty_slots += 1;
                lines.push(None);
                continue;
            }

            let mut content = Vec::with_capacity(elements.len());
            for element in &elements {
                content.push(element.parse(&mut reader)?);
            }

            let key = content[index_column]
                .as_str()
                .unwrap_or_default()
                .to_string();

            if primary.contains_key(&key) {
                warn!(slot, key = %key, "duplicate key skipped during scan");
                has_duplicates = true;
                lines.push(None);
                continue;
            }

            let sort_key = sort_column.map(|c| content[c].as_str().unwrap_or_default().to_string());

            if let (Some(groups), Some(sort_key)) = (groups.as_mut(), sort_key.as_ref()) {
                groups.entry(sort_key.clone()).or_default().push(slot);
            }

            primary.insert(key.clone(), slot);
            lines.push(Some(Line::new(
                key,
                sort_key,
                slot,
                LineFlag::Active,
                content,
            )));
        }

        let total_slots = lines.len() as u32;
        debug!(total_slots, empty_slots, has_duplicates, "scan complete");

        self.index_column = index_column;
        self.sort_column = sort_column;
        self.lines = lines;
        self.primary = primary;
        self.groups = groups;
        self.empty_slots = empty_slots;
        self.loaded = true;

        Ok(LoadReport {
            has_duplicates,
            empty_slots,
            total_slots,
        })
    }

    fn bind(&mut self, path: &Path) -> Result<()> {
        if self.layout.is_none() {
            return Err(GrainError::NotInitialized);
        }
        if self.stream.is_some() {
            return Err(GrainError::AlreadyBound);
        }

        self.stream = Some(OpenOptions::new().read(true).write(true).open(path)?);
        Ok(())
    }

    fn unbind(&mut self) -> Result<()> {
        match self.stream.take() {
            Some(stream) => {
                stream.sync_all()?;
                Ok(())
            }
            None => Err(GrainError::NotBound),
        }
    }

    fn add_line(&mut self, values: &[Value]) -> Result<Line> {
        let layout = self.layout.as_ref().ok_or(GrainError::NotInitialized)?;
        if !self.loaded {
            return Err(GrainError::NotLoaded);
        }
        let stream = self.stream.as_mut().ok_or(GrainError::NotBound)?;

        if values.len() != layout.len() {
            return Err(GrainError::SchemaMismatch {
                expected: layout.len(),
                got: values.len(),
            });
        }
        for (column, (element, value)) in layout.elements().iter().zip(values).enumerate() {
            if !element.is_valid(value) {
                return Err(GrainError::InvalidValue { column });
            }
        }

        let key = values[self.index_column]
            .as_str()
            .ok_or(GrainError::InvalidValue {
                column: self.index_column,
            })?
            .to_string();
        if self.primary.contains_key(&key) {
            return Err(GrainError::DuplicateKey(key));
        }

        let slot = self.lines.len() as u32;
        let offset = row_offset(layout, slot);

        // Stage the full row flagged Incomplete, then commit it by
        // flipping the flag: a crash in between leaves a skippable slot.
        let mut data = vec![0u8; layout.row_size()];
        data[0] = LineFlag::Incomplete.as_byte();
        for (i, (element, value)) in layout.elements().iter().zip(values).enumerate() {
            let start = 1 + layout.offset(i);
            element.encode(value, &mut data[start..start + element.size()]);
        }

        stream.seek(SeekFrom::Start(offset))?;
        stream.write_all(&data)?;
        stream.seek(SeekFrom::Start(offset))?;
        stream.write_all(&[LineFlag::Active.as_byte()])?;
        stream.flush()?;

        let sort_key = self
            .sort_column
            .map(|c| values[c].as_str().unwrap_or_default().to_string());

        let line = Line::new(
            key.clone(),
            sort_key.clone(),
            slot,
            LineFlag::Active,
            values.to_vec(),
        );

        self.primary.insert(key, slot);
        if let (Some(groups), Some(sort_key)) = (self.groups.as_mut(), sort_key) {
            groups.entry(sort_key).or_default().push(slot);
        }
        self.lines.push(Some(line.clone()));

        Ok(line)
    }

    fn get_line(&self, key: &str) -> Option<Line> {
        let slot = *self.primary.get(key)?;
        self.lines[slot as usize].clone()
    }

    fn get_object(&self, key: &str, column: usize) -> Result<Value> {
        let layout = self.layout.as_ref().ok_or(GrainError::NotInitialized)?;
        if column >= layout.len() {
            return Err(GrainError::InvalidColumn(column));
        }

        let slot = *self
            .primary
            .get(key)
            .ok_or_else(|| GrainError::UnknownKey(key.to_string()))?;

        match &self.lines[slot as usize] {
            Some(line) => Ok(line.content()[column].clone()),
            None => Err(GrainError::UnknownKey(key.to_string())),
        }
    }

    fn update_line(&mut self, key: &str, values: &[Value]) -> Result<bool> {
        let layout = self.layout.as_ref().ok_or(GrainError::NotInitialized)?;
        if !self.loaded {
            return Err(GrainError::NotLoaded);
        }
        let stream = self.stream.as_mut().ok_or(GrainError::NotBound)?;

        if values.len() != layout.len() {
            return Err(GrainError::SchemaMismatch {
                expected: layout.len(),
                got: values.len(),
            });
        }

        let slot = *self
            .primary
            .get(key)
            .ok_or_else(|| GrainError::UnknownKey(key.to_string()))?;
        let offset = row_offset(layout, slot);

        // (1) full-row pre-image into the backup slot.
        let mut payload = vec![0u8; layout.row_size() - 1];
        stream.seek(SeekFrom::Start(offset + 1))?;
        stream.read_exact(&mut payload)?;
        stream.seek(SeekFrom::Start(backup_offset(layout)))?;
        stream.write_all(&[LineFlag::Backup.as_byte()])?;
        stream.write_all(&payload)?;
        stream.flush()?;

        // (2) mark the live row Corrupt for the duration of the rewrite.
        write_flag(stream, offset, LineFlag::Corrupt)?;

        let mut key_update_failed = false;
        let mut new_key: Option<String> = None;
        let mut written: Vec<usize> = Vec::with_capacity(values.len());

        stream.seek(SeekFrom::Start(offset + 1))?;
        for (i, (element, value)) in layout.elements().iter().zip(values).enumerate() {
            if !element.is_valid(value) {
                stream.seek(SeekFrom::Current(element.size() as i64))?;
                continue;
            }

            if i == self.index_column {
                let candidate = value.as_str().unwrap_or_default();
                if candidate != key && self.primary.contains_key(candidate) {
                    key_update_failed = true;
                    stream.seek(SeekFrom::Current(element.size() as i64))?;
                    continue;
                }
                element.write(value, stream)?;
                if candidate != key {
                    new_key = Some(candidate.to_string());
                }
            } else {
                element.write(value, stream)?;
            }

            written.push(i);
        }

        // (4) the rewrite is complete; the row is consistent again.
        write_flag(stream, offset, LineFlag::Active)?;
        stream.flush()?;

        if let Some(new_key) = &new_key {
            self.primary.remove(key);
            self.primary.insert(new_key.clone(), slot);
        }

        let sort_column = self.sort_column;
        if let Some(line) = self.lines[slot as usize].as_mut() {
            for &i in &written {
                line.set_value(i, values[i].clone());
            }
            if let Some(new_key) = new_key {
                line.set_key(new_key);
            }

            if let Some(sort) = sort_column {
                if written.contains(&sort) {
                    let new_sort = values[sort].as_str().unwrap_or_default().to_string();
                    if line.sort_key() != Some(new_sort.as_str()) {
                        let old_sort = line.sort_key().map(str::to_string);
                        line.set_sort_key(Some(new_sort.clone()));
                        rebucket(self.groups.as_mut(), slot, old_sort.as_deref(), &new_sort);
                    }
                }
            }
        }

        Ok(!key_update_failed)
    }

    fn update_object(&mut self, key: &str, column: usize, value: &Value) -> Result<()> {
        let layout = self.layout.as_ref().ok_or(GrainError::NotInitialized)?;
        if !self.loaded {
            return Err(GrainError::NotLoaded);
        }
        let stream = self.stream.as_mut().ok_or(GrainError::NotBound)?;

        if column >= layout.len() {
            return Err(GrainError::InvalidColumn(column));
        }
        let element = layout.elements()[column];
        if !element.is_valid(value) {
            return Err(GrainError::InvalidValue { column });
        }

        let slot = *self
            .primary
            .get(key)
            .ok_or_else(|| GrainError::UnknownKey(key.to_string()))?;

        // A key rename through the single-field path must fail before any
        // bytes change, so the operation stays a no-op on collision.
        let mut new_key: Option<String> = None;
        if column == self.index_column {
            let candidate = value.as_str().unwrap_or_default();
            if candidate != key {
                if self.primary.contains_key(candidate) {
                    return Err(GrainError::DuplicateKey(candidate.to_string()));
                }
                new_key = Some(candidate.to_string());
            }
        }

        let offset = row_offset(layout, slot);
        let field_offset = offset + 1 + layout.offset(column) as u64;

        // (1) single-field pre-image. The column marker byte plus the
        // field must fit in the slot's payload area; a single-column
        // layout cannot spare that byte, so it falls back to a full-row
        // image, which for one column is the same bytes.
        let mut field = vec![0u8; element.size()];
        stream.seek(SeekFrom::Start(field_offset))?;
        stream.read_exact(&mut field)?;

        stream.seek(SeekFrom::Start(backup_offset(layout)))?;
        if 1 + element.size() <= layout.row_size() - 1 {
            stream.write_all(&[LineFlag::BackupObject.as_byte(), column as u8])?;
        } else {
            stream.write_all(&[LineFlag::Backup.as_byte()])?;
        }
        stream.write_all(&field)?;
        stream.flush()?;

        // (2) corrupt-bracket the rewrite exactly as for full rows.
        write_flag(stream, offset, LineFlag::Corrupt)?;

        stream.seek(SeekFrom::Start(field_offset))?;
        element.write(value, stream)?;

        write_flag(stream, offset, LineFlag::Active)?;
        stream.flush()?;

        if let Some(new_key) = &new_key {
            self.primary.remove(key);
            self.primary.insert(new_key.clone(), slot);
        }

        let sort_column = self.sort_column;
        if let Some(line) = self.lines[slot as usize].as_mut() {
            line.set_value(column, value.clone());
            if let Some(new_key) = new_key {
                line.set_key(new_key);
            }

            if sort_column == Some(column) {
                let new_sort = value.as_str().unwrap_or_default().to_string();
                if line.sort_key() != Some(new_sort.as_str()) {
                    let old_sort = line.sort_key().map(str::to_string);
                    line.set_sort_key(Some(new_sort.clone()));
                    rebucket(self.groups.as_mut(), slot, old_sort.as_deref(), &new_sort);
                }
            }
        }

        Ok(())
    }

    fn remove_line(&mut self, key: &str, allow_recycle: bool) -> Result<()> {
        let layout = self.layout.as_ref().ok_or(GrainError::NotInitialized)?;
        if !self.loaded {
            return Err(GrainError::NotLoaded);
        }
        let stream = self.stream.as_mut().ok_or(GrainError::NotBound)?;

        let slot = *self
            .primary
            .get(key)
            .ok_or_else(|| GrainError::UnknownKey(key.to_string()))?;

        let flag = if allow_recycle {
            LineFlag::Inactive
        } else {
            LineFlag::NoRecycle
        };

        write_flag(stream, row_offset(layout, slot), flag)?;
        stream.flush()?;

        self.primary.remove(key);

        if let Some(line) = self.lines[slot as usize].as_mut() {
            line.set_flag(flag);

            if let (Some(groups), Some(sort_key)) = (self.groups.as_mut(), line.sort_key()) {
                if let Some(bucket) = groups.get_mut(sort_key) {
                    bucket.retain(|s| *s != slot);
                }
            }
        }

        self.empty_slots += 1;
        Ok(())
    }

    fn get_sorted_lines(&self, sort_key: &str) -> Result<Vec<Line>> {
        let groups = self.groups.as_ref().ok_or(GrainError::NotSorted)?;

        let lines = groups
            .get(sort_key)
            .map(|bucket| {
                bucket
                    .iter()
                    .filter_map(|&slot| self.lines[slot as usize].clone())
                    .collect()
            })
            .unwrap_or_default();

        Ok(lines)
    }
}

/// Moves `slot` from its old sort-key bucket to the new one. The old
/// bucket entry is removed so bucket membership always mirrors the lines'
/// current sort keys.
fn rebucket(
    groups: Option<&mut HashMap<String, Bucket>>,
    slot: u32,
    old_sort: Option<&str>,
    new_sort: &str,
) {
    let Some(groups) = groups else {
        return;
    };

    if let Some(old_sort) = old_sort {
        if let Some(bucket) = groups.get_mut(old_sort) {
            bucket.retain(|s| *s != slot);
        }
    }

    groups.entry(new_sort.to_string()).or_default().push(slot);
}

/// Scans for a row left `Corrupt` by an interrupted update and restores it
/// from the backup slot, then resets the slot to its created state.
fn replay_backup(file: &mut File, path: &Path, layout: &Layout, file_len: u64) -> Result<()> {
    let row_size = layout.row_size();

    let mut slot_image = vec![0u8; row_size];
    file.seek(SeekFrom::Start(backup_offset(layout)))?;
    file.read_exact(&mut slot_image)?;

    let tag = match LineFlag::from_byte(slot_image[0]) {
        Some(tag @ (LineFlag::Backup | LineFlag::BackupObject)) => tag,
        _ => return Ok(()),
    };

    let total_rows = (file_len - layout.header_size() as u64) / row_size as u64;
    let mut corrupt_slot = None;

    for slot in 0..total_rows {
        file.seek(SeekFrom::Start(row_offset(layout, slot as u32)))?;
        let mut flag = [0u8; 1];
        file.read_exact(&mut flag)?;
        if flag[0] == LineFlag::Corrupt.as_byte() {
            corrupt_slot = Some(slot as u32);
            break;
        }
    }

    let Some(slot) = corrupt_slot else {
        return Ok(());
    };

    let mut writer = OpenOptions::new().read(true).write(true).open(path)?;
    let offset = row_offset(layout, slot);

    match tag {
        LineFlag::Backup => {
            writer.seek(SeekFrom::Start(offset + 1))?;
            writer.write_all(&slot_image[1..])?;
        }
        _ => {
            let column = slot_image[1] as usize;
            if column >= layout.len() {
                warn!(slot, column, "backup slot names an unknown column; row left corrupt");
                return Ok(());
            }
            let element = layout.elements()[column];
            if 2 + element.size() > slot_image.len() {
                warn!(slot, column, "backup slot image too short for its column; row left corrupt");
                return Ok(());
            }
            writer.seek(SeekFrom::Start(offset + 1 + layout.offset(column) as u64))?;
            writer.write_all(&slot_image[2..2 + element.size()])?;
        }
    }

    write_flag(&mut writer, offset, LineFlag::Active)?;

    // Reset the slot to the same state create_new leaves it in.
    let mut fresh = vec![0u8; row_size];
    fresh[0] = LineFlag::Backup.as_byte();
    writer.seek(SeekFrom::Start(backup_offset(layout)))?;
    writer.write_all(&fresh)?;
    writer.sync_all()?;

    info!(slot, "restored interrupted update from backup slot");
    Ok(())
}

fn check_index_column(layout: &Layout, column: usize) -> Result<()> {
    if column >= layout.len() {
        return Err(GrainError::InvalidColumn(column));
    }
    if !layout.elements()[column].is_string() {
        return Err(GrainError::NotIndexable(column));
    }
    Ok(())
}

fn row_offset(layout: &Layout, slot: u32) -> u64 {
    layout.header_size() as u64 + slot as u64 * layout.row_size() as u64
}

fn backup_offset(layout: &Layout) -> u64 {
    (layout.header_size() - layout.row_size()) as u64
}

fn write_flag(stream: &mut File, offset: u64, flag: LineFlag) -> Result<()> {
    stream.seek(SeekFrom::Start(offset))?;
    stream.write_all(&[flag.as_byte()])?;
    stream.flush()?;
    Ok(())
}

fn read_header(file: &mut File, buf: &mut [u8], what: &'static str) -> Result<()> {
    file.read_exact(buf).map_err(|e| match e.kind() {
        ErrorKind::UnexpectedEof => GrainError::CorruptHeader(what),
        _ => GrainError::Io(e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ElementType;
    use tempfile::tempdir;

    fn scores_layout() -> Layout {
        Layout::new(&[ElementType::String8, ElementType::Int, ElementType::Bool])
    }

    #[test]
    fn initialize_rejects_an_empty_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.gdb");
        File::create(&path).unwrap();

        let db = GrainFile::new(&path, ElementRegistry::standard());
        assert!(matches!(db.initialize(), Err(GrainError::EmptyFile)));
    }

    #[test]
    fn initialize_rejects_a_version_mismatch() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("versioned.gdb");

        let db = GrainFile::new(&path, ElementRegistry::standard());
        db.create_new(scores_layout(), 0, None).unwrap();

        let mut bytes = std::fs::read(&path).unwrap();
        bytes[0] = 9;
        std::fs::write(&path, bytes).unwrap();

        assert!(matches!(
            db.initialize(),
            Err(GrainError::VersionMismatch {
                found: 9,
                expected: FORMAT_VERSION
            })
        ));
    }

    #[test]
    fn initialize_rejects_unknown_type_ids() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("badid.gdb");

        let db = GrainFile::new(&path, ElementRegistry::standard());
        db.create_new(scores_layout(), 0, None).unwrap();

        let mut bytes = std::fs::read(&path).unwrap();
        bytes[4] = 250; // second column's type id
        std::fs::write(&path, bytes).unwrap();

        assert!(matches!(
            db.initialize(),
            Err(GrainError::UnknownTypeId(250))
        ));
    }

    #[test]
    fn initialize_rejects_misaligned_row_data() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("torn.gdb");

        let db = GrainFile::new(&path, ElementRegistry::standard());
        db.create_new(scores_layout(), 0, None).unwrap();

        let mut bytes = std::fs::read(&path).unwrap();
        bytes.extend_from_slice(&[0u8; 5]); // not a whole row
        std::fs::write(&path, bytes).unwrap();

        assert!(matches!(db.initialize(), Err(GrainError::FileCorrupt)));
    }

    #[test]
    fn create_new_rejects_bad_schemas() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.gdb");
        let db = GrainFile::new(&path, ElementRegistry::standard());

        assert!(matches!(
            db.create_new(Layout::new(&[]), 0, None),
            Err(GrainError::InvalidLayout)
        ));
        assert!(matches!(
            db.create_new(scores_layout(), 7, None),
            Err(GrainError::InvalidColumn(7))
        ));
        assert!(matches!(
            db.create_new(scores_layout(), 1, None),
            Err(GrainError::NotIndexable(1))
        ));
    }

    #[test]
    fn load_requires_initialize_and_a_string_index() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("order.gdb");
        let db = GrainFile::new(&path, ElementRegistry::standard());

        assert!(matches!(db.load(0, None), Err(GrainError::NotInitialized)));

        db.create_new(scores_layout(), 0, None).unwrap();
        assert!(matches!(db.load(1, None), Err(GrainError::NotIndexable(1))));
        assert!(matches!(
            db.load(0, Some(2)),
            Err(GrainError::NotIndexable(2))
        ));
    }

    #[test]
    fn bind_and_unbind_are_guarded() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bind.gdb");
        let db = GrainFile::new(&path, ElementRegistry::standard());

        assert!(matches!(db.bind(), Err(GrainError::NotInitialized)));
        assert!(matches!(db.unbind(), Err(GrainError::NotBound)));

        db.create_new(scores_layout(), 0, None).unwrap();
        db.bind().unwrap();
        assert!(matches!(db.bind(), Err(GrainError::AlreadyBound)));
        db.unbind().unwrap();
        assert!(matches!(db.unbind(), Err(GrainError::NotBound)));
    }

    #[test]
    fn add_line_validates_before_touching_the_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("validate.gdb");
        let db = GrainFile::new(&path, ElementRegistry::standard());
        db.create_new(scores_layout(), 0, None).unwrap();
        db.bind().unwrap();

        let len_before = std::fs::metadata(&path).unwrap().len();

        assert!(matches!(
            db.add_line(&[Value::String("a".into()), Value::Int(1)]),
            Err(GrainError::SchemaMismatch {
                expected: 3,
                got: 2
            })
        ));
        assert!(matches!(
            db.add_line(&[
                Value::String("way too long for String8".into()),
                Value::Int(1),
                Value::Bool(true),
            ]),
            Err(GrainError::InvalidValue { column: 0 })
        ));
        assert!(matches!(
            db.add_line(&[Value::String("a".into()), Value::Long(1), Value::Bool(true)]),
            Err(GrainError::InvalidValue { column: 1 })
        ));

        assert_eq!(std::fs::metadata(&path).unwrap().len(), len_before);
    }
}
