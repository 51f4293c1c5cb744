//! Append-only record store
//!
//! The store owns every record, deduplicates by name, and keeps a
//! name → id index for O(1) existence checks.
//!
//! ## Layout
//!
//! ```text
//!  index: HashMap<String, NameEntry>
//!           │ value: Option<ValueId> ───────► values:   [ValueRecord; N]
//!           │ command: Option<CommandId> ───► commands: [CommandRecord; M]
//! ```
//!
//! Records are only ever appended, so ids handed out by the store stay valid
//! for its whole lifetime.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::export::{self, ExportPaths};
use crate::record::{CommandId, CommandRecord, Record, RefSource, ValueId, ValueRecord};
use crate::traits::NameResolver;

/// Records registered under one name
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NameEntry {
    /// The value record, if the name resolved as a value
    pub value: Option<ValueId>,
    /// The command record, if the name resolved as a command
    pub command: Option<CommandId>,
}

/// Outcome counters of one ingestion batch (for logging)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct BatchStats {
    registered: usize,
    duplicates: usize,
    unresolved: usize,
}

/// Owner of all catalog records
pub struct RecordStore {
    resolver: Box<dyn NameResolver>,
    values: Vec<ValueRecord>,
    commands: Vec<CommandRecord>,
    index: HashMap<String, NameEntry>,
    blacklist: HashSet<String>,
    export_paths: Option<ExportPaths>,
    last_export_ok: Option<bool>,
}

impl RecordStore {
    /// Create an empty store around a host resolver
    pub fn new(resolver: Box<dyn NameResolver>) -> Self {
        Self {
            resolver,
            values: Vec::new(),
            commands: Vec::new(),
            index: HashMap::new(),
            blacklist: HashSet::new(),
            export_paths: None,
            last_export_ok: None,
        }
    }

    /// Names whose value records are created blacklisted
    pub fn with_blacklist<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.blacklist = names
            .into_iter()
            .map(|name| name.as_ref().trim().to_string())
            .filter(|name| !name.is_empty())
            .collect();
        self
    }

    /// Snapshot every ingestion batch to `paths`
    pub fn with_export(mut self, paths: ExportPaths) -> Self {
        self.export_paths = Some(paths);
        self
    }

    /// Register a batch of names
    ///
    /// Each name is trimmed. Names already in the index are skipped; the
    /// others are resolved as a value and as a command independently, and a
    /// record is appended for each kind that resolves. Names resolving to
    /// neither are dropped.
    ///
    /// When export is configured, the full name snapshot is written after
    /// the batch; a failed write is logged and does not undo the batch.
    ///
    /// # Returns
    ///
    /// The number of names newly registered by this call.
    pub fn ingest<I, S>(&mut self, names: I, source: RefSource) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut stats = BatchStats::default();

        for raw in names {
            let name = raw.as_ref().trim();
            if name.is_empty() {
                continue;
            }

            if self.index.contains_key(name) {
                stats.duplicates += 1;
                continue;
            }

            if self.register(name, source) {
                stats.registered += 1;
            } else {
                stats.unresolved += 1;
            }
        }

        debug!(
            "Ingested {} names from {:?} ({} duplicates, {} unresolved)",
            stats.registered, source, stats.duplicates, stats.unresolved
        );

        if self.export_paths.is_some() {
            self.export_snapshot();
        }

        stats.registered
    }

    /// Register every name listed in a text file
    ///
    /// The first whitespace-delimited token of each line is the name; blank
    /// lines and lines starting with `#` are ignored.
    pub fn ingest_file<P: AsRef<Path>>(&mut self, path: P, source: RefSource) -> Result<usize> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;

        let names: Vec<&str> = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .filter_map(|line| line.split_whitespace().next())
            .collect();

        info!("Loading {} names from {}", names.len(), path.display());
        Ok(self.ingest(names, source))
    }

    fn register(&mut self, name: &str, source: RefSource) -> bool {
        let value_handle = self.resolver.resolve_value(name);
        let command_handle = self.resolver.resolve_command(name);

        if value_handle.is_none() && command_handle.is_none() {
            return false;
        }

        let mut entry = NameEntry::default();

        if let Some(handle) = value_handle {
            let initial = self.resolver.read(handle);
            let mut record = ValueRecord::new(name.to_string(), handle, source, initial);
            if self.blacklist.contains(name) {
                record.set_blacklisted(true);
            }
            entry.value = Some(ValueId(self.values.len()));
            self.values.push(record);
        }

        if let Some(handle) = command_handle {
            entry.command = Some(CommandId(self.commands.len()));
            self.commands
                .push(CommandRecord::new(name.to_string(), handle, source));
        }

        self.index.insert(name.to_string(), entry);
        true
    }

    /// Write the current name snapshot to the configured export paths
    ///
    /// # Returns
    ///
    /// - `Some(true)`: both files written
    /// - `Some(false)`: a write failed (already logged)
    /// - `None`: export is not configured
    pub fn export_snapshot(&mut self) -> Option<bool> {
        let paths = self.export_paths.as_ref()?;

        let mut value_names: Vec<&str> = self.values.iter().map(|r| r.name()).collect();
        let mut command_names: Vec<&str> = self.commands.iter().map(|r| r.name()).collect();

        let ok = export::export_to(&mut value_names, &mut command_names, paths);
        if !ok {
            warn!("Name snapshot export incomplete; catalog contents are unaffected");
        }

        self.last_export_ok = Some(ok);
        Some(ok)
    }

    /// Result of the most recent snapshot export (`None` before the first)
    pub fn last_export_ok(&self) -> Option<bool> {
        self.last_export_ok
    }

    /// Look up the records registered under `name`
    pub fn lookup(&self, name: &str) -> Option<NameEntry> {
        self.index.get(name.trim()).copied()
    }

    /// Check whether `name` is registered (as either kind)
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name.trim())
    }

    /// Value record by id
    pub fn value(&self, id: ValueId) -> Option<&ValueRecord> {
        self.values.get(id.0)
    }

    /// Command record by id
    pub fn command(&self, id: CommandId) -> Option<&CommandRecord> {
        self.commands.get(id.0)
    }

    /// Value record registered under `name`
    pub fn value_by_name(&self, name: &str) -> Option<&ValueRecord> {
        self.lookup(name)?.value.and_then(|id| self.value(id))
    }

    /// Command record registered under `name`
    pub fn command_by_name(&self, name: &str) -> Option<&CommandRecord> {
        self.lookup(name)?.command.and_then(|id| self.command(id))
    }

    /// All value records, in registration order
    pub fn values(&self) -> &[ValueRecord] {
        &self.values
    }

    /// All command records, in registration order
    pub fn commands(&self) -> &[CommandRecord] {
        &self.commands
    }

    /// Total number of records (a dual-kind name counts twice)
    pub fn len(&self) -> usize {
        self.values.len() + self.commands.len()
    }

    /// Check if the store holds no records
    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.commands.is_empty()
    }

    /// Number of distinct registered names
    pub fn name_count(&self) -> usize {
        self.index.len()
    }

    /// Enable or disable sampling for the value registered under `name`
    pub fn set_blacklisted(&mut self, name: &str, blacklisted: bool) -> Result<()> {
        let id = self
            .lookup(name)
            .and_then(|entry| entry.value)
            .ok_or_else(|| Error::not_found(format!("no value named {}", name.trim())))?;

        self.values[id.0].set_blacklisted(blacklisted);
        debug!("Value {} blacklisted: {}", name.trim(), blacklisted);
        Ok(())
    }

    /// Invoke the command registered under `name`
    pub fn invoke(&self, name: &str) -> Result<()> {
        let record = self
            .command_by_name(name)
            .ok_or_else(|| Error::not_found(format!("no command named {}", name.trim())))?;

        self.resolver.invoke(record.handle())
    }

    /// The injected host resolver
    pub fn resolver(&self) -> &dyn NameResolver {
        self.resolver.as_ref()
    }

    /// Host handle and the value arena, borrowed together for sampling
    pub(crate) fn sampling_parts(&mut self) -> (&dyn NameResolver, &mut [ValueRecord]) {
        (self.resolver.as_ref(), &mut self.values)
    }
}

impl std::fmt::Debug for RecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordStore")
            .field("values", &self.values.len())
            .field("commands", &self.commands.len())
            .field("export_paths", &self.export_paths)
            .finish_non_exhaustive()
    }
}
