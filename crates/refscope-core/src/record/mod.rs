//! Catalog records
//!
//! Two record kinds share one capability set ([`Record`]):
//!
//! - [`ValueRecord`]: a sampled host value with change-tracking timestamps
//! - [`CommandRecord`]: an invocable host command; never sampled, so its
//!   timestamps are the [`NEVER`] sentinel
//!
//! Records live in append-only arenas inside the
//! [`RecordStore`](crate::RecordStore) and are addressed by [`ValueId`] /
//! [`CommandId`]. Ids stay valid for the store's lifetime.

use crate::traits::{CommandHandle, SampleValue, ValueHandle};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Timestamp meaning "has never changed"
pub const NEVER: DateTime<Utc> = DateTime::<Utc>::UNIX_EPOCH;

/// Where a name entered the catalog from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefSource {
    /// Listed by the host itself
    Enumerated,
    /// Typed in by an operator
    UserEntered,
    /// Read from a name-list file
    NameFile,
    /// Listed in the blacklist configuration
    Blacklist,
}

/// Record kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Value,
    Command,
}

/// Stable index of a value record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValueId(pub(crate) usize);

impl ValueId {
    /// Position in the value arena
    pub fn index(self) -> usize {
        self.0
    }
}

/// Stable index of a command record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CommandId(pub(crate) usize);

impl CommandId {
    /// Position in the command arena
    pub fn index(self) -> usize {
        self.0
    }
}

/// Capabilities shared by every record kind
pub trait Record {
    /// The registered (trimmed) name
    fn name(&self) -> &str;

    /// Last time any change was observed
    fn last_update_time(&self) -> DateTime<Utc>;

    /// Last time a big change was observed
    fn last_big_update_time(&self) -> DateTime<Utc>;

    /// Provenance of the name
    fn source(&self) -> RefSource;

    /// Which arena the record lives in
    fn kind(&self) -> RecordKind;
}

/// A sampled host value
#[derive(Debug, Clone)]
pub struct ValueRecord {
    name: String,
    handle: ValueHandle,
    source: RefSource,
    last_value: SampleValue,
    last_update_time: DateTime<Utc>,
    last_big_update_time: DateTime<Utc>,
    blacklisted: bool,
}

impl ValueRecord {
    /// Create a record from its first sample
    ///
    /// The first sample is the baseline, not a change: both timestamps
    /// start at [`NEVER`].
    pub(crate) fn new(
        name: String,
        handle: ValueHandle,
        source: RefSource,
        initial: SampleValue,
    ) -> Self {
        Self {
            name,
            handle,
            source,
            last_value: initial,
            last_update_time: NEVER,
            last_big_update_time: NEVER,
            blacklisted: false,
        }
    }

    /// Host handle used for sampling
    pub fn handle(&self) -> ValueHandle {
        self.handle
    }

    /// Most recent sample
    pub fn last_value(&self) -> &SampleValue {
        &self.last_value
    }

    /// Whether sampling is suppressed for this record
    pub fn is_blacklisted(&self) -> bool {
        self.blacklisted
    }

    pub(crate) fn set_blacklisted(&mut self, blacklisted: bool) {
        self.blacklisted = blacklisted;
    }

    /// Store a changed sample and move the timestamps forward
    ///
    /// `big` comes from the engine's change policy. Timestamps never move
    /// backward even if `now` is older than the stored value.
    pub(crate) fn record_sample(&mut self, sample: SampleValue, big: bool, now: DateTime<Utc>) {
        self.last_update_time = self.last_update_time.max(now);
        if big {
            self.last_big_update_time = self.last_big_update_time.max(now);
        }
        self.last_value = sample;
    }
}

impl Record for ValueRecord {
    fn name(&self) -> &str {
        &self.name
    }

    fn last_update_time(&self) -> DateTime<Utc> {
        self.last_update_time
    }

    fn last_big_update_time(&self) -> DateTime<Utc> {
        self.last_big_update_time
    }

    fn source(&self) -> RefSource {
        self.source
    }

    fn kind(&self) -> RecordKind {
        RecordKind::Value
    }
}

/// An invocable host command
#[derive(Debug, Clone)]
pub struct CommandRecord {
    name: String,
    handle: CommandHandle,
    source: RefSource,
}

impl CommandRecord {
    pub(crate) fn new(name: String, handle: CommandHandle, source: RefSource) -> Self {
        Self {
            name,
            handle,
            source,
        }
    }

    /// Host handle used for invocation
    pub fn handle(&self) -> CommandHandle {
        self.handle
    }
}

impl Record for CommandRecord {
    fn name(&self) -> &str {
        &self.name
    }

    fn last_update_time(&self) -> DateTime<Utc> {
        NEVER
    }

    fn last_big_update_time(&self) -> DateTime<Utc> {
        NEVER
    }

    fn source(&self) -> RefSource {
        self.source
    }

    fn kind(&self) -> RecordKind {
        RecordKind::Command
    }
}

/// Borrowed view of either record kind
///
/// Search results are returned as views so values and commands can be
/// filtered and sorted uniformly.
#[derive(Debug, Clone, Copy)]
pub enum RecordView<'a> {
    Value(&'a ValueRecord),
    Command(&'a CommandRecord),
}

impl<'a> RecordView<'a> {
    /// The value record, if this is one
    pub fn as_value(&self) -> Option<&'a ValueRecord> {
        match *self {
            RecordView::Value(record) => Some(record),
            RecordView::Command(_) => None,
        }
    }

    /// The command record, if this is one
    pub fn as_command(&self) -> Option<&'a CommandRecord> {
        match *self {
            RecordView::Value(_) => None,
            RecordView::Command(record) => Some(record),
        }
    }

    fn inner(&self) -> &'a dyn Record {
        match *self {
            RecordView::Value(record) => record,
            RecordView::Command(record) => record,
        }
    }
}

impl Record for RecordView<'_> {
    fn name(&self) -> &str {
        self.inner().name()
    }

    fn last_update_time(&self) -> DateTime<Utc> {
        self.inner().last_update_time()
    }

    fn last_big_update_time(&self) -> DateTime<Utc> {
        self.inner().last_big_update_time()
    }

    fn source(&self) -> RefSource {
        self.inner().source()
    }

    fn kind(&self) -> RecordKind {
        self.inner().kind()
    }
}
