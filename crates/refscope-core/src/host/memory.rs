// # Memory Host
//
// In-memory implementation of NameResolver.
//
// ## Purpose
//
// Stands in for a live simulator: a table of named values and commands that
// can be edited while the catalog is running. Used by tests, by the
// `refscoped` binary (loaded from a JSON fixture), and by embedders that want
// to drive the catalog without a real host.
//
// ## Fixture Format
//
// ```json
// {
//   "values": {
//     "sim/cockpit/electrical/battery_on": { "type": "int", "value": 1 },
//     "sim/flightmodel/position/latitude": { "type": "float", "value": 47.46 }
//   },
//   "commands": ["sim/operation/pause_toggle"]
// }
// ```

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};

use crate::Error;
use crate::traits::{CommandHandle, NameResolver, SampleValue, ValueHandle};

/// Serializable host description
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HostFixture {
    /// Named values with their current sample
    #[serde(default)]
    pub values: BTreeMap<String, SampleValue>,

    /// Named commands
    #[serde(default)]
    pub commands: Vec<String>,
}

#[derive(Debug, Default)]
struct HostTable {
    value_handles: HashMap<String, ValueHandle>,
    value_names: Vec<String>,
    samples: Vec<SampleValue>,
    command_handles: HashMap<String, CommandHandle>,
    command_names: Vec<String>,
    invocations: Vec<u64>,
}

/// In-memory host implementation
///
/// Cloning shares the underlying table, so a test can keep one clone to edit
/// values while the catalog owns another.
///
/// # Example
///
/// ```rust
/// use refscope_core::host::MemoryHost;
/// use refscope_core::traits::{NameResolver, SampleValue};
///
/// let host = MemoryHost::new();
/// host.add_value("sim/time/paused", SampleValue::Int(0));
///
/// let handle = host.resolve_value("sim/time/paused").unwrap();
/// assert_eq!(host.read(handle), SampleValue::Int(0));
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryHost {
    inner: Arc<RwLock<HostTable>>,
    reads: Arc<AtomicU64>,
}

impl MemoryHost {
    /// Create an empty host
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a host from a fixture
    pub fn from_fixture(fixture: HostFixture) -> Self {
        let host = Self::new();
        for (name, value) in fixture.values {
            host.add_value(name, value);
        }
        for name in fixture.commands {
            host.add_command(name);
        }
        host
    }

    /// Load a JSON fixture file
    pub fn load_fixture<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("Failed to read host fixture {}: {}", path.display(), e))
        })?;
        let fixture: HostFixture = serde_json::from_str(&content)?;

        tracing::debug!(
            "Loaded host fixture {}: {} values, {} commands",
            path.display(),
            fixture.values.len(),
            fixture.commands.len()
        );
        Ok(Self::from_fixture(fixture))
    }

    /// Register a value (or replace the sample of an existing one)
    pub fn add_value(&self, name: impl Into<String>, value: SampleValue) -> ValueHandle {
        let name = name.into();
        let mut table = self.write();

        if let Some(&handle) = table.value_handles.get(&name) {
            table.samples[handle.0 as usize] = value;
            return handle;
        }

        let handle = ValueHandle(table.samples.len() as u64);
        table.samples.push(value);
        table.value_names.push(name.clone());
        table.value_handles.insert(name, handle);
        handle
    }

    /// Register a command
    pub fn add_command(&self, name: impl Into<String>) -> CommandHandle {
        let name = name.into();
        let mut table = self.write();

        if let Some(&handle) = table.command_handles.get(&name) {
            return handle;
        }

        let handle = CommandHandle(table.invocations.len() as u64);
        table.invocations.push(0);
        table.command_names.push(name.clone());
        table.command_handles.insert(name, handle);
        handle
    }

    /// Change the current sample of a registered value
    pub fn set_value(&self, name: &str, value: SampleValue) -> Result<(), Error> {
        let mut table = self.write();
        let handle = *table
            .value_handles
            .get(name)
            .ok_or_else(|| Error::not_found(name))?;
        table.samples[handle.0 as usize] = value;
        Ok(())
    }

    /// Number of times the named command was invoked
    pub fn invocation_count(&self, name: &str) -> u64 {
        let table = self.read_table();
        table
            .command_handles
            .get(name)
            .and_then(|handle| table.invocations.get(handle.0 as usize))
            .copied()
            .unwrap_or(0)
    }

    /// Total number of `read()` calls served
    pub fn read_count(&self) -> u64 {
        self.reads.load(Ordering::SeqCst)
    }

    fn read_table(&self) -> RwLockReadGuard<'_, HostTable> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HostTable> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl NameResolver for MemoryHost {
    fn resolve_value(&self, name: &str) -> Option<ValueHandle> {
        self.read_table().value_handles.get(name).copied()
    }

    fn resolve_command(&self, name: &str) -> Option<CommandHandle> {
        self.read_table().command_handles.get(name).copied()
    }

    fn read(&self, handle: ValueHandle) -> SampleValue {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.read_table()
            .samples
            .get(handle.0 as usize)
            .cloned()
            .unwrap_or(SampleValue::Unavailable)
    }

    fn invoke(&self, handle: CommandHandle) -> Result<(), Error> {
        let mut table = self.write();
        match table.invocations.get_mut(handle.0 as usize) {
            Some(count) => {
                *count += 1;
                Ok(())
            }
            None => Err(Error::resolver(format!("Unknown command handle {}", handle.0))),
        }
    }

    fn enumerate(&self) -> Vec<String> {
        let table = self.read_table();
        table
            .value_names
            .iter()
            .chain(table.command_names.iter())
            .cloned()
            .collect()
    }
}
