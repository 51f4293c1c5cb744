// # Name Resolver Trait
//
// Defines the boundary to the host process that owns the named values and
// commands.
//
// ## Implementations
//
// - In-memory: `host::MemoryHost` (tests, fixtures, the `refscoped` binary)
// - Embedders bind their simulator's lookup/read/invoke API behind this trait
//
// ## Usage
//
// ```rust,ignore
// use refscope_core::NameResolver;
//
// let host = /* NameResolver implementation */;
//
// if let Some(handle) = host.resolve_value("sim/cockpit/electrical/battery_on") {
//     let sample = host.read(handle);
//     println!("battery: {:?}", sample);
// }
// ```

use serde::{Deserialize, Serialize};

/// Opaque handle to a readable host value
///
/// Handles are stable for the host process lifetime and never reused for a
/// different name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ValueHandle(pub u64);

/// Opaque handle to an invocable host command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommandHandle(pub u64);

/// One sample of a host value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum SampleValue {
    /// Integer scalar
    Int(i64),
    /// Floating point scalar
    Float(f64),
    /// Integer array
    IntArray(Vec<i64>),
    /// Floating point array
    FloatArray(Vec<f64>),
    /// Raw bytes (strings, opaque blobs)
    Bytes(Vec<u8>),
    /// The host could not produce a value
    Unavailable,
}

/// Trait for host name resolution
///
/// The catalog never reaches for a global host API; a resolver is injected
/// at construction and owned by the [`RecordStore`](crate::RecordStore).
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` so the catalog can be moved onto a
/// tokio task by the [`Poller`](crate::Poller). The catalog itself calls the
/// resolver from one thread at a time.
///
/// # Responsibilities
///
/// - ✅ Map names to handles, read values, invoke commands
/// - ❌ Cache change state (owned by `ValueRecord`)
/// - ❌ Decide when to sample (owned by `UpdateEngine`)
pub trait NameResolver: Send + Sync {
    /// Resolve `name` to a readable value handle
    ///
    /// # Returns
    ///
    /// - `Some(ValueHandle)`: the name is a value on the host
    /// - `None`: no value of that name exists
    fn resolve_value(&self, name: &str) -> Option<ValueHandle>;

    /// Resolve `name` to a command handle
    ///
    /// Independent of [`resolve_value`](Self::resolve_value): hosts may use
    /// the same identifier for a value and a command.
    fn resolve_command(&self, name: &str) -> Option<CommandHandle>;

    /// Read the current value behind a handle
    ///
    /// Must be cheap; it is called once per record per tick.
    fn read(&self, handle: ValueHandle) -> SampleValue;

    /// Invoke a command once
    ///
    /// # Returns
    ///
    /// - `Ok(())`: the host accepted the command
    /// - `Err(Error)`: the host refused it
    fn invoke(&self, handle: CommandHandle) -> Result<(), crate::Error>;

    /// List every name the host can enumerate
    ///
    /// Hosts without an enumeration facility keep the default (empty list);
    /// names then arrive only through explicit ingestion.
    fn enumerate(&self) -> Vec<String> {
        Vec::new()
    }
}
