// # refscope-core
//
// Core library for the refscope named-value catalog.
//
// ## Architecture Overview
//
// A host process exposes thousands of named values and commands. This
// library keeps a searchable catalog of them:
// - **NameResolver**: Trait for resolving names, reading values and invoking commands
// - **RecordStore**: Append-only arenas of value/command records with a name index
// - **UpdateEngine**: Periodic resampling with small/big change tracking
// - **SearchEngine**: Token-AND substring/regex search with a recency filter
// - **export**: Sorted name snapshots written after every ingestion batch
// - **Catalog**: Façade bundling the pieces above
// - **Poller**: Async driver that ticks the catalog and serves requests
//
// ## Design Principles
//
// 1. **Injected Host**: The resolver is passed in, never a global
// 2. **Stable Ids**: Records are addressed by arena index, never by pointer
// 3. **Synchronous Core**: Only the Poller touches the async runtime
// 4. **Library-First**: All core functionality can be used as a library

pub mod traits;
pub mod record;
pub mod store;
pub mod engine;
pub mod search;
pub mod export;
pub mod host;
pub mod catalog;
pub mod poller;
pub mod config;
pub mod error;

// Re-export core types for convenience
pub use traits::{CommandHandle, NameResolver, SampleValue, ValueHandle};
pub use record::{CommandId, CommandRecord, NEVER, Record, RecordKind, RecordView, RefSource, ValueId, ValueRecord};
pub use store::{NameEntry, RecordStore};
pub use engine::{TickReport, UpdateEngine};
pub use search::{SearchEngine, SearchHit, SearchQuery};
pub use export::ExportPaths;
pub use catalog::Catalog;
pub use poller::{CatalogEvent, Poller, PollerHandle};
pub use config::{CatalogConfig, ChangeTolerance, ExportConfig, PollerConfig};
pub use error::{Error, Result};
