// # Host Implementations
//
// This module provides implementations of the NameResolver trait that do not
// need a live simulator.

pub mod memory;

pub use memory::{HostFixture, MemoryHost};
