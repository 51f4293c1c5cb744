//! Core traits for the catalog
//!
//! This module defines the abstract interface to the host process.
//!
//! - [`NameResolver`]: Resolve names to handles, read values, invoke commands

pub mod name_resolver;

pub use name_resolver::{CommandHandle, NameResolver, SampleValue, ValueHandle};
