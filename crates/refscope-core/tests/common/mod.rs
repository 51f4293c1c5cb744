//! Test doubles and common utilities for catalog contract tests
//!
//! This module provides a scripted host that counts every call the catalog
//! makes, so tests can assert on what the catalog did NOT do as well.

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use refscope_core::config::CatalogConfig;
use refscope_core::error::{Error, Result};
use refscope_core::traits::{CommandHandle, NameResolver, SampleValue, ValueHandle};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct Script {
    values: Vec<(String, SampleValue)>,
    commands: Vec<String>,
}

/// A host whose values are set by the test and whose calls are counted
pub struct ScriptedHost {
    script: Arc<Mutex<Script>>,
    /// Call counter for resolve_value() + resolve_command()
    resolve_call_count: Arc<AtomicUsize>,
    /// Names passed to read(), in call order
    read_log: Arc<Mutex<Vec<String>>>,
    /// Names passed to invoke(), in call order
    invoke_log: Arc<Mutex<Vec<String>>>,
    /// Refuse every invoke() with a resolver error
    refuse_commands: bool,
}

impl ScriptedHost {
    pub fn new() -> Self {
        Self {
            script: Arc::new(Mutex::new(Script::default())),
            resolve_call_count: Arc::new(AtomicUsize::new(0)),
            read_log: Arc::new(Mutex::new(Vec::new())),
            invoke_log: Arc::new(Mutex::new(Vec::new())),
            refuse_commands: false,
        }
    }

    /// Builder: add a value
    pub fn with_value(self, name: &str, value: SampleValue) -> Self {
        self.add_value(name, value);
        self
    }

    /// Builder: add a command
    pub fn with_command(self, name: &str) -> Self {
        self.add_command(name);
        self
    }

    /// Builder: make every command invocation fail
    pub fn refusing_commands(mut self) -> Self {
        self.refuse_commands = true;
        self
    }

    /// Add a value after construction (visible to every sharing clone)
    pub fn add_value(&self, name: &str, value: SampleValue) {
        self.script
            .lock()
            .unwrap()
            .values
            .push((name.to_string(), value));
    }

    /// Add a command after construction
    pub fn add_command(&self, name: &str) {
        self.script.lock().unwrap().commands.push(name.to_string());
    }

    /// Change the current sample of a value
    pub fn set(&self, name: &str, value: SampleValue) {
        let mut script = self.script.lock().unwrap();
        let slot = script
            .values
            .iter_mut()
            .find(|(n, _)| n == name)
            .expect("value is scripted");
        slot.1 = value;
    }

    /// Get the number of resolve calls (either kind)
    pub fn resolve_call_count(&self) -> usize {
        self.resolve_call_count.load(Ordering::SeqCst)
    }

    /// Get the total number of read() calls
    pub fn read_call_count(&self) -> usize {
        self.read_log.lock().unwrap().len()
    }

    /// Get the number of read() calls for one name
    pub fn reads_of(&self, name: &str) -> usize {
        self.read_log
            .lock()
            .unwrap()
            .iter()
            .filter(|n| n.as_str() == name)
            .count()
    }

    /// Get the names invoked so far
    pub fn invoked(&self) -> Vec<String> {
        self.invoke_log.lock().unwrap().clone()
    }

    /// Create a new ScriptedHost that shares script and counters with an existing one
    pub fn sharing_counters_with(other: &Self) -> Self {
        Self {
            script: Arc::clone(&other.script),
            resolve_call_count: Arc::clone(&other.resolve_call_count),
            read_log: Arc::clone(&other.read_log),
            invoke_log: Arc::clone(&other.invoke_log),
            refuse_commands: other.refuse_commands,
        }
    }
}

impl NameResolver for ScriptedHost {
    fn resolve_value(&self, name: &str) -> Option<ValueHandle> {
        self.resolve_call_count.fetch_add(1, Ordering::SeqCst);
        self.script
            .lock()
            .unwrap()
            .values
            .iter()
            .position(|(n, _)| n == name)
            .map(|i| ValueHandle(i as u64))
    }

    fn resolve_command(&self, name: &str) -> Option<CommandHandle> {
        self.resolve_call_count.fetch_add(1, Ordering::SeqCst);
        self.script
            .lock()
            .unwrap()
            .commands
            .iter()
            .position(|n| n == name)
            .map(|i| CommandHandle(i as u64))
    }

    fn read(&self, handle: ValueHandle) -> SampleValue {
        let script = self.script.lock().unwrap();
        match script.values.get(handle.0 as usize) {
            Some((name, value)) => {
                self.read_log.lock().unwrap().push(name.clone());
                value.clone()
            }
            None => SampleValue::Unavailable,
        }
    }

    fn invoke(&self, handle: CommandHandle) -> Result<()> {
        let script = self.script.lock().unwrap();
        let name = script
            .commands
            .get(handle.0 as usize)
            .ok_or_else(|| Error::resolver("unknown command handle"))?;

        if self.refuse_commands {
            return Err(Error::resolver(format!("host refused {}", name)));
        }

        self.invoke_log.lock().unwrap().push(name.clone());
        Ok(())
    }

    fn enumerate(&self) -> Vec<String> {
        let script = self.script.lock().unwrap();
        let mut names: Vec<String> = script.values.iter().map(|(n, _)| n.clone()).collect();
        names.extend(script.commands.iter().cloned());
        names
    }
}

/// Helper to create a UTC timestamp from seconds since the epoch
pub fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).unwrap()
}

/// Helper to create a UTC timestamp from milliseconds since the epoch
pub fn at_millis(millis: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(millis).unwrap()
}

/// Helper to create a minimal CatalogConfig for testing
pub fn minimal_config() -> CatalogConfig {
    let mut config = CatalogConfig::default();
    config.poller.tick_interval_ms = 10;
    config.poller.event_channel_capacity = 100;
    config
}
