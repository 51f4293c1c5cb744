//! Catalog façade
//!
//! Bundles the [`RecordStore`], [`UpdateEngine`] and [`SearchEngine`] behind
//! one owner configured from a [`CatalogConfig`]. This is the type hosts and
//! the [`Poller`](crate::Poller) hold on to.

use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use tracing::info;

use crate::config::CatalogConfig;
use crate::engine::{TickReport, UpdateEngine};
use crate::error::{Error, Result};
use crate::export::ExportPaths;
use crate::record::{RecordView, RefSource};
use crate::search::{SearchEngine, SearchQuery};
use crate::store::RecordStore;
use crate::traits::NameResolver;

/// Searchable catalog of host values and commands
#[derive(Debug)]
pub struct Catalog {
    store: RecordStore,
    updater: UpdateEngine,
    searcher: SearchEngine,
    config: CatalogConfig,
}

impl Catalog {
    /// Create a catalog around a host resolver
    ///
    /// Blacklisted names from the configuration are ingested right away
    /// (source [`RefSource::Blacklist`]) so they appear in search results
    /// while never being sampled.
    ///
    /// # Parameters
    ///
    /// - `resolver`: host name resolver
    /// - `config`: catalog configuration (validated here)
    pub fn new(resolver: Box<dyn NameResolver>, config: CatalogConfig) -> Result<Self> {
        config.validate()?;

        let window = i64::try_from(config.recent_window_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .ok_or_else(|| {
                Error::config(format!(
                    "Recent window of {}s is out of range",
                    config.recent_window_secs
                ))
            })?;

        let mut store = RecordStore::new(resolver).with_blacklist(&config.blacklist);
        if let Some(export) = &config.export {
            store = store.with_export(ExportPaths::under(&export.base_dir));
        }

        let mut catalog = Self {
            store,
            updater: UpdateEngine::new(config.change),
            searcher: SearchEngine::new(window),
            config,
        };

        if !catalog.config.blacklist.is_empty() {
            let blacklist = catalog.config.blacklist.clone();
            let registered = catalog.store.ingest(&blacklist, RefSource::Blacklist);
            info!("Registered {} of {} blacklisted names", registered, blacklist.len());
        }

        Ok(catalog)
    }

    /// Active configuration
    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    /// Underlying store, for read access
    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    /// Register a batch of names; see [`RecordStore::ingest`]
    pub fn ingest<I, S>(&mut self, names: I, source: RefSource) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.store.ingest(names, source)
    }

    /// Register every name listed in a file; see [`RecordStore::ingest_file`]
    pub fn ingest_file<P: AsRef<Path>>(&mut self, path: P, source: RefSource) -> Result<usize> {
        self.store.ingest_file(path, source)
    }

    /// Register every name the host can list by itself
    pub fn ingest_enumerated(&mut self) -> usize {
        let names = self.store.resolver().enumerate();
        info!("Host enumerated {} names", names.len());
        self.store.ingest(names, RefSource::Enumerated)
    }

    /// Run one update pass at `now`
    pub fn tick(&mut self, now: DateTime<Utc>) -> TickReport {
        self.updater.tick(&mut self.store, now)
    }

    /// Search relative to the current wall clock
    pub fn search(&self, query: &SearchQuery) -> Vec<RecordView<'_>> {
        self.search_at(query, Utc::now())
    }

    /// Search relative to `now`
    pub fn search_at(&self, query: &SearchQuery, now: DateTime<Utc>) -> Vec<RecordView<'_>> {
        self.searcher.search(&self.store, query, now)
    }

    /// Search relative to `now`, surfacing invalid expressions as errors
    pub fn try_search(&self, query: &SearchQuery, now: DateTime<Utc>) -> Result<Vec<RecordView<'_>>> {
        self.searcher.try_search(&self.store, query, now)
    }

    /// Invoke a registered command
    pub fn invoke(&self, name: &str) -> Result<()> {
        self.store.invoke(name)
    }

    /// Enable or disable sampling of a registered value
    pub fn set_blacklisted(&mut self, name: &str, blacklisted: bool) -> Result<()> {
        self.store.set_blacklisted(name, blacklisted)
    }

    /// Write the name snapshot now (`None` when export is not configured)
    pub fn export_snapshot(&mut self) -> Option<bool> {
        self.store.export_snapshot()
    }
}
