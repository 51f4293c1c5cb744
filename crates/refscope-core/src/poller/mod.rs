//! Async catalog driver
//!
//! The Poller owns a [`Catalog`] on a single task and is responsible for:
//! - Ticking the update engine on a fixed interval
//! - Serializing requests (ingest, search, invoke, blacklist) from any number
//!   of [`PollerHandle`]s
//! - Emitting [`CatalogEvent`]s for monitoring/logging
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐                      ┌──────────────┐
//! │ PollerHandle │── PollerRequest ────►│              │── CatalogEvent ──► Receiver
//! └──────────────┘   (oneshot reply)    │    Poller    │
//! ┌──────────────┐                      │  (Catalog)   │
//! │ IntervalStream│── tick ────────────►│              │
//! └──────────────┘                      └──────────────┘
//! ```
//!
//! Everything touching the catalog happens on the poller task, so the
//! catalog itself needs no locking.

use chrono::Utc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::time::MissedTickBehavior;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::IntervalStream;
use tracing::{debug, info, warn};

use crate::catalog::Catalog;
use crate::config::PollerConfig;
use crate::error::{Error, Result};
use crate::record::RefSource;
use crate::search::{SearchHit, SearchQuery};

/// Events emitted by the Poller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogEvent {
    /// Poller started
    Started {
        values: usize,
        commands: usize,
    },

    /// An ingestion request completed
    Ingested {
        registered: usize,
    },

    /// A tick observed at least one change
    Ticked {
        changed: usize,
        big_changes: usize,
    },

    /// Poller stopped
    Stopped {
        reason: String,
    },
}

/// Work sent from a [`PollerHandle`] to the poller task
#[derive(Debug)]
pub enum PollerRequest {
    Ingest {
        names: Vec<String>,
        source: RefSource,
        reply: oneshot::Sender<usize>,
    },
    Search {
        query: SearchQuery,
        reply: oneshot::Sender<Result<Vec<SearchHit>>>,
    },
    Invoke {
        name: String,
        reply: oneshot::Sender<Result<()>>,
    },
    SetBlacklisted {
        name: String,
        blacklisted: bool,
        reply: oneshot::Sender<Result<()>>,
    },
}

/// Cloneable client for a running [`Poller`]
#[derive(Debug, Clone)]
pub struct PollerHandle {
    tx: mpsc::Sender<PollerRequest>,
}

impl PollerHandle {
    /// Register a batch of names
    ///
    /// # Returns
    ///
    /// The number of newly registered names.
    pub async fn ingest<I, S>(&self, names: I, source: RefSource) -> Result<usize>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names = names.into_iter().map(Into::into).collect();
        self.request(|reply| PollerRequest::Ingest {
            names,
            source,
            reply,
        })
        .await
    }

    /// Run a query against the live catalog
    pub async fn search(&self, query: SearchQuery) -> Result<Vec<SearchHit>> {
        self.request(|reply| PollerRequest::Search { query, reply })
            .await?
    }

    /// Invoke a registered command
    pub async fn invoke(&self, name: impl Into<String>) -> Result<()> {
        let name = name.into();
        self.request(|reply| PollerRequest::Invoke { name, reply })
            .await?
    }

    /// Enable or disable sampling of a registered value
    pub async fn set_blacklisted(&self, name: impl Into<String>, blacklisted: bool) -> Result<()> {
        let name = name.into();
        self.request(|reply| PollerRequest::SetBlacklisted {
            name,
            blacklisted,
            reply,
        })
        .await?
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> PollerRequest,
    ) -> Result<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(build(reply_tx))
            .await
            .map_err(|_| Error::Other("Poller is not running".to_string()))?;
        reply_rx
            .await
            .map_err(|_| Error::Other("Poller stopped before replying".to_string()))
    }
}

/// Interval-driven owner of a [`Catalog`]
///
/// ## Lifecycle
///
/// 1. Create with [`Poller::new()`]
/// 2. Start with [`Poller::run()`]
/// 3. Poller runs until a shutdown signal is received; dropping every
///    [`PollerHandle`] does not stop it
/// 4. The name snapshot is written once more on the way out
///
/// ## Load Resistance
///
/// - **Bounded request channel**: handles wait when the poller falls behind
/// - **Bounded event channel**: when full, new events are dropped (logged)
/// - **Skipped ticks**: a slow tick does not cause a burst of catch-up ticks
pub struct Poller {
    catalog: Catalog,
    requests: mpsc::Receiver<PollerRequest>,
    event_tx: mpsc::Sender<CatalogEvent>,
    tick_interval: std::time::Duration,
}

impl Poller {
    /// Create a new poller
    ///
    /// # Parameters
    ///
    /// - `catalog`: the catalog to drive
    /// - `config`: poller configuration
    ///
    /// # Returns
    ///
    /// A tuple of (poller, handle, event_receiver)
    pub fn new(
        catalog: Catalog,
        config: PollerConfig,
    ) -> Result<(Self, PollerHandle, mpsc::Receiver<CatalogEvent>)> {
        config.validate()?;

        let (request_tx, request_rx) = mpsc::channel(config.command_channel_capacity);
        let (event_tx, event_rx) = mpsc::channel(config.event_channel_capacity);

        let poller = Self {
            catalog,
            requests: request_rx,
            event_tx,
            tick_interval: std::time::Duration::from_millis(config.tick_interval_ms),
        };

        Ok((poller, PollerHandle { tx: request_tx }, event_rx))
    }

    /// Give the catalog back (after the poller has stopped)
    pub fn into_catalog(self) -> Catalog {
        self.catalog
    }

    /// Run until SIGINT
    pub async fn run(&mut self) -> Result<()> {
        self.run_internal(None).await
    }

    /// Run until `shutdown_rx` fires (or its sender is dropped)
    ///
    /// With `None` this behaves like [`Poller::run()`].
    pub async fn run_with_shutdown(&mut self, shutdown_rx: Option<oneshot::Receiver<()>>) -> Result<()> {
        self.run_internal(shutdown_rx).await
    }

    async fn run_internal(&mut self, shutdown_rx: Option<oneshot::Receiver<()>>) -> Result<()> {
        let values = self.catalog.store().values().len();
        let commands = self.catalog.store().commands().len();
        self.emit_event(CatalogEvent::Started { values, commands });
        info!(
            "Poller started: {} values, {} commands, tick every {:?}",
            values, commands, self.tick_interval
        );

        let mut interval = tokio::time::interval(self.tick_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut ticks = IntervalStream::new(interval);

        let shutdown = async move {
            match shutdown_rx {
                Some(rx) => {
                    let _ = rx.await;
                }
                None => {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        warn!("Failed to listen for shutdown signal: {}", e);
                        std::future::pending::<()>().await;
                    }
                }
            }
        };
        tokio::pin!(shutdown);

        let mut requests_open = true;

        loop {
            tokio::select! {
                Some(_) = ticks.next() => {
                    self.handle_tick();
                }

                request = self.requests.recv(), if requests_open => {
                    match request {
                        Some(request) => self.handle_request(request),
                        None => {
                            debug!("All poller handles dropped, continuing with ticks only");
                            requests_open = false;
                        }
                    }
                }

                _ = &mut shutdown => {
                    info!("Shutdown signal received");
                    self.emit_event(CatalogEvent::Stopped {
                        reason: "Shutdown signal".to_string(),
                    });
                    break;
                }
            }
        }

        if let Some(ok) = self.catalog.export_snapshot() {
            info!("Final name snapshot written: {}", ok);
        }
        info!("Poller stopped");

        Ok(())
    }

    fn handle_tick(&mut self) {
        let report = self.catalog.tick(Utc::now());
        if report.changed > 0 {
            self.emit_event(CatalogEvent::Ticked {
                changed: report.changed,
                big_changes: report.big_changes,
            });
        }
    }

    fn handle_request(&mut self, request: PollerRequest) {
        match request {
            PollerRequest::Ingest {
                names,
                source,
                reply,
            } => {
                let registered = self.catalog.ingest(&names, source);
                self.emit_event(CatalogEvent::Ingested { registered });
                let _ = reply.send(registered);
            }
            PollerRequest::Search { query, reply } => {
                let hits = self
                    .catalog
                    .try_search(&query, Utc::now())
                    .map(|views| views.into_iter().map(SearchHit::from).collect());
                if let Err(e) = &hits {
                    warn!("{}", e);
                }
                let _ = reply.send(hits);
            }
            PollerRequest::Invoke { name, reply } => {
                let result = self.catalog.invoke(&name);
                if let Err(e) = &result {
                    warn!("Failed to invoke {}: {}", name, e);
                }
                let _ = reply.send(result);
            }
            PollerRequest::SetBlacklisted {
                name,
                blacklisted,
                reply,
            } => {
                let _ = reply.send(self.catalog.set_blacklisted(&name, blacklisted));
            }
        }
    }

    /// Emit a poller event
    ///
    /// Returns whether the event was queued.
    fn emit_event(&self, event: CatalogEvent) -> bool {
        match self.event_tx.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(event)) => {
                warn!(
                    "Event channel full, dropping {:?}. Consider increasing event_channel_capacity.",
                    event
                );
                false
            }
            // Nobody listens for events; ticking goes on regardless.
            Err(TrySendError::Closed(event)) => {
                debug!("Event receiver dropped, discarding {:?}", event);
                false
            }
        }
    }
}

impl std::fmt::Debug for Poller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Poller")
            .field("catalog", &self.catalog)
            .field("tick_interval", &self.tick_interval)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_event_clone_eq() {
        let event = CatalogEvent::Ticked {
            changed: 2,
            big_changes: 1,
        };
        assert_eq!(event.clone(), event);
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let catalog = Catalog::new(
            Box::new(crate::host::MemoryHost::new()),
            crate::config::CatalogConfig::default(),
        )
        .unwrap();
        let config = PollerConfig {
            event_channel_capacity: 0,
            ..PollerConfig::default()
        };
        assert!(matches!(Poller::new(catalog, config), Err(Error::Config(_))));
    }

    fn small_poller(capacity: usize) -> (Poller, mpsc::Receiver<CatalogEvent>) {
        let catalog = Catalog::new(
            Box::new(crate::host::MemoryHost::new()),
            crate::config::CatalogConfig::default(),
        )
        .unwrap();
        let config = PollerConfig {
            event_channel_capacity: capacity,
            ..PollerConfig::default()
        };
        let (poller, _handle, events) = Poller::new(catalog, config).unwrap();
        (poller, events)
    }

    #[test]
    fn test_emit_event_drops_when_full() {
        let (poller, mut events) = small_poller(1);

        assert!(poller.emit_event(CatalogEvent::Ingested { registered: 1 }));
        assert!(!poller.emit_event(CatalogEvent::Ingested { registered: 2 }));

        assert_eq!(events.try_recv().unwrap(), CatalogEvent::Ingested { registered: 1 });
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn test_emit_event_without_receiver() {
        let (poller, events) = small_poller(4);
        drop(events);

        assert!(!poller.emit_event(CatalogEvent::Ticked {
            changed: 1,
            big_changes: 0,
        }));
        assert!(!poller.emit_event(CatalogEvent::Stopped {
            reason: "test".to_string(),
        }));
    }
}
