//! Sync coordinator
//!
//! The SyncCoordinator is responsible for:
//! - Snapshotting the eligible DHCP entries once per run
//! - Pushing that snapshot to every registered DHCP server
//! - Writing back `last_synchronized` for each confirmed push
//! - Reporting a per-target outcome without letting one failure affect others
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────┐     entries      ┌─────────────────┐
//! │ EligibilityFilter │ ───────────────▶ │ SyncCoordinator │
//! └───────────────────┘                  └─────────────────┘
//!                                            │         │
//!                        push (per target)   │         │  update_last_synchronized
//!                                            ▼         ▼  (on success only)
//!                                ┌───────────────┐  ┌────────────────────┐
//!                                │ PushTransport │  │ SyncTargetRegistry │
//!                                └───────────────┘  └────────────────────┘
//! ```
//!
//! ## Run Flow
//!
//! 1. List DHCP servers and eligible entries (a failure here fails the run)
//! 2. Push to each server, at most `max_concurrent_pushes` at a time
//! 3. On success, update that server's timestamp
//! 4. On failure, record the error and leave the timestamp alone
//! 5. Return every outcome, sorted by server IP

use std::future::Future;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Semaphore, mpsc, oneshot};
use tokio::time::MissedTickBehavior;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::IntervalStream;
use tracing::{debug, error, info, warn};

use crate::config::CoordinatorConfig;
use crate::eligibility::EligibilityFilter;
use crate::error::{Error, Result};
use crate::model::DhcpEntry;
use crate::registry::SyncTargetRegistry;
use crate::traits::PushTransport;

/// Events emitted by the SyncCoordinator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// A sync run started
    RunStarted { targets: usize, entries: usize },

    /// Push to one target started
    PushStarted { target: IpAddr, entries: usize },

    /// Push confirmed and timestamp written
    PushSucceeded { target: IpAddr, entries: usize },

    /// Push or timestamp write failed
    PushFailed { target: IpAddr, error: String },

    /// A sync run finished
    RunFinished { succeeded: usize, failed: usize },

    /// A sync run could not start (store unavailable)
    RunFailed { error: String },

    /// Coordinator loop stopped
    Stopped { reason: String },
}

/// Result of syncing one DHCP server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    /// Target DHCP server
    pub ip: IpAddr,
    /// Whether the push was confirmed and the timestamp written
    pub success: bool,
    /// Number of entries offered to the target
    pub entries: usize,
    /// Failure description, when `success` is false
    pub error: Option<String>,
}

impl SyncOutcome {
    fn succeeded(ip: IpAddr, entries: usize) -> Self {
        Self {
            ip,
            success: true,
            entries,
            error: None,
        }
    }

    fn failed(ip: IpAddr, entries: usize, error: impl Into<String>) -> Self {
        Self {
            ip,
            success: false,
            entries,
            error: Some(error.into()),
        }
    }
}

/// Coordinates pushes of eligible entries to DHCP servers
///
/// ## Lifecycle
///
/// 1. Create with [`SyncCoordinator::new()`]
/// 2. Call [`SyncCoordinator::sync_all()`] directly, or
/// 3. Start the periodic loop with [`SyncCoordinator::run()`]
///
/// ## Load Resistance
///
/// - **Bounded concurrency**: a semaphore caps in-flight pushes
/// - **Bounded event channel**: events are dropped (logged) when it is full
/// - **No retries**: a failed target waits for the next run
pub struct SyncCoordinator {
    filter: EligibilityFilter,
    registry: SyncTargetRegistry,
    transport: Arc<dyn PushTransport>,
    config: CoordinatorConfig,
    event_tx: mpsc::Sender<SyncEvent>,
}

impl SyncCoordinator {
    /// Create a new coordinator
    ///
    /// # Returns
    ///
    /// A tuple of (coordinator, event_receiver)
    pub fn new(
        filter: EligibilityFilter,
        registry: SyncTargetRegistry,
        transport: Arc<dyn PushTransport>,
        config: CoordinatorConfig,
    ) -> Result<(Self, mpsc::Receiver<SyncEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.event_channel_capacity);

        let coordinator = Self {
            filter,
            registry,
            transport,
            config,
            event_tx: tx,
        };

        Ok((coordinator, rx))
    }

    /// The registry this coordinator writes timestamps to
    pub fn registry(&self) -> &SyncTargetRegistry {
        &self.registry
    }

    /// Push the current eligible entries to every registered DHCP server
    ///
    /// # Errors
    ///
    /// Only failures to read the identity or target store fail the call.
    /// Per-target failures are reported in the returned outcomes.
    pub async fn sync_all(&self) -> Result<Vec<SyncOutcome>> {
        let servers = self.registry.list_dhcp_servers().await?;
        let entries = Arc::new(self.filter.list_eligible_entries().await?);

        info!(
            "Sync run: {} entries to {} DHCP server(s) via {}",
            entries.len(),
            servers.len(),
            self.transport.transport_name()
        );
        emit_event(
            &self.event_tx,
            SyncEvent::RunStarted {
                targets: servers.len(),
                entries: entries.len(),
            },
        );

        let permits = Arc::new(Semaphore::new(self.config.max_concurrent_pushes));
        let mut handles = Vec::with_capacity(servers.len());

        for server in servers {
            let permits = Arc::clone(&permits);
            let transport = Arc::clone(&self.transport);
            let registry = self.registry.clone();
            let entries = Arc::clone(&entries);
            let event_tx = self.event_tx.clone();

            let handle = tokio::spawn(async move {
                let _permit = match permits.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        return SyncOutcome::failed(server.ip, entries.len(), "Sync run aborted");
                    }
                };
                push_one(transport.as_ref(), &registry, &event_tx, server.ip, &entries).await
            });
            handles.push((server.ip, handle));
        }

        let mut outcomes = Vec::with_capacity(handles.len());
        for (ip, handle) in handles {
            match handle.await {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    error!("Push task for {} did not complete: {}", ip, e);
                    emit_event(
                        &self.event_tx,
                        SyncEvent::PushFailed {
                            target: ip,
                            error: e.to_string(),
                        },
                    );
                    outcomes.push(SyncOutcome::failed(ip, entries.len(), e.to_string()));
                }
            }
        }
        outcomes.sort_by_key(|outcome| outcome.ip);

        let succeeded = outcomes.iter().filter(|o| o.success).count();
        let failed = outcomes.len() - succeeded;
        info!("Sync run finished: {} succeeded, {} failed", succeeded, failed);
        emit_event(&self.event_tx, SyncEvent::RunFinished { succeeded, failed });

        Ok(outcomes)
    }

    /// Push the current eligible entries to one registered DHCP server
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`] if no DHCP server is registered at `ip`
    /// - Store failures, as for [`sync_all`](Self::sync_all)
    pub async fn sync_one(&self, ip: IpAddr) -> Result<SyncOutcome> {
        if self.registry.get_dhcp_server(ip).await?.is_none() {
            return Err(Error::not_found(format!("No DHCP server registered at {}", ip)));
        }

        let entries = self.filter.list_eligible_entries().await?;
        Ok(push_one(self.transport.as_ref(), &self.registry, &self.event_tx, ip, &entries).await)
    }

    /// Run sync periodically until Ctrl-C
    pub async fn run(&self) -> Result<()> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Run sync periodically until `shutdown_rx` fires (or its sender is dropped)
    pub async fn run_with_shutdown(&self, shutdown_rx: oneshot::Receiver<()>) -> Result<()> {
        self.run_until(async {
            let _ = shutdown_rx.await;
        })
        .await
    }

    async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let mut interval = tokio::time::interval(Duration::from_secs(self.config.interval_secs));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        if !self.config.sync_on_start {
            // First tick completes immediately
            interval.tick().await;
        }
        let mut ticks = IntervalStream::new(interval);

        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                Some(_) = ticks.next() => {
                    self.run_once().await;
                }

                _ = &mut shutdown => {
                    info!("Shutdown signal received");
                    emit_event(&self.event_tx, SyncEvent::Stopped {
                        reason: "Shutdown signal".to_string(),
                    });
                    break;
                }
            }
        }

        self.registry.flush().await?;
        info!("Target store flushed, coordinator stopped");

        Ok(())
    }

    async fn run_once(&self) {
        match self.sync_all().await {
            Ok(outcomes) => {
                for outcome in outcomes.iter().filter(|o| !o.success) {
                    debug!(
                        "{} not synchronized this run: {}",
                        outcome.ip,
                        outcome.error.as_deref().unwrap_or("unknown error")
                    );
                }
            }
            Err(e) => {
                error!("Sync run failed: {}", e);
                emit_event(
                    &self.event_tx,
                    SyncEvent::RunFailed {
                        error: e.to_string(),
                    },
                );
            }
        }
    }
}

/// Push to one target and write back its timestamp on success
async fn push_one(
    transport: &dyn PushTransport,
    registry: &SyncTargetRegistry,
    event_tx: &mpsc::Sender<SyncEvent>,
    target: IpAddr,
    entries: &[DhcpEntry],
) -> SyncOutcome {
    emit_event(
        event_tx,
        SyncEvent::PushStarted {
            target,
            entries: entries.len(),
        },
    );

    if let Err(e) = transport.push(target, entries).await {
        warn!("Push to {} failed: {}", target, e);
        emit_event(
            event_tx,
            SyncEvent::PushFailed {
                target,
                error: e.to_string(),
            },
        );
        return SyncOutcome::failed(target, entries.len(), e.to_string());
    }

    match registry.update_last_synchronized(target, None).await {
        Ok(1) => {
            info!("Synchronized {} entries to {}", entries.len(), target);
            emit_event(
                event_tx,
                SyncEvent::PushSucceeded {
                    target,
                    entries: entries.len(),
                },
            );
            SyncOutcome::succeeded(target, entries.len())
        }
        Ok(_) => {
            // Unregistered while the push was in flight
            let message = format!("DHCP server {} was removed during sync", target);
            warn!("{}", message);
            emit_event(
                event_tx,
                SyncEvent::PushFailed {
                    target,
                    error: message.clone(),
                },
            );
            SyncOutcome::failed(target, entries.len(), message)
        }
        Err(e) => {
            let message = format!("Push succeeded but timestamp update failed: {}", e);
            error!("{}: {}", target, message);
            emit_event(
                event_tx,
                SyncEvent::PushFailed {
                    target,
                    error: message.clone(),
                },
            );
            SyncOutcome::failed(target, entries.len(), message)
        }
    }
}

/// Send an event, dropping it with a warning if the channel is full
fn emit_event(event_tx: &mpsc::Sender<SyncEvent>, event: SyncEvent) {
    if let Err(mpsc::error::TrySendError::Full(_)) = event_tx.try_send(event) {
        warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
    }
}
