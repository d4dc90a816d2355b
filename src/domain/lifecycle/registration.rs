//! Registration - owns the active and waiting worker versions

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use super::message::{ControlMessage, MessageEnvelope};
use super::state::WorkerState;
use super::worker::{ActivationReport, FetchOutcome, ServiceWorker};
use crate::domain::classifier::PassthroughReason;
use crate::domain::clients::Clients;
use crate::domain::fetch::FetchRequest;
use crate::domain::sync::SyncReport;
use crate::domain::DomainError;

#[derive(Debug, Clone, Serialize)]
pub struct WorkerStatus {
    pub version: String,
    pub state: WorkerState,
    pub partitions: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl WorkerStatus {
    fn of(worker: &ServiceWorker) -> Self {
        Self {
            version: worker.version().to_string(),
            state: worker.state(),
            partitions: worker
                .partitions()
                .all()
                .iter()
                .map(|name| name.to_string())
                .collect(),
            created_at: worker.created_at(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RegistrationStatus {
    pub active: Option<WorkerStatus>,
    pub waiting: Option<WorkerStatus>,
    pub clients: usize,
}

/// Tracks which worker version controls the gateway.
///
/// Requests are served by the active worker; until one exists they pass
/// through. A newly registered worker installs while the previous version
/// keeps serving, then waits until it asks to skip waiting.
#[derive(Debug)]
pub struct Registration {
    active: RwLock<Option<Arc<ServiceWorker>>>,
    waiting: RwLock<Option<Arc<ServiceWorker>>>,
    clients: Clients,
    updates: Mutex<()>,
}

impl Registration {
    pub fn new(clients: Clients) -> Self {
        Self {
            active: RwLock::new(None),
            waiting: RwLock::new(None),
            clients,
            updates: Mutex::new(()),
        }
    }

    pub fn clients(&self) -> &Clients {
        &self.clients
    }

    pub async fn active(&self) -> Option<Arc<ServiceWorker>> {
        self.active.read().await.clone()
    }

    pub async fn waiting(&self) -> Option<Arc<ServiceWorker>> {
        self.waiting.read().await.clone()
    }

    /// Installs `worker`, promoting it when it asks to skip waiting.
    ///
    /// A failed install leaves the current active worker untouched.
    pub async fn register(&self, worker: Arc<ServiceWorker>) -> Result<(), DomainError> {
        let _update = self.updates.lock().await;

        worker.install().await?;

        let superseded = self.waiting.write().await.replace(worker.clone());
        if let Some(previous) = superseded {
            info!(version = %previous.version(), "Discarding previously waiting worker");
            previous.retire();
        }

        if worker.skip_waiting_requested() {
            self.promote_waiting().await?;
        } else {
            info!(version = %worker.version(), "Worker installed and waiting");
        }

        Ok(())
    }

    async fn promote_waiting(&self) -> Result<Option<ActivationReport>, DomainError> {
        let Some(worker) = self.waiting.write().await.take() else {
            return Ok(None);
        };

        let report = match worker.activate().await {
            Ok(report) => report,
            Err(e) => {
                worker.retire();
                return Err(e);
            }
        };

        let previous = self.active.write().await.replace(worker.clone());
        if let Some(previous) = previous {
            previous.retire();
        }

        let claimed = self.clients.claim(worker.version());
        info!(version = %worker.version(), claimed, "Worker took control");

        Ok(Some(report))
    }

    /// Routes a request to the active worker
    pub async fn handle_fetch(&self, request: &FetchRequest) -> FetchOutcome {
        match self.active().await {
            Some(worker) => worker.handle_fetch(request).await,
            None => FetchOutcome::Passthrough(PassthroughReason::NoController),
        }
    }

    /// Delivers a control message, replying on the envelope's port if any
    pub async fn post_message(&self, envelope: MessageEnvelope) {
        match envelope.message {
            ControlMessage::SkipWaiting => {
                let _update = self.updates.lock().await;

                if let Some(waiting) = self.waiting().await {
                    waiting.handle_message(ControlMessage::SkipWaiting).await;

                    if let Err(e) = self.promote_waiting().await {
                        warn!(error = %e, "Failed to promote waiting worker");
                    }
                }
            }
            message => {
                let reply = match self.active().await {
                    Some(worker) => worker.handle_message(message).await,
                    None => None,
                };

                if let Some(reply) = reply {
                    envelope.reply(reply);
                }
            }
        }
    }

    /// Connectivity came back: refresh the sync endpoints
    pub async fn notify_online(&self) -> Option<SyncReport> {
        let worker = self.active().await?;
        Some(worker.on_online(&self.clients).await)
    }

    pub async fn status(&self) -> RegistrationStatus {
        RegistrationStatus {
            active: self.active().await.as_deref().map(WorkerStatus::of),
            waiting: self.waiting().await.as_deref().map(WorkerStatus::of),
            clients: self.clients.connected(),
        }
    }
}
