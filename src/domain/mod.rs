//! Domain layer - Core caching and lifecycle logic

pub mod cache;
pub mod classifier;
pub mod clients;
pub mod error;
pub mod fetch;
pub mod lifecycle;
pub mod offline_page;
pub mod strategy;
pub mod sync;

pub use cache::{CachePartition, CacheStorage, PartitionKind, PartitionNames};
pub use classifier::{
    Classifier, ClassifierConfig, Interception, PassthroughReason, RequestClassification,
};
pub use clients::{ClientEvent, Clients};
pub use error::DomainError;
pub use fetch::{
    CacheEntryKey, Destination, FetchRequest, Fetcher, OfflineApiError, Response, ResponseSource,
    StoredResponse, STALE_MARKER_HEADER,
};
pub use lifecycle::{
    ActivationReport, ControlMessage, ControlReply, FetchOutcome, InstallReport, MessageEnvelope,
    Registration, RegistrationStatus, ServiceWorker, WorkerConfig, WorkerState, WorkerStatus,
};
pub use strategy::{Strategy, StrategyDispatcher};
pub use sync::{SyncBridge, SyncReport};
