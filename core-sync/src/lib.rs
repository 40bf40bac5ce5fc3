//! # Pull History Sync Module
//!
//! Keeps the local pull-record store in step with the remote record API.
//!
//! ## Overview
//!
//! This module manages the lifecycle of sync tasks, including:
//! - Accepting sync requests and persisting them as tasks
//! - Claiming tasks from a background poller
//! - Planning which remote pages are missing locally
//! - Fetching pages concurrently on a bounded, shared pool
//! - Persisting records with constraint-based deduplication
//!
//! ## Components
//!
//! - **Id Generator** (`id_generator`): Time-ordered 64-bit ids for records and tasks
//! - **Window Planner** (`window`): Cursor list between the newest remote and stored sequence
//! - **Fetch Pool** (`worker_pool`): Bounded fetch concurrency with caller-runs overflow
//! - **Persister** (`persister`): Batched inserts with per-record duplicate fallback
//! - **Task State Machine** (`task`): Created → Started → Completed
//! - **Repository** (`repository`): Database persistence for sync tasks
//! - **Task Registry** (`registry`): Submit, claim, complete and poll tasks
//! - **Sync Coordinator** (`coordinator`): Orchestrates one sync end to end
//! - **Task Poller** (`poller`): Background claim loop
//! - **Metrics** (`metrics`): Cumulative sync counters

pub mod coordinator;
pub mod error;
pub mod id_generator;
pub mod metrics;
pub mod persister;
pub mod poller;
pub mod registry;
pub mod repository;
pub mod task;
pub mod window;
pub mod worker_pool;

pub use coordinator::{SyncConfig, SyncCoordinator, SyncReport};
pub use error::{Result, SyncError};
pub use id_generator::{IdGenerator, IdParts, UniqueId};
pub use metrics::{MetricsSnapshot, SyncMetrics};
pub use persister::{BatchOutcome, DedupPersister};
pub use poller::TaskPoller;
pub use registry::TaskRegistry;
pub use repository::{SqliteSyncTaskRepository, SyncTaskRepository};
pub use task::{SyncTask, TaskId, TaskSnapshot, TaskStatus};
pub use worker_pool::{FetchHandle, FetchPool};
