//! StackFlow provisioning engine
//!
//! Provider abstraction, per-deployment execution state and the executor that
//! walks a descriptor set in dependency order.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                   stack CLI                      │
//! │        (provision / status / teardown)           │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │               stackflow-cloud                    │
//! │  ┌──────────────┐  ┌──────────────┐             │
//! │  │   Executor   │──│  State Mgmt  │             │
//! │  └──────┬───────┘  └──────────────┘             │
//! │  ┌──────▼───────────────────────────────────┐   │
//! │  │  trait ProviderAdapter { ... }           │   │
//! │  └──────────────────────────────────────────┘   │
//! └───────┬─────────────────────────────────────────┘
//!         │
//! ┌───────▼───────────┐
//! │ stackflow-cloud-  │
//! │ gcp (gcloud CLI)  │
//! └───────────────────┘
//! ```

pub mod action;
pub mod error;
pub mod executor;
pub mod provider;
pub mod report;
pub mod state;

// Re-exports
pub use action::{Action, ActionType, Plan, PlanSummary};
pub use error::{CloudError, Result};
pub use executor::{
    CancellationFlag, Executor, ExecutorConfig, Operation, ResourceOutcome, RunOutcome, RunReport,
};
pub use provider::{AuthStatus, ProviderAdapter, ProviderHandle, RetryConfig};
pub use report::{DeploymentResult, OutputEntry};
pub use state::{ExecutionState, ResourceRecord, ResourceStatus, StateLock, StateManager};
