//! Google Cloud provider for StackFlow
//!
//! This crate implements the ProviderAdapter trait for Google Cloud,
//! driving the gcloud CLI for every resource kind.
//!
//! # Resource mapping
//!
//! - network / subnet: VPC networks and subnets (`gcloud compute`)
//! - database-instance: Cloud SQL (`gcloud sql`)
//! - cache-instance: Memorystore for Redis (`gcloud redis`)
//! - secret: Secret Manager, payload piped through stdin
//! - service: Cloud Run (`gcloud run deploy`)
//! - scheduler-job: Cloud Scheduler HTTP jobs
//! - function: Cloud Functions (2nd gen)
//!
//! # Requirements
//!
//! - `gcloud` CLI must be installed and logged in
//! - Authentication is managed through gcloud configuration
//!
//! # Example
//!
//! ```ignore
//! use stackflow_cloud_gcp::GcpProvider;
//! use stackflow_cloud::ProviderAdapter;
//!
//! let provider = GcpProvider::new(Some("demo-project".into()), "us-central1");
//!
//! let auth = provider.check_auth().await?;
//! if !auth.authenticated {
//!     panic!("Not authenticated: {:?}", auth.error);
//! }
//! ```

pub mod error;
pub mod gcloud;
pub mod provider;
pub mod resources;

pub use error::{GcloudError, Result};
pub use gcloud::{Gcloud, Invocation};
pub use provider::GcpProvider;
