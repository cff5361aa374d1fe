//! StackFlow core
//!
//! Resource descriptor model, KDL loader and dependency validation.
//!
//! A descriptor file lists the resources of one deployment and the
//! dependencies between them:
//!
//! ```kdl
//! deployment "three-tier"
//!
//! resource "vpc" kind="network"
//!
//! resource "db" kind="database-instance" {
//!     depends_on "vpc"
//!     network "${vpc.handle}"
//! }
//! ```
//!
//! Loading renders `{{ ... }}` templates, parses the KDL and validates the
//! result: unknown or cyclic dependencies, references to non-dependencies and
//! literal credentials are all rejected with a [`ConfigError`].

pub mod error;
pub mod graph;
pub mod loader;
pub mod model;
pub mod parser;
pub mod reference;
pub mod template;
pub mod validate;

pub use error::{ConfigError, Result};
pub use loader::{load, load_str};
pub use model::{DescriptorSet, ResourceConfig, ResourceDescriptor, ResourceKind, value_to_string};
pub use reference::{OutputField, OutputRef, resolve_references};
