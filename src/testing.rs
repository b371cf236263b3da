//! Testing utilities for compositions and reconciliation handlers.
//!
//! This module gathers what tests embedding the engine need:
//!
//! - **Fakes**: in-memory collaborators that record every call
//! - **Fixtures**: small registries and profiles for common scenarios
//! - **Assertions**: compare deployments with expected shapes, with readable
//!   failure messages
//!
//! # Quick Start
//!
//! ```
//! use tiergraph::Composer;
//! use tiergraph::testing::*;
//!
//! # fn main() -> anyhow::Result<()> {
//! let provider = FakeResourceProvider::new();
//! let deployment = Composer::new(two_component_registry()?)
//!     .compose(&profile_for("dev"), &provider)?;
//!
//! assert_order(&deployment, &["db", "app"]);
//! assert_present(&deployment, "app");
//! assert_eq!(provider.provisioned(), vec!["db", "app"]);
//! # Ok(())
//! # }
//! ```
//!
//! # Fakes
//!
//! - [`FakeResourceProvider`]: synthesizes deterministic outputs; failure injection per component
//! - [`FakeExternalResolver`]: map-backed external references
//! - [`FakeGroupDirectory`]: group directory with eventual-consistency lag and failure injection
//!
//! # Assertion Functions
//!
//! - [`assert_order`]: exact instantiation order
//! - [`assert_present`] / [`assert_absent`]: presence of one component
//! - [`assert_wired`]: an input equals an upstream output exactly

pub mod assertions;
pub mod fixtures;

pub use crate::provider::fake::{FakeExternalResolver, FakeGroupDirectory, FakeResourceProvider, ProvisionCall};
pub use assertions::*;
pub use fixtures::*;
