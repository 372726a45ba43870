//! Core types for hangar: task definitions, build configuration and the remote API contract.
//!
//! A task is described by a [`Definition`]: a versioned document holding the task's
//! identity (slug, name), its parameters, execution rules and exactly one kind-specific
//! block (`node`, `python`, `shell`, `image`, `sql` or `rest`). Definitions are produced
//! either top-down, by parsing a `*.task.yaml` / `*.task.json` file, or bottom-up, by
//! reverse-engineering a task record fetched through an [`ApiClient`].
//!
//! # Build configuration
//!
//! The build configuration of a definition is its kind options layered with explicit
//! overrides. An override can also mask an inherited key:
//!
//! ```
//! use hangar_core::definitions::{DefFormat, Definition};
//!
//! let yaml = b"slug: hello\nname: Hello\nnode:\n  entrypoint: main.ts\n  nodeVersion: \"18\"\n";
//! let mut def = Definition::unmarshal(DefFormat::Yaml, yaml)?;
//!
//! def.set_build_config("workdir", "/pkg");
//! def.unset_build_config("nodeVersion");
//!
//! let config = def.build_config();
//! assert_eq!(config["workdir"], "/pkg");
//! assert!(!config.contains_key("nodeVersion"));
//! # Ok::<(), hangar_core::Error>(())
//! ```
//!
//! # Feature flags
//!
//! - `mock` - exposes [`api::mock::MockClient`], an in-memory [`ApiClient`] used by the
//!   discovery and deploy test suites.

pub mod api;
pub mod definitions;
pub mod error;
pub mod kind;
pub mod paths;

pub use api::{ApiClient, ApiError};
pub use definitions::{AppDefinition, DefFormat, Definition, DefinitionVersion, KindDefinition};
pub use error::{Error, Result};
pub use kind::{BuildConfig, KindOptions, TaskKind};
