//! Deploys discovered hangar tasks.
//!
//! A [`Deployer`] takes the [`TaskConfig`]s produced by discovery, builds an
//! image for the kinds that need one through a [`BuildCreator`] and updates the
//! remote task from its definition. Builds run concurrently; one failing task
//! does not stop the others, and the outcome is reported as a
//! [`DeploySummary`].
//!
//! [`TaskConfig`]: hangar_discover::TaskConfig

mod build;
mod deployer;
pub mod error;

pub use build::{BuildCreator, BuildOutput, BuildRequest};
pub use deployer::{DeploySummary, Deployer};
pub use error::{Error, Result};
