//! ContainAI target resolution.
//!
//! Decides which Docker context, container and data volume a `shell`, `run`
//! or `exec` session targets, by querying the `docker` and `git` CLIs through
//! a [`process::ProcessGateway`]. Entry point: [`resolve::TargetResolver`].

pub mod config;
pub mod docker;
pub mod error;
pub mod git;
pub mod process;
pub mod resolve;
