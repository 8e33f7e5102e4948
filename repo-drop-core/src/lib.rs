#![doc = "repo-drop-core: core logic library for repo-drop."]

//! This crate contains the transport-free logic of repo-drop: turning file and
//! directory sources into a flat list of path-qualified records, collecting
//! those records into a batch, and reconciling the batch against a remote
//! contents store one file at a time.
//!
//! HTTP intake, the GitHub client and the CLI live in the `repo-drop` crate.
//!
//! # Usage
//! Add this as a dependency for the flattener, collector, synchronisation
//! engine and the [`contract::RemoteStore`] seam.

pub mod aggregate;
pub mod collector;
pub mod contract;
pub mod flatten;
pub mod local;
#[cfg(any(test, feature = "test-export-mocks"))]
pub mod memory;
pub mod record;
pub mod synchronise;
pub mod target;
