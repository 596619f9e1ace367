//! Evermedia - media info for link files
//!
//! Resolves link files to the media they point at, probes that media, caches
//! the result in a sidecar next to the link file and reconciles it into the
//! host library. This library crate exposes the pipeline for the binary and
//! for integration testing.

pub mod config;
pub mod dispatch;
pub mod host;
pub mod library;
pub mod pipeline;
pub mod prober;
pub mod reconcile;
pub mod resolver;
pub mod scanner;
pub mod sidecar;
pub mod watch;
