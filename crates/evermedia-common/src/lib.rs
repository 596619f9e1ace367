//! Evermedia-Common: Shared types, constants, and utilities.
//!
//! This crate provides the vocabulary shared by every stage of the link-file
//! pipeline:
//!
//! - **Typed IDs**: [`ItemId`] for host library items
//! - **Media sources**: [`MediaSourceRecord`], the normalized probe result
//! - **Path Utilities**: link-file detection and sidecar path derivation
//! - **Error Handling**: one error type per pipeline stage
//!
//! # Examples
//!
//! ```
//! use evermedia_common::paths::{is_link_file, sidecar_path};
//! use std::path::Path;
//!
//! assert!(is_link_file(Path::new("/media/Show.strm"), "strm"));
//! assert_eq!(
//!     sidecar_path(Path::new("/media/Show.strm"), "medinfo"),
//!     Path::new("/media/Show.strm.medinfo"),
//! );
//! ```

pub mod error;
pub mod ids;
pub mod paths;
pub mod types;

pub use error::{CacheError, PersistError, ProbeFailure, ResolutionError};
pub use ids::*;
pub use types::*;
