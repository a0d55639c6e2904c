//! Duplicate resolution module.
//!
//! This module provides functionality for:
//! - Picking the canonical (newest) release
//! - Comparing every older release's fingerprint map against it
//! - Grouping matching releases per relative path

pub mod resolver;

pub use resolver::{resolve, DuplicateSet, ResolveError};
