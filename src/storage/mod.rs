//! Storage layer - page formats.
//!
//! This module holds the on-page representation handed to the page manager:
//! - [`page`] - Page types and layouts
//!
//! Disk I/O belongs to the page manager and is not part of this crate.

pub mod page;
