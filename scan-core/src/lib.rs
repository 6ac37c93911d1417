//! The filesystem-state reconciliation engine: walks a disk, compares
//! it against a previously persisted [`disk_types::disk::Disk`]
//! inventory, and classifies every entry into equal / moved / restored
//! / changed / removed / inserted while keeping the block-addressed
//! parity map consistent.
//!
//! [`driver::ScanDriver`] is the entry point; it orchestrates the
//! [`walker`], [`identity`] and [`link_resolver`] modules per disk and
//! applies the cross-disk mass-removal guard once every disk has been
//! scanned.

#![deny(missing_docs)]

pub mod deferred;
pub mod driver;
pub mod error;
pub mod identity;
pub mod link_resolver;
pub mod report;
pub mod walker;
