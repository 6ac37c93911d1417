//! Record types, error types, and the platform/filter contracts shared
//! between a scan driver and whatever hosts it.
//!
//! This crate is the data layer: the persisted record shapes
//! (`types`), the indexed per-disk inventory built out of them
//! (`disk`), the arena those indices are built on (`slab`), the error
//! type they raise (`error`), and the external collaborators a real
//! scan needs but this crate does not implement itself
//! (`portability`, `filters`).

#![deny(missing_docs)]

pub mod disk;
pub mod error;
pub mod filters;
pub mod portability;
pub mod slab;
pub mod types;
