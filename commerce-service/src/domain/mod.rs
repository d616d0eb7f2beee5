//! Pure calculation and policy logic for commerce documents.
//!
//! Everything here is synchronous and side-effect free; the persistence
//! adapter applies the results inside the transaction that triggered them.

pub mod convert;
pub mod lifecycle;
pub mod pricing;
pub mod totals;
pub mod weight;
