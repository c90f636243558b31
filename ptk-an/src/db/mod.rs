//! Repository layer for ptk-an
//!
//! Thin async functions over the shared pool. Plant-identity and
//! measurement-uniqueness invariants live in the schema (UNIQUE
//! constraints), not in process state.

pub mod images;
pub mod measurements;
pub mod plants;
