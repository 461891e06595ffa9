//! Front-end bridge for Reelmark core.
//!
//! # Responsibility
//! - Re-export the use-case API consumed by the UI through FRB.

pub mod api;
