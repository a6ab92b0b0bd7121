//! Foundational low-level utilities shared across mcbridge crates.
//!
//! Provides the atomic file-write helper used by provenance persistence and
//! settings bootstrap, plus the text truncation used in diagnostics.

pub mod atomic_io;
pub mod text_utils;

pub use atomic_io::write_text_atomic;
pub use text_utils::truncate_for_log;
