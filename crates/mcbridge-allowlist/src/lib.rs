//! Allowlist provenance tracking and reconciliation.
//!
//! The game server owns the authoritative allowlist; this crate owns the local
//! record of who authorized each entry. Every command handler reconciles the
//! two before acting, because operators and crashes can change the server
//! list behind the bridge's back.

mod allowlist_commands;
mod allowlist_patterns;
mod member_directory;
mod player_name;
mod provenance_store;
mod reconcile;

pub use allowlist_commands::*;
pub use allowlist_patterns::*;
pub use member_directory::*;
pub use player_name::*;
pub use provenance_store::*;
pub use reconcile::*;
