//! Shared types for hopfs.
//!
//! Leaf crate with no async machinery: the inventory records describing
//! which hosts and login identities a user may reach, the directory-entry
//! record handed back to the file-manager protocol layer, and the one-way
//! identifier codec that turns virtual paths into opaque entry ids.

mod entry;
mod host;
pub mod ident;

pub use entry::{EntryKind, VolumeEntry};
pub use host::{AuthMethod, HostInfo, LoginInfo};
