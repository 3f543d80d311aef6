//! Remote file sessions for hopfs.
//!
//! This crate defines the seams between the gateway and the machines it
//! fronts:
//!
//! - [`RemoteFs`] — one ready-to-use file session on a remote host
//! - [`RemoteConnector`] / [`RemoteTransport`] — the transport collaborator
//!   that produces file sessions and recycles the underlying connections
//! - [`Inventory`] — the collaborator listing which hosts and logins a
//!   user is entitled to
//!
//! Two implementations ship here: [`sftp`] (russh + SFTP subsystem, the
//! production transport) and [`memory`] (an in-process fake used by tests
//! and local demos).

mod connect;
mod error;
mod fs;
pub mod memory;
pub mod sftp;

pub use connect::{Inventory, RemoteConnector, RemoteTransport, StaticInventory};
pub use error::{RemoteError, RemoteResult};
pub use fs::{FileKind, FileStat, RemoteDirEntry, RemoteFs, RemoteReader, RemoteWriter, WriteFlags};
