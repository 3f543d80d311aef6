//! Virtual filesystem gateway.
//!
//! Presents a user's entitled remote hosts as one hierarchical namespace:
//!
//! ```text
//! /Home                  virtual root (locked)
//! /Home/web1             host node
//! /Home/web1/deploy      login node = the login's remote root
//! /Home/web1/deploy/...  real remote filesystem
//! ```
//!
//! [`Volume`] is the facade the file-manager protocol layer talks to. It
//! resolves virtual paths through the [`tree`], lazily connects login
//! sessions through a [`hopfs_remote::RemoteConnector`], translates paths
//! at the login boundary, and stages chunked uploads locally until they
//! are merged into the remote destination.

mod chunks;
mod config;
mod error;
mod session;
mod translate;
mod tree;
mod volume;

pub use chunks::ChunkAssembler;
pub use config::GatewayConfig;
pub use error::{GatewayError, GatewayResult};
pub use translate::translate;
pub use tree::{HierarchyTree, HostNode, LoginNode, Resolved};
pub use volume::Volume;
