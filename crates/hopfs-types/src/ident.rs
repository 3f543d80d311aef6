//! One-way identifier codec.
//!
//! The file-manager protocol addresses entries by opaque ids. The gateway
//! always re-derives ids from virtual paths it already computed, so the
//! codec only ever runs in the encode direction: deterministic, and
//! collision-free across distinct paths within one volume instance.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use uuid::Uuid;

/// Namespace for volume instance ids.
const VOLUME_NS: Uuid = Uuid::from_bytes([
    0x68, 0x6f, 0x70, 0x66, 0x73, 0x2d, 0x76, 0x6f, 0x6c, 0x75, 0x6d, 0x65, 0x2d, 0x6e, 0x73,
    0x00,
]);

/// Deterministic volume instance id for one user + client address pair.
pub fn volume_id(user: &str, client_addr: &str) -> String {
    Uuid::new_v5(&VOLUME_NS, format!("{user}@{client_addr}").as_bytes())
        .simple()
        .to_string()
}

/// Opaque entry id for a virtual path within a volume.
///
/// The path is base64url-encoded (no padding) and prefixed with the
/// volume id, so ids from different instances never collide and the
/// encoding is injective per instance.
pub fn encode(volume_id: &str, virtual_path: &str) -> String {
    format!("{}_{}", volume_id, URL_SAFE_NO_PAD.encode(virtual_path))
}
