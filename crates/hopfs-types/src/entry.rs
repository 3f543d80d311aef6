//! Directory-entry record returned to the file-manager protocol layer.

use serde::{Deserialize, Serialize};

/// Kind of a directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    /// Regular file.
    File,
    /// Directory.
    Directory,
}

impl EntryKind {
    /// Returns true if this is a regular file.
    pub fn is_file(&self) -> bool {
        matches!(self, EntryKind::File)
    }

    /// Returns true if this is a directory.
    pub fn is_dir(&self) -> bool {
        matches!(self, EntryKind::Directory)
    }
}

/// One entry in the virtual filesystem, in the shape the file-manager
/// client consumes.
///
/// `id` and `parent_id` are opaque identifiers produced by [`crate::ident`];
/// the client only ever echoes them back, it never decodes them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolumeEntry {
    /// Display name (last path component).
    pub name: String,
    /// Opaque identifier for this entry.
    pub id: String,
    /// Opaque identifier of the containing directory. Empty for the root.
    pub parent_id: String,
    /// Identifier of the owning volume instance.
    pub volume_id: String,
    /// Size in bytes (0 for directories).
    pub size: u64,
    /// File or directory.
    pub kind: EntryKind,
    /// Entry is readable.
    pub read: bool,
    /// Entry is writable.
    pub write: bool,
    /// Entry may not be renamed or removed.
    pub locked: bool,
}

impl VolumeEntry {
    /// Entry for a synthetic directory (root, host, or login level).
    pub fn directory(
        name: impl Into<String>,
        id: impl Into<String>,
        parent_id: impl Into<String>,
        volume_id: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            id: id.into(),
            parent_id: parent_id.into(),
            volume_id: volume_id.into(),
            size: 0,
            kind: EntryKind::Directory,
            read: true,
            write: true,
            locked: false,
        }
    }

    /// Mark the entry as locked (not renamable/removable).
    pub fn locked(mut self) -> Self {
        self.locked = true;
        self
    }
}
