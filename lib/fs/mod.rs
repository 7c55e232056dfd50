//! The cached location namespace and its filesystem-facing types.
/// FUSE adapter: maps [`fuser::Filesystem`] callbacks to [`namespace::Namespace`].
pub mod fuser;
/// Lock-coupled path resolution and lazy population.
pub mod namespace;
/// Directory and leaf nodes of the cached tree.
pub mod node;

pub use namespace::Namespace;
pub use node::{DirectoryNode, LeafNode, Node, NodeMeta};

use bitflags::bitflags;
use thiserror::Error;

use crate::remote::RemoteError;

bitflags! {
    /// Flags for opening a file, similar to Unix open(2) flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct OpenFlags: i32 {
        /// Open for reading only.
        const RDONLY = libc::O_RDONLY;
        /// Open for writing only.
        const WRONLY = libc::O_WRONLY;
        /// Open for reading and writing.
        const RDWR = libc::O_RDWR;

        /// Append on each write.
        const APPEND = libc::O_APPEND;
        /// Truncate to zero length.
        const TRUNC = libc::O_TRUNC;
        /// Create file if it does not exist.
        const CREAT = libc::O_CREAT;
        /// Error if file already exists (with `CREAT`).
        const EXCL = libc::O_EXCL;

        /// Non-blocking mode.
        const NONBLOCK = libc::O_NONBLOCK;
        /// Do not follow symlinks.
        const NOFOLLOW = libc::O_NOFOLLOW;
        /// Set close-on-exec.
        const CLOEXEC = libc::O_CLOEXEC;
        /// Fail if not a directory.
        const DIRECTORY = libc::O_DIRECTORY;

        /// Every flag that implies the caller intends to modify the file.
        const ANY_WRITE = Self::WRONLY.bits()
            | Self::RDWR.bits()
            | Self::APPEND.bits()
            | Self::TRUNC.bits()
            | Self::CREAT.bits();
    }
}

impl OpenFlags {
    /// Whether these flags ask for anything other than reading.
    #[must_use]
    pub fn is_write_intent(self) -> bool {
        self.intersects(Self::ANY_WRITE)
    }
}

/// The kind of a namespace entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// A location.
    Directory,
    /// A device rendered as a small text file.
    File,
}

/// Attributes returned by [`Namespace::get_attributes`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attributes {
    /// Directory or file.
    pub kind: NodeKind,
    /// Byte length of the rendered content; zero for directories.
    pub size: u64,
}

/// One entry of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// Local, sibling-unique name.
    pub name: String,
    /// Directory or file.
    pub kind: NodeKind,
}

/// Everything a namespace operation can fail with.
#[derive(Debug, Error)]
pub enum NamespaceError {
    /// A path segment is neither a sub-location nor a device of its parent.
    #[error("no such entry: {0}")]
    NotFound(String),

    /// Fetching from the remote service failed. Nothing was cached; the next call retries.
    #[error("remote fetch failed")]
    Io(#[from] RemoteError),

    /// A write was requested against the read-only namespace.
    #[error("the namespace is read-only")]
    PermissionDenied,
}

impl NamespaceError {
    /// The errno reported to the kernel for this error.
    #[must_use]
    pub fn errno(&self) -> i32 {
        match self {
            Self::NotFound(_) => libc::ENOENT,
            Self::Io(_) => libc::EIO,
            Self::PermissionDenied => libc::EPERM,
        }
    }
}

impl From<NamespaceError> for std::io::Error {
    fn from(e: NamespaceError) -> Self {
        Self::from_raw_os_error(e.errno())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_only_flags_are_not_write_intent() {
        assert!(!OpenFlags::RDONLY.is_write_intent());
        assert!(!(OpenFlags::RDONLY | OpenFlags::NOFOLLOW | OpenFlags::CLOEXEC).is_write_intent());
    }

    #[test]
    fn any_write_flag_is_write_intent() {
        for flags in [
            OpenFlags::WRONLY,
            OpenFlags::RDWR,
            OpenFlags::APPEND,
            OpenFlags::TRUNC,
            OpenFlags::CREAT | OpenFlags::EXCL,
        ] {
            assert!(flags.is_write_intent(), "{flags:?} should be write intent");
        }
    }

    #[test]
    fn errors_map_to_distinct_errnos() {
        let not_found: std::io::Error = NamespaceError::NotFound("/a".to_owned()).into();
        let io: std::io::Error = NamespaceError::Io(RemoteError::new("boom")).into();
        let denied: std::io::Error = NamespaceError::PermissionDenied.into();
        assert_eq!(not_found.raw_os_error(), Some(libc::ENOENT));
        assert_eq!(io.raw_os_error(), Some(libc::EIO));
        assert_eq!(denied.raw_os_error(), Some(libc::EPERM));
    }
}
