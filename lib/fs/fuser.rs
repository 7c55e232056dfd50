//! FUSE adapter: maps [`fuser::Filesystem`] callbacks to [`Namespace`].
//!
//! The kernel speaks in inode numbers while the namespace speaks in paths, so the adapter keeps
//! a table handing out one stable inode number per path it has reported to the kernel. Like the
//! namespace itself, the table never shrinks.

use std::ffi::OsStr;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use bytes::Bytes;
use rustc_hash::FxHashMap;
use tracing::{debug, instrument};

use super::namespace::Namespace;
use super::{Attributes, NodeKind, OpenFlags};
use crate::remote::RemoteClient;

/// Inode number of the mount root.
pub const ROOT_INO: u64 = 1;

const BLOCK_SIZE: u32 = 4096;
const MAX_NAME_LENGTH: u32 = 255;
const DIR_PERM: u16 = 0o755;
const FILE_PERM: u16 = 0o644;

/// Convert an I/O error to the corresponding errno value for FUSE replies.
#[expect(
    clippy::wildcard_enum_match_arm,
    reason = "ErrorKind is non_exhaustive; EIO is the safe default"
)]
fn io_to_errno(e: &std::io::Error) -> i32 {
    e.raw_os_error().unwrap_or_else(|| match e.kind() {
        std::io::ErrorKind::NotFound => libc::ENOENT,
        std::io::ErrorKind::PermissionDenied => libc::EPERM,
        _ => libc::EIO,
    })
}

/// Trait abstracting the `.error(errno)` method common to all fuser reply types.
trait FuseReply {
    fn error(self, errno: i32);
}

macro_rules! impl_fuse_reply {
    ($($ty:ty),* $(,)?) => {
        $(impl FuseReply for $ty {
            fn error(self, errno: i32) {
                // Calls the inherent fuser method (not this trait method).
                self.error(errno);
            }
        })*
    };
}

impl_fuse_reply!(
    fuser::ReplyEntry,
    fuser::ReplyAttr,
    fuser::ReplyDirectory,
    fuser::ReplyOpen,
    fuser::ReplyData,
);

/// Extension trait on `Result<T, std::io::Error>` for FUSE reply handling.
trait FuseResultExt<T> {
    fn fuse_reply<R: FuseReply>(self, reply: R, on_ok: impl FnOnce(T, R));
}

impl<T> FuseResultExt<T> for Result<T, std::io::Error> {
    fn fuse_reply<R: FuseReply>(self, reply: R, on_ok: impl FnOnce(T, R)) {
        match self {
            Ok(val) => on_ok(val, reply),
            Err(e) => {
                debug!(error = %e, "replying error");
                reply.error(io_to_errno(&e));
            }
        }
    }
}

/// Append `name` to a slash-separated directory path.
fn join_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_owned()
    } else {
        format!("{parent}/{name}")
    }
}

/// Bidirectional path <-> inode number table.
#[derive(Debug)]
struct InodeTable {
    paths: FxHashMap<u64, String>,
    inodes: FxHashMap<String, u64>,
    next_ino: u64,
}

impl InodeTable {
    fn new() -> Self {
        let mut table = Self {
            paths: FxHashMap::default(),
            inodes: FxHashMap::default(),
            next_ino: ROOT_INO + 1,
        };
        table.paths.insert(ROOT_INO, String::new());
        table.inodes.insert(String::new(), ROOT_INO);
        table
    }

    fn path(&self, ino: u64) -> Result<&str, std::io::Error> {
        self.paths
            .get(&ino)
            .map(String::as_str)
            .ok_or_else(|| std::io::Error::from_raw_os_error(libc::ENOENT))
    }

    fn ino_for(&mut self, path: &str) -> u64 {
        if let Some(&ino) = self.inodes.get(path) {
            return ino;
        }
        let ino = self.next_ino;
        self.next_ino += 1;
        self.paths.insert(ino, path.to_owned());
        self.inodes.insert(path.to_owned(), ino);
        ino
    }
}

fn to_fuser_kind(kind: NodeKind) -> fuser::FileType {
    match kind {
        NodeKind::Directory => fuser::FileType::Directory,
        NodeKind::File => fuser::FileType::RegularFile,
    }
}

/// Bridges a [`Namespace`] to the [`fuser::Filesystem`] trait.
///
/// Owns the path table, the content of every open file, and a tokio runtime handle for
/// blocking on namespace operations.
pub struct FuserAdapter<C: RemoteClient> {
    namespace: Arc<Namespace<C>>,
    inodes: InodeTable,
    open_files: FxHashMap<u64, Bytes>,
    next_fh: u64,
    fs_owner: (u32, u32),
    mounted_at: SystemTime,
    runtime: tokio::runtime::Handle,
}

impl<C: RemoteClient> FuserAdapter<C> {
    // The namespace never changes a cached entry, but new locations only show up in directories
    // that have not been listed yet, so keep the kernel's view short-lived anyway.
    const TTL: Duration = Duration::from_secs(1);

    /// Create an adapter serving `namespace`, with every entry owned by `fs_owner` (uid, gid).
    pub fn new(
        namespace: Arc<Namespace<C>>,
        fs_owner: (u32, u32),
        runtime: tokio::runtime::Handle,
    ) -> Self {
        Self {
            namespace,
            inodes: InodeTable::new(),
            open_files: FxHashMap::default(),
            next_fh: 1,
            fs_owner,
            mounted_at: SystemTime::now(),
            runtime,
        }
    }

    fn file_attr(&self, ino: u64, attrs: Attributes) -> fuser::FileAttr {
        let perm = match attrs.kind {
            NodeKind::Directory => DIR_PERM,
            NodeKind::File => FILE_PERM,
        };
        fuser::FileAttr {
            ino,
            size: attrs.size,
            blocks: attrs.size.div_ceil(512),
            atime: self.mounted_at,
            mtime: self.mounted_at,
            ctime: self.mounted_at,
            crtime: self.mounted_at,
            kind: to_fuser_kind(attrs.kind),
            perm,
            nlink: match attrs.kind {
                NodeKind::Directory => 2,
                NodeKind::File => 1,
            },
            uid: self.fs_owner.0,
            gid: self.fs_owner.1,
            rdev: 0,
            blksize: BLOCK_SIZE,
            flags: 0,
        }
    }

    fn child_path(&self, parent: u64, name: &OsStr) -> Result<String, std::io::Error> {
        let parent_path = self.inodes.path(parent)?;
        // Every name the namespace hands out came from JSON, so it is valid UTF-8.
        let name = name
            .to_str()
            .ok_or_else(|| std::io::Error::from_raw_os_error(libc::ENOENT))?;
        Ok(join_path(parent_path, name))
    }
}

impl<C: RemoteClient> fuser::Filesystem for FuserAdapter<C> {
    #[instrument(name = "FuserAdapter::lookup", skip(self, _req, reply))]
    fn lookup(
        &mut self,
        _req: &fuser::Request<'_>,
        parent: u64,
        name: &OsStr,
        reply: fuser::ReplyEntry,
    ) {
        let result = self.child_path(parent, name).and_then(|path| {
            let attrs = self.runtime.block_on(self.namespace.get_attributes(&path))?;
            Ok((path, attrs))
        });
        result.fuse_reply(reply, |(path, attrs), reply| {
            let ino = self.inodes.ino_for(&path);
            let attr = self.file_attr(ino, attrs);
            debug!(?attr, "replying...");
            reply.entry(&Self::TTL, &attr, 0);
        });
    }

    #[instrument(name = "FuserAdapter::getattr", skip(self, _req, _fh, reply))]
    fn getattr(
        &mut self,
        _req: &fuser::Request<'_>,
        ino: u64,
        _fh: Option<u64>,
        reply: fuser::ReplyAttr,
    ) {
        let result = self.inodes.path(ino).and_then(|path| {
            Ok(self.runtime.block_on(self.namespace.get_attributes(path))?)
        });
        result.fuse_reply(reply, |attrs, reply| {
            let attr = self.file_attr(ino, attrs);
            debug!(?attr, "replying...");
            reply.attr(&Self::TTL, &attr);
        });
    }

    #[instrument(name = "FuserAdapter::readdir", skip(self, _req, _fh, reply))]
    fn readdir(
        &mut self,
        _req: &fuser::Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        mut reply: fuser::ReplyDirectory,
    ) {
        let result = self.inodes.path(ino).map(str::to_owned).and_then(|path| {
            let entries = self.runtime.block_on(self.namespace.list_entries(&path))?;
            Ok((path, entries))
        });
        let (path, entries) = match result {
            Ok(listing) => listing,
            Err(e) => {
                debug!(error = %e, "replying error");
                reply.error(io_to_errno(&e));
                return;
            }
        };

        let parent_ino = match path.rsplit_once('/') {
            Some((parent, _)) => self.inodes.ino_for(parent),
            None => ROOT_INO,
        };
        let dots = [
            (ino, fuser::FileType::Directory, ".".to_owned()),
            (parent_ino, fuser::FileType::Directory, "..".to_owned()),
        ];
        let children = entries.into_iter().map(|entry| {
            let child_ino = self.inodes.ino_for(&join_path(&path, &entry.name));
            (child_ino, to_fuser_kind(entry.kind), entry.name)
        });
        let all: Vec<_> = dots.into_iter().chain(children).collect();

        let skip = usize::try_from(offset).unwrap_or(0);
        for (i, (entry_ino, kind, name)) in all.iter().enumerate().skip(skip) {
            let Ok(next_offset) = i64::try_from(i + 1) else {
                reply.error(libc::EIO);
                return;
            };
            if reply.add(*entry_ino, next_offset, *kind, name) {
                debug!("buffer full for now, stopping readdir");
                break;
            }
        }
        reply.ok();
    }

    #[instrument(name = "FuserAdapter::open", skip(self, _req, reply))]
    fn open(&mut self, _req: &fuser::Request<'_>, ino: u64, flags: i32, reply: fuser::ReplyOpen) {
        let flags = OpenFlags::from_bits_truncate(flags);
        let result = self.inodes.path(ino).and_then(|path| {
            Ok(self
                .runtime
                .block_on(self.namespace.open_for_read(path, flags))?)
        });
        result.fuse_reply(reply, |content, reply| {
            let fh = self.next_fh;
            self.next_fh += 1;
            self.open_files.insert(fh, content);
            debug!(handle = fh, "replying...");
            reply.opened(fh, fuser::consts::FOPEN_KEEP_CACHE);
        });
    }

    #[instrument(
        name = "FuserAdapter::read",
        skip(self, _req, _ino, _flags, _lock_owner, reply)
    )]
    fn read(
        &mut self,
        _req: &fuser::Request<'_>,
        _ino: u64,
        fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: fuser::ReplyData,
    ) {
        let Some(content) = self.open_files.get(&fh) else {
            debug!("file handle not open, replying error");
            reply.error(libc::EBADF);
            return;
        };
        let start = usize::try_from(offset).unwrap_or(usize::MAX).min(content.len());
        let end = start.saturating_add(size as usize).min(content.len());
        debug!(read_bytes = end - start, "replying...");
        reply.data(&content[start..end]);
    }

    #[instrument(
        name = "FuserAdapter::release",
        skip(self, _req, _ino, _flags, _lock_owner, _flush, reply)
    )]
    fn release(
        &mut self,
        _req: &fuser::Request<'_>,
        _ino: u64,
        fh: u64,
        _flags: i32,
        _lock_owner: Option<u64>,
        _flush: bool,
        reply: fuser::ReplyEmpty,
    ) {
        if self.open_files.remove(&fh).is_some() {
            reply.ok();
        } else {
            debug!("file handle not open, replying error");
            reply.error(libc::EBADF);
        }
    }

    #[instrument(name = "FuserAdapter::statfs", skip(self, _req, _ino, reply))]
    fn statfs(&mut self, _req: &fuser::Request<'_>, _ino: u64, reply: fuser::ReplyStatfs) {
        let known = self.inodes.paths.len() as u64;
        reply.statfs(0, 0, 0, known, 0, BLOCK_SIZE, MAX_NAME_LENGTH, 0);
    }
}
