//! chirp-fs shared library.
//!
//! A lazily populated, concurrently walkable cache of a remote location tree, plus the FUSE
//! adapter that serves it.

/// Namespace cache, node model and FUSE adapter.
pub mod fs;
/// Remote service abstraction.
pub mod remote;
