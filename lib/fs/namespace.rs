//! Lazily populated, lock-coupled view of a remote location tree.
//!
//! Paths are walked one segment at a time from the root. Each directory is populated from the
//! [`RemoteClient`] the first time a walk needs it, while that directory's mutex is held, so
//! concurrent walks through the same unpopulated directory trigger exactly one fetch. Walks
//! descend hand-over-hand: the child's lock is acquired before the parent's is released, and no
//! walk ever holds more than two locks.
//!
//! Nothing is ever evicted or refreshed. A directory that failed to populate keeps its loaded
//! flags cleared and is re-fetched by the next walk that reaches it.

use std::collections::BTreeMap;
use std::sync::Arc;

use bytes::Bytes;
use futures::{StreamExt as _, TryStreamExt as _};
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, instrument, warn};

use super::node::{DirState, DirectoryNode, LeafNode, Node, render_device, unique_name};
use super::{Attributes, DirEntry, NamespaceError, NodeKind, OpenFlags};
use crate::remote::{RemoteClient, RemoteError};

/// Maximum number of sub-location descriptors fetched concurrently while populating one
/// directory.
const MAX_CHILD_FETCH_CONCURRENCY: usize = 8;

type Children = BTreeMap<String, Arc<DirectoryNode>>;
type Devices = BTreeMap<String, Arc<LeafNode>>;

/// Split a slash-separated path into its non-empty segments.
fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// The cached namespace rooted at one remote location.
pub struct Namespace<C: RemoteClient> {
    client: C,
    root: Arc<DirectoryNode>,
}

impl<C: RemoteClient> Namespace<C> {
    /// Fetch the root location and build a namespace around it.
    ///
    /// The root is fetched eagerly so that an unreachable service or bad credentials fail here,
    /// before anything is mounted.
    pub async fn connect(client: C, root_id: &str) -> Result<Self, NamespaceError> {
        let root = client.fetch_location(root_id).await.inspect_err(|e| {
            warn!(root_id, error = %e, "failed to fetch root location");
        })?;
        debug!(id = %root.id, name = %root.name, "fetched root location");
        let name = root.name.clone();
        Ok(Self {
            client,
            root: Arc::new(DirectoryNode::new(root, name)),
        })
    }

    /// The root directory.
    #[must_use]
    pub fn root(&self) -> &Arc<DirectoryNode> {
        &self.root
    }

    /// Resolve `path` to a node.
    ///
    /// Every intermediate directory gets its sub-locations populated; the final directory gets
    /// both sub-locations and devices populated, since the last segment may name either. A name
    /// present in both maps resolves to the sub-location.
    #[instrument(skip(self))]
    pub async fn resolve(&self, path: &str) -> Result<Node, NamespaceError> {
        let segments = segments(path);
        let Some((last, parents)) = segments.split_last() else {
            return Ok(Node::Directory(Arc::clone(&self.root)));
        };

        let (parent, mut state) = self.descend(parents, path).await?;
        self.ensure_children_and_devices_locked(&parent, &mut state)
            .await?;
        state.lookup(last).ok_or_else(|| {
            debug!(segment = last, "path segment not found");
            NamespaceError::NotFound(path.to_owned())
        })
    }

    /// Kind and size of the entry at `path`.
    ///
    /// For a device the size is the byte length of its rendered content, which is materialized
    /// if it was not already.
    #[instrument(skip(self))]
    pub async fn get_attributes(&self, path: &str) -> Result<Attributes, NamespaceError> {
        match self.resolve(path).await? {
            Node::Directory(_) => Ok(Attributes {
                kind: NodeKind::Directory,
                size: 0,
            }),
            Node::Leaf(leaf) => {
                let content = self.materialize(&leaf).await?;
                Ok(Attributes {
                    kind: NodeKind::File,
                    size: content.len() as u64,
                })
            }
        }
    }

    /// List the sub-locations and devices of the directory at `path`, sorted by name.
    #[instrument(skip(self))]
    pub async fn list_entries(&self, path: &str) -> Result<Vec<DirEntry>, NamespaceError> {
        let segments = segments(path);
        let (dir, mut state) = self.descend(&segments, path).await?;
        self.ensure_children_and_devices_locked(&dir, &mut state)
            .await?;

        let mut entries: Vec<DirEntry> = state
            .children
            .keys()
            .map(|name| DirEntry {
                name: name.clone(),
                kind: NodeKind::Directory,
            })
            .chain(state.devices.keys().map(|name| DirEntry {
                name: name.clone(),
                kind: NodeKind::File,
            }))
            .collect();
        drop(state);

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    /// Return the rendered content of the device at `path`.
    ///
    /// Write intent is rejected before the namespace is touched. The last segment is looked up
    /// among devices only, so a device stays readable when a sibling sub-location shares its name.
    #[instrument(skip(self))]
    pub async fn open_for_read(&self, path: &str, flags: OpenFlags) -> Result<Bytes, NamespaceError> {
        if flags.is_write_intent() {
            debug!(?flags, "rejecting write intent");
            return Err(NamespaceError::PermissionDenied);
        }

        let segments = segments(path);
        let Some((last, parents)) = segments.split_last() else {
            return Err(NamespaceError::NotFound(path.to_owned()));
        };

        let (parent, mut state) = self.descend(parents, path).await?;
        self.ensure_children_and_devices_locked(&parent, &mut state)
            .await?;
        let leaf = state.lookup_device(last).ok_or_else(|| {
            debug!(segment = last, "no such device");
            NamespaceError::NotFound(path.to_owned())
        })?;
        drop(state);

        self.materialize(&leaf).await
    }

    /// Return the leaf's content, fetching and rendering it on first use.
    ///
    /// Concurrent first reads of the same leaf share one fetch. A failed fetch caches nothing.
    pub async fn materialize(&self, leaf: &LeafNode) -> Result<Bytes, NamespaceError> {
        let mut content = leaf.lock_content().await;
        if let Some(bytes) = content.as_ref() {
            return Ok(bytes.clone());
        }

        debug!(id = leaf.meta().id(), name = leaf.meta().name(), "materializing device");
        let device = self
            .client
            .fetch_device_info(leaf.meta().id())
            .await
            .inspect_err(|e| warn!(id = leaf.meta().id(), error = %e, "failed to fetch device"))?;
        let rendered = render_device(&device);
        *content = Some(rendered.clone());
        Ok(rendered)
    }

    /// Populate the sub-locations of `dir` unless already cached.
    pub async fn ensure_children(&self, dir: &DirectoryNode) -> Result<(), NamespaceError> {
        let mut state = dir.lock().await;
        self.ensure_children_locked(dir, &mut state).await
    }

    /// Populate the devices of `dir` unless already cached.
    pub async fn ensure_devices(&self, dir: &DirectoryNode) -> Result<(), NamespaceError> {
        let mut state = dir.lock().await;
        self.ensure_devices_locked(dir, &mut state).await
    }

    /// Populate both maps of `dir`, fetching whichever halves are not yet cached.
    pub async fn ensure_children_and_devices(
        &self,
        dir: &DirectoryNode,
    ) -> Result<(), NamespaceError> {
        let mut state = dir.lock().await;
        self.ensure_children_and_devices_locked(dir, &mut state)
            .await
    }

    /// Walk `segments` from the root, treating every segment as a sub-location.
    ///
    /// Returns the final directory together with its held lock.
    async fn descend(
        &self,
        segments: &[&str],
        path: &str,
    ) -> Result<(Arc<DirectoryNode>, OwnedMutexGuard<DirState>), NamespaceError> {
        let mut current = Arc::clone(&self.root);
        let mut state = current.lock().await;

        for segment in segments {
            self.ensure_children_locked(&current, &mut state).await?;

            let Some(child) = state.children.get(*segment).map(Arc::clone) else {
                debug!(segment, parent = current.meta().name(), "path segment not found");
                return Err(NamespaceError::NotFound(path.to_owned()));
            };

            // Take the child's lock first; assigning the new guard releases the parent.
            let child_state = child.lock().await;
            state = child_state;
            current = child;
        }

        Ok((current, state))
    }

    async fn ensure_children_locked(
        &self,
        dir: &DirectoryNode,
        state: &mut DirState,
    ) -> Result<(), NamespaceError> {
        if state.children_loaded {
            return Ok(());
        }
        state.children = self.fetch_children(dir).await?;
        state.children_loaded = true;
        Ok(())
    }

    async fn ensure_devices_locked(
        &self,
        dir: &DirectoryNode,
        state: &mut DirState,
    ) -> Result<(), NamespaceError> {
        if state.devices_loaded {
            return Ok(());
        }
        state.devices = self.fetch_devices(dir).await?;
        state.devices_loaded = true;
        Ok(())
    }

    /// Fetch the missing halves concurrently and wait for both, even if one fails early.
    ///
    /// The pair is one unit for retry purposes: if either half fails, the half that succeeded
    /// has its map replaced but its flag left unset, so the next call fetches both again. When
    /// both fail the sub-location error is the one reported.
    async fn ensure_children_and_devices_locked(
        &self,
        dir: &DirectoryNode,
        state: &mut DirState,
    ) -> Result<(), NamespaceError> {
        if state.is_ready() {
            return Ok(());
        }

        let need_children = !state.children_loaded;
        let need_devices = !state.devices_loaded;
        let (children, devices) = tokio::join!(
            async {
                if need_children {
                    Some(self.fetch_children(dir).await)
                } else {
                    None
                }
            },
            async {
                if need_devices {
                    Some(self.fetch_devices(dir).await)
                } else {
                    None
                }
            },
        );

        let mut failure: Option<RemoteError> = None;
        match children {
            Some(Ok(map)) => state.children = map,
            Some(Err(e)) => failure = Some(e),
            None => {}
        }
        match devices {
            Some(Ok(map)) => state.devices = map,
            Some(Err(e)) => {
                failure.get_or_insert(e);
            }
            None => {}
        }

        if let Some(e) = failure {
            return Err(e.into());
        }
        state.children_loaded = true;
        state.devices_loaded = true;
        Ok(())
    }

    /// Fetch the descriptors of `dir`'s sub-locations and name them uniquely, in remote order.
    async fn fetch_children(&self, dir: &DirectoryNode) -> Result<Children, RemoteError> {
        let id = dir.meta().id();
        debug!(id, name = dir.meta().name(), "populating children");

        let fetches: Vec<_> = dir
            .child_ids()
            .iter()
            .map(|child_id| self.client.fetch_location(child_id))
            .collect();
        let descriptors: Vec<_> = futures::stream::iter(fetches)
            .buffered(MAX_CHILD_FETCH_CONCURRENCY)
            .try_collect()
            .await
            .inspect_err(|e| warn!(id, error = %e, "failed to fetch child location"))?;

        let mut children = Children::new();
        for descriptor in descriptors {
            let name = unique_name(&children, &descriptor.name, &descriptor.id);
            children.insert(name.clone(), Arc::new(DirectoryNode::new(descriptor, name)));
        }
        Ok(children)
    }

    /// Fetch the devices of `dir` and name them uniquely, in remote order.
    async fn fetch_devices(&self, dir: &DirectoryNode) -> Result<Devices, RemoteError> {
        let id = dir.meta().id();
        debug!(id, name = dir.meta().name(), "populating devices");

        let listing = self
            .client
            .fetch_location_devices(id)
            .await
            .inspect_err(|e| warn!(id, error = %e, "failed to fetch devices"))?;

        let mut devices = Devices::new();
        for descriptor in listing {
            let name = unique_name(&devices, &descriptor.name, &descriptor.id);
            devices.insert(name.clone(), Arc::new(LeafNode::new(descriptor, name)));
        }
        Ok(devices)
    }
}
