//! In-memory nodes of the cached location tree.
//!
//! Every node carries its own [`tokio::sync::Mutex`]. For a [`DirectoryNode`] the mutex guards
//! both child maps and their loaded flags; for a [`LeafNode`] it guards the rendered content. A
//! node is populated while its mutex is held, so the unpopulated -> populated transition is a
//! single critical section and concurrent callers simply queue behind the populator.

use std::collections::BTreeMap;
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::{Mutex, MutexGuard, OwnedMutexGuard};

use crate::remote::{DeviceDescriptor, LocationDescriptor};

/// Identity shared by both node variants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeMeta {
    id: String,
    display_name: String,
    name: String,
}

impl NodeMeta {
    fn new(id: String, display_name: String, name: String) -> Self {
        Self {
            id,
            display_name,
            name,
        }
    }

    /// Opaque remote identity.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The name the remote service reports.
    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// The sibling-unique name this node is reachable under.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Population state of a directory. Only ever touched through the directory's mutex.
#[derive(Debug, Default)]
pub struct DirState {
    pub(crate) children: BTreeMap<String, Arc<DirectoryNode>>,
    pub(crate) devices: BTreeMap<String, Arc<LeafNode>>,
    pub(crate) children_loaded: bool,
    pub(crate) devices_loaded: bool,
}

impl DirState {
    /// Whether both halves are cached.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.children_loaded && self.devices_loaded
    }

    /// Whether the sub-location map is cached.
    #[must_use]
    pub fn children_loaded(&self) -> bool {
        self.children_loaded
    }

    /// Whether the device map is cached.
    #[must_use]
    pub fn devices_loaded(&self) -> bool {
        self.devices_loaded
    }

    /// Sub-locations keyed by local name.
    #[must_use]
    pub fn children(&self) -> &BTreeMap<String, Arc<DirectoryNode>> {
        &self.children
    }

    /// Devices keyed by local name.
    #[must_use]
    pub fn devices(&self) -> &BTreeMap<String, Arc<LeafNode>> {
        &self.devices
    }

    /// Find `name` among sub-locations first, then among devices.
    pub(crate) fn lookup(&self, name: &str) -> Option<Node> {
        if let Some(dir) = self.children.get(name) {
            return Some(Node::Directory(Arc::clone(dir)));
        }
        self.devices.get(name).map(|leaf| Node::Leaf(Arc::clone(leaf)))
    }

    /// Find `name` among devices only, even if a sub-location shares it.
    pub(crate) fn lookup_device(&self, name: &str) -> Option<Arc<LeafNode>> {
        self.devices.get(name).map(Arc::clone)
    }
}

/// A location. Its sub-locations and devices are fetched lazily.
///
/// The ids of the sub-locations arrive with the location's own descriptor, so populating the
/// children only fetches the children's descriptors.
#[derive(Debug)]
pub struct DirectoryNode {
    meta: NodeMeta,
    child_ids: Vec<String>,
    state: Arc<Mutex<DirState>>,
}

impl DirectoryNode {
    pub(crate) fn new(descriptor: LocationDescriptor, name: String) -> Self {
        Self {
            meta: NodeMeta::new(descriptor.id, descriptor.name, name),
            child_ids: descriptor.children,
            state: Arc::new(Mutex::new(DirState::default())),
        }
    }

    /// Ids of the direct sub-locations, in remote order.
    #[must_use]
    pub fn child_ids(&self) -> &[String] {
        &self.child_ids
    }

    /// Identity of this location.
    #[must_use]
    pub fn meta(&self) -> &NodeMeta {
        &self.meta
    }

    /// Lock the population state, returning a guard that does not borrow `self`.
    ///
    /// Owned guards are what lets traversal hold a child's lock while releasing the parent's.
    pub async fn lock(&self) -> OwnedMutexGuard<DirState> {
        Arc::clone(&self.state).lock_owned().await
    }

    /// Non-blocking peek at the population state, for diagnostics and tests.
    pub fn try_state(&self) -> Option<MutexGuard<'_, DirState>> {
        self.state.try_lock().ok()
    }
}

/// A device. Its textual content is fetched on first read and then kept forever.
#[derive(Debug)]
pub struct LeafNode {
    meta: NodeMeta,
    owner_name: String,
    owner_email: String,
    content: Mutex<Option<Bytes>>,
}

impl LeafNode {
    pub(crate) fn new(descriptor: DeviceDescriptor, name: String) -> Self {
        Self {
            meta: NodeMeta::new(descriptor.id, descriptor.name, name),
            owner_name: descriptor.owner_name,
            owner_email: descriptor.owner_email,
            content: Mutex::new(None),
        }
    }

    /// Identity of this device.
    #[must_use]
    pub fn meta(&self) -> &NodeMeta {
        &self.meta
    }

    /// Owner name as reported by the device listing.
    #[must_use]
    pub fn owner_name(&self) -> &str {
        &self.owner_name
    }

    /// Owner email as reported by the device listing.
    #[must_use]
    pub fn owner_email(&self) -> &str {
        &self.owner_email
    }

    pub(crate) async fn lock_content(&self) -> MutexGuard<'_, Option<Bytes>> {
        self.content.lock().await
    }

    /// The cached content, if it has been materialized and nobody is materializing it right now.
    #[must_use]
    pub fn cached_content(&self) -> Option<Bytes> {
        self.content.try_lock().ok().and_then(|c| c.clone())
    }
}

/// What a path resolves to.
#[derive(Debug, Clone)]
pub enum Node {
    /// A location.
    Directory(Arc<DirectoryNode>),
    /// A device.
    Leaf(Arc<LeafNode>),
}

impl Node {
    /// Identity of the underlying node.
    #[must_use]
    pub fn meta(&self) -> &NodeMeta {
        match self {
            Self::Directory(dir) => dir.meta(),
            Self::Leaf(leaf) => leaf.meta(),
        }
    }

    /// Which kind of node this is.
    #[must_use]
    pub fn kind(&self) -> super::NodeKind {
        match self {
            Self::Directory(_) => super::NodeKind::Directory,
            Self::Leaf(_) => super::NodeKind::File,
        }
    }
}

/// Render the textual content of a device.
///
/// Exactly three newline-terminated lines with nothing after the last newline.
#[must_use]
pub fn render_device(device: &DeviceDescriptor) -> Bytes {
    Bytes::from(format!(
        "Name: {}\nID: {}\nOwner: {} ({})\n",
        device.name, device.id, device.owner_name, device.owner_email
    ))
}

/// Pick a name for `display_name` that is not yet a key of `taken`.
///
/// The first occurrence keeps the display name; later ones get a numeric suffix starting at 2.
/// Names that cannot be path components are replaced first (see [`path_safe_name`]), so the
/// replaced name competes with real ones: remote `a/b` and `a_b` end up as `a_b` and `a_b2`.
#[must_use]
pub fn unique_name<V>(taken: &BTreeMap<String, V>, display_name: &str, id: &str) -> String {
    let base = path_safe_name(display_name, id);
    if !taken.contains_key(&base) {
        return base;
    }
    (2u64..)
        .map(|generation| format!("{base}{generation}"))
        .find(|candidate| !taken.contains_key(candidate))
        .unwrap_or_else(|| unreachable!("suffix space is unbounded"))
}

/// Make a display name usable as a single path component.
///
/// Slashes and NULs become underscores; a name that is empty, `.` or `..` falls back to the
/// remote id.
#[must_use]
pub fn path_safe_name(display_name: &str, id: &str) -> String {
    match display_name {
        "" | "." | ".." => id.replace(['/', '\0'], "_"),
        other => other.replace(['/', '\0'], "_"),
    }
}
