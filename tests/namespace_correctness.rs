#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::doc_markdown,
    missing_docs
)]

mod common;

use chirp_fs::fs::{DirEntry, Namespace, NamespaceError, Node, NodeKind, OpenFlags};

use common::remote_mocks::{Call, MockRemote, MockRemoteState};
use common::{ROOT, connect, sample_tree};

const TEMP01: &[u8] = b"Name: Temp01\nID: abc123\nOwner: Alice (a@x.com)\n";

#[tokio::test]
async fn connect_fetches_only_the_root() {
    let (_ns, remote) = connect(sample_tree()).await;
    assert_eq!(remote.calls(Call::Location, ROOT), 1);
    assert_eq!(remote.total_calls(), 1, "nothing below the root is fetched eagerly");
}

#[tokio::test]
async fn connect_fails_with_io_when_root_is_unreachable() {
    let remote = MockRemote::new(sample_tree());
    remote.fail(Call::Location, ROOT);
    let err = Namespace::connect(remote, ROOT).await.err().unwrap();
    assert!(matches!(err, NamespaceError::Io(_)), "got {err:?}");
}

#[tokio::test]
async fn resolve_nested_directory() {
    let (ns, _remote) = connect(sample_tree()).await;
    let node = ns.resolve("/A/B").await.unwrap();
    assert_eq!(node.kind(), NodeKind::Directory);
    assert_eq!(node.meta().id(), "loc-b");
    assert_eq!(node.meta().name(), "B");
}

#[tokio::test]
async fn resolve_device_yields_file_sized_to_rendered_content() {
    let (ns, _remote) = connect(sample_tree()).await;
    let node = ns.resolve("/A/Temp01").await.unwrap();
    assert_eq!(node.kind(), NodeKind::File);

    let attrs = ns.get_attributes("/A/Temp01").await.unwrap();
    assert_eq!(attrs.kind, NodeKind::File);
    assert_eq!(attrs.size, TEMP01.len() as u64);
}

#[tokio::test]
async fn resolve_missing_segment_is_not_found() {
    let (ns, _remote) = connect(sample_tree()).await;
    let err = ns.resolve("/A/missing").await.unwrap_err();
    assert!(matches!(err, NamespaceError::NotFound(_)), "got {err:?}");

    let err = ns.resolve("/nope/B").await.unwrap_err();
    assert!(matches!(err, NamespaceError::NotFound(_)), "got {err:?}");
}

#[tokio::test]
async fn device_cannot_be_traversed_as_a_directory() {
    let (ns, _remote) = connect(sample_tree()).await;
    let err = ns.resolve("/A/Temp01/anything").await.unwrap_err();
    assert!(matches!(err, NamespaceError::NotFound(_)), "got {err:?}");
}

#[tokio::test]
async fn empty_segments_are_ignored() {
    let (ns, _remote) = connect(sample_tree()).await;
    let node = ns.resolve("//A///B/").await.unwrap();
    assert_eq!(node.meta().id(), "loc-b");
}

#[tokio::test]
async fn root_path_resolves_without_fetching() {
    let (ns, remote) = connect(sample_tree()).await;
    for path in ["", "/", "//"] {
        let node = ns.resolve(path).await.unwrap();
        assert!(matches!(node, Node::Directory(_)));
        assert_eq!(node.meta().id(), ROOT);
    }
    assert_eq!(remote.total_calls(), 1);

    let attrs = ns.get_attributes("/").await.unwrap();
    assert_eq!(attrs.kind, NodeKind::Directory);
    assert_eq!(attrs.size, 0);
}

#[tokio::test]
async fn open_for_read_returns_exact_content() {
    let (ns, _remote) = connect(sample_tree()).await;
    let content = ns
        .open_for_read("/A/Temp01", OpenFlags::RDONLY)
        .await
        .unwrap();
    assert_eq!(&content[..], TEMP01);
}

#[tokio::test]
async fn open_for_read_on_directory_is_not_found() {
    let (ns, _remote) = connect(sample_tree()).await;
    let err = ns.open_for_read("/A/B", OpenFlags::RDONLY).await.unwrap_err();
    assert!(matches!(err, NamespaceError::NotFound(_)), "got {err:?}");
}

#[tokio::test]
async fn write_intent_is_rejected_before_touching_the_namespace() {
    let (ns, remote) = connect(sample_tree()).await;
    for flags in [
        OpenFlags::WRONLY,
        OpenFlags::RDWR,
        OpenFlags::RDONLY | OpenFlags::APPEND,
        OpenFlags::RDONLY | OpenFlags::TRUNC,
        OpenFlags::WRONLY | OpenFlags::CREAT,
    ] {
        let err = ns.open_for_read("/A/Temp01", flags).await.unwrap_err();
        assert!(matches!(err, NamespaceError::PermissionDenied), "got {err:?}");
    }

    assert_eq!(remote.total_calls(), 1, "only the root fetch from connect");
    let state = ns.root().try_state().unwrap();
    assert!(!state.children_loaded());
    assert!(!state.devices_loaded());
    assert!(state.children().is_empty());
}

#[tokio::test]
async fn content_is_fetched_once_and_cached_forever() {
    let (ns, remote) = connect(sample_tree()).await;
    ns.get_attributes("/A/Temp01").await.unwrap();
    ns.open_for_read("/A/Temp01", OpenFlags::RDONLY)
        .await
        .unwrap();
    ns.open_for_read("/A/Temp01", OpenFlags::RDONLY)
        .await
        .unwrap();
    assert_eq!(remote.calls(Call::DeviceInfo, "abc123"), 1);

    let Node::Leaf(leaf) = ns.resolve("/A/Temp01").await.unwrap() else {
        panic!("expected a leaf");
    };
    assert_eq!(leaf.cached_content().as_deref(), Some(TEMP01));
    assert_eq!(leaf.owner_name(), "Alice");
    assert_eq!(leaf.owner_email(), "a@x.com");
}

#[tokio::test]
async fn list_entries_of_root_and_nested_directory() {
    let (ns, _remote) = connect(sample_tree()).await;

    let root = ns.list_entries("/").await.unwrap();
    assert_eq!(
        root,
        vec![
            DirEntry {
                name: "A".to_owned(),
                kind: NodeKind::Directory
            },
            DirEntry {
                name: "C".to_owned(),
                kind: NodeKind::Directory
            },
        ]
    );

    let a = ns.list_entries("/A").await.unwrap();
    assert_eq!(
        a,
        vec![
            DirEntry {
                name: "B".to_owned(),
                kind: NodeKind::Directory
            },
            DirEntry {
                name: "Temp01".to_owned(),
                kind: NodeKind::File
            },
        ]
    );

    assert!(ns.list_entries("/A/B").await.unwrap().is_empty());
}

#[tokio::test]
async fn list_entries_of_a_device_or_missing_path_is_not_found() {
    let (ns, _remote) = connect(sample_tree()).await;
    for path in ["/A/Temp01", "/A/missing"] {
        let err = ns.list_entries(path).await.unwrap_err();
        assert!(matches!(err, NamespaceError::NotFound(_)), "{path}: got {err:?}");
    }
}

#[tokio::test]
async fn second_ensure_children_fetches_nothing() {
    let (ns, remote) = connect(sample_tree()).await;
    ns.ensure_children(ns.root()).await.unwrap();
    let after_first = remote.total_calls();

    ns.ensure_children(ns.root()).await.unwrap();
    assert_eq!(remote.total_calls(), after_first);
    assert_eq!(remote.calls(Call::Location, "loc-a"), 1);
    assert_eq!(remote.calls(Call::Location, "loc-c"), 1);
}

#[tokio::test]
async fn ensure_children_does_not_load_devices() {
    let (ns, remote) = connect(sample_tree()).await;
    ns.ensure_children(ns.root()).await.unwrap();
    assert_eq!(remote.calls(Call::LocationDevices, ROOT), 0);

    let state = ns.root().try_state().unwrap();
    assert!(state.children_loaded());
    assert!(!state.devices_loaded());
}

#[tokio::test]
async fn pair_population_skips_an_already_loaded_half() {
    let (ns, remote) = connect(sample_tree()).await;
    ns.ensure_devices(ns.root()).await.unwrap();
    ns.ensure_children_and_devices(ns.root()).await.unwrap();
    assert_eq!(remote.calls(Call::LocationDevices, ROOT), 1);

    ns.ensure_children_and_devices(ns.root()).await.unwrap();
    assert_eq!(remote.calls(Call::LocationDevices, ROOT), 1);
    assert_eq!(remote.calls(Call::Location, ROOT), 1, "child ids come from connect");
}

#[tokio::test]
async fn duplicate_children_get_numbered_in_remote_order() {
    let state = MockRemoteState::default()
        .location(ROOT, "root", &["x1", "x2", "x3", "x4"])
        .location("x1", "X", &[])
        .location("x2", "X", &[])
        .location("x3", "X", &[])
        .location("x4", "X", &[]);
    let (ns, _remote) = connect(state).await;

    let names: Vec<_> = ns
        .list_entries("/")
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.name)
        .collect();
    assert_eq!(names, ["X", "X2", "X3", "X4"]);

    for (name, id) in [("X", "x1"), ("X2", "x2"), ("X3", "x3"), ("X4", "x4")] {
        let node = ns.resolve(name).await.unwrap();
        assert_eq!(node.meta().id(), id);
        assert_eq!(node.meta().display_name(), "X");
    }
}

#[tokio::test]
async fn duplicate_devices_are_numbered_independently_of_children() {
    let state = MockRemoteState::default()
        .location(ROOT, "root", &["lab"])
        .location("lab", "Sensor", &[])
        .device(ROOT, "d1", "Sensor", "Bob", "b@x.com")
        .device(ROOT, "d2", "Sensor", "Bob", "b@x.com");
    let (ns, _remote) = connect(state).await;

    let entries = ns.list_entries("/").await.unwrap();
    let mut summary: Vec<_> = entries.iter().map(|e| (e.name.as_str(), e.kind)).collect();
    summary.sort_by_key(|(name, kind)| (*name, *kind == NodeKind::File));
    assert_eq!(
        summary,
        [
            ("Sensor", NodeKind::Directory),
            ("Sensor", NodeKind::File),
            ("Sensor2", NodeKind::File),
        ]
    );

    // A name present in both maps resolves to the directory.
    assert_eq!(ns.resolve("/Sensor").await.unwrap().kind(), NodeKind::Directory);
    let node = ns.resolve("/Sensor2").await.unwrap();
    assert_eq!(node.meta().id(), "d2");
}

#[tokio::test]
async fn device_sharing_a_name_with_a_sub_location_is_still_readable() {
    let state = MockRemoteState::default()
        .location(ROOT, "root", &["lab"])
        .location("lab", "Sensor", &[])
        .device(ROOT, "d1", "Sensor", "Bob", "b@x.com");
    let (ns, remote) = connect(state).await;

    let content = ns.open_for_read("/Sensor", OpenFlags::RDONLY).await.unwrap();
    assert_eq!(&content[..], b"Name: Sensor\nID: d1\nOwner: Bob (b@x.com)\n");
    assert_eq!(remote.calls(Call::DeviceInfo, "d1"), 1);

    // Attributes still report the sub-location.
    let attrs = ns.get_attributes("/Sensor").await.unwrap();
    assert_eq!(attrs.kind, NodeKind::Directory);
}

#[tokio::test]
async fn children_are_populated_from_ids_already_known() {
    let (ns, remote) = connect(sample_tree()).await;
    ns.list_entries("/A").await.unwrap();

    assert_eq!(remote.calls(Call::Location, ROOT), 1);
    assert_eq!(remote.calls(Call::Location, "loc-a"), 1);
    assert_eq!(remote.calls(Call::Location, "loc-b"), 1);
}

#[tokio::test]
async fn names_that_are_not_path_components_are_replaced() {
    let state = MockRemoteState::default()
        .location(ROOT, "root", &["slashy", "unnamed"])
        .location("slashy", "Floor 1/East", &[])
        .location("unnamed", "", &[]);
    let (ns, _remote) = connect(state).await;

    assert_eq!(ns.resolve("/Floor 1_East").await.unwrap().meta().id(), "slashy");
    assert_eq!(ns.resolve("/unnamed").await.unwrap().meta().id(), "unnamed");
}
