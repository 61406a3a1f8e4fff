//! Snapshot persistence against an on-disk database.

use ripple::{
    DependencyGraph, FactSheet, ImpactConfig, NodeId, Relation, RepositoryId, Session,
    SnapshotKey, SnapshotStore, build_graph, compute_impact,
};
use tempfile::TempDir;

fn facts() -> Vec<FactSheet> {
    vec![
        FactSheet::new("auth.py")
            .with_function("login")
            .with_import("db")
            .with_call("login", "connect"),
        FactSheet::new("db.py").with_function("connect").with_class("Pool"),
    ]
}

fn key(commit: &str) -> SnapshotKey {
    SnapshotKey::new()
        .with(&RepositoryId::new("api").expect("valid repository id"), commit)
        .expect("valid commit")
}

#[test]
fn snapshot_survives_reopening_the_database() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("state").join("snapshots.db");
    let repository = RepositoryId::new("api").expect("valid repository id");
    let mut graph = DependencyGraph::new();
    build_graph(&mut graph, &repository, &facts());

    {
        let store = SnapshotStore::open(&path).expect("open");
        store.save(&key("c1"), &graph.to_snapshot()).expect("save");
    }

    let store = SnapshotStore::open(&path).expect("reopen");
    let snapshot = store.load(&key("c1")).expect("load").expect("present");
    let restored = DependencyGraph::from_snapshot(&snapshot).expect("restore");

    assert_eq!(restored.node_count(), graph.node_count());
    assert_eq!(restored.edge_count(), graph.edge_count());
    let connect = NodeId::function(&repository, "db.py", "connect");
    let config = ImpactConfig::default();
    assert_eq!(
        compute_impact(&restored, &[connect.clone()], &[], &config),
        compute_impact(&graph, &[connect], &[], &config),
    );
}

#[test]
fn snapshots_are_listed_by_key_and_deleted_individually() {
    let dir = TempDir::new().expect("temp dir");
    let store = SnapshotStore::open(&dir.path().join("snapshots.db")).expect("open");
    let mut graph = DependencyGraph::new();
    build_graph(&mut graph, &RepositoryId::new("api").expect("valid repository id"), &facts());
    let snapshot = graph.to_snapshot();

    store.save(&key("c2"), &snapshot).expect("save c2");
    store.save(&key("c1"), &snapshot).expect("save c1");
    store
        .save(&"api@c1,web@w9".parse().expect("valid key"), &snapshot)
        .expect("save multi-repo key");

    let keys: Vec<String> = store
        .list()
        .expect("list")
        .into_iter()
        .map(|summary| summary.key.to_string())
        .collect();
    assert_eq!(keys, vec!["api@c1", "api@c1,web@w9", "api@c2"]);

    assert!(store.delete(&key("c1")).expect("delete"));
    assert!(!store.delete(&key("c1")).expect("second delete"));
    assert!(store.load(&key("c1")).expect("load").is_none());
    assert_eq!(store.list().expect("list").len(), 2);
}

#[test]
fn saving_under_an_existing_key_replaces_the_snapshot() {
    let dir = TempDir::new().expect("temp dir");
    let store = SnapshotStore::open(&dir.path().join("snapshots.db")).expect("open");
    let repository = RepositoryId::new("api").expect("valid repository id");
    let mut graph = DependencyGraph::new();
    build_graph(&mut graph, &repository, &facts());
    store.save(&key("c1"), &graph.to_snapshot()).expect("first save");

    build_graph(
        &mut graph,
        &repository,
        &[FactSheet::new("db.py").with_function("connect")],
    );
    store.save(&key("c1"), &graph.to_snapshot()).expect("second save");

    let summaries = store.list().expect("list");
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].node_count, graph.node_count());
    assert_eq!(summaries[0].edge_count, graph.edge_count());
}

#[test]
fn session_restores_graph_from_file_store() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("snapshots.db");
    let repository = RepositoryId::new("api").expect("valid repository id");

    let mut writer = Session::new();
    writer.build_graph(&repository, &facts());
    writer
        .save_snapshot(&SnapshotStore::open(&path).expect("open"), &key("c1"))
        .expect("save");

    let mut reader = Session::new();
    let store = SnapshotStore::open(&path).expect("reopen");
    assert!(!reader.load_snapshot(&store, &key("missing")).expect("load missing"));
    assert!(reader.load_snapshot(&store, &key("c1")).expect("load"));

    let graph = reader.graph().expect("graph loaded");
    assert!(graph.contains(&NodeId::class(&repository, "db.py", "Pool")));
}

#[test]
fn linked_snapshot_relinks_after_rebuild_in_new_session() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("snapshots.db");
    let gateway = RepositoryId::new("gateway").expect("valid repository id");
    let auth = RepositoryId::new("auth").expect("valid repository id");
    let routes = [FactSheet::new("routes.py")
        .with_function("handle")
        .with_call("handle", "auth_client.validate_token")];
    let key: SnapshotKey = "auth@a1,gateway@g1".parse().expect("valid key");

    let mut writer = Session::new();
    writer.build_graph(&gateway, &routes);
    writer.build_graph(&auth, &[FactSheet::new("service.py").with_function("validate_token")]);
    writer.link_cross_repository().expect("link");
    writer
        .save_snapshot(&SnapshotStore::open(&path).expect("open"), &key)
        .expect("save");

    let mut reader = Session::new();
    assert!(reader
        .load_snapshot(&SnapshotStore::open(&path).expect("reopen"), &key)
        .expect("load"));
    reader.build_graph(&gateway, &routes);

    let graph = reader.graph().expect("graph");
    assert!(graph.has_edge(
        &NodeId::function(&gateway, "routes.py", "handle"),
        &NodeId::function(&auth, "service.py", "validate_token"),
        Relation::CrossRepoCall,
    ));
}
