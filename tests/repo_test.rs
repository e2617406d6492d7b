/*!
 * Repository Tests
 * Cross-backend tests for the shared repository contract
 */

use repofs::{Composite, LocalStore, RepoError, Repository, Resource, ResourceSet, TreeStore};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use tempfile::TempDir;

#[test]
fn test_tree_store_contract_basics() {
    let store = TreeStore::new();

    // Root exists from construction and is empty
    assert!(store.contains("/"));
    assert!(store.list_children("/").unwrap().is_empty());

    store
        .add("/a/b/file", Resource::file("file", b"data".to_vec()))
        .unwrap();

    // Ancestors were auto-created as containers
    assert!(store.get("/a").unwrap().is_container());
    assert!(store.get("/a/b").unwrap().is_container());
    assert_eq!(store.get("/a/b/file").unwrap().body(), Some(&b"data"[..]));

    // Check-before-get avoids the error path
    assert!(store.contains("/a/b/file"));
    assert!(!store.contains("/a/b/other"));
    assert!(matches!(
        store.get("/a/b/other"),
        Err(RepoError::ResourceNotFound(_))
    ));
}

#[test]
fn test_merge_overwrite_semantics() {
    let store = TreeStore::new();

    let first = Resource::node("x")
        .with_child(Resource::file("file1", b"old".to_vec()))
        .unwrap()
        .with_child(Resource::file("file2", b"two".to_vec()))
        .unwrap();
    store.add("/x", first).unwrap();

    let second = Resource::node("x")
        .with_child(Resource::file("file1", b"new".to_vec()))
        .unwrap()
        .with_child(Resource::file("file3", b"three".to_vec()))
        .unwrap();
    store.add("/x", second).unwrap();

    let children = store.list_children("/x").unwrap();
    assert_eq!(children.names(), vec!["file1", "file2", "file3"]);
    assert_eq!(store.get("/x/file1").unwrap().body(), Some(&b"new"[..]));
    assert_eq!(store.get("/x/file2").unwrap().body(), Some(&b"two"[..]));
}

#[test]
fn test_remove_and_move_counts() {
    let store = TreeStore::new();
    store.add("/x/a/b", Resource::node("b")).unwrap();

    assert_eq!(store.remove("/x").unwrap(), 3);
    assert!(!store.contains("/x"));
    assert!(!store.contains("/x/a"));
    assert!(!store.contains("/x/a/b"));

    store.add("/src", Resource::file("src", b"s".to_vec())).unwrap();
    assert_eq!(store.move_to("/src", "/dst").unwrap(), 1);
    assert!(!store.contains("/src"));
    assert_eq!(store.get("/dst").unwrap().path(), Some("/dst"));
}

#[test]
fn test_local_store_satisfies_contract() {
    let temp = TempDir::new().unwrap();
    let store = LocalStore::new(temp.path());

    store
        .add("/docs/guide.md", Resource::file("guide.md", b"# hi".to_vec()))
        .unwrap();
    assert!(store.get("/docs").unwrap().is_container());
    assert_eq!(store.get("/docs/guide.md").unwrap().body(), Some(&b"# hi"[..]));

    let found = store.find("/docs/*.md").unwrap();
    assert_eq!(found.paths(), vec!["/docs/guide.md"]);

    assert_eq!(store.remove("/docs").unwrap(), 2);
    assert!(!store.contains("/docs"));
}

#[test]
fn test_local_store_mounts_in_composite() {
    let temp = TempDir::new().unwrap();
    let local = LocalStore::new(temp.path());
    local
        .add("/cfg/app.json", Resource::file("app.json", b"{}".to_vec()))
        .unwrap();

    let composite = Composite::new();
    composite.mount("/etc", local).unwrap();
    composite.mount("/tmp", TreeStore::new()).unwrap();

    let got = composite.get("/etc/cfg/app.json").unwrap();
    assert_eq!(got.path(), Some("/etc/cfg/app.json"));
    assert_eq!(got.body(), Some(&b"{}"[..]));

    composite
        .add("/tmp/scratch", Resource::file("scratch", b"s".to_vec()))
        .unwrap();
    assert!(composite.contains("/tmp/scratch"));
    assert!(!composite.contains("/etc/scratch"));
}

#[test]
fn test_composite_shadowing_end_to_end() {
    let root_backend = TreeStore::new();
    root_backend
        .add("/data", Resource::file("data", b"shadowed".to_vec()))
        .unwrap();
    root_backend
        .add("/keep", Resource::file("keep", b"kept".to_vec()))
        .unwrap();

    let data_backend = TreeStore::new();
    data_backend
        .add("/inner", Resource::file("inner", b"inner".to_vec()))
        .unwrap();

    let composite = Composite::new();
    composite.mount("/", root_backend).unwrap();
    composite.mount("/data", data_backend).unwrap();

    // The root backend's /data is covered by the dedicated mount
    let found = composite.find("/*").unwrap();
    assert_eq!(found.paths(), vec!["/keep"]);

    let nested = composite.find("/data/*").unwrap();
    assert_eq!(nested.paths(), vec!["/data/inner"]);
}

#[test]
fn test_composite_with_nested_composite() {
    let leaf = TreeStore::new();
    leaf.add("/f", Resource::file("f", b"x".to_vec())).unwrap();

    let inner = Composite::new();
    inner.mount("/a", leaf).unwrap();

    let outer = Composite::new();
    outer.mount_arc("/outer", Arc::new(inner)).unwrap();

    let got = outer.get("/outer/a/f").unwrap();
    assert_eq!(got.path(), Some("/outer/a/f"));
    assert_eq!(got.body(), Some(&b"x"[..]));

    let children = outer.list_children("/outer/a").unwrap();
    assert_eq!(children.paths(), vec!["/outer/a/f"]);
}

#[test]
fn test_deferred_backend_through_contract() {
    let composite = Composite::new();
    composite
        .mount_deferred("/lazy", || {
            let store = TreeStore::new();
            store.add("/ready", Resource::file("ready", b"r".to_vec()))?;
            Ok(Box::new(store))
        })
        .unwrap();

    // First touch materializes the factory
    assert_eq!(composite.get("/lazy/ready").unwrap().body(), Some(&b"r"[..]));
    composite
        .add("/lazy/more", Resource::file("more", b"m".to_vec()))
        .unwrap();
    assert_eq!(composite.find("/lazy/*").unwrap().len(), 2);
}

#[test]
fn test_add_all_collection() {
    let store = TreeStore::new();
    let members: ResourceSet = vec![
        Resource::file("a.txt", b"a".to_vec()),
        Resource::node("sub")
            .with_child(Resource::file("deep.txt", b"d".to_vec()))
            .unwrap(),
    ]
    .into();

    store.add_all("/batch", members).unwrap();
    assert!(store.get("/batch").unwrap().is_container());
    assert_eq!(store.get("/batch/a.txt").unwrap().body(), Some(&b"a"[..]));
    assert_eq!(
        store.get("/batch/sub/deep.txt").unwrap().body(),
        Some(&b"d"[..])
    );
}

#[test]
fn test_clear_resets_to_fresh_root() {
    let store = TreeStore::new();
    store.add("/a/b/c", Resource::node("c")).unwrap();
    store.add("/d", Resource::file("d", b"x".to_vec())).unwrap();

    assert_eq!(store.clear().unwrap(), 4);
    assert!(store.contains("/"));
    assert!(store.list_children("/").unwrap().is_empty());
    assert!(!store.contains("/a"));
}

#[test]
fn test_error_paths_before_backends() {
    let composite = Composite::new();
    composite.mount("/app", TreeStore::new()).unwrap();

    // Path validation happens before any backend is consulted
    assert!(matches!(composite.get(""), Err(RepoError::InvalidPath(_))));
    assert!(matches!(
        composite.get("relative"),
        Err(RepoError::InvalidPath(_))
    ));
    assert!(matches!(
        composite.remove("/"),
        Err(RepoError::InvalidPath(_))
    ));
    assert!(matches!(
        composite.get("/app/missing"),
        Err(RepoError::ResourceNotFound(_))
    ));
}

#[test]
fn test_pattern_language_is_pluggable() {
    let store = TreeStore::new();
    store.add("/a", Resource::node("a")).unwrap();

    assert!(store.find_in("/*", "glob").is_ok());
    assert_eq!(
        store.find_in("/*", "regex").unwrap_err(),
        RepoError::UnsupportedLanguage("regex".into())
    );
}
