//! Integration tests for the mixed contents router.
//!
//! Every test builds a router with the prefix `mixed` over in-memory
//! backends, wrapped where needed so the calls each backend sees can be
//! inspected.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use mixfs_kernel::config::{BackendConfig, MountConfig};
use mixfs_kernel::{
    BackendRegistry, Checkpoint, ConfigError, Content, ContentsError, ContentsOps, ContentsResult,
    GetOptions, MemoryBackend, MixedContents, Model, MountTable, RouterConfig,
};

// ============================================================================
// Test backends
// ============================================================================

/// Memory backend that logs every call as `"<op> <path>"`.
struct Recording {
    inner: MemoryBackend,
    calls: Mutex<Vec<String>>,
}

impl Recording {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: MemoryBackend::new(),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn log(&self, entry: String) {
        self.calls.lock().unwrap().push(entry);
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }
}

#[async_trait]
impl ContentsOps for Recording {
    async fn dir_exists(&self, path: &str) -> ContentsResult<bool> {
        self.log(format!("dir_exists {path}"));
        self.inner.dir_exists(path).await
    }

    async fn file_exists(&self, path: &str) -> ContentsResult<bool> {
        self.log(format!("file_exists {path}"));
        self.inner.file_exists(path).await
    }

    async fn is_hidden(&self, path: &str) -> ContentsResult<bool> {
        self.log(format!("is_hidden {path}"));
        self.inner.is_hidden(path).await
    }

    async fn get(&self, path: &str, options: GetOptions) -> ContentsResult<Model> {
        self.log(format!("get {path}"));
        self.inner.get(path, options).await
    }

    async fn save(&self, model: Model, path: &str) -> ContentsResult<Model> {
        self.log(format!("save {path}"));
        self.inner.save(model, path).await
    }

    async fn delete(&self, path: &str) -> ContentsResult<()> {
        self.log(format!("delete {path}"));
        self.inner.delete(path).await
    }

    async fn rename(&self, old_path: &str, new_path: &str) -> ContentsResult<()> {
        self.log(format!("rename {old_path} {new_path}"));
        self.inner.rename(old_path, new_path).await
    }

    async fn create_checkpoint(&self, path: &str) -> ContentsResult<Checkpoint> {
        self.log(format!("create_checkpoint {path}"));
        self.inner.create_checkpoint(path).await
    }

    async fn list_checkpoints(&self, path: &str) -> ContentsResult<Vec<Checkpoint>> {
        self.log(format!("list_checkpoints {path}"));
        self.inner.list_checkpoints(path).await
    }

    async fn restore_checkpoint(&self, checkpoint_id: &str, path: &str) -> ContentsResult<()> {
        self.log(format!("restore_checkpoint {checkpoint_id} {path}"));
        self.inner.restore_checkpoint(checkpoint_id, path).await
    }

    async fn delete_checkpoint(&self, checkpoint_id: &str, path: &str) -> ContentsResult<()> {
        self.log(format!("delete_checkpoint {checkpoint_id} {path}"));
        self.inner.delete_checkpoint(checkpoint_id, path).await
    }
}

/// Backend whose every call fails.
struct Failing;

#[async_trait]
impl ContentsOps for Failing {
    async fn dir_exists(&self, _path: &str) -> ContentsResult<bool> {
        Err(ContentsError::other("offline"))
    }

    async fn file_exists(&self, _path: &str) -> ContentsResult<bool> {
        Err(ContentsError::other("offline"))
    }

    async fn is_hidden(&self, _path: &str) -> ContentsResult<bool> {
        Err(ContentsError::other("offline"))
    }

    async fn get(&self, _path: &str, _options: GetOptions) -> ContentsResult<Model> {
        Err(ContentsError::other("offline"))
    }

    async fn save(&self, _model: Model, _path: &str) -> ContentsResult<Model> {
        Err(ContentsError::other("offline"))
    }

    async fn delete(&self, _path: &str) -> ContentsResult<()> {
        Err(ContentsError::other("offline"))
    }

    async fn rename(&self, _old_path: &str, _new_path: &str) -> ContentsResult<()> {
        Err(ContentsError::other("offline"))
    }

    async fn create_checkpoint(&self, _path: &str) -> ContentsResult<Checkpoint> {
        Err(ContentsError::other("offline"))
    }

    async fn list_checkpoints(&self, _path: &str) -> ContentsResult<Vec<Checkpoint>> {
        Err(ContentsError::other("offline"))
    }

    async fn restore_checkpoint(&self, _id: &str, _path: &str) -> ContentsResult<()> {
        Err(ContentsError::other("offline"))
    }

    async fn delete_checkpoint(&self, _id: &str, _path: &str) -> ContentsResult<()> {
        Err(ContentsError::other("offline"))
    }
}

// ============================================================================
// Shared setup
// ============================================================================

struct Fixture {
    router: MixedContents,
    space1: Arc<Recording>,
    space2: Arc<Recording>,
    default: Arc<Recording>,
}

/// Route router logs to the test harness; `RUST_LOG=debug` shows dispatch.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn fixture() -> Fixture {
    init_tracing();
    let space1 = Recording::new();
    let space2 = Recording::new();
    let default = Recording::new();
    let table = MountTable::from_backends([
        ("space1", Arc::clone(&space1) as Arc<dyn ContentsOps>),
        ("space2", Arc::clone(&space2) as Arc<dyn ContentsOps>),
    ])
    .unwrap();
    let router = MixedContents::new("mixed", table, Arc::clone(&default) as Arc<dyn ContentsOps>);
    Fixture {
        router,
        space1,
        space2,
        default,
    }
}

fn ts(secs: i64) -> chrono::DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).unwrap()
}

// ============================================================================
// Mount table construction
// ============================================================================

#[test]
fn duplicate_mount_names_fail_construction() {
    let config = RouterConfig {
        mounts: vec![
            MountConfig::new("space1", "memory"),
            MountConfig::new("space1", "memory"),
        ],
        ..Default::default()
    };
    let err = MixedContents::from_config(&config, &BackendRegistry::with_builtin()).unwrap_err();
    assert!(matches!(err, ConfigError::DuplicateMount(ref name) if name == "space1"));
}

#[test]
fn distinct_mounts_are_all_resolvable() {
    let config = RouterConfig {
        virtual_prefix: "mixed".into(),
        default: BackendConfig::new("memory"),
        mounts: vec![
            MountConfig::new("space1", "memory"),
            MountConfig::new("space2", "memory"),
        ],
    };
    let router = MixedContents::from_config(&config, &BackendRegistry::with_builtin()).unwrap();
    for name in ["space1", "space2"] {
        assert!(router.resolve("mixed", &[name.to_string()]).is_some());
    }
    assert_eq!(router.mounts().len(), 2);
}

#[test]
fn unknown_backend_fails_construction() {
    let config = RouterConfig {
        default: BackendConfig::new("memory"),
        mounts: vec![MountConfig::new("space1", "s3")],
        ..Default::default()
    };
    let err = MixedContents::from_config(&config, &BackendRegistry::with_builtin()).unwrap_err();
    assert!(matches!(err, ConfigError::UnknownBackend { ref backend, .. } if backend == "s3"));
}

#[test]
fn unknown_default_backend_fails_construction() {
    let config = RouterConfig {
        default: BackendConfig::new("s3"),
        ..Default::default()
    };
    let err = MixedContents::from_config(&config, &BackendRegistry::with_builtin()).unwrap_err();
    assert!(matches!(err, ConfigError::UnknownBackend { ref mount, .. } if mount == "default"));
}

// ============================================================================
// Rename and update
// ============================================================================

#[tokio::test]
async fn rename_across_mounts_is_rejected() {
    let f = fixture();
    f.router
        .save(Model::text_file("x", "1"), "mixed/space1/x")
        .await
        .unwrap();
    f.space1.clear();

    let err = f
        .router
        .rename("mixed/space1/x", "mixed/space2/y")
        .await
        .unwrap_err();
    assert!(matches!(err, ContentsError::CrossMount { .. }));
    assert!(f.space1.calls().is_empty());
    assert!(f.space2.calls().is_empty());
}

#[tokio::test]
async fn rename_between_mount_and_default_is_rejected() {
    let f = fixture();
    let err = f.router.rename("mixed/space1/x", "notes/x").await.unwrap_err();
    assert!(matches!(err, ContentsError::CrossMount { .. }));

    let err = f.router.rename("notes/x", "mixed/space2/x").await.unwrap_err();
    assert!(matches!(err, ContentsError::CrossMount { .. }));
}

#[tokio::test]
async fn rename_within_mount_uses_local_paths() {
    let f = fixture();
    f.router
        .save(Model::text_file("x", "1"), "mixed/space1/x")
        .await
        .unwrap();
    f.space1.clear();

    f.router.rename("mixed/space1/x", "mixed/space1/y").await.unwrap();

    assert_eq!(f.space1.calls(), vec!["rename x y"]);
    assert!(f.space1.inner.file_exists("y").await.unwrap());
    assert!(!f.space1.inner.file_exists("x").await.unwrap());
}

#[tokio::test]
async fn rename_on_default_uses_full_paths() {
    let f = fixture();
    f.default
        .save(Model::text_file("a", "1"), "notes/a")
        .await
        .unwrap();
    f.default.clear();

    f.router.rename("notes/a", "notes/b").await.unwrap();
    assert_eq!(f.default.calls(), vec!["rename notes/a notes/b"]);
}

#[tokio::test]
async fn update_outside_prefix_goes_to_default_unrebased() {
    let f = fixture();
    f.default
        .save(Model::text_file("a", "1"), "notes/a")
        .await
        .unwrap();
    f.default.clear();

    let mut model = Model::text_file("b", "1");
    model.path = "notes/b".into();
    let updated = f.router.update(model, "notes/a").await.unwrap();

    assert_eq!(updated.path, "notes/b");
    assert_eq!(f.default.calls(), vec!["rename notes/a notes/b", "get notes/b"]);
    assert!(f.space1.calls().is_empty());
    assert!(f.space2.calls().is_empty());
}

#[tokio::test]
async fn update_across_mounts_is_rejected() {
    let f = fixture();
    let mut model = Model::text_file("y", "1");
    model.path = "mixed/space2/y".into();
    let err = f.router.update(model, "mixed/space1/x").await.unwrap_err();
    assert!(matches!(err, ContentsError::CrossMount { .. }));
}

#[tokio::test]
async fn update_within_mount_moves_and_rebases() {
    let f = fixture();
    f.router
        .save(Model::text_file("x", "1"), "mixed/space1/x")
        .await
        .unwrap();

    let mut model = Model::text_file("y", "1");
    model.path = "mixed/space1/y".into();
    let updated = f.router.update(model, "mixed/space1/x").await.unwrap();

    assert_eq!(updated.path, "mixed/space1/y");
    assert!(f.space1.calls().contains(&"rename x y".to_string()));
}

// ============================================================================
// Aggregated prefix listing
// ============================================================================

#[tokio::test]
async fn prefix_listing_takes_latest_timestamp() {
    let f = fixture();
    f.space1.inner.touch("", ts(1_000)).unwrap();
    f.space2.inner.touch("", ts(2_000)).unwrap();

    let root = f.router.get("mixed", GetOptions::default()).await.unwrap();
    assert_eq!(root.path, "mixed");
    assert!(root.is_dir());
    assert!(!root.writable);
    assert_eq!(root.last_modified, Some(ts(2_000)));
    assert_eq!(root.created, Some(ts(1_000)));

    let children = root.children().unwrap();
    let paths: Vec<_> = children.iter().map(|c| c.path.as_str()).collect();
    assert_eq!(paths, vec!["mixed/space1", "mixed/space2"]);
    let names: Vec<_> = children.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["space1", "space2"]);
}

#[tokio::test]
async fn prefix_listing_omits_failed_mounts() {
    init_tracing();
    let space1 = Arc::new(MemoryBackend::new());
    space1.touch("", ts(1_000)).unwrap();
    let table = MountTable::from_backends([
        ("space1", Arc::clone(&space1) as Arc<dyn ContentsOps>),
        ("space2", Arc::new(Failing) as Arc<dyn ContentsOps>),
    ])
    .unwrap();
    let router = MixedContents::new("mixed", table, Arc::new(MemoryBackend::new()));

    let root = router.get("mixed", GetOptions::default()).await.unwrap();
    let children = root.children().unwrap();
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].path, "mixed/space1");
    assert_eq!(root.last_modified, Some(ts(1_000)));
}

#[tokio::test]
async fn prefix_listing_with_no_mounts_has_no_timestamps() {
    let table = MountTable::from_backends([("broken", Arc::new(Failing) as Arc<dyn ContentsOps>)])
        .unwrap();
    let router = MixedContents::new("mixed", table, Arc::new(MemoryBackend::new()));

    let root = router.get("mixed/", GetOptions::default()).await.unwrap();
    assert_eq!(root.children().map(|c| c.len()), Some(0));
    assert_eq!(root.last_modified, None);
    assert_eq!(root.created, None);

    let empty = MixedContents::new("mixed", MountTable::empty(), Arc::new(MemoryBackend::new()));
    let root = empty.get("mixed", GetOptions::default()).await.unwrap();
    assert_eq!(root.last_modified, None);
}

// ============================================================================
// Default backend fallback
// ============================================================================

#[tokio::test]
async fn fallback_is_transparent() {
    let f = fixture();
    let saved = f
        .router
        .save(Model::text_file("c.txt", "body"), "notes/c.txt")
        .await
        .unwrap();
    assert_eq!(saved.path, "notes/c.txt");

    let model = f.router.get("notes/c.txt", GetOptions::default()).await.unwrap();
    assert_eq!(model.path, "notes/c.txt");
    assert_eq!(model.content, Some(Content::Text("body".into())));
    assert_eq!(f.default.calls(), vec!["save notes/c.txt", "get notes/c.txt"]);
    assert!(f.space1.calls().is_empty());
}

#[tokio::test]
async fn unknown_mount_falls_back_with_full_path() {
    let f = fixture();
    assert!(!f.router.exists("mixed/space9/a").await.unwrap());
    assert_eq!(
        f.default.calls(),
        vec!["file_exists mixed/space9/a", "dir_exists mixed/space9/a"]
    );
}

#[tokio::test]
async fn root_listing_includes_prefix_entry() {
    let f = fixture();
    f.router
        .save(Model::text_file("top.txt", "t"), "top.txt")
        .await
        .unwrap();

    let root = f.router.get("", GetOptions::default()).await.unwrap();
    let children = root.children().unwrap();
    let prefix = children.iter().find(|c| c.path == "mixed").unwrap();
    assert!(prefix.is_dir());
    assert!(!prefix.writable);
    assert!(children.iter().any(|c| c.path == "top.txt"));
}

// ============================================================================
// Root and prefix-alone queries
// ============================================================================

#[tokio::test]
async fn root_and_prefix_never_reach_a_backend() {
    let f = fixture();
    for path in ["mixed", "/mixed/", "", "/"] {
        assert!(f.router.dir_exists(path).await.unwrap());
        assert!(f.router.exists(path).await.unwrap());
        assert!(!f.router.file_exists(path).await.unwrap());
        assert!(!f.router.is_hidden(path).await.unwrap());
    }
    assert!(f.space1.calls().is_empty());
    assert!(f.space2.calls().is_empty());
    assert!(f.default.calls().is_empty());
}

// ============================================================================
// Mounted paths
// ============================================================================

#[tokio::test]
async fn mounted_directory_listing_is_rebased() {
    let f = fixture();
    f.router
        .save(Model::text_file("b.txt", "1"), "mixed/space1/a/b.txt")
        .await
        .unwrap();
    f.space1.clear();

    let dir = f.router.get("mixed/space1/a", GetOptions::default()).await.unwrap();
    assert_eq!(f.space1.calls(), vec!["get a"]);
    assert_eq!(dir.path, "mixed/space1/a");
    let children = dir.children().unwrap();
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].path, "mixed/space1/a/b.txt");
}

#[tokio::test]
async fn delete_in_mount() {
    let f = fixture();
    f.router
        .save(Model::text_file("x", "1"), "mixed/space2/x")
        .await
        .unwrap();
    f.router.delete("mixed/space2/x").await.unwrap();
    assert!(!f.space2.inner.exists("x").await.unwrap());
    assert!(f.space2.calls().contains(&"delete x".to_string()));
}

// ============================================================================
// Checkpoints
// ============================================================================

#[tokio::test]
async fn checkpoint_lifecycle_through_mount() {
    let f = fixture();
    f.router
        .save(Model::text_file("n.txt", "v1"), "mixed/space1/n.txt")
        .await
        .unwrap();

    let cp = f.router.create_checkpoint("mixed/space1/n.txt").await.unwrap();
    f.router
        .save(Model::text_file("n.txt", "v2"), "mixed/space1/n.txt")
        .await
        .unwrap();

    let listed = f.router.list_checkpoints("mixed/space1/n.txt").await.unwrap();
    assert_eq!(listed, vec![cp.clone()]);

    f.router
        .restore_checkpoint(&cp.id, "mixed/space1/n.txt")
        .await
        .unwrap();
    let model = f
        .router
        .get("mixed/space1/n.txt", GetOptions::default())
        .await
        .unwrap();
    assert_eq!(model.content, Some(Content::Text("v1".into())));

    f.router
        .delete_checkpoint(&cp.id, "mixed/space1/n.txt")
        .await
        .unwrap();
    let calls = f.space1.calls();
    assert!(calls.contains(&format!("restore_checkpoint {} n.txt", cp.id)));
    assert!(calls.contains(&format!("delete_checkpoint {} n.txt", cp.id)));
    assert!(f.router.list_checkpoints("mixed/space1/n.txt").await.unwrap().is_empty());
}

#[tokio::test]
async fn checkpoint_lifecycle_through_default() {
    let f = fixture();
    f.router
        .save(Model::text_file("n.txt", "v1"), "n.txt")
        .await
        .unwrap();
    let cp = f.router.create_checkpoint("n.txt").await.unwrap();
    f.router.restore_checkpoint(&cp.id, "n.txt").await.unwrap();
    f.router.delete_checkpoint(&cp.id, "n.txt").await.unwrap();

    let calls = f.default.calls();
    assert!(calls.contains(&format!("restore_checkpoint {} n.txt", cp.id)));
    assert!(calls.contains(&format!("delete_checkpoint {} n.txt", cp.id)));
    assert!(f.space1.calls().is_empty());

    let err = f.router.delete_checkpoint(&cp.id, "n.txt").await.unwrap_err();
    assert!(err.is_not_found());
}

// ============================================================================
// Configured local mounts
// ============================================================================

#[tokio::test]
async fn local_mount_from_config() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().to_string_lossy().into_owned();
    let config = RouterConfig::from_toml_str(&format!(
        r#"
        virtual_prefix = "mixed"

        [default]
        backend = "memory"

        [[mounts]]
        name = "disk"
        backend = "local"
        options = {{ root = {root:?} }}
        "#
    ))
    .unwrap();
    let router = MixedContents::from_config(&config, &BackendRegistry::with_builtin()).unwrap();

    let saved = router
        .save(Model::text_file("hello.txt", "hi"), "mixed/disk/sub/hello.txt")
        .await
        .unwrap();
    assert_eq!(saved.path, "mixed/disk/sub/hello.txt");
    assert_eq!(
        std::fs::read_to_string(dir.path().join("sub/hello.txt")).unwrap(),
        "hi"
    );

    let err = router
        .get("mixed/disk/../../etc/passwd", GetOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ContentsError::PathEscapesRoot(_) | ContentsError::NotFound(_) | ContentsError::Io(_)
    ));
}

#[tokio::test]
async fn read_only_local_mount_rejects_writes() {
    let dir = tempfile::tempdir().unwrap();
    let config = RouterConfig {
        virtual_prefix: "mixed".into(),
        default: BackendConfig::new("memory"),
        mounts: vec![MountConfig::new("ro", "local")
            .with_option("root", dir.path().to_string_lossy().into_owned())
            .with_option("read_only", true)],
    };
    let router = MixedContents::from_config(&config, &BackendRegistry::with_builtin()).unwrap();

    let err = router
        .save(Model::text_file("a", "x"), "mixed/ro/a")
        .await
        .unwrap_err();
    assert!(matches!(err, ContentsError::ReadOnly));
}
