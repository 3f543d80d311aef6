//! End-to-end volume operations over the in-memory transport.

use std::sync::Arc;

use tokio::io::AsyncReadExt;

use hopfs_gateway::{ChunkAssembler, GatewayConfig, GatewayError, Volume};
use hopfs_remote::StaticInventory;
use hopfs_remote::memory::{MemoryConnector, MemoryRemoteFs};
use hopfs_types::{HostInfo, LoginInfo};

struct Fixture {
    volume: Volume,
    connector: Arc<MemoryConnector>,
    _staging: tempfile::TempDir,
}

impl Fixture {
    /// Filesystem behind web1's deploy login.
    fn deploy_fs(&self) -> MemoryRemoteFs {
        self.connector.fs_for("web1", "deploy")
    }
}

async fn fixture() -> Fixture {
    let connector = Arc::new(MemoryConnector::new());
    let staging = tempfile::tempdir().unwrap();
    let inventory = StaticInventory::new(vec![
        HostInfo::new("web1", "10.0.0.5").with_login(LoginInfo::new("deploy")),
        HostInfo::new("db1", "10.0.0.9").with_login(LoginInfo::new("postgres")),
    ]);
    let config = GatewayConfig {
        staging_dir: staging.path().to_path_buf(),
        ..GatewayConfig::default()
    };
    let volume = Volume::new(
        "amy",
        "198.51.100.7:52114",
        &inventory,
        connector.clone(),
        config,
    )
    .await
    .unwrap();
    Fixture {
        volume,
        connector,
        _staging: staging,
    }
}

#[tokio::test]
async fn test_root_listing() {
    let fx = fixture().await;

    let root = fx.volume.info("/Home").await.unwrap();
    assert_eq!(root.name, "Home");
    assert!(root.kind.is_dir());
    assert!(root.locked);
    assert_eq!(root.parent_id, "");

    let entries = fx.volume.list("/Home").await;
    let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["web1", "db1"]);
    for entry in &entries {
        assert!(entry.kind.is_dir());
        assert!(!entry.kind.is_file());
        assert!(!entry.locked);
        assert_eq!(entry.volume_id, fx.volume.id());
    }
    // No session was needed for the synthetic levels.
    assert_eq!(fx.connector.connect_count(), 0);
}

#[tokio::test]
async fn test_host_listing_shows_logins() {
    let fx = fixture().await;
    let entries = fx.volume.list("/Home/web1").await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].name, "deploy");
    assert!(entries[0].kind.is_dir());
    assert_eq!(fx.connector.connect_count(), 0);
}

#[tokio::test]
async fn test_upload_to_host_path_is_denied() {
    let fx = fixture().await;
    let err = fx
        .volume
        .upload("/Home/web1", "notes.txt", &b"hi"[..])
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::PermissionDenied(_)));
    // Nothing was connected or written.
    assert_eq!(fx.connector.connect_count(), 0);
    assert!(fx.deploy_fs().file_contents("~/notes.txt").is_none());

    let err = fx
        .volume
        .upload("/Home", "notes.txt", &b"hi"[..])
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::PermissionDenied(_)));
}

#[tokio::test]
async fn test_upload_and_read_back() {
    let fx = fixture().await;
    let entry = fx
        .volume
        .upload("/Home/web1/deploy", "notes.txt", &b"remember the milk"[..])
        .await
        .unwrap();
    assert_eq!(entry.name, "notes.txt");
    assert!(entry.kind.is_file());
    assert_eq!(entry.size, 17);

    let mut reader = fx
        .volume
        .get_file("/Home/web1/deploy/notes.txt")
        .await
        .unwrap();
    let mut buf = Vec::new();
    reader.read_to_end(&mut buf).await.unwrap();
    assert_eq!(buf, b"remember the milk");
}

#[tokio::test]
async fn test_session_is_cached_and_closed_once() {
    let fx = fixture().await;
    fx.volume
        .upload("/Home/web1/deploy", "a.txt", &b"a"[..])
        .await
        .unwrap();
    fx.volume
        .upload("/Home/web1/deploy", "b.txt", &b"b"[..])
        .await
        .unwrap();
    assert_eq!(fx.connector.connect_count(), 1);

    fx.volume.close().await;
    assert_eq!(fx.connector.recycle_count(), 1);
    fx.volume.close().await;
    assert_eq!(fx.connector.recycle_count(), 1);
}

#[tokio::test]
async fn test_connect_failure_maps_to_permission_denied() {
    let fx = fixture().await;
    fx.connector.refuse_connections(true);
    let err = fx
        .volume
        .info("/Home/web1/deploy/srv/app.log")
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::PermissionDenied(_)));
    // Listings degrade to empty instead.
    assert!(fx.volume.list("/Home/web1/deploy").await.is_empty());
}

#[tokio::test]
async fn test_chunked_upload_round_trip() {
    let fx = fixture().await;
    let dir = "/Home/web1/deploy";
    let upload_id = 42;

    // Three chunks; the declared total names the LAST index.
    let parts: [&[u8]; 3] = [b"alpha-", b"beta-", b"gamma"];
    for (index, data) in parts.iter().enumerate() {
        let name = ChunkAssembler::part_name("a.bin", index as u32, 2);
        fx.volume
            .upload_chunk(upload_id, dir, &name, &data[..])
            .await
            .unwrap();
    }

    assert!(fx.volume.complete_chunk(upload_id, 2, dir, "a.bin").await);
    assert!(!fx.volume.complete_chunk(upload_id, 3, dir, "a.bin").await);

    let entry = fx
        .volume
        .merge_chunk(upload_id, 2, dir, "a.bin")
        .await
        .unwrap();
    assert_eq!(entry.name, "a.bin");
    assert_eq!(
        fx.deploy_fs().file_contents("~/a.bin").unwrap(),
        b"alpha-beta-gamma"
    );
    // All staged parts were consumed.
    assert!(!fx.volume.complete_chunk(upload_id, 2, dir, "a.bin").await);
}

#[tokio::test]
async fn test_merge_with_missing_chunk_fails() {
    let fx = fixture().await;
    let dir = "/Home/web1/deploy";

    // Stage chunks 0 and 2, leave 1 missing.
    for index in [0u32, 2] {
        let name = ChunkAssembler::part_name("a.bin", index, 2);
        fx.volume
            .upload_chunk(7, dir, &name, &b"xx"[..])
            .await
            .unwrap();
    }
    assert!(!fx.volume.complete_chunk(7, 2, dir, "a.bin").await);

    let err = fx.volume.merge_chunk(7, 2, dir, "a.bin").await.unwrap_err();
    assert!(matches!(
        err,
        GatewayError::MissingChunk { index: 1, total: 2 }
    ));
    // The destination holds the prefix that was already appended.
    assert_eq!(fx.deploy_fs().file_contents("~/a.bin").unwrap(), b"xx");
}

#[tokio::test]
async fn test_paste_appends_conflict_suffix() {
    let fx = fixture().await;
    fx.deploy_fs().seed_file("~/report.csv", b"original");

    let entry = fx
        .volume
        .paste("/Home/web1/deploy", "report.csv", "_copy", &b"copied"[..])
        .await
        .unwrap();
    assert_eq!(entry.name, "report.csv_copy");
    assert_eq!(
        fx.deploy_fs().file_contents("~/report.csv").unwrap(),
        b"original"
    );
    assert_eq!(
        fx.deploy_fs().file_contents("~/report.csv_copy").unwrap(),
        b"copied"
    );
}

#[tokio::test]
async fn test_paste_without_conflict_keeps_name() {
    let fx = fixture().await;
    let entry = fx
        .volume
        .paste("/Home/web1/deploy", "fresh.txt", "_copy", &b"data"[..])
        .await
        .unwrap();
    assert_eq!(entry.name, "fresh.txt");
}

#[tokio::test]
async fn test_rename_stays_in_directory() {
    let fx = fixture().await;
    fx.deploy_fs().seed_file("~/logs/old.txt", b"x");

    let entry = fx
        .volume
        .rename("/Home/web1/deploy/logs/old.txt", "new.txt")
        .await
        .unwrap();
    assert_eq!(entry.name, "new.txt");
    assert!(fx.deploy_fs().file_contents("~/logs/new.txt").is_some());
    assert!(fx.deploy_fs().file_contents("~/logs/old.txt").is_none());
}

#[tokio::test]
async fn test_mutations_above_login_level_are_denied() {
    let fx = fixture().await;
    for path in ["/Home", "/Home/web1", "/Home/web1/deploy"] {
        let err = fx.volume.rename(path, "renamed").await.unwrap_err();
        assert!(matches!(err, GatewayError::PermissionDenied(_)), "{path}");
        let err = fx.volume.remove(path).await.unwrap_err();
        assert!(matches!(err, GatewayError::PermissionDenied(_)), "{path}");
    }
}

#[tokio::test]
async fn test_make_dir_and_file_then_remove() {
    let fx = fixture().await;
    let dir = fx
        .volume
        .make_dir("/Home/web1/deploy", "uploads")
        .await
        .unwrap();
    assert!(dir.kind.is_dir());

    let file = fx
        .volume
        .make_file("/Home/web1/deploy/uploads", "empty.txt")
        .await
        .unwrap();
    assert!(file.kind.is_file());
    assert_eq!(file.size, 0);

    fx.volume
        .remove("/Home/web1/deploy/uploads/empty.txt")
        .await
        .unwrap();
    fx.volume.remove("/Home/web1/deploy/uploads").await.unwrap();
    assert!(matches!(
        fx.volume.info("/Home/web1/deploy/uploads").await,
        Err(GatewayError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_list_deep_directory() {
    let fx = fixture().await;
    let fs = fx.deploy_fs();
    fs.seed_file("~/srv/app.log", b"log");
    fs.seed_dir("~/srv/static");

    let entries = fx.volume.list("/Home/web1/deploy/srv").await;
    let mut names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
    names.sort_unstable();
    assert_eq!(names, vec!["app.log", "static"]);

    let log = entries.iter().find(|e| e.name == "app.log").unwrap();
    assert_eq!(log.size, 3);
    assert!(log.read);
}

#[tokio::test]
async fn test_parents_collects_ancestor_directories() {
    let fx = fixture().await;
    let fs = fx.deploy_fs();
    fs.seed_dir("~/srv/static");

    let entries = fx.volume.parents("/Home/web1/deploy/srv", 0).await;
    let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
    // Every ancestor's own entry appears, the root included.
    assert!(names.contains(&"Home"), "root entry missing: {names:?}");
    assert!(names.contains(&"deploy"));
    assert!(names.contains(&"web1"));
    // Sibling directories at each ancestor level.
    assert!(names.contains(&"db1"));
    assert!(names.contains(&"srv"));
    // The target's own children are not listed.
    assert!(!names.contains(&"static"), "target children leaked: {names:?}");
}

#[tokio::test]
async fn test_parents_of_root_lists_root_and_hosts() {
    let fx = fixture().await;
    let entries = fx.volume.parents("/Home", 0).await;
    let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["Home", "web1", "db1"]);
    assert!(entries[0].locked);
}

#[tokio::test]
async fn test_inventory_is_queried_once() {
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingInventory {
        inner: StaticInventory,
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl hopfs_remote::Inventory for CountingInventory {
        async fn entitled_hosts(
            &self,
            user_id: &str,
            filter: &str,
        ) -> hopfs_remote::RemoteResult<Vec<HostInfo>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.entitled_hosts(user_id, filter).await
        }
    }

    let inventory = CountingInventory {
        inner: StaticInventory::new(vec![
            HostInfo::new("web1", "10.0.0.5").with_login(LoginInfo::new("deploy")),
        ]),
        calls: AtomicUsize::new(0),
    };
    let staging = tempfile::tempdir().unwrap();
    let volume = Volume::new(
        "amy",
        "local",
        &inventory,
        Arc::new(MemoryConnector::new()),
        GatewayConfig {
            staging_dir: staging.path().to_path_buf(),
            ..GatewayConfig::default()
        },
    )
    .await
    .unwrap();

    volume.list("/Home").await;
    volume.list("/Home/web1").await;
    volume.info("/Home/web1/deploy").await.unwrap();
    assert_eq!(inventory.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_unknown_paths_are_not_found() {
    let fx = fixture().await;
    assert!(matches!(
        fx.volume.info("/Home/gone").await,
        Err(GatewayError::NotFound(_))
    ));
    assert!(matches!(
        fx.volume.info("/Home/web1/nobody").await,
        Err(GatewayError::NotFound(_))
    ));
    assert!(fx.volume.list("/Home/gone").await.is_empty());
}
