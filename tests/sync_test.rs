use chrono::{DateTime, TimeZone, Utc};
use savesync_lib::core::checksum_bytes;
use savesync_lib::core::probe::META_CHECKSUM;
use savesync_lib::storage::MemoryStorage;
use savesync_lib::{SyncConfig, SyncEngine, SyncError};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, UNIX_EPOCH};

fn write_file(root: &Path, rel: &str, content: &[u8]) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn engine(root: &Path, prefix: &str, storage: &Arc<MemoryStorage>) -> SyncEngine {
    let mut config = SyncConfig::new("saves-bucket", prefix, root);
    config.max_concurrent_transfers = 1;
    SyncEngine::new(config, storage.clone())
}

fn timestamp(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).unwrap()
}

#[tokio::test]
async fn test_first_upload_then_rerun_skips() {
    let dir = tempfile::tempdir().unwrap();
    let storage = Arc::new(MemoryStorage::new("saves-bucket"));
    write_file(dir.path(), "game1/slot0.sav", b"slot zero");
    let checksum = checksum_bytes(b"slot zero");

    let engine = engine(dir.path(), "saves/", &storage);

    let report = engine.upload().await.unwrap();
    assert_eq!((report.transferred, report.skipped), (1, 0));

    let remote = storage.get("saves/game1/slot0.sav").unwrap();
    assert_eq!(remote.user_metadata[META_CHECKSUM], checksum);

    let report = engine.upload().await.unwrap();
    assert_eq!((report.transferred, report.skipped), (0, 1));

    // 跳过时远程内容与元数据都不变
    let after = storage.get("saves/game1/slot0.sav").unwrap();
    assert_eq!(storage.write_count(), 1);
    assert_eq!(after.last_modified, remote.last_modified);
    assert_eq!(after.user_metadata, remote.user_metadata);
}

#[tokio::test]
async fn test_changed_file_is_uploaded_again() {
    let dir = tempfile::tempdir().unwrap();
    let storage = Arc::new(MemoryStorage::new("saves-bucket"));
    write_file(dir.path(), "slot.sav", b"before");

    let engine = engine(dir.path(), "saves", &storage);
    engine.upload().await.unwrap();

    write_file(dir.path(), "slot.sav", b"after");
    let report = engine.upload().await.unwrap();

    assert_eq!((report.transferred, report.skipped), (1, 0));
    let remote = storage.get("saves/slot.sav").unwrap();
    assert_eq!(remote.data, b"after");
    assert_eq!(remote.user_metadata[META_CHECKSUM], checksum_bytes(b"after"));
}

#[tokio::test]
async fn test_hidden_files_never_uploaded() {
    let dir = tempfile::tempdir().unwrap();
    let storage = Arc::new(MemoryStorage::new("saves-bucket"));
    write_file(dir.path(), ".hidden.sav", b"secret");
    write_file(dir.path(), ".cache/state.sav", b"secret");
    write_file(dir.path(), "game/.lock", b"secret");
    write_file(dir.path(), "game/visible.sav", b"visible");

    let report = engine(dir.path(), "", &storage).upload().await.unwrap();

    assert_eq!(report.transferred, 1);
    assert_eq!(storage.keys(), vec!["game/visible.sav".to_string()]);
}

#[tokio::test]
async fn test_upload_is_fail_fast() {
    let dir = tempfile::tempdir().unwrap();
    let storage = Arc::new(MemoryStorage::new("saves-bucket"));
    write_file(dir.path(), "a.sav", b"a");
    write_file(dir.path(), "b.sav", b"b");
    storage.fail_writes_for("b.sav");

    let err = engine(dir.path(), "", &storage).upload().await.unwrap_err();

    assert!(matches!(err, SyncError::Transport { ref key, .. } if key == "b.sav"));
}

#[cfg(unix)]
#[tokio::test]
async fn test_unreadable_file_aborts_upload() {
    let dir = tempfile::tempdir().unwrap();
    let storage = Arc::new(MemoryStorage::new("saves-bucket"));
    write_file(dir.path(), "a.sav", b"a");
    let broken = dir.path().join("broken.sav");
    std::os::unix::fs::symlink(dir.path().join("missing.sav"), &broken).unwrap();

    let err = engine(dir.path(), "", &storage).upload().await.unwrap_err();

    match err {
        SyncError::Io { path, .. } => assert_eq!(path, broken),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(storage.write_count(), 0);
}

#[tokio::test]
async fn test_download_restores_mtime() {
    let dir = tempfile::tempdir().unwrap();
    let storage = Arc::new(MemoryStorage::new("saves-bucket"));
    let t = timestamp(1_700_000_000);
    storage.insert("saves/x.sav", "remote save", t);

    let report = engine(dir.path(), "saves/", &storage).download().await.unwrap();

    assert_eq!(report.downloaded, 1);
    let local = dir.path().join("x.sav");
    assert_eq!(fs::read(&local).unwrap(), b"remote save");
    let mtime = fs::metadata(&local).unwrap().modified().unwrap();
    assert_eq!(mtime, UNIX_EPOCH + Duration::from_secs(1_700_000_000));
}

#[tokio::test]
async fn test_download_creates_intermediate_dirs() {
    let dir = tempfile::tempdir().unwrap();
    let storage = Arc::new(MemoryStorage::new("saves-bucket"));
    storage.insert("saves/gba/pokemon/slot1.sav", "deep", Utc::now());

    let report = engine(dir.path(), "saves", &storage).download().await.unwrap();

    assert_eq!(report.downloaded, 1);
    let local = dir.path().join("gba").join("pokemon").join("slot1.sav");
    assert_eq!(fs::read(local).unwrap(), b"deep");
}

#[tokio::test]
async fn test_one_failed_download_does_not_abort() {
    let dir = tempfile::tempdir().unwrap();
    let storage = Arc::new(MemoryStorage::new("saves-bucket"));
    storage.insert("saves/bad.sav", "bad", Utc::now());
    storage.insert("saves/good.sav", "good", Utc::now());
    storage.fail_reads_for("saves/bad.sav");

    let report = engine(dir.path(), "saves/", &storage).download().await.unwrap();

    assert_eq!(report.downloaded, 1);
    assert_eq!(report.failed, 1);
    assert!(dir.path().join("good.sav").exists());
    assert!(!dir.path().join("bad.sav").exists());
}

#[tokio::test]
async fn test_local_write_failure_skips_object() {
    let dir = tempfile::tempdir().unwrap();
    let storage = Arc::new(MemoryStorage::new("saves-bucket"));
    storage.insert("saves/a.sav", "a", Utc::now());
    storage.insert("saves/b.sav", "b", Utc::now());
    // 目标路径被目录占用，创建文件会失败
    write_file(dir.path(), "a.sav/keep.txt", b"keep");

    let report = engine(dir.path(), "saves", &storage).download().await.unwrap();

    assert_eq!((report.downloaded, report.failed), (1, 1));
    assert!(dir.path().join("a.sav").is_dir());
    assert_eq!(fs::read(dir.path().join("a.sav").join("keep.txt")).unwrap(), b"keep");
    assert_eq!(fs::read(dir.path().join("b.sav")).unwrap(), b"b");
}

#[tokio::test]
async fn test_parent_dir_failure_skips_object() {
    let dir = tempfile::tempdir().unwrap();
    let storage = Arc::new(MemoryStorage::new("saves-bucket"));
    storage.insert("saves/game1/slot.sav", "slot", Utc::now());
    storage.insert("saves/ok.sav", "ok", Utc::now());
    // 父目录位置已有同名普通文件
    write_file(dir.path(), "game1", b"not a dir");

    let report = engine(dir.path(), "saves", &storage).download().await.unwrap();

    assert_eq!((report.downloaded, report.failed), (1, 1));
    assert_eq!(fs::read(dir.path().join("game1")).unwrap(), b"not a dir");
    assert_eq!(fs::read(dir.path().join("ok.sav")).unwrap(), b"ok");
}

#[tokio::test]
async fn test_dir_markers_not_downloaded() {
    let dir = tempfile::tempdir().unwrap();
    let storage = Arc::new(MemoryStorage::new("saves-bucket"));
    storage.insert("saves/", "", Utc::now());
    storage.insert("saves/empty/", "", Utc::now());
    storage.insert("saves/empty/real.sav", "real", Utc::now());

    let report = engine(dir.path(), "saves/", &storage).download().await.unwrap();

    assert_eq!((report.downloaded, report.failed), (1, 0));
    assert!(dir.path().join("empty").is_dir());
    assert!(dir.path().join("empty").join("real.sav").is_file());
}

#[tokio::test]
async fn test_listing_failure_aborts_download() {
    let dir = tempfile::tempdir().unwrap();
    let storage = Arc::new(MemoryStorage::new("saves-bucket"));
    storage.insert("saves/a.sav", "a", Utc::now());
    storage.insert("saves/b.sav", "b", Utc::now());
    storage.insert("saves/c.sav", "c", Utc::now());
    storage.fail_listing_after(2);

    let err = engine(dir.path(), "saves/", &storage)
        .download()
        .await
        .unwrap_err();

    match err {
        SyncError::Listing { downloaded, .. } => assert_eq!(downloaded, 2),
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(dir.path().join("a.sav").exists());
    assert!(!dir.path().join("c.sav").exists());
}

#[tokio::test]
async fn test_download_never_short_circuits_on_checksum() {
    let dir = tempfile::tempdir().unwrap();
    let storage = Arc::new(MemoryStorage::new("saves-bucket"));
    write_file(dir.path(), "x.sav", b"same");
    let engine = engine(dir.path(), "", &storage);
    engine.upload().await.unwrap();

    let report = engine.download().await.unwrap();

    assert_eq!(report.downloaded, 1);
}

#[tokio::test]
async fn test_upload_then_download_round_trip() {
    let src = tempfile::tempdir().unwrap();
    let dst = tempfile::tempdir().unwrap();
    let storage = Arc::new(MemoryStorage::new("saves-bucket"));
    write_file(src.path(), "snes/zelda.srm", b"link");
    write_file(src.path(), "gb/tetris.sav", b"blocks");

    let report = engine(src.path(), "handheld", &storage).upload().await.unwrap();
    assert_eq!(report.transferred, 2);

    let report = engine(dst.path(), "handheld", &storage).download().await.unwrap();
    assert_eq!(report.downloaded, 2);
    assert_eq!(fs::read(dst.path().join("snes").join("zelda.srm")).unwrap(), b"link");
    assert_eq!(fs::read(dst.path().join("gb").join("tetris.sav")).unwrap(), b"blocks");
}

#[tokio::test]
async fn test_slash_prefix_round_trip() {
    let src = tempfile::tempdir().unwrap();
    let dst = tempfile::tempdir().unwrap();
    let storage = Arc::new(MemoryStorage::new("saves-bucket"));
    write_file(src.path(), "x.sav", b"slot");

    let uploader = engine(src.path(), "/saves", &storage);
    assert_eq!(uploader.config().prefix, "saves");
    uploader.upload().await.unwrap();
    assert_eq!(storage.keys(), vec!["saves/x.sav".to_string()]);

    // 构造后再改写的前缀同样被规范化
    let mut config = SyncConfig::new("saves-bucket", "", dst.path());
    config.prefix = "saves//".to_string();
    let downloader = SyncEngine::new(config, storage.clone());
    assert_eq!(downloader.config().prefix, "saves");

    let report = downloader.download().await.unwrap();
    assert_eq!(report.downloaded, 1);
    assert_eq!(fs::read(dst.path().join("x.sav")).unwrap(), b"slot");
    assert!(!dst.path().join("saves").exists());
}

#[tokio::test]
async fn test_missing_local_root_is_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let storage = Arc::new(MemoryStorage::new("saves-bucket"));
    let engine = engine(&dir.path().join("gone"), "", &storage);

    assert!(matches!(engine.upload().await, Err(SyncError::ConfigInvalid(_))));
    assert!(matches!(engine.download().await, Err(SyncError::ConfigInvalid(_))));
    assert_eq!(storage.write_count(), 0);
}

#[tokio::test]
async fn test_concurrent_upload_counts() {
    let dir = tempfile::tempdir().unwrap();
    let storage = Arc::new(MemoryStorage::new("saves-bucket"));
    for i in 0..10 {
        write_file(dir.path(), &format!("slot{i}.sav"), format!("data {i}").as_bytes());
    }
    let mut config = SyncConfig::new("saves-bucket", "saves", dir.path());
    config.max_concurrent_transfers = 4;
    let engine = SyncEngine::new(config, storage.clone());

    let first = engine.upload_report().await.unwrap();
    assert_eq!((first.transferred, first.skipped), (10, 0));

    let second = engine.upload_report().await.unwrap();
    assert_eq!((second.transferred, second.skipped), (0, 10));
    assert_eq!(storage.write_count(), 10);
}
