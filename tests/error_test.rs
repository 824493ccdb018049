//! エラーケーステスト
//!
//! 各種エラー条件でのエラーハンドリングを検証

use asset_plate_review::config::Config;
use asset_plate_review::error::AssetReviewError;
use asset_plate_review::images::ImageStore;
use asset_plate_review::mirror::{MirrorStore, RowValues};
use asset_plate_review::review::DashboardFilter;
use asset_plate_review::store::DocumentStore;
use asset_plate_review::SyncEngine;
use std::path::Path;
use std::time::Duration;
use tempfile::tempdir;

/// 存在しないJSONフォルダを一覧した場合
#[test]
fn test_list_nonexistent_folder() {
    let store = DocumentStore::new("/nonexistent/path/12345", "ME");
    let result = store.list();
    assert!(matches!(result, Err(AssetReviewError::NotFound(_))));

    let images = ImageStore::new("/nonexistent/path/12345");
    assert!(matches!(images.list(), Err(AssetReviewError::NotFound(_))));
}

/// フォルダが無くても同期はエラーにならない（空の集計）
#[test]
fn test_sync_with_missing_folders() {
    let dir = tempdir().expect("Failed to create temp dir");
    let config = Config::with_paths(
        dir.path().join("no-json"),
        dir.path().join("no-images"),
        dir.path().join("mirror.db"),
    );

    let engine = SyncEngine::open(config).unwrap();
    let report = engine.sync();
    assert_eq!(report.images.report().unwrap().scanned, 0);
    assert_eq!(report.documents.report().unwrap().scanned, 0);

    assert!(matches!(
        engine.list_records(&DashboardFilter::default()),
        Err(AssetReviewError::NotFound(_))
    ));
}

/// DBファイルが無い場合は作らずにエラー
#[test]
fn test_missing_database_is_not_created() {
    let dir = tempdir().expect("Failed to create temp dir");
    let db_path = dir.path().join("missing.db");
    let mirror = MirrorStore::new(&db_path, Duration::from_millis(100));

    assert!(matches!(mirror.connect(), Err(AssetReviewError::Query(_))));
    assert!(!db_path.exists());
}

/// 任意テーブルへの upsert でテーブルが無い場合
#[test]
fn test_upsert_into_missing_table() {
    let dir = tempdir().expect("Failed to create temp dir");
    let db_path = dir.path().join("mirror.db");
    rusqlite::Connection::open(&db_path).unwrap();

    let engine = SyncEngine::open(Config::with_paths(dir.path(), dir.path(), &db_path)).unwrap();
    let row = RowValues::new().with("QR Code", "1");
    let result = engine.upsert_mirror_row("nope", &["QR Code"], &row);
    assert!(matches!(result, Err(AssetReviewError::Schema(_))));
}

/// 利用者向けエラーの分類
#[test]
fn test_user_facing_errors() {
    assert!(AssetReviewError::NotFound("x".into()).is_user_facing());
    assert!(AssetReviewError::Forbidden("x".into()).is_user_facing());
    assert!(AssetReviewError::BadIdentifier("x".into()).is_user_facing());
    assert!(!AssetReviewError::Schema("x".into()).is_user_facing());

    let io = AssetReviewError::from(std::io::Error::new(std::io::ErrorKind::Other, "disk"));
    assert!(!io.is_user_facing());
    assert!(io.to_string().contains("disk"));
}

/// 壊れた設定ファイル
#[test]
fn test_invalid_config_file() {
    let dir = tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("config.json");
    std::fs::write(&path, "{ invalid").unwrap();

    assert!(matches!(Config::load_from(&path), Err(AssetReviewError::JsonParse(_))));
    assert!(Config::load_from(Path::new("/nonexistent/config.json")).is_ok());
}
