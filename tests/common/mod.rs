//! テスト用フィクスチャ
//!
//! 一時フォルダに JSON / 画像 / SQLite ミラーを用意する。

#![allow(dead_code)]

use asset_plate_review::config::Config;
use asset_plate_review::mirror::DATASET_COLUMNS;
use asset_plate_review::SyncEngine;
use rusqlite::{Connection, OptionalExtension};
use serde_json::Value;
use std::path::PathBuf;
use tempfile::{tempdir, TempDir};

pub struct Fixture {
    pub dir: TempDir,
    pub config: Config,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = tempdir().expect("Failed to create temp dir");
        let json_dir = dir.path().join("json");
        let image_dir = dir.path().join("images");
        let data_dir = dir.path().join("data");
        std::fs::create_dir_all(&json_dir).unwrap();
        std::fs::create_dir_all(&image_dir).unwrap();
        std::fs::create_dir_all(&data_dir).unwrap();

        let config = Config::with_paths(json_dir, image_dir, data_dir.join("mirror.db"));
        let fixture = Self { dir, config };
        fixture.create_tables();
        fixture
    }

    /// DBファイルを作らない設定
    pub fn without_database() -> Self {
        let dir = tempdir().expect("Failed to create temp dir");
        let json_dir = dir.path().join("json");
        let image_dir = dir.path().join("images");
        std::fs::create_dir_all(&json_dir).unwrap();
        std::fs::create_dir_all(&image_dir).unwrap();

        let config = Config::with_paths(json_dir, image_dir, dir.path().join("data").join("mirror.db"));
        Self { dir, config }
    }

    fn create_tables(&self) {
        let columns = DATASET_COLUMNS
            .iter()
            .map(|c| format!("\"{}\" TEXT", c))
            .collect::<Vec<_>>()
            .join(", ");

        let conn = Connection::open(&self.config.db_path).unwrap();
        conn.execute_batch(&format!(
            r#"CREATE TABLE "sdi_dataset" ({}, PRIMARY KEY ("QR Code", "Building"));
               CREATE TABLE "QR_codes" ("QR_code_ID" TEXT PRIMARY KEY, "Approved" TEXT);"#,
            columns
        ))
        .unwrap();
    }

    pub fn engine(&self) -> SyncEngine {
        SyncEngine::open(self.config.clone()).expect("エンジンを開けない")
    }

    pub fn conn(&self) -> Connection {
        Connection::open(&self.config.db_path).unwrap()
    }

    pub fn doc_path(&self, file_name: &str) -> PathBuf {
        self.config.json_dir.join(file_name)
    }

    pub fn write_doc(&self, file_name: &str, doc: &Value) {
        std::fs::write(self.doc_path(file_name), serde_json::to_string_pretty(doc).unwrap()).unwrap();
    }

    pub fn read_doc(&self, file_name: &str) -> Value {
        let text = std::fs::read_to_string(self.doc_path(file_name)).unwrap();
        serde_json::from_str(&text).unwrap()
    }

    pub fn add_image(&self, file_name: &str) {
        std::fs::write(self.config.image_dir.join(file_name), b"\xFF\xD8\xFF").unwrap();
    }

    /// 更新時刻を未来へ進める（ファイルシステムの時刻精度に依存しないため）
    pub fn bump_mtime(&self, file_name: &str, secs: i64) {
        let path = self.doc_path(file_name);
        let now = filetime::FileTime::now();
        let later = filetime::FileTime::from_unix_time(now.unix_seconds() + secs, 0);
        filetime::set_file_mtime(&path, later).unwrap();
    }

    pub fn dataset_value(&self, qr: &str, building: &str, column: &str) -> Option<String> {
        let sql = format!(
            r#"SELECT "{}" FROM "sdi_dataset" WHERE "QR Code" = ?1 AND "Building" = ?2"#,
            column
        );
        self.conn()
            .query_row(&sql, [qr, building], |r| r.get::<_, Option<String>>(0))
            .optional()
            .unwrap()
            .flatten()
    }

    pub fn dataset_count(&self) -> i64 {
        self.conn()
            .query_row(r#"SELECT COUNT(*) FROM "sdi_dataset""#, [], |r| r.get(0))
            .unwrap()
    }

    pub fn approval_value(&self, qr: &str) -> Option<String> {
        self.conn()
            .query_row(
                r#"SELECT "Approved" FROM "QR_codes" WHERE "QR_code_ID" = ?1"#,
                [qr],
                |r| r.get::<_, Option<String>>(0),
            )
            .optional()
            .unwrap()
            .flatten()
    }

    pub fn execute(&self, sql: &str) {
        self.conn().execute_batch(sql).unwrap();
    }
}
