use crate::error::{AssetReviewError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const IMAGE_LEDGER_FILE: &str = "processed_images.log";
pub const DOCUMENT_LEDGER_FILE: &str = "processed_json.log";

/// ミラー先テーブル名とキー列
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MirrorTables {
    /// 横長ミラー（QR Code + Building）
    pub dataset: String,
    pub dataset_keys: Vec<String>,
    /// QRコード単位の承認テーブル
    pub approvals: String,
    pub approvals_key: String,
    pub approvals_column: String,
    /// エクスポート済みマーカー（読み取り専用）
    pub exported: String,
    pub exported_key: String,
}

impl Default for MirrorTables {
    fn default() -> Self {
        Self {
            dataset: "sdi_dataset".into(),
            dataset_keys: vec!["QR Code".into(), "Building".into()],
            approvals: "QR_codes".into(),
            approvals_key: "QR_code_ID".into(),
            approvals_column: "Approved".into(),
            exported: "sdi_print_out".into(),
            exported_key: "QR Code".into(),
        }
    }
}

impl MirrorTables {
    pub fn dataset_key_refs(&self) -> Vec<&str> {
        self.dataset_keys.iter().map(String::as_str).collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// OCR結果JSONのフォルダ
    pub json_dir: PathBuf,
    /// アップロード写真のフォルダ
    pub image_dir: PathBuf,
    /// SQLiteミラーのパス
    pub db_path: PathBuf,
    /// 処理済みログの置き場（未指定ならDBと同じフォルダ）
    pub ledger_dir: Option<PathBuf>,
    /// 対象とする種別トークン
    pub asset_type: String,
    /// 承認済みを表すセンチネル
    pub approved_marker: String,
    pub busy_timeout_ms: u64,
    pub tables: MirrorTables,
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        Self::load_from(&config_path)
    }

    /// 指定パスから読み込み（無ければ既定値）
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            serde_json::from_str(&content)?
        } else {
            Self::default_config()
        };

        // 環境変数を優先
        if let Ok(db_path) = std::env::var("ASSET_REVIEW_DB") {
            if !db_path.trim().is_empty() {
                config.db_path = PathBuf::from(db_path);
            }
        }

        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| AssetReviewError::Config("ホームディレクトリが見つかりません".into()))?;
        Ok(home.join(".config").join("asset-review").join("config.json"))
    }

    fn default_config() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("asset-review");

        Self {
            json_dir: data_dir.join("Output_jason_api"),
            image_dir: data_dir.join("Capture_photos_upload"),
            db_path: data_dir.join("data").join("QR_codes.db"),
            ledger_dir: None,
            asset_type: "ME".into(),
            approved_marker: "True".into(),
            busy_timeout_ms: 5_000,
            tables: MirrorTables::default(),
        }
    }

    pub fn ledger_dir(&self) -> PathBuf {
        match &self.ledger_dir {
            Some(dir) => dir.clone(),
            None => self
                .db_path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from(".")),
        }
    }

    pub fn image_ledger_path(&self) -> PathBuf {
        self.ledger_dir().join(IMAGE_LEDGER_FILE)
    }

    pub fn document_ledger_path(&self) -> PathBuf {
        self.ledger_dir().join(DOCUMENT_LEDGER_FILE)
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    /// テスト・組み込み用: 3つのパスだけ差し替えた設定
    pub fn with_paths(json_dir: impl Into<PathBuf>, image_dir: impl Into<PathBuf>, db_path: impl Into<PathBuf>) -> Self {
        Self {
            json_dir: json_dir.into(),
            image_dir: image_dir.into(),
            db_path: db_path.into(),
            ..Self::default_config()
        }
    }
}
