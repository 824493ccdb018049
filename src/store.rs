//! ドキュメントストア
//!
//! 1資産 = 1 JSONファイル。外部のキャプチャ処理が作成し、
//! レビュー操作（属性編集・承認切替）がファイル全体を書き戻す。

use crate::error::{AssetReviewError, Result};
use asset_plate_common::naming::RAW_OCR_SUFFIX;
use asset_plate_common::{CaptureRecord, DocumentName, Error as CommonError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs::File;
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// JSONファイルの中身
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CaptureDocument {
    #[serde(default)]
    pub structured_data: Value,

    #[serde(default)]
    pub modified: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_type: Option<String>,

    /// 未知のトップレベル項目（書き戻し時に保持）
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CaptureDocument {
    /// `structured_data` をマップとして取得
    ///
    /// null・欠落なら空のマップで置き換える。マップ以外は書き換えずにエラー。
    pub fn structured_mut(&mut self) -> Result<&mut Map<String, Value>> {
        if self.structured_data.is_null() {
            self.structured_data = Value::Object(Map::new());
        }
        self.structured_data.as_object_mut().ok_or_else(|| {
            AssetReviewError::Common(CommonError::InvalidStructuredData(
                "structured_data is not an object".into(),
            ))
        })
    }

    pub fn record(&self) -> Result<CaptureRecord> {
        Ok(CaptureRecord::from_value(&self.structured_data)?)
    }
}

/// ドキュメントIDの解決結果
#[derive(Debug, Clone)]
pub struct ResolvedDocument {
    pub name: DocumentName,
    pub path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct DocumentStore {
    dir: PathBuf,
    asset_type: String,
}

impl DocumentStore {
    pub fn new(dir: impl Into<PathBuf>, asset_type: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            asset_type: asset_type.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn asset_type(&self) -> &str {
        &self.asset_type
    }

    /// ファイル名が同期・一覧の対象か
    pub fn accepts(&self, file_name: &str) -> Option<DocumentName> {
        if file_name.ends_with(RAW_OCR_SUFFIX) {
            return None;
        }
        DocumentName::parse(file_name)
            .ok()
            .filter(|name| name.matches_type(&self.asset_type))
    }

    /// ドキュメントIDを検証してパスを返す
    ///
    /// 順序: ID形式 → 種別フィルタ → 存在確認。
    /// 対象外の種別は存在有無に関わらず Forbidden にする。
    pub fn resolve(&self, doc_id: &str) -> Result<ResolvedDocument> {
        let name = DocumentName::from_doc_id(doc_id)
            .map_err(|_| AssetReviewError::BadIdentifier(doc_id.to_string()))?;

        if !name.matches_type(&self.asset_type) {
            return Err(AssetReviewError::Forbidden(doc_id.to_string()));
        }

        let path = self.dir.join(name.file_name());
        if !path.is_file() {
            return Err(AssetReviewError::NotFound(doc_id.to_string()));
        }

        Ok(ResolvedDocument { name, path })
    }

    /// 対象ファイル名の一覧（ファイル名順）
    pub fn list(&self) -> Result<Vec<String>> {
        if !self.dir.is_dir() {
            return Err(AssetReviewError::NotFound(self.dir.display().to_string()));
        }

        let mut names: Vec<String> = WalkDir::new(&self.dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter_map(|e| e.file_name().to_str().map(str::to_string))
            .filter(|name| self.accepts(name).is_some())
            .collect();

        names.sort();
        Ok(names)
    }

    pub fn load(&self, path: &Path) -> Result<CaptureDocument> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let doc = serde_json::from_reader(reader)?;
        Ok(doc)
    }

    /// ファイル全体を書き戻す（4スペースインデント、UTF-8そのまま）
    ///
    /// 一時ファイルに書いてから置き換えるので、途中で落ちても元のファイルは残る。
    pub fn save(&self, path: &Path, doc: &CaptureDocument) -> Result<()> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        doc.serialize(&mut ser)?;

        let tmp_path = path.with_extension("json.tmp");
        {
            let mut file = File::create(&tmp_path)?;
            file.write_all(&buf)?;
            file.sync_all()?;
        }
        std::fs::rename(&tmp_path, path)?;
        Ok(())
    }
}
