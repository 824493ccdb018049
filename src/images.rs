//! 写真（Image Asset）の存在確認
//!
//! 写真自体は状態を持たず、命名規則に一致するファイルの有無だけで判定する。

use crate::error::{AssetReviewError, Result};
use asset_plate_common::naming::IMAGE_EXTENSIONS;
use asset_plate_common::{is_image_file, RecordKey, SeqTag};
use serde::Serialize;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Clone)]
pub struct ImageStore {
    dir: PathBuf,
}

/// シーケンスタグごとの写真
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageSlot {
    pub seq: SeqTag,
    pub file_name: Option<String>,
}

impl ImageStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `<QR> <Building> ME - <seq>.<ext>` を拡張子順に探す
    pub fn find_image(&self, key: &RecordKey, seq: SeqTag) -> Option<String> {
        let stem = seq.image_stem(key);
        IMAGE_EXTENSIONS
            .iter()
            .map(|ext| format!("{}.{}", stem, ext))
            .find(|name| self.dir.join(name).is_file())
    }

    /// レビュー表示用（-0〜-3）
    pub fn image_map(&self, key: &RecordKey) -> Vec<ImageSlot> {
        SeqTag::ALL
            .iter()
            .map(|&seq| ImageSlot {
                seq,
                file_name: self.find_image(key, seq),
            })
            .collect()
    }

    /// 必須写真（-0〜-2）のうち欠けているタグ
    pub fn missing_required(&self, key: &RecordKey) -> Vec<SeqTag> {
        SeqTag::REQUIRED
            .iter()
            .copied()
            .filter(|&seq| self.find_image(key, seq).is_none())
            .collect()
    }

    /// フォルダ直下の画像ファイル名
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
            .filter(|name| is_image_file(name))
            .collect();

        names.sort();
        Ok(names)
    }
}
