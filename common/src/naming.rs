//! ファイル命名規則
//!
//! - JSON: `<QR>_<種別>_<Building>.json`（例: `1234_ME_5.json`, `1234_ME_5-1.json`）
//! - 画像: `<QR> <Building> ME - <seq>.<ext>`（seq は 0〜3、拡張子は jpg/jpeg/png、大文字小文字不問）
//! - `_raw_ocr.json` で終わるファイルは常に対象外

use crate::error::{Error, Result};
use regex::Regex;
use serde::Serialize;

/// OCR生データのサフィックス（同期・一覧の対象外）
pub const RAW_OCR_SUFFIX: &str = "_raw_ocr.json";

/// 画像として扱う拡張子（検索順）
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "JPG", "jpeg", "JPEG", "png", "PNG"];

lazy_static::lazy_static! {
    static ref DOCUMENT_NAME_RE: Regex =
        Regex::new(r"^(\d+)_([A-Za-z]+)_(\d+(?:-\d+)?)\.json$").unwrap();
    static ref IMAGE_NAME_RE: Regex =
        Regex::new(r"(?i)^(\d+)\s+(.+?)\s+ME\s+-\s+([0-3])\.(?:jpe?g|png)$").unwrap();
}

/// レコードの複合キー `(QR code, building)`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordKey {
    pub qr_code: String,
    pub building: String,
}

impl RecordKey {
    pub fn new(qr_code: impl Into<String>, building: impl Into<String>) -> Self {
        Self {
            qr_code: qr_code.into(),
            building: building.into(),
        }
    }
}

impl std::fmt::Display for RecordKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.qr_code, self.building)
    }
}

/// JSONファイル名から取り出した識別情報
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentName {
    pub qr_code: String,
    /// ファイル名中央のトークン（`ME` など）
    pub asset_type: String,
    pub building: String,
}

impl DocumentName {
    /// ファイル名（`.json` 付き）をパース
    pub fn parse(file_name: &str) -> Result<Self> {
        if file_name.ends_with(RAW_OCR_SUFFIX) {
            return Err(Error::BadFileName(file_name.to_string()));
        }

        let caps = DOCUMENT_NAME_RE
            .captures(file_name)
            .ok_or_else(|| Error::BadFileName(file_name.to_string()))?;

        Ok(Self {
            qr_code: caps[1].to_string(),
            asset_type: caps[2].to_string(),
            building: caps[3].to_string(),
        })
    }

    /// ドキュメントID（拡張子なし）をパース
    pub fn from_doc_id(doc_id: &str) -> Result<Self> {
        Self::parse(&format!("{}.json", doc_id))
    }

    pub fn doc_id(&self) -> String {
        format!("{}_{}_{}", self.qr_code, self.asset_type, self.building)
    }

    pub fn file_name(&self) -> String {
        format!("{}.json", self.doc_id())
    }

    /// 種別フィルタに一致するか（大文字小文字不問）
    pub fn matches_type(&self, asset_type: &str) -> bool {
        self.asset_type.eq_ignore_ascii_case(asset_type)
    }

    pub fn key(&self) -> RecordKey {
        RecordKey::new(self.qr_code.clone(), self.building.clone())
    }
}

/// 写真のシーケンスタグ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum SeqTag {
    AssetPlate,
    UbcTag,
    MainPicture,
    Extra,
}

impl SeqTag {
    /// レビュー画面に表示するタグ
    pub const ALL: [SeqTag; 4] = [
        SeqTag::AssetPlate,
        SeqTag::UbcTag,
        SeqTag::MainPicture,
        SeqTag::Extra,
    ];

    /// 欠落チェックの対象（-3 は任意）
    pub const REQUIRED: [SeqTag; 3] = [SeqTag::AssetPlate, SeqTag::UbcTag, SeqTag::MainPicture];

    pub fn index(self) -> u8 {
        match self {
            SeqTag::AssetPlate => 0,
            SeqTag::UbcTag => 1,
            SeqTag::MainPicture => 2,
            SeqTag::Extra => 3,
        }
    }

    pub fn from_index(index: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|tag| tag.index() == index)
    }

    pub fn label(self) -> &'static str {
        match self {
            SeqTag::AssetPlate => "Asset Plate",
            SeqTag::UbcTag => "UBC Tag",
            SeqTag::MainPicture => "Main Picture",
            SeqTag::Extra => "Extra",
        }
    }

    /// 拡張子を除いた画像ファイル名
    pub fn image_stem(self, key: &RecordKey) -> String {
        format!("{} {} ME - {}", key.qr_code, key.building, self.index())
    }
}

impl std::fmt::Display for SeqTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "-{}", self.index())
    }
}

/// 画像ファイル名から取り出した識別情報
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageName {
    pub key: RecordKey,
    pub seq: SeqTag,
}

impl ImageName {
    /// 命名規則に合わない場合は None（恒久的にパース不能）
    pub fn parse(file_name: &str) -> Option<Self> {
        let caps = IMAGE_NAME_RE.captures(file_name)?;
        let seq = caps[3].parse::<u8>().ok().and_then(SeqTag::from_index)?;

        Some(Self {
            key: RecordKey::new(caps[1].trim(), caps[2].trim()),
            seq,
        })
    }
}

/// 画像拡張子を持つファイル名か
pub fn is_image_file(file_name: &str) -> bool {
    let lower = file_name.to_ascii_lowercase();
    [".jpg", ".jpeg", ".png"].iter().any(|ext| lower.ends_with(ext))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_document_name() {
        let name = DocumentName::parse("1234_ME_5.json").unwrap();
        assert_eq!(name.qr_code, "1234");
        assert_eq!(name.asset_type, "ME");
        assert_eq!(name.building, "5");
        assert_eq!(name.doc_id(), "1234_ME_5");
    }

    #[test]
    fn test_parse_document_name_sub_building() {
        let name = DocumentName::parse("987_me_102-3.json").unwrap();
        assert_eq!(name.building, "102-3");
        assert!(name.matches_type("ME"));
        assert!(!name.matches_type("EL"));
    }

    #[test]
    fn test_parse_document_name_rejects() {
        assert!(DocumentName::parse("1234_ME_5_raw_ocr.json").is_err());
        assert!(DocumentName::parse("abc_ME_5.json").is_err());
        assert!(DocumentName::parse("1234_ME_5.txt").is_err());
        assert!(DocumentName::from_doc_id("../1234_ME_5").is_err());
    }

    #[test]
    fn test_parse_image_name() {
        let name = ImageName::parse("1234 5 ME - 0.jpg").unwrap();
        assert_eq!(name.key, RecordKey::new("1234", "5"));
        assert_eq!(name.seq, SeqTag::AssetPlate);

        let name = ImageName::parse("55  12-1 me - 3.PNG").unwrap();
        assert_eq!(name.key.building, "12-1");
        assert_eq!(name.seq, SeqTag::Extra);
    }

    #[test]
    fn test_parse_image_name_rejects() {
        assert!(ImageName::parse("1234 5 ME - 4.jpg").is_none());
        assert!(ImageName::parse("1234 5 ME - 0.gif").is_none());
        assert!(ImageName::parse("holiday.jpg").is_none());
    }

    #[test]
    fn test_image_stem() {
        let key = RecordKey::new("1234", "5");
        assert_eq!(SeqTag::MainPicture.image_stem(&key), "1234 5 ME - 2");
    }

    #[test]
    fn test_is_image_file() {
        assert!(is_image_file("a.JPG"));
        assert!(is_image_file("a.jpeg"));
        assert!(is_image_file("a.Png"));
        assert!(!is_image_file("a.json"));
    }
}
