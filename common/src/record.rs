//! Capture Record（資産1件の構造化データ）
//!
//! JSONの `structured_data` は自由形式のマップ。ここでは既知の属性だけを
//! 文字列として取り出し、説明文と承認状態を導出する。

use crate::error::{Error, Result};
use serde::Serialize;
use serde_json::{Map, Value};

pub const MANUFACTURER: &str = "Manufacturer";
pub const MODEL: &str = "Model";
pub const SERIAL_NUMBER: &str = "Serial Number";
pub const YEAR: &str = "Year";
pub const UBC_TAG: &str = "UBC Tag";
pub const TECHNICAL_SAFETY_BC: &str = "Technical Safety BC";
pub const ASSET_GROUP: &str = "Asset Group";
pub const ATTRIBUTE: &str = "Attribute";
pub const DIAMETER: &str = "Diameter";
pub const DESCRIPTION: &str = "Description";
pub const FLAGGED: &str = "Flagged";
pub const APPROVED: &str = "Approved";

/// 空文字で補完する属性
pub const ATTRIBUTE_FIELDS: &[&str] = &[
    MANUFACTURER,
    MODEL,
    SERIAL_NUMBER,
    YEAR,
    UBC_TAG,
    TECHNICAL_SAFETY_BC,
    ASSET_GROUP,
    ATTRIBUTE,
    DIAMETER,
];

/// 編集フォームから上書きしないフィールド
pub const NON_EDITABLE_FIELDS: &[&str] = &[FLAGGED, DESCRIPTION, APPROVED];

/// 承認状態（ドキュメント側はセンチネル文字列で保持）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalState {
    NotApproved,
    Approved,
}

impl ApprovalState {
    /// センチネルが承認マーカーと一致する場合のみ Approved
    pub fn from_sentinel(sentinel: &str, marker: &str) -> Self {
        if sentinel == marker {
            ApprovalState::Approved
        } else {
            ApprovalState::NotApproved
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            ApprovalState::NotApproved => ApprovalState::Approved,
            ApprovalState::Approved => ApprovalState::NotApproved,
        }
    }

    /// ドキュメントに書き戻す値
    pub fn sentinel(self, marker: &str) -> String {
        match self {
            ApprovalState::Approved => marker.to_string(),
            ApprovalState::NotApproved => String::new(),
        }
    }

    /// 横長ミラーテーブルの値（"1"/"0"）
    pub fn mirror_flag(self) -> &'static str {
        match self {
            ApprovalState::Approved => "1",
            ApprovalState::NotApproved => "0",
        }
    }

    /// QRコード単位の承認テーブルの値（"1"/""）
    pub fn approval_table_flag(self) -> &'static str {
        match self {
            ApprovalState::Approved => "1",
            ApprovalState::NotApproved => "",
        }
    }

    pub fn is_approved(self) -> bool {
        self == ApprovalState::Approved
    }
}

impl std::fmt::Display for ApprovalState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApprovalState::Approved => write!(f, "approved"),
            ApprovalState::NotApproved => write!(f, "not approved"),
        }
    }
}

/// 説明文: "Asset Group - UBC Tag"、片方だけならその値
pub fn compute_description(asset_group: &str, ubc_tag: &str) -> String {
    let group = asset_group.trim();
    let tag = ubc_tag.trim();
    match (group.is_empty(), tag.is_empty()) {
        (false, false) => format!("{} - {}", group, tag),
        (false, true) => group.to_string(),
        (true, false) => tag.to_string(),
        (true, true) => String::new(),
    }
}

/// JSON値を文字列へ（null → 空文字）
pub fn value_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// 既知キーが無ければ既定値で補完する
pub fn ensure_defaults(data: &mut Map<String, Value>) {
    for field in ATTRIBUTE_FIELDS {
        data.entry(field.to_string())
            .or_insert_with(|| Value::String(String::new()));
    }
    data.entry(FLAGGED.to_string())
        .or_insert_with(|| Value::String("false".into()));
    data.entry(APPROVED.to_string())
        .or_insert_with(|| Value::String(String::new()));
}

/// 資産1件分の属性
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CaptureRecord {
    pub manufacturer: String,
    pub model: String,
    pub serial_number: String,
    pub year: String,
    pub ubc_tag: String,
    pub technical_safety_bc: String,
    pub asset_group: String,
    pub attribute: String,
    pub diameter: String,
    pub flagged: bool,
    /// 承認センチネル（空 = 未承認）
    pub approved: String,
}

impl CaptureRecord {
    pub fn from_map(data: &Map<String, Value>) -> Self {
        let text = |key: &str| value_text(data.get(key));

        Self {
            manufacturer: text(MANUFACTURER),
            model: text(MODEL),
            serial_number: text(SERIAL_NUMBER),
            year: text(YEAR),
            ubc_tag: text(UBC_TAG),
            technical_safety_bc: text(TECHNICAL_SAFETY_BC),
            asset_group: text(ASSET_GROUP),
            attribute: text(ATTRIBUTE),
            diameter: text(DIAMETER),
            flagged: text(FLAGGED) == "true",
            approved: text(APPROVED),
        }
    }

    /// `structured_data` の値から生成（マップ以外はエラー）
    pub fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self::from_map(map)),
            Value::Null => Ok(Self::default()),
            other => Err(Error::InvalidStructuredData(json_kind(other).to_string())),
        }
    }

    pub fn description(&self) -> String {
        compute_description(&self.asset_group, &self.ubc_tag)
    }

    pub fn approval(&self, marker: &str) -> ApprovalState {
        ApprovalState::from_sentinel(&self.approved, marker)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
