//! レビュー作業: 一覧表示と属性編集
//!
//! 画面の描画は外側のレイヤーが行う。ここでは一覧用の集計と、
//! 編集内容をドキュメントへ反映してミラーへ流すところまでを扱う。

use crate::config::MirrorTables;
use crate::error::Result;
use crate::images::{ImageSlot, ImageStore};
use crate::mirror::{upsert_dataset_row, MirrorStore};
use crate::store::DocumentStore;
use asset_plate_common::record::{
    compute_description, ensure_defaults, value_text, ASSET_GROUP, DESCRIPTION, FLAGGED,
    NON_EDITABLE_FIELDS, UBC_TAG,
};
use asset_plate_common::{CaptureRecord, DocumentName, SeqTag};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// 一覧の1行
#[derive(Debug, Clone, Serialize)]
pub struct RecordSummary {
    pub doc_id: String,
    pub qr_code: String,
    pub building: String,
    pub description: String,
    pub flagged: bool,
    /// 承認センチネル（空 = 未承認）
    pub approved: String,
    pub modified: bool,
    /// 必須写真（-0〜-2）で欠けているもの
    pub missing_photos: Vec<SeqTag>,
    pub record: CaptureRecord,
}

impl RecordSummary {
    pub fn missed_photo(&self) -> bool {
        !self.missing_photos.is_empty()
    }

    /// 例: "Asset Plate, Main Picture"
    pub fn missing_list(&self) -> String {
        self.missing_photos
            .iter()
            .map(|tag| tag.label())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// 例: "2/3"
    pub fn photos_summary(&self) -> String {
        let required = SeqTag::REQUIRED.len();
        format!("{}/{}", required - self.missing_photos.len(), required)
    }
}

/// 一覧の絞り込み条件
#[derive(Debug, Clone, Copy, Default)]
pub struct DashboardFilter {
    pub flagged: bool,
    pub modified: bool,
    pub missed: bool,
}

impl DashboardFilter {
    fn matches(&self, item: &RecordSummary) -> bool {
        (!self.flagged || item.flagged)
            && (!self.modified || item.modified)
            && (!self.missed || item.missed_photo())
    }
}

/// 一覧と件数
#[derive(Debug, Clone, Default, Serialize)]
pub struct Dashboard {
    pub items: Vec<RecordSummary>,
    pub count_flagged: usize,
    pub count_modified: usize,
    pub count_missed: usize,
}

/// 対象種別のドキュメントを一覧化する（件数は絞り込み前の全体）
pub fn list_records(
    store: &DocumentStore,
    images: &ImageStore,
    filter: &DashboardFilter,
) -> Result<Dashboard> {
    let mut all = Vec::new();

    for file_name in store.list()? {
        let Ok(name) = DocumentName::parse(&file_name) else {
            continue;
        };

        match summarize(store, images, &name) {
            Ok(item) => all.push(item),
            Err(e) => tracing::warn!(file = %file_name, error = %e, "一覧から除外"),
        }
    }

    let mut dashboard = Dashboard {
        count_flagged: all.iter().filter(|i| i.flagged).count(),
        count_modified: all.iter().filter(|i| i.modified).count(),
        count_missed: all.iter().filter(|i| i.missed_photo()).count(),
        ..Default::default()
    };
    dashboard.items = all.into_iter().filter(|i| filter.matches(i)).collect();

    Ok(dashboard)
}

fn summarize(store: &DocumentStore, images: &ImageStore, name: &DocumentName) -> Result<RecordSummary> {
    let doc = store.load(&store.dir().join(name.file_name()))?;
    let record = doc.record()?;
    let key = name.key();

    Ok(RecordSummary {
        doc_id: name.doc_id(),
        qr_code: key.qr_code.clone(),
        building: key.building.clone(),
        description: record.description(),
        flagged: record.flagged,
        approved: record.approved.clone(),
        modified: doc.modified,
        missing_photos: images.missing_required(&key),
        record,
    })
}

/// レビュー画面1件分（写真は -0〜-3）
#[derive(Debug, Clone, Serialize)]
pub struct RecordDetail {
    pub summary: RecordSummary,
    pub photos: Vec<ImageSlot>,
}

pub fn record_detail(store: &DocumentStore, images: &ImageStore, doc_id: &str) -> Result<RecordDetail> {
    let resolved = store.resolve(doc_id)?;
    let summary = summarize(store, images, &resolved.name)?;
    let photos = images.image_map(&resolved.name.key());
    Ok(RecordDetail { summary, photos })
}

/// 編集内容（フォーム全体）
///
/// `fields` に無い編集可能項目は空文字として扱う。
#[derive(Debug, Clone, Default)]
pub struct ReviewEdits {
    pub flagged: bool,
    pub fields: BTreeMap<String, String>,
}

impl ReviewEdits {
    /// 現在のドキュメント内容で埋めたフォーム
    pub fn current(store: &DocumentStore, doc_id: &str) -> Result<Self> {
        let resolved = store.resolve(doc_id)?;
        let mut doc = store.load(&resolved.path)?;

        let structured = doc.structured_mut()?;
        ensure_defaults(structured);

        let fields = structured
            .iter()
            .filter(|(k, _)| !NON_EDITABLE_FIELDS.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), value_text(Some(v))))
            .collect();

        Ok(Self {
            flagged: value_text(structured.get(FLAGGED)) == "true",
            fields,
        })
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(field.into(), value.into());
    }
}

/// 保存結果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SaveOutcome {
    pub doc_id: String,
    /// 今回の保存で何か変わったか
    pub changed: bool,
    pub mirror_synced: bool,
}

/// 編集内容をドキュメントへ書き戻し、ミラー行を更新する
pub fn save_review(
    store: &DocumentStore,
    mirror: &MirrorStore,
    tables: &MirrorTables,
    approved_marker: &str,
    doc_id: &str,
    edits: &ReviewEdits,
) -> Result<SaveOutcome> {
    let resolved = store.resolve(doc_id)?;
    let mut doc = store.load(&resolved.path)?;
    let mut changed = false;

    let structured = doc.structured_mut()?;
    ensure_defaults(structured);

    let new_flagged = if edits.flagged { "true" } else { "false" };
    if value_text(structured.get(FLAGGED)) != new_flagged {
        changed = true;
    }
    structured.insert(FLAGGED.to_string(), Value::String(new_flagged.to_string()));

    let editable: Vec<String> = structured
        .keys()
        .filter(|k| !NON_EDITABLE_FIELDS.contains(&k.as_str()))
        .cloned()
        .collect();
    for field in editable {
        let submitted = edits.fields.get(&field).cloned().unwrap_or_default();
        if value_text(structured.get(&field)) != submitted {
            changed = true;
        }
        structured.insert(field, Value::String(submitted));
    }

    for (field, value) in &edits.fields {
        if NON_EDITABLE_FIELDS.contains(&field.as_str()) || structured.contains_key(field) {
            continue;
        }
        structured.insert(field.clone(), Value::String(value.clone()));
        changed = true;
    }

    let description = compute_description(
        &value_text(structured.get(ASSET_GROUP)),
        &value_text(structured.get(UBC_TAG)),
    );
    structured.insert(DESCRIPTION.to_string(), Value::String(description));
    let record = CaptureRecord::from_map(structured);

    if changed {
        doc.modified = true;
    }
    store.save(&resolved.path, &doc)?;
    tracing::info!(doc_id, changed, "レビュー内容を保存");

    let key = resolved.name.key();
    let mirror_synced = match mirror
        .connect()
        .and_then(|conn| upsert_dataset_row(&conn, tables, &key, &record, approved_marker))
    {
        Ok(_) => true,
        Err(e) => {
            tracing::warn!(key = %key, error = %e, "保存後のミラー更新に失敗");
            false
        }
    };

    Ok(SaveOutcome {
        doc_id: doc_id.to_string(),
        changed,
        mirror_synced,
    })
}
