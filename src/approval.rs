//! 承認状態の切り替え
//!
//! NotApproved（センチネル = 空）⇄ Approved（センチネル = 承認マーカー）の単純なトグル。
//!
//! ## 処理順
//! 1. JSONのセンチネルを反転してファイル全体を書き戻す（ここが確定点）
//! 2. QRコード単位の承認テーブルへ "1"/"" を書き込む
//! 3. 横長ミラー行を属性一式で更新する
//!
//! 2・3 の失敗はログに残すだけで、トグル自体は成功として返す。
//! ファイルの更新時刻が進んでいるので、次回のJSON同期でミラーは追いつく。

use crate::config::MirrorTables;
use crate::error::Result;
use crate::mirror::{upsert_approval_flag, upsert_dataset_row, MirrorStore};
use crate::store::DocumentStore;
use asset_plate_common::record::{value_text, APPROVED};
use asset_plate_common::{ApprovalState, CaptureRecord, RecordKey};
use serde::Serialize;
use serde_json::Value;

/// トグルの結果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToggleOutcome {
    pub doc_id: String,
    pub qr_code: String,
    pub state: ApprovalState,
    /// ドキュメントに書き込んだセンチネル
    pub new_value: String,
    /// 両方のミラーへの書き込みが成功したか
    pub mirror_synced: bool,
}

/// 承認を反転する
///
/// 事前条件（ID形式・種別・存在）を満たさない場合は
/// `BadIdentifier` / `Forbidden` / `NotFound`。ファイルの読み書き失敗は呼び出し側へ返す。
pub fn toggle_approval(
    store: &DocumentStore,
    mirror: &MirrorStore,
    tables: &MirrorTables,
    approved_marker: &str,
    doc_id: &str,
) -> Result<ToggleOutcome> {
    let resolved = store.resolve(doc_id)?;
    let mut doc = store.load(&resolved.path)?;
    let structured = doc.structured_mut()?;
    let current = value_text(structured.get(APPROVED));
    let next = ApprovalState::from_sentinel(&current, approved_marker).toggled();
    let new_value = next.sentinel(approved_marker);
    structured.insert(APPROVED.to_string(), Value::String(new_value.clone()));
    let record = CaptureRecord::from_map(structured);

    store.save(&resolved.path, &doc)?;
    tracing::info!(doc_id, state = %next, "承認状態を更新");

    let key = resolved.name.key();
    let mirror_synced = mirror_approval(mirror, tables, approved_marker, &key, &record, next);

    Ok(ToggleOutcome {
        doc_id: doc_id.to_string(),
        qr_code: key.qr_code,
        state: next,
        new_value,
        mirror_synced,
    })
}

/// ミラー2か所へ反映（失敗は警告のみ）
fn mirror_approval(
    mirror: &MirrorStore,
    tables: &MirrorTables,
    approved_marker: &str,
    key: &RecordKey,
    record: &CaptureRecord,
    state: ApprovalState,
) -> bool {
    let conn = match mirror.connect() {
        Ok(conn) => conn,
        Err(e) => {
            tracing::warn!(key = %key, error = %e, "承認のミラー反映をスキップ（DBに接続できません）");
            return false;
        }
    };

    let mut synced = true;

    if let Err(e) = upsert_approval_flag(&conn, tables, &key.qr_code, state) {
        synced = false;
        tracing::warn!(table = %tables.approvals, key = %key, error = %e, "承認テーブルの更新に失敗");
    }

    if let Err(e) = upsert_dataset_row(&conn, tables, key, record, approved_marker) {
        synced = false;
        tracing::warn!(table = %tables.dataset, key = %key, error = %e, "ミラー行の更新に失敗");
    }

    synced
}
