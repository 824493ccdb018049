//! JSONフォルダ → ミラー
//!
//! 新規または更新時刻が進んだJSONだけを読み、
//! `structured_data` の属性一式でミラー行を更新する。

use super::{connection, PassReport};
use crate::config::MirrorTables;
use crate::error::{AssetReviewError, Result};
use crate::ledger::{file_mtime, DocumentLedger};
use crate::mirror::{upsert_dataset_row, MirrorStore, UpsertOutcome};
use crate::store::DocumentStore;
use asset_plate_common::CaptureRecord;
use rusqlite::Connection;

/// 1ファイルの処理結果
enum DocumentSync {
    Upserted(UpsertOutcome),
    /// `structured_data` がマップでない（更新時刻が変わるまで再確認しない）
    Invalid,
}

pub fn sync_documents(
    store: &DocumentStore,
    mirror: &MirrorStore,
    ledger: &mut DocumentLedger,
    tables: &MirrorTables,
    approved_marker: &str,
) -> PassReport {
    let mut report = PassReport::default();

    let current = match store.list() {
        Ok(names) => names,
        Err(e) => {
            tracing::warn!(dir = %store.dir().display(), error = %e, "JSONフォルダを読めません");
            return report;
        }
    };
    report.scanned = current.len();

    let mut pending = Vec::new();
    for file_name in current {
        match file_mtime(&store.dir().join(&file_name)) {
            Ok(mtime) if ledger.is_dirty(&file_name, mtime) => pending.push((file_name, mtime)),
            Ok(_) => {}
            Err(e) => {
                report.failed += 1;
                tracing::warn!(file = %file_name, error = %e, "SYNC-JSON: 更新時刻を取得できません");
            }
        }
    }
    report.pending = pending.len();

    if pending.is_empty() {
        return report;
    }

    tracing::info!(count = pending.len(), "SYNC-JSON: 新規/更新JSONを検出");

    let mut conn: Option<Connection> = None;
    for (file_name, mtime) in pending {
        match sync_one(store, mirror, &mut conn, tables, approved_marker, &file_name) {
            Ok(DocumentSync::Upserted(outcome)) => {
                match outcome {
                    UpsertOutcome::Unchanged => report.unchanged += 1,
                    UpsertOutcome::Inserted | UpsertOutcome::Updated => report.upserted += 1,
                }
                tracing::debug!(file = %file_name, ?outcome, "SYNC-JSON");
                ledger.record(file_name, mtime);
            }
            Ok(DocumentSync::Invalid) => {
                report.skipped += 1;
                tracing::warn!(file = %file_name, "SYNC-JSON: 'structured_data' がマップではありません");
                ledger.record(file_name, mtime);
            }
            Err(e) => {
                report.failed += 1;
                tracing::warn!(file = %file_name, error = %e, "SYNC-JSON: 処理に失敗");
            }
        }
    }

    if let Err(e) = ledger.save() {
        tracing::warn!(path = %ledger.path().display(), error = %e, "SYNC-JSON: 処理済みログを書けません");
    }

    report
}

fn sync_one(
    store: &DocumentStore,
    mirror: &MirrorStore,
    conn: &mut Option<Connection>,
    tables: &MirrorTables,
    approved_marker: &str,
    file_name: &str,
) -> Result<DocumentSync> {
    let name = store
        .accepts(file_name)
        .ok_or_else(|| AssetReviewError::BadIdentifier(file_name.to_string()))?;

    let doc = store.load(&store.dir().join(file_name))?;
    let record = match CaptureRecord::from_value(&doc.structured_data) {
        Ok(record) => record,
        Err(_) => return Ok(DocumentSync::Invalid),
    };

    let conn = connection(conn, mirror)?;
    let outcome = upsert_dataset_row(conn, tables, &name.key(), &record, approved_marker)?;
    Ok(DocumentSync::Upserted(outcome))
}
