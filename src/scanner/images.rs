//! 画像フォルダ → ミラー
//!
//! 写真がアップロードされた時点で、JSONがまだ無くても
//! `(QR, Building)` の行がミラーに存在するようにする。

use super::{connection, PassReport};
use crate::config::MirrorTables;
use crate::images::ImageStore;
use crate::ledger::ImageLedger;
use crate::mirror::{dataset_row, ensure_row, MirrorStore, UpsertOutcome};
use asset_plate_common::ImageName;
use rusqlite::Connection;

/// 未処理の画像ごとにプレースホルダ行を用意する
pub fn sync_images(
    images: &ImageStore,
    mirror: &MirrorStore,
    ledger: &mut ImageLedger,
    tables: &MirrorTables,
    approved_marker: &str,
) -> PassReport {
    let mut report = PassReport::default();

    let current = match images.list() {
        Ok(names) => names,
        Err(e) => {
            tracing::warn!(dir = %images.dir().display(), error = %e, "画像フォルダを読めません");
            return report;
        }
    };
    report.scanned = current.len();

    let pending: Vec<String> = current
        .into_iter()
        .filter(|name| !ledger.contains(name))
        .collect();
    report.pending = pending.len();

    if pending.is_empty() {
        return report;
    }

    tracing::info!(count = pending.len(), "SYNC-IMG: 新しい画像を検出");

    let mut conn: Option<Connection> = None;
    let mut processed = Vec::with_capacity(pending.len());

    for file_name in pending {
        let Some(image) = ImageName::parse(&file_name) else {
            // 命名規則外は今後も解析できないので処理済みにする
            report.skipped += 1;
            processed.push(file_name);
            continue;
        };

        let result = connection(&mut conn, mirror).and_then(|conn| {
            let tx = conn.unchecked_transaction()?;
            let row = dataset_row(tables, &image.key, None, approved_marker);
            let outcome = ensure_row(&tx, &tables.dataset, &tables.dataset_key_refs(), &row)?;
            tx.commit()?;
            Ok(outcome)
        });

        match result {
            Ok(outcome) => {
                match outcome {
                    UpsertOutcome::Unchanged => report.unchanged += 1,
                    UpsertOutcome::Inserted | UpsertOutcome::Updated => report.upserted += 1,
                }
                tracing::debug!(file = %file_name, key = %image.key, ?outcome, "SYNC-IMG");
                processed.push(file_name);
            }
            Err(e) => {
                report.failed += 1;
                tracing::warn!(file = %file_name, error = %e, "SYNC-IMG: DB upsert failed");
            }
        }
    }

    if let Err(e) = ledger.append(&processed) {
        tracing::warn!(path = %ledger.path().display(), error = %e, "SYNC-IMG: 処理済みログを書けません");
    }

    report
}
