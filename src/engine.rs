//! 同期エンジン
//!
//! ストアと処理済みログを保持する。グローバル状態は持たず、
//! `open()` で組み立てて `close()` で閉じる。
//!
//! スキャナごとに try-lock を持ち、実行中に来たトリガーは待たずにスキップする。
//! 画像とJSONのスキャナは互いに独立して同時に動ける。

use crate::approval::{toggle_approval, ToggleOutcome};
use crate::config::Config;
use crate::error::{AssetReviewError, Result};
use crate::export_guard;
use crate::images::ImageStore;
use crate::ledger::{DocumentLedger, ImageLedger};
use crate::mirror::{self, MirrorStore, RowValues, UpsertOutcome};
use crate::review::{self, Dashboard, DashboardFilter, RecordDetail, ReviewEdits, SaveOutcome};
use crate::scanner::{documents, images, PassOutcome};
use crate::store::DocumentStore;
use serde::Serialize;
use std::sync::{Mutex, MutexGuard, TryLockError};

/// `sync()` の結果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub images: PassOutcome,
    pub documents: PassOutcome,
    pub finished_at: String,
}

impl SyncReport {
    pub fn upserted(&self) -> usize {
        self.images.upserted() + self.documents.upserted()
    }
}

pub struct SyncEngine {
    config: Config,
    documents: DocumentStore,
    images: ImageStore,
    mirror: MirrorStore,
    image_ledger: Mutex<ImageLedger>,
    document_ledger: Mutex<DocumentLedger>,
}

/// 実行中なら None（毒化したロックはそのまま引き継ぐ）
fn try_acquire<T>(lock: &Mutex<T>) -> Option<MutexGuard<'_, T>> {
    match lock.try_lock() {
        Ok(guard) => Some(guard),
        Err(TryLockError::WouldBlock) => None,
        Err(TryLockError::Poisoned(poisoned)) => Some(poisoned.into_inner()),
    }
}

fn lock<T>(lock: &Mutex<T>) -> MutexGuard<'_, T> {
    lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl SyncEngine {
    /// 設定からストアを組み立て、処理済みログを読み込む
    pub fn open(config: Config) -> Result<Self> {
        if config.asset_type.trim().is_empty() {
            return Err(AssetReviewError::Config("asset_type が空です".into()));
        }
        if config.tables.dataset_keys.len() != 2 {
            return Err(AssetReviewError::Config(
                "dataset_keys は QR Code と Building の2列を指定してください".into(),
            ));
        }

        let image_ledger = ImageLedger::load(&config.image_ledger_path());
        let document_ledger = DocumentLedger::load(&config.document_ledger_path());
        tracing::debug!(
            images = image_ledger.len(),
            documents = document_ledger.len(),
            "処理済みログを読み込み"
        );

        Ok(Self {
            documents: DocumentStore::new(&config.json_dir, &config.asset_type),
            images: ImageStore::new(&config.image_dir),
            mirror: MirrorStore::new(&config.db_path, config.busy_timeout()),
            image_ledger: Mutex::new(image_ledger),
            document_ledger: Mutex::new(document_ledger),
            config,
        })
    }

    /// 閉じる
    ///
    /// 処理済みログは各パスの終わりに書き出し済みなので、ここでは書かない。
    pub fn close(self) -> Result<()> {
        let (images, documents) = self.ledger_counts();
        tracing::debug!(images, documents, "同期エンジンを閉じる");
        Ok(())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn document_store(&self) -> &DocumentStore {
        &self.documents
    }

    pub fn image_store(&self) -> &ImageStore {
        &self.images
    }

    pub fn mirror(&self) -> &MirrorStore {
        &self.mirror
    }

    /// 画像 → JSON の順に両方のスキャナを実行
    pub fn sync(&self) -> SyncReport {
        let images = self.sync_images();
        let documents = self.sync_documents();
        SyncReport {
            images,
            documents,
            finished_at: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }

    pub fn sync_images(&self) -> PassOutcome {
        let Some(mut ledger) = try_acquire(&self.image_ledger) else {
            tracing::debug!("SYNC-IMG: 実行中のためスキップ");
            return PassOutcome::Skipped;
        };

        let report = images::sync_images(
            &self.images,
            &self.mirror,
            &mut ledger,
            &self.config.tables,
            &self.config.approved_marker,
        );
        PassOutcome::Completed(report)
    }

    pub fn sync_documents(&self) -> PassOutcome {
        let Some(mut ledger) = try_acquire(&self.document_ledger) else {
            tracing::debug!("SYNC-JSON: 実行中のためスキップ");
            return PassOutcome::Skipped;
        };

        let report = documents::sync_documents(
            &self.documents,
            &self.mirror,
            &mut ledger,
            &self.config.tables,
            &self.config.approved_marker,
        );
        PassOutcome::Completed(report)
    }

    /// 承認を反転（エクスポート済みかどうかは呼び出し側が確認する）
    pub fn toggle_approval(&self, doc_id: &str) -> Result<ToggleOutcome> {
        toggle_approval(
            &self.documents,
            &self.mirror,
            &self.config.tables,
            &self.config.approved_marker,
            doc_id,
        )
    }

    /// エクスポート済みなら Forbidden、判定できなければそのエラーを返す
    pub fn toggle_approval_guarded(&self, doc_id: &str) -> Result<ToggleOutcome> {
        let resolved = self.documents.resolve(doc_id)?;
        if self.is_exported(&resolved.name.qr_code)? {
            return Err(AssetReviewError::Forbidden(format!(
                "{} はエクスポート済みです",
                doc_id
            )));
        }
        self.toggle_approval(doc_id)
    }

    pub fn is_exported(&self, qr_code: &str) -> Result<bool> {
        let conn = self.mirror.connect()?;
        export_guard::is_exported(&conn, &self.config.tables, qr_code)
    }

    /// 任意テーブルへのスキーマ対応 upsert（1件ごとにコミット）
    pub fn upsert_mirror_row(&self, table: &str, key_cols: &[&str], row: &RowValues) -> Result<UpsertOutcome> {
        let conn = self.mirror.connect()?;
        let tx = conn.unchecked_transaction()?;
        let outcome = mirror::upsert_row(&tx, table, key_cols, row)?;
        tx.commit()?;
        Ok(outcome)
    }

    pub fn list_records(&self, filter: &DashboardFilter) -> Result<Dashboard> {
        review::list_records(&self.documents, &self.images, filter)
    }

    pub fn record_detail(&self, doc_id: &str) -> Result<RecordDetail> {
        review::record_detail(&self.documents, &self.images, doc_id)
    }

    /// 現在の内容で埋めた編集フォーム
    pub fn current_edits(&self, doc_id: &str) -> Result<ReviewEdits> {
        ReviewEdits::current(&self.documents, doc_id)
    }

    pub fn save_review(&self, doc_id: &str, edits: &ReviewEdits) -> Result<SaveOutcome> {
        review::save_review(
            &self.documents,
            &self.mirror,
            &self.config.tables,
            &self.config.approved_marker,
            doc_id,
            edits,
        )
    }

    /// 処理済みログの件数（画像, JSON）
    pub fn ledger_counts(&self) -> (usize, usize) {
        (lock(&self.image_ledger).len(), lock(&self.document_ledger).len())
    }

    /// 処理済みログを消去（次回は全件を再同期）
    pub fn clear_ledgers(&self) -> Result<bool> {
        let images = lock(&self.image_ledger).clear()?;
        let documents = lock(&self.document_ledger).clear()?;
        Ok(images || documents)
    }
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("json_dir", &self.config.json_dir)
            .field("image_dir", &self.config.image_dir)
            .field("db_path", &self.config.db_path)
            .finish()
    }
}
