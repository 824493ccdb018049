//! ディレクトリ同期スキャナ
//!
//! ファイルシステム（正本）と処理済みログの差分を取り、
//! 差分だけをSQLiteミラーへ反映する。
//!
//! ## 失敗時の方針
//! - 1ファイルの失敗はログに出してそのファイルだけ次回に回す
//! - パス全体はエラーにしない

pub mod documents;
pub mod images;

use crate::error::Result;
use crate::mirror::MirrorStore;
use rusqlite::Connection;
use serde::Serialize;

/// 接続は最初に必要になった時に1回だけ開く（失敗したら次のファイルで再試行）
fn connection<'a>(slot: &'a mut Option<Connection>, mirror: &MirrorStore) -> Result<&'a Connection> {
    let conn = match slot.take() {
        Some(conn) => conn,
        None => mirror.connect()?,
    };
    Ok(&*slot.insert(conn))
}

/// 1回のパスの集計
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PassReport {
    /// フォルダ内の対象ファイル数
    pub scanned: usize,
    /// 処理済みログとの差分
    pub pending: usize,
    /// ミラーへの書き込み（新規・更新）
    pub upserted: usize,
    /// 既存行のため書き込み不要だったもの
    pub unchanged: usize,
    /// 処理済みとして記録したが反映しなかったもの（命名不一致・不正データ）
    pub skipped: usize,
    /// 次回に再試行するもの
    pub failed: usize,
}

/// パスの結果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PassOutcome {
    Completed(PassReport),
    /// 別のパスが実行中のため何もしなかった
    Skipped,
}

impl PassOutcome {
    pub fn report(&self) -> Option<&PassReport> {
        match self {
            PassOutcome::Completed(report) => Some(report),
            PassOutcome::Skipped => None,
        }
    }

    pub fn upserted(&self) -> usize {
        self.report().map(|r| r.upserted).unwrap_or(0)
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, PassOutcome::Skipped)
    }
}

impl std::fmt::Display for PassOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PassOutcome::Skipped => write!(f, "実行中のためスキップ"),
            PassOutcome::Completed(r) => write!(
                f,
                "対象 {} / 差分 {} / 反映 {} / 変更なし {} / スキップ {} / 失敗 {}",
                r.scanned, r.pending, r.upserted, r.unchanged, r.skipped, r.failed
            ),
        }
    }
}
