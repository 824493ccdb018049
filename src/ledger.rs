//! 処理済みログ（Ledger）
//!
//! - 画像: 改行区切りのファイル名一覧（追記のみ）
//! - JSON: ファイル名 → 最終同期時の更新時刻（秒, f64）のJSONマップ（毎回全体を書き直す）
//!
//! ログが壊れていても致命的にはしない。空として扱い全件を再同期する。

use crate::error::Result;
use std::collections::{BTreeMap, HashSet};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

/// 更新時刻（UNIX秒）
pub fn file_mtime(path: &Path) -> Result<f64> {
    let modified = std::fs::metadata(path)?.modified()?;
    let secs = modified
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0);
    Ok(secs)
}

/// 処理済み画像の一覧
#[derive(Debug, Clone, Default)]
pub struct ImageLedger {
    path: PathBuf,
    entries: HashSet<String>,
}

impl ImageLedger {
    /// 読み込み（無い・読めない場合は空）
    pub fn load(path: &Path) -> Self {
        let mut ledger = Self {
            path: path.to_path_buf(),
            entries: HashSet::new(),
        };

        let file = match File::open(path) {
            Ok(f) => f,
            Err(_) => return ledger,
        };

        for line in BufReader::new(file).lines() {
            match line {
                Ok(line) => {
                    // ファイル名の前後の空白はそのまま（改行コードだけ落とす）
                    let name = line.strip_suffix('\r').unwrap_or(&line);
                    if !name.is_empty() {
                        ledger.entries.insert(name.to_string());
                    }
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "画像ログの読み込みを中断");
                    break;
                }
            }
        }

        ledger
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn contains(&self, file_name: &str) -> bool {
        self.entries.contains(file_name)
    }

    /// 成功したファイル名をまとめて追記
    pub fn append(&mut self, file_names: &[String]) -> Result<()> {
        if file_names.is_empty() {
            return Ok(());
        }

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        let mut writer = BufWriter::new(file);
        for name in file_names {
            writeln!(writer, "{}", name)?;
        }
        writer.flush()?;

        self.entries.extend(file_names.iter().cloned());
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// ログファイルを削除（次回は全画像を再確認）
    pub fn clear(&mut self) -> Result<bool> {
        self.entries.clear();
        remove_if_exists(&self.path)
    }
}

/// 処理済みJSONの更新時刻マップ
#[derive(Debug, Clone, Default)]
pub struct DocumentLedger {
    path: PathBuf,
    entries: BTreeMap<String, f64>,
}

impl DocumentLedger {
    /// 読み込み（無い・壊れている場合は空 = 全件再同期）
    pub fn load(path: &Path) -> Self {
        let mut ledger = Self {
            path: path.to_path_buf(),
            entries: BTreeMap::new(),
        };

        let file = match File::open(path) {
            Ok(f) => f,
            Err(_) => return ledger,
        };

        match serde_json::from_reader(BufReader::new(file)) {
            Ok(entries) => ledger.entries = entries,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "JSONログが読めないため全件を再同期します");
            }
        }

        ledger
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, file_name: &str) -> Option<f64> {
        self.entries.get(file_name).copied()
    }

    /// 未記録、または記録より新しい更新時刻なら要同期
    pub fn is_dirty(&self, file_name: &str, mtime: f64) -> bool {
        match self.entries.get(file_name) {
            Some(&synced) => mtime > synced,
            None => true,
        }
    }

    pub fn record(&mut self, file_name: impl Into<String>, mtime: f64) {
        self.entries.insert(file_name.into(), mtime);
    }

    /// 全体を書き直す（一時ファイル経由で置き換え）
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let tmp_path = self.path.with_extension("log.tmp");
        {
            let file = File::create(&tmp_path)?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, &self.entries)?;
            writer.flush()?;
        }
        std::fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) -> Result<bool> {
        self.entries.clear();
        remove_if_exists(&self.path)
    }
}

fn remove_if_exists(path: &Path) -> Result<bool> {
    if path.exists() {
        std::fs::remove_file(path)?;
        Ok(true)
    } else {
        Ok(false)
    }
}
