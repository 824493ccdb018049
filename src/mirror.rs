//! リレーショナルミラー（SQLite）
//!
//! テーブルの列構成は実行時に調べ、書き込みたい列との共通部分だけを使う。
//! トランザクションの範囲は呼び出し側が決める。

use crate::config::MirrorTables;
use crate::error::{AssetReviewError, Result};
use asset_plate_common::{ApprovalState, CaptureRecord, RecordKey};
use rusqlite::{ffi, params_from_iter, Connection, OpenFlags, OptionalExtension};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// 横長ミラーの列（存在する列だけ書き込まれる）
pub const DATASET_COLUMNS: &[&str] = &[
    "QR Code",
    "Building",
    "Manufacturer",
    "Model",
    "Serial",
    "UBC Tag",
    "Asset Group",
    "Attribute",
    "Description",
    "Diameter",
    "Year",
    "Technical Safety BC",
    "Approved",
];

/// SQLiteファイルへの接続元
#[derive(Debug, Clone)]
pub struct MirrorStore {
    db_path: PathBuf,
    busy_timeout: Duration,
}

impl MirrorStore {
    pub fn new(db_path: impl Into<PathBuf>, busy_timeout: Duration) -> Self {
        Self {
            db_path: db_path.into(),
            busy_timeout,
        }
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    /// 既存のDBファイルを開く（存在しなければ作らずにエラー）
    pub fn connect(&self) -> Result<Connection> {
        let conn = Connection::open_with_flags(
            &self.db_path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.busy_timeout(self.busy_timeout)?;
        Ok(conn)
    }
}

/// 識別子を二重引用符で囲む
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// テーブルの実際の列名
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnSet {
    columns: HashSet<String>,
}

impl ColumnSet {
    pub fn load(conn: &Connection, table: &str) -> Result<Self> {
        let mut stmt = conn.prepare("SELECT name FROM pragma_table_info(?1)")?;
        let columns = stmt
            .query_map([table], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<HashSet<_>, _>>()?;
        Ok(Self { columns })
    }

    pub fn contains(&self, column: &str) -> bool {
        self.columns.contains(column)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for ColumnSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            columns: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// 書き込みたい行（列名 → 文字列、挿入順を保持）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowValues {
    values: Vec<(String, String)>,
}

impl RowValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(column, value);
        self
    }

    pub fn set(&mut self, column: impl Into<String>, value: impl Into<String>) {
        let column = column.into();
        let value = value.into();
        match self.values.iter_mut().find(|(c, _)| *c == column) {
            Some(entry) => entry.1 = value,
            None => self.values.push((column, value)),
        }
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(c, _)| c == column)
            .map(|(_, v)| v.as_str())
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(|(c, _)| c.as_str())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// 実在する列だけに絞り込み、キー列を必ず含める
    fn restrict(&self, table: &str, key_cols: &[&str], columns: &ColumnSet) -> Result<RowValues> {
        let mut filtered = RowValues {
            values: self
                .values
                .iter()
                .filter(|(c, _)| columns.contains(c))
                .cloned()
                .collect(),
        };

        for key in key_cols {
            if !columns.contains(key) {
                return Err(AssetReviewError::Schema(format!(
                    "キー列 \"{}\" がテーブル \"{}\" にありません",
                    key, table
                )));
            }
            if filtered.get(key).is_none() {
                filtered.set(*key, "");
            }
        }

        Ok(filtered)
    }
}

/// upsertの結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Updated,
    Inserted,
    /// 行は既に存在し、書き込む非キー列がなかった
    Unchanged,
}

fn load_columns(conn: &Connection, table: &str) -> Result<ColumnSet> {
    let columns = ColumnSet::load(conn, table)?;
    if columns.is_empty() {
        return Err(AssetReviewError::Schema(format!(
            "テーブル \"{}\" が存在しないか列がありません",
            table
        )));
    }
    Ok(columns)
}

/// 主キー・一意制約の衝突だけを同時書き込みとみなす（NOT NULL や CHECK は含めない）
fn is_key_conflict(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                || e.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

fn where_clause(key_cols: &[&str]) -> String {
    key_cols
        .iter()
        .map(|k| format!("{} = ?", quote_ident(k)))
        .collect::<Vec<_>>()
        .join(" AND ")
}

fn key_values<'a>(row: &'a RowValues, key_cols: &[&str]) -> Vec<&'a str> {
    key_cols.iter().map(|k| row.get(k).unwrap_or("")).collect()
}

fn row_exists(conn: &Connection, table: &str, key_cols: &[&str], row: &RowValues) -> Result<bool> {
    let sql = format!(
        "SELECT 1 FROM {} WHERE {} LIMIT 1",
        quote_ident(table),
        where_clause(key_cols)
    );
    let found = conn
        .query_row(&sql, params_from_iter(key_values(row, key_cols)), |_| Ok(()))
        .optional()?;
    Ok(found.is_some())
}

fn update_row(conn: &Connection, table: &str, key_cols: &[&str], row: &RowValues) -> Result<usize> {
    let set_cols: Vec<&str> = row.columns().filter(|c| !key_cols.contains(c)).collect();
    if set_cols.is_empty() {
        return Ok(usize::from(row_exists(conn, table, key_cols, row)?));
    }

    let set_clause = set_cols
        .iter()
        .map(|c| format!("{} = ?", quote_ident(c)))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "UPDATE {} SET {} WHERE {}",
        quote_ident(table),
        set_clause,
        where_clause(key_cols)
    );

    let mut params: Vec<&str> = set_cols.iter().map(|c| row.get(c).unwrap_or("")).collect();
    params.extend(key_values(row, key_cols));

    Ok(conn.execute(&sql, params_from_iter(params))?)
}

fn insert_row(conn: &Connection, table: &str, row: &RowValues) -> rusqlite::Result<usize> {
    let cols: Vec<&str> = row.columns().collect();
    let placeholders = vec!["?"; cols.len()].join(", ");
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_ident(table),
        cols.iter().map(|c| quote_ident(c)).collect::<Vec<_>>().join(", "),
        placeholders
    );
    conn.execute(&sql, params_from_iter(cols.iter().map(|c| row.get(c).unwrap_or(""))))
}

/// スキーマ対応 upsert
///
/// 1. 実際の列を取得（列なし = テーブルなし → Schema）
/// 2. 書き込みたい列と共通部分をとる（無い列は黙って捨てる）
/// 3. キー列が実在しなければ Schema
/// 4. キー一致で UPDATE、0件なら INSERT
pub fn upsert_row(
    conn: &Connection,
    table: &str,
    key_cols: &[&str],
    row: &RowValues,
) -> Result<UpsertOutcome> {
    let columns = load_columns(conn, table)?;
    let filtered = row.restrict(table, key_cols, &columns)?;

    if update_row(conn, table, key_cols, &filtered)? > 0 {
        return Ok(if has_payload(&filtered, key_cols) {
            UpsertOutcome::Updated
        } else {
            UpsertOutcome::Unchanged
        });
    }

    insert_or_update(conn, table, key_cols, &filtered)
}

fn has_payload(row: &RowValues, key_cols: &[&str]) -> bool {
    row.columns().any(|c| !key_cols.contains(&c))
}

/// INSERT がキー衝突で失敗した場合は、同じキーへの同時初回書き込みとみなして
/// UPDATE をやり直す。やり直しでも行が見つからなければ INSERT のエラーを返す。
fn insert_or_update(
    conn: &Connection,
    table: &str,
    key_cols: &[&str],
    row: &RowValues,
) -> Result<UpsertOutcome> {
    match insert_row(conn, table, row) {
        Ok(_) => Ok(UpsertOutcome::Inserted),
        Err(e) if is_key_conflict(&e) => {
            tracing::debug!(table, "INSERT conflicted, retrying as UPDATE");
            if update_row(conn, table, key_cols, row)? == 0 {
                return Err(e.into());
            }
            Ok(if has_payload(row, key_cols) {
                UpsertOutcome::Updated
            } else {
                UpsertOutcome::Unchanged
            })
        }
        Err(e) => Err(e.into()),
    }
}

/// 行が無ければ挿入する（既存行は一切変更しない）
pub fn ensure_row(
    conn: &Connection,
    table: &str,
    key_cols: &[&str],
    row: &RowValues,
) -> Result<UpsertOutcome> {
    let columns = load_columns(conn, table)?;
    let filtered = row.restrict(table, key_cols, &columns)?;

    if row_exists(conn, table, key_cols, &filtered)? {
        return Ok(UpsertOutcome::Unchanged);
    }

    insert_or_keep(conn, table, key_cols, &filtered)
}

/// キー衝突は、同じキーの行が実在する場合に限り Unchanged
fn insert_or_keep(
    conn: &Connection,
    table: &str,
    key_cols: &[&str],
    row: &RowValues,
) -> Result<UpsertOutcome> {
    match insert_row(conn, table, row) {
        Ok(_) => Ok(UpsertOutcome::Inserted),
        Err(e) if is_key_conflict(&e) => {
            if row_exists(conn, table, key_cols, row)? {
                Ok(UpsertOutcome::Unchanged)
            } else {
                Err(e.into())
            }
        }
        Err(e) => Err(e.into()),
    }
}

/// 横長ミラーの1行（record が None なら全属性空・未承認）
pub fn dataset_row(
    tables: &MirrorTables,
    key: &RecordKey,
    record: Option<&CaptureRecord>,
    approved_marker: &str,
) -> RowValues {
    let empty = CaptureRecord::default();
    let record = record.unwrap_or(&empty);
    let approval = ApprovalState::from_sentinel(&record.approved, approved_marker);

    let mut row = RowValues::new();
    let key_values = [key.qr_code.clone(), key.building.clone()];
    for (column, value) in tables.dataset_keys.iter().zip(key_values) {
        row.set(column.clone(), value);
    }

    row.with("Manufacturer", record.manufacturer.clone())
        .with("Model", record.model.clone())
        .with("Serial", record.serial_number.clone())
        .with("UBC Tag", record.ubc_tag.clone())
        .with("Asset Group", record.asset_group.clone())
        .with("Attribute", record.attribute.clone())
        .with("Description", record.description())
        .with("Diameter", record.diameter.clone())
        .with("Year", record.year.clone())
        .with("Technical Safety BC", record.technical_safety_bc.clone())
        .with("Approved", approval.mirror_flag())
}

/// 横長ミラーへ1件書き込む（トランザクション内でコミットまで行う）
pub fn upsert_dataset_row(
    conn: &Connection,
    tables: &MirrorTables,
    key: &RecordKey,
    record: &CaptureRecord,
    approved_marker: &str,
) -> Result<UpsertOutcome> {
    let tx = conn.unchecked_transaction()?;
    let row = dataset_row(tables, key, Some(record), approved_marker);
    let outcome = upsert_row(&tx, &tables.dataset, &tables.dataset_key_refs(), &row)?;
    tx.commit()?;
    Ok(outcome)
}

/// QRコード単位の承認テーブルへ書き込む
pub fn upsert_approval_flag(
    conn: &Connection,
    tables: &MirrorTables,
    qr_code: &str,
    approval: ApprovalState,
) -> Result<UpsertOutcome> {
    let tx = conn.unchecked_transaction()?;
    let row = RowValues::new()
        .with(tables.approvals_key.clone(), qr_code)
        .with(tables.approvals_column.clone(), approval.approval_table_flag());
    let outcome = upsert_row(&tx, &tables.approvals, &[tables.approvals_key.as_str()], &row)?;
    tx.commit()?;
    Ok(outcome)
}
