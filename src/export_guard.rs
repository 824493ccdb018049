//! エクスポート済み判定
//!
//! 下流システムへ出力済みのQRコードは承認状態を変更できない。
//! このモジュールは参照のみで、マーカーテーブルには書き込まない。

use crate::config::MirrorTables;
use crate::error::Result;
use crate::mirror::quote_ident;
use rusqlite::{Connection, OptionalExtension};

fn is_missing_table(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(_, Some(msg)) => msg.to_lowercase().contains("no such table"),
        _ => false,
    }
}

/// QRコードの行がエクスポートテーブルにあるか
///
/// テーブル自体が無い場合はまだ一度もエクスポートしていないので false。
/// それ以外のDBエラーは `Query` として返す（呼び出し側はどちらとも判断しないこと）。
pub fn is_exported(conn: &Connection, tables: &MirrorTables, qr_code: &str) -> Result<bool> {
    let sql = format!(
        "SELECT 1 FROM {} WHERE {} = ?1 LIMIT 1",
        quote_ident(&tables.exported),
        quote_ident(&tables.exported_key)
    );

    let found = conn
        .query_row(&sql, [qr_code], |_| Ok(()))
        .optional();

    match found {
        Ok(row) => Ok(row.is_some()),
        Err(e) if is_missing_table(&e) => Ok(false),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AssetReviewError;

    #[test]
    fn test_missing_table_is_not_exported() {
        let conn = Connection::open_in_memory().unwrap();
        assert!(!is_exported(&conn, &MirrorTables::default(), "1234").unwrap());
    }

    #[test]
    fn test_row_lookup() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            r#"CREATE TABLE "sdi_print_out" ("QR Code" TEXT, "Building" TEXT);
               INSERT INTO "sdi_print_out" VALUES ('1234', '5');"#,
        )
        .unwrap();

        let tables = MirrorTables::default();
        assert!(is_exported(&conn, &tables, "1234").unwrap());
        assert!(!is_exported(&conn, &tables, "9999").unwrap());
    }

    #[test]
    fn test_missing_table_classification() {
        let missing = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(1),
            Some("no such table: sdi_print_out".into()),
        );
        let other = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(1),
            Some("no such column: Code".into()),
        );

        assert!(is_missing_table(&missing));
        assert!(!is_missing_table(&other));
        assert!(!is_missing_table(&rusqlite::Error::QueryReturnedNoRows));
        assert!(matches!(AssetReviewError::from(other), AssetReviewError::Query(_)));
    }
}
