//! 同期テスト
//!
//! 画像・JSONフォルダからSQLiteミラーへの同期を検証

mod common;

use common::Fixture;
use serde_json::json;

/// 画像だけが先に届いた場合 → JSON到着 → 承認
#[test]
fn test_image_then_document_then_toggle() {
    let fx = Fixture::new();
    let engine = fx.engine();

    fx.add_image("1234 5 ME - 0.jpg");
    let report = engine.sync();
    assert_eq!(report.images.upserted(), 1);
    assert_eq!(report.documents.upserted(), 0);

    assert_eq!(fx.dataset_count(), 1);
    assert_eq!(fx.dataset_value("1234", "5", "Manufacturer").as_deref(), Some(""));
    assert_eq!(fx.dataset_value("1234", "5", "Description").as_deref(), Some(""));
    assert_eq!(fx.dataset_value("1234", "5", "Approved").as_deref(), Some("0"));

    fx.write_doc(
        "1234_ME_5.json",
        &json!({
            "structured_data": {
                "Approved": "",
                "Asset Group": "Pump",
                "UBC Tag": "A1"
            }
        }),
    );
    let report = engine.sync();
    assert_eq!(report.documents.upserted(), 1);
    assert_eq!(fx.dataset_count(), 1);
    assert_eq!(fx.dataset_value("1234", "5", "Description").as_deref(), Some("Pump - A1"));
    assert_eq!(fx.dataset_value("1234", "5", "Approved").as_deref(), Some("0"));

    let outcome = engine.toggle_approval("1234_ME_5").unwrap();
    assert!(outcome.state.is_approved());
    assert!(outcome.mirror_synced);
    assert_eq!(outcome.new_value, "True");

    assert_eq!(fx.read_doc("1234_ME_5.json")["structured_data"]["Approved"], json!("True"));
    assert_eq!(fx.approval_value("1234").as_deref(), Some("1"));
    assert_eq!(fx.dataset_value("1234", "5", "Approved").as_deref(), Some("1"));
}

/// 変更なしで2回同期しても書き込みは発生しない
#[test]
fn test_sync_is_idempotent() {
    let fx = Fixture::new();
    fx.add_image("1 2 ME - 0.jpg");
    fx.add_image("1 2 ME - 1.png");
    fx.write_doc("1_ME_2.json", &json!({"structured_data": {"Model": "A"}}));
    fx.write_doc("3_ME_4.json", &json!({"structured_data": {"Model": "B"}}));

    let engine = fx.engine();
    let first = engine.sync();
    assert_eq!(first.documents.upserted(), 2);

    let second = engine.sync();
    assert_eq!(second.upserted(), 0);
    let documents = second.documents.report().unwrap();
    assert_eq!(documents.scanned, 2);
    assert_eq!(documents.pending, 0);
    assert_eq!(second.images.report().unwrap().pending, 0);
}

/// 処理済みログはエンジンを開き直しても引き継がれる
#[test]
fn test_ledger_survives_reopen() {
    let fx = Fixture::new();
    fx.add_image("1 2 ME - 0.jpg");
    fx.write_doc("1_ME_2.json", &json!({"structured_data": {"Model": "A"}}));

    let engine = fx.engine();
    engine.sync();
    engine.close().unwrap();

    let engine = fx.engine();
    assert_eq!(engine.ledger_counts(), (1, 1));
    assert_eq!(engine.sync().upserted(), 0);
}

/// 画像のプレースホルダはJSON由来の属性を上書きしない
#[test]
fn test_image_does_not_wipe_document_data() {
    let fx = Fixture::new();
    fx.write_doc(
        "7_ME_1.json",
        &json!({"structured_data": {"Model": "X-100", "Approved": "True"}}),
    );

    let engine = fx.engine();
    engine.sync();
    assert_eq!(fx.dataset_value("7", "1", "Approved").as_deref(), Some("1"));

    fx.add_image("7 1 ME - 2.jpeg");
    let report = engine.sync();
    assert_eq!(report.images.report().unwrap().unchanged, 1);
    assert_eq!(fx.dataset_value("7", "1", "Model").as_deref(), Some("X-100"));
    assert_eq!(fx.dataset_value("7", "1", "Approved").as_deref(), Some("1"));
}

/// 命名規則外の画像は処理済みとして記録し、行は作らない
#[test]
fn test_unparseable_image_is_recorded() {
    let fx = Fixture::new();
    fx.add_image("holiday.jpg");
    fx.add_image("1 2 ME - 9.jpg");

    let engine = fx.engine();
    let report = engine.sync();
    let images = report.images.report().unwrap();
    assert_eq!(images.skipped, 2);
    assert_eq!(fx.dataset_count(), 0);

    let ledger = std::fs::read_to_string(fx.config.image_ledger_path()).unwrap();
    assert!(ledger.lines().any(|l| l == "holiday.jpg"));

    assert_eq!(engine.sync().images.report().unwrap().pending, 0);
}

/// テーブルが無い間は記録せず、作成後の同期で反映される
#[test]
fn test_failed_upsert_is_retried() {
    let fx = Fixture::new();
    fx.add_image("5 6 ME - 0.jpg");
    fx.write_doc("5_ME_6.json", &json!({"structured_data": {"Model": "M"}}));
    fx.execute(r#"ALTER TABLE "sdi_dataset" RENAME TO "sdi_dataset_off";"#);

    let engine = fx.engine();
    let report = engine.sync();
    assert_eq!(report.images.report().unwrap().failed, 1);
    assert_eq!(report.documents.report().unwrap().failed, 1);
    assert_eq!(engine.ledger_counts(), (0, 0));

    fx.execute(r#"ALTER TABLE "sdi_dataset_off" RENAME TO "sdi_dataset";"#);
    let report = engine.sync();
    assert_eq!(report.images.upserted(), 1);
    assert_eq!(report.documents.upserted(), 1);
    assert_eq!(fx.dataset_value("5", "6", "Model").as_deref(), Some("M"));
}

/// 制約違反で書けなかったファイルは処理済みにしない
#[test]
fn test_constraint_failure_stays_out_of_ledger() {
    let fx = Fixture::new();
    fx.execute(
        r#"DROP TABLE "sdi_dataset";
           CREATE TABLE "sdi_dataset" ("QR Code" TEXT, "Building" TEXT, "Model" TEXT,
                                       "Owner" TEXT NOT NULL,
                                       PRIMARY KEY ("QR Code", "Building"));"#,
    );
    fx.write_doc("1_ME_1.json", &json!({"structured_data": {"Model": "A"}}));
    fx.add_image("2 2 ME - 0.jpg");

    let engine = fx.engine();
    let report = engine.sync();
    assert_eq!(report.images.report().unwrap().failed, 1);
    assert_eq!(report.documents.report().unwrap().failed, 1);
    assert_eq!(report.upserted(), 0);
    assert_eq!(fx.dataset_count(), 0);
    assert_eq!(engine.ledger_counts(), (0, 0));
}

/// 前後に空白のあるファイル名も開き直した後に処理済みとして扱う
#[test]
fn test_spaced_image_name_is_not_reappended() {
    let fx = Fixture::new();
    fx.add_image(" holiday.jpg");

    let engine = fx.engine();
    assert_eq!(engine.sync().images.report().unwrap().skipped, 1);
    engine.close().unwrap();

    let engine = fx.engine();
    assert_eq!(engine.sync().images.report().unwrap().pending, 0);

    let ledger = std::fs::read_to_string(fx.config.image_ledger_path()).unwrap();
    assert_eq!(ledger.lines().count(), 1);
}

/// JSONログが壊れていたら全件を再同期する
#[test]
fn test_malformed_ledger_triggers_full_resync() {
    let fx = Fixture::new();
    fx.write_doc("1_ME_1.json", &json!({"structured_data": {"Model": "A"}}));
    fx.write_doc("2_ME_1.json", &json!({"structured_data": {"Model": "B"}}));

    let engine = fx.engine();
    assert_eq!(engine.sync().documents.upserted(), 2);
    engine.close().unwrap();

    std::fs::write(fx.config.document_ledger_path(), "{broken").unwrap();

    let engine = fx.engine();
    let report = engine.sync();
    assert_eq!(report.documents.report().unwrap().pending, 2);
    assert_eq!(report.documents.upserted(), 2);
    assert_eq!(fx.dataset_count(), 2);
}

/// 更新時刻が進んだJSONだけを再同期する
#[test]
fn test_modified_document_is_resynced() {
    let fx = Fixture::new();
    fx.write_doc("1_ME_1.json", &json!({"structured_data": {"Model": "A"}}));
    fx.write_doc("2_ME_1.json", &json!({"structured_data": {"Model": "B"}}));

    let engine = fx.engine();
    engine.sync();

    fx.write_doc("1_ME_1.json", &json!({"structured_data": {"Model": "A2"}}));
    fx.bump_mtime("1_ME_1.json", 10);

    let report = engine.sync();
    assert_eq!(report.documents.report().unwrap().pending, 1);
    assert_eq!(fx.dataset_value("1", "1", "Model").as_deref(), Some("A2"));
    assert_eq!(fx.dataset_value("2", "1", "Model").as_deref(), Some("B"));
}

/// 対象外のファイルは同期しない
#[test]
fn test_sync_filters_documents() {
    let fx = Fixture::new();
    fx.write_doc("1_ME_1.json", &json!({"structured_data": {}}));
    fx.write_doc("1_ME_1_raw_ocr.json", &json!({"text": "..."}));
    fx.write_doc("2_EL_1.json", &json!({"structured_data": {}}));
    std::fs::write(fx.doc_path("notes.txt"), "x").unwrap();

    let engine = fx.engine();
    let report = engine.sync();
    let documents = report.documents.report().unwrap();
    assert_eq!(documents.scanned, 1);
    assert_eq!(documents.upserted, 1);
    assert_eq!(fx.dataset_count(), 1);
}

/// structured_data がマップでないJSONは処理済みにして行を作らない
#[test]
fn test_non_mapping_structured_data_is_skipped() {
    let fx = Fixture::new();
    fx.write_doc("9_ME_1.json", &json!({"structured_data": ["not", "a", "map"]}));
    fx.write_doc("8_ME_1.json", &json!({"modified": false}));

    let engine = fx.engine();
    let report = engine.sync();
    let documents = report.documents.report().unwrap();
    assert_eq!(documents.skipped, 1);
    // structured_data が無い場合は空の属性として同期
    assert_eq!(documents.upserted, 1);
    assert_eq!(fx.dataset_value("9", "1", "QR Code"), None);
    assert_eq!(fx.dataset_value("8", "1", "Approved").as_deref(), Some("0"));

    assert_eq!(engine.sync().documents.report().unwrap().pending, 0);
}

/// 存在しない列は黙って捨てる
#[test]
fn test_narrow_mirror_table() {
    let fx = Fixture::new();
    fx.execute(
        r#"DROP TABLE "sdi_dataset";
           CREATE TABLE "sdi_dataset" ("QR Code" TEXT, "Building" TEXT, "Model" TEXT,
                                       PRIMARY KEY ("QR Code", "Building"));"#,
    );
    fx.write_doc("1_ME_1.json", &json!({"structured_data": {"Model": "A", "Serial Number": "S"}}));

    let engine = fx.engine();
    assert_eq!(engine.sync().documents.upserted(), 1);
    assert_eq!(fx.dataset_value("1", "1", "Model").as_deref(), Some("A"));
}

/// 処理済みログの消去で再同期される
#[test]
fn test_clear_ledgers() {
    let fx = Fixture::new();
    fx.add_image("1 1 ME - 0.jpg");
    fx.write_doc("1_ME_1.json", &json!({"structured_data": {"Model": "A"}}));

    let engine = fx.engine();
    engine.sync();
    assert!(engine.clear_ledgers().unwrap());
    assert_eq!(engine.ledger_counts(), (0, 0));
    assert!(!fx.config.document_ledger_path().exists());

    let report = engine.sync();
    assert_eq!(report.images.report().unwrap().unchanged, 1);
    assert_eq!(report.documents.upserted(), 1);
}
