use anyhow::{Context, Result};
use asset_plate_review::{cli, config, engine, review};
use clap::Parser;
use cli::{Cli, Commands};
use config::Config;
use engine::SyncEngine;
use review::{Dashboard, DashboardFilter};
use tracing_subscriber::EnvFilter;

fn init_logging(verbose: bool) {
    let default = if verbose { "asset_plate_review=debug" } else { "asset_plate_review=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => Config::config_path()?,
    };
    let config = Config::load_from(&config_path)
        .with_context(|| format!("設定を読み込めません: {}", config_path.display()))?;

    // 設定コマンドはストアを開かずに処理
    if let Commands::Config { show, init } = cli.command {
        if init {
            if config_path.exists() {
                println!("設定ファイルは既に存在します: {}", config_path.display());
            } else {
                config.save_to(&config_path)?;
                println!("✔ 設定ファイルを作成: {}", config_path.display());
            }
        }

        if show || !init {
            println!("設定: {}", config_path.display());
            println!("  JSONフォルダ: {}", config.json_dir.display());
            println!("  画像フォルダ: {}", config.image_dir.display());
            println!("  DB: {}", config.db_path.display());
            println!("  処理済みログ: {}", config.ledger_dir().display());
            println!("  種別: {}", config.asset_type);
            println!("  承認マーカー: {}", config.approved_marker);
            println!("  ミラー: {} / 承認: {} / エクスポート: {}",
                config.tables.dataset, config.tables.approvals, config.tables.exported);
        }
        return Ok(());
    }

    let engine = SyncEngine::open(config)?;

    match cli.command {
        Commands::Sync => {
            println!("🔄 asset-review - 同期\n");

            let report = engine.sync();
            println!("[1/2] 画像: {}", report.images);
            println!("[2/2] JSON: {}", report.documents);
            println!("\n✅ 同期完了 ({}) 反映 {}件", report.finished_at, report.upserted());
        }

        Commands::Toggle { doc_id, force } => {
            let outcome = if force {
                engine.toggle_approval(&doc_id)?
            } else {
                engine.toggle_approval_guarded(&doc_id)?
            };

            println!("✔ {}: {}", outcome.doc_id, outcome.state);
            if !outcome.mirror_synced {
                println!("⚠ ミラーへの反映に失敗しました（次回の同期で反映されます）");
            }
        }

        Commands::CheckExport { qr_code } => {
            if engine.is_exported(&qr_code)? {
                println!("{}: エクスポート済み（承認の変更不可）", qr_code);
            } else {
                println!("{}: 未エクスポート", qr_code);
            }
        }

        Commands::List { flagged, modified, missed, json } => {
            let filter = DashboardFilter { flagged, modified, missed };
            let dashboard = engine.list_records(&filter)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&dashboard)?);
            } else {
                print_dashboard(&dashboard, &engine.config().approved_marker);
            }
        }

        Commands::Show { doc_id } => {
            let detail = engine.record_detail(&doc_id)?;
            let summary = &detail.summary;
            let record = &summary.record;

            println!("{} ({} / {})", summary.doc_id, summary.qr_code, summary.building);
            println!("  説明: {}", summary.description);
            println!("  メーカー: {}", record.manufacturer);
            println!("  型式: {}", record.model);
            println!("  製造番号: {}", record.serial_number);
            println!("  年: {}", record.year);
            println!("  承認: {}", record.approval(&engine.config().approved_marker));
            println!("  フラグ: {} / 編集済: {}", summary.flagged, summary.modified);
            println!("写真:");
            for slot in &detail.photos {
                println!(
                    "  {} {:<12} {}",
                    slot.seq,
                    slot.seq.label(),
                    slot.file_name.as_deref().unwrap_or("（なし）")
                );
            }
        }

        Commands::Edit { doc_id, set, flag, unflag } => {
            let mut edits = engine.current_edits(&doc_id)?;
            for (field, value) in set {
                edits.set(field, value);
            }
            if flag {
                edits.flagged = true;
            }
            if unflag {
                edits.flagged = false;
            }

            let outcome = engine.save_review(&doc_id, &edits)?;
            if outcome.changed {
                println!("✔ 保存しました: {}", outcome.doc_id);
            } else {
                println!("変更はありません: {}", outcome.doc_id);
            }
            if !outcome.mirror_synced {
                println!("⚠ ミラーへの反映に失敗しました（次回の同期で反映されます）");
            }
        }

        Commands::Ledger { clear, info } => {
            if info || !clear {
                let (images, documents) = engine.ledger_counts();
                println!("処理済みログ:");
                println!("  場所: {}", engine.config().ledger_dir().display());
                println!("  画像: {}件", images);
                println!("  JSON: {}件", documents);
            }

            if clear {
                if engine.clear_ledgers()? {
                    println!("✔ 処理済みログを削除しました");
                } else {
                    println!("処理済みログは存在しません");
                }
            }
        }

        Commands::Config { .. } => {}
    }

    engine.close()?;
    Ok(())
}

fn print_dashboard(dashboard: &Dashboard, approved_marker: &str) {
    for item in &dashboard.items {
        let approved = item.approved == approved_marker;
        println!(
            "{:<20} {:<30} 写真 {} {}{}{}",
            item.doc_id,
            item.description,
            item.photos_summary(),
            if approved { "[承認]" } else { "" },
            if item.flagged { "[フラグ]" } else { "" },
            if item.modified { "[編集済]" } else { "" },
        );
        if item.missed_photo() {
            println!("    欠落: {}", item.missing_list());
        }
    }
    println!(
        "\n{}件 (フラグ {} / 編集済 {} / 写真欠落 {})",
        dashboard.items.len(),
        dashboard.count_flagged,
        dashboard.count_modified,
        dashboard.count_missed
    );
}
