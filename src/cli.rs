use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "asset-review")]
#[command(about = "資産銘板レビュー: フォルダとSQLiteミラーの同期・承認管理", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 詳細ログを出力
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// 設定ファイル（デフォルト: ~/.config/asset-review/config.json）
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 画像 → JSON の順にミラーへ同期
    Sync,

    /// 承認状態を切り替え
    Toggle {
        /// ドキュメントID（例: 1234_ME_5）
        #[arg(required = true)]
        doc_id: String,

        /// エクスポート済みでも切り替える
        #[arg(long)]
        force: bool,
    },

    /// QRコードがエクスポート済みか確認
    CheckExport {
        #[arg(required = true)]
        qr_code: String,
    },

    /// レビュー一覧を表示
    List {
        /// フラグ付きのみ
        #[arg(long)]
        flagged: bool,

        /// 編集済みのみ
        #[arg(long)]
        modified: bool,

        /// 必須写真が欠けているもののみ
        #[arg(long)]
        missed: bool,

        /// JSONで出力
        #[arg(long)]
        json: bool,
    },

    /// 1件の内容と写真を表示
    Show {
        #[arg(required = true)]
        doc_id: String,
    },

    /// 属性を編集して保存
    Edit {
        #[arg(required = true)]
        doc_id: String,

        /// 変更する属性（例: --set "Model=X-100"）
        #[arg(long = "set", value_name = "FIELD=VALUE", value_parser = parse_field)]
        set: Vec<(String, String)>,

        /// フラグを立てる
        #[arg(long, conflicts_with = "unflag")]
        flag: bool,

        /// フラグを外す
        #[arg(long)]
        unflag: bool,
    },

    /// 処理済みログの管理
    Ledger {
        /// ログを消去（次回は全件を再同期）
        #[arg(long)]
        clear: bool,

        /// ログ情報を表示
        #[arg(long)]
        info: bool,
    },

    /// 設定を表示・初期化
    Config {
        /// 現在の設定を表示
        #[arg(long)]
        show: bool,

        /// 既定値で設定ファイルを作成
        #[arg(long)]
        init: bool,
    },
}

/// `FIELD=VALUE` を分解（値は空でもよい）
fn parse_field(s: &str) -> Result<(String, String), String> {
    let (field, value) = s
        .split_once('=')
        .ok_or_else(|| format!("FIELD=VALUE の形式で指定してください: {}", s))?;
    let field = field.trim();
    if field.is_empty() {
        return Err(format!("フィールド名が空です: {}", s));
    }
    Ok((field.to_string(), value.to_string()))
}
