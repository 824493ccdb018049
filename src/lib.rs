//! 資産銘板レビュー
//!
//! JSON/画像フォルダ（正本）をSQLiteミラーへ同期し、
//! レビュー画面からの承認切替・属性編集を扱う。

pub mod approval;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod export_guard;
pub mod images;
pub mod ledger;
pub mod mirror;
pub mod review;
pub mod scanner;
pub mod store;

pub use engine::{SyncEngine, SyncReport};
pub use error::{AssetReviewError, Result};
