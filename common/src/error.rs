//! エラー型定義

use thiserror::Error;

/// 共通エラー型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Bad file name: {0}")]
    BadFileName(String),

    #[error("Invalid structured_data: {0}")]
    InvalidStructuredData(String),
}

/// Result型エイリアス
pub type Result<T> = std::result::Result<T, Error>;
