use thiserror::Error;

#[derive(Error, Debug)]
pub enum AssetReviewError {
    #[error("設定エラー: {0}")]
    Config(String),

    #[error("見つかりません: {0}")]
    NotFound(String),

    #[error("対象外のドキュメントです: {0}")]
    Forbidden(String),

    #[error("不正なID: {0}")]
    BadIdentifier(String),

    #[error("スキーマエラー: {0}")]
    Schema(String),

    #[error("DBクエリエラー: {0}")]
    Query(#[from] rusqlite::Error),

    #[error("JSON解析エラー: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IOエラー: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Common(#[from] asset_plate_common::Error),
}

impl AssetReviewError {
    /// 利用者に返すエラーか（内部詳細を含まない）
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            AssetReviewError::NotFound(_)
                | AssetReviewError::Forbidden(_)
                | AssetReviewError::BadIdentifier(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, AssetReviewError>;
