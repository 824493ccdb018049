//! Asset Plate Common Library
//!
//! 同期エンジン・CLIで共有される命名規則とレコード型（I/Oなし）

pub mod error;
pub mod naming;
pub mod record;

pub use error::{Error, Result};
pub use naming::{is_image_file, DocumentName, ImageName, RecordKey, SeqTag};
pub use record::{compute_description, ApprovalState, CaptureRecord};
