//! linestore - 近似去重行存储
//!
//! 基于编辑距离的相似度判定，接收的行追加到只追加日志，启动时从日志恢复

mod compact;
mod config;
mod corpus;
mod log;
mod shared;
mod similarity;
mod store;

pub use compact::{compact_file, CompactOptions, CompactStats};
pub use config::{default_log_path, StoreConfig, DEFAULT_THRESHOLD};
pub use corpus::{validate_threshold, Corpus, SimilarityResult};
pub use log::{FileLog, LineLog};
pub use shared::SharedStore;
pub use similarity::{levenshtein, similarity};
pub use store::{AppendResult, LineStore, Result, StoreError};
