//! 存储层 - 协调内存语料集与持久化日志

use std::io;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::config::StoreConfig;
use crate::corpus::{Corpus, SimilarityResult};
use crate::log::{FileLog, LineLog};

/// 存储层错误
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("failed to initialize line log {location}: {source}")]
    Initialization {
        location: String,
        #[source]
        source: io::Error,
    },
    #[error("invalid similarity threshold {0}: must be in (0, 1]")]
    InvalidThreshold(f64),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("blocking store task failed: {0}")]
    Task(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// 一次追加的结果
///
/// 拒绝不是错误；只有持久化失败才是 `Failed`，且可以原样重试。
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AppendResult {
    Accepted,
    RejectedEmpty,
    RejectedMultiline,
    RejectedSimilar { similarity: f64, similar_to: String },
    Failed { error: String },
}

impl AppendResult {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }

    pub fn is_rejected(&self) -> bool {
        matches!(
            self,
            Self::RejectedEmpty | Self::RejectedMultiline | Self::RejectedSimilar { .. }
        )
    }
}

/// 近似去重行存储
///
/// 首次 `append` 时从日志加载，之后只在成功追加时增长。
/// 所有可变操作都要 `&mut self`；跨任务共享请用 [`crate::SharedStore`]。
pub struct LineStore<L: LineLog = FileLog> {
    log: L,
    corpus: Corpus,
    initialized: bool,
}

impl LineStore<FileLog> {
    /// 绑定到文件的存储（不读取文件，首次使用时才加载）
    pub fn new(path: impl Into<PathBuf>, threshold: f64) -> Result<Self> {
        Self::with_log(FileLog::new(path), threshold)
    }

    pub fn from_config(config: &StoreConfig) -> Result<Self> {
        let log = FileLog::new(config.path.clone()).with_sync(config.fsync);
        Self::with_log(log, config.threshold)
    }
}

impl<L: LineLog> LineStore<L> {
    pub fn with_log(log: L, threshold: f64) -> Result<Self> {
        Ok(Self {
            log,
            corpus: Corpus::new(threshold)?,
            initialized: false,
        })
    }

    pub fn threshold(&self) -> f64 {
        self.corpus.threshold()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn log(&self) -> &L {
        &self.log
    }

    /// 当前内存中的行（顺序不固定）
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.corpus.iter()
    }

    /// 从日志加载语料集，已初始化时直接返回
    pub fn initialize(&mut self) -> Result<()> {
        if self.initialized {
            return Ok(());
        }

        let lines = match self.log.ensure().and_then(|_| self.log.read_lines()) {
            Ok(lines) => lines,
            Err(e) => {
                tracing::error!("Error initializing line store {}: {}", self.log.location(), e);
                return Err(StoreError::Initialization {
                    location: self.log.location(),
                    source: e,
                });
            }
        };

        // 磁盘内容视为已去重，不做相似度过滤
        for line in lines {
            let line = line.trim();
            if !line.is_empty() {
                self.corpus.insert(line.to_string());
            }
        }

        self.initialized = true;
        tracing::info!(
            "Initialized with {} lines from {}",
            self.corpus.len(),
            self.log.location()
        );
        Ok(())
    }

    /// 检查候选行是否与已有行近似（只看内存，不触发加载）
    pub fn check_similar(&self, candidate: &str) -> SimilarityResult {
        self.corpus.find_similar(candidate)
    }

    /// 追加一行（不与已有行近似时）
    ///
    /// 只有初始化失败返回 `Err`，其余情况都体现在 [`AppendResult`] 里。
    pub fn append(&mut self, candidate: &str) -> Result<AppendResult> {
        self.initialize()?;

        let candidate = candidate.trim();
        if candidate.is_empty() {
            return Ok(AppendResult::RejectedEmpty);
        }

        if candidate.contains(|c: char| c == '\n' || c == '\r') {
            tracing::debug!("Rejected multi-line candidate");
            return Ok(AppendResult::RejectedMultiline);
        }

        if let SimilarityResult::Similar { similar_to, similarity } = self.check_similar(candidate) {
            tracing::debug!(
                "Rejected candidate: {:.4} similar to existing line",
                similarity
            );
            return Ok(AppendResult::RejectedSimilar { similarity, similar_to });
        }

        // 先写盘，成功后才进内存
        if let Err(e) = self.log.append_line(candidate) {
            tracing::warn!("Error appending to {}: {}", self.log.location(), e);
            return Ok(AppendResult::Failed { error: e.to_string() });
        }
        self.corpus.insert(candidate.to_string());

        Ok(AppendResult::Accepted)
    }

    /// 清空内存并重新从日志加载
    pub fn refresh(&mut self) -> Result<()> {
        self.corpus.clear();
        self.initialized = false;
        self.initialize()
    }

    pub fn line_count(&self) -> usize {
        self.corpus.len()
    }
}
