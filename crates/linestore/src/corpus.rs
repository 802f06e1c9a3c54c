//! 内存语料集 - 已接收行的集合与近似重复判定

use std::collections::HashSet;

use rayon::prelude::*;
use serde::Serialize;

use crate::similarity::similarity;
use crate::store::{Result, StoreError};

/// 语料数量达到该值后才并行扫描
const PARALLEL_SCAN_MIN: usize = 64;

/// 候选行与语料集的比较结果
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SimilarityResult {
    NoMatch,
    Similar { similar_to: String, similarity: f64 },
}

impl SimilarityResult {
    pub fn is_similar(&self) -> bool {
        matches!(self, Self::Similar { .. })
    }
}

/// 阈值必须落在 (0, 1]
pub fn validate_threshold(threshold: f64) -> Result<f64> {
    if threshold.is_finite() && threshold > 0.0 && threshold <= 1.0 {
        Ok(threshold)
    } else {
        Err(StoreError::InvalidThreshold(threshold))
    }
}

/// 已接收行集合
///
/// 集合内按文本精确去重；近似重复由 [`Corpus::find_similar`] 在插入前拦截。
#[derive(Debug, Clone)]
pub struct Corpus {
    lines: HashSet<String>,
    threshold: f64,
}

impl Corpus {
    pub fn new(threshold: f64) -> Result<Self> {
        Ok(Self {
            lines: HashSet::new(),
            threshold: validate_threshold(threshold)?,
        })
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn contains(&self, line: &str) -> bool {
        self.lines.contains(line)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(String::as_str)
    }

    /// 不做相似度检查直接插入，返回是否为新行
    pub fn insert(&mut self, line: String) -> bool {
        self.lines.insert(line)
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// 查找相似度 >= 阈值的已有行
    ///
    /// 多个已有行同时超过阈值时返回哪一个不做保证。
    pub fn find_similar(&self, candidate: &str) -> SimilarityResult {
        // 精确命中不必跑编辑距离
        if let Some(existing) = self.lines.get(candidate) {
            return SimilarityResult::Similar {
                similar_to: existing.clone(),
                similarity: 1.0,
            };
        }

        let threshold = self.threshold;
        let matches = |existing: &String| {
            let score = similarity(candidate, existing);
            (score >= threshold).then(|| (existing.clone(), score))
        };

        let hit = if self.lines.len() >= PARALLEL_SCAN_MIN {
            self.lines.par_iter().find_map_any(matches)
        } else {
            self.lines.iter().find_map(matches)
        };

        match hit {
            Some((similar_to, score)) => SimilarityResult::Similar {
                similar_to,
                similarity: score,
            },
            None => SimilarityResult::NoMatch,
        }
    }
}
