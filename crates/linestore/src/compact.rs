//! 离线压缩 - 对已有行文件一次性去重

use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use tempfile::NamedTempFile;

use crate::config::DEFAULT_THRESHOLD;
use crate::corpus::Corpus;
use crate::store::Result;

/// 压缩选项
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompactOptions {
    pub threshold: f64,
    /// 只比较最后一个分隔符之前的部分（例如 `sequence,label` 只按 sequence 去重）
    pub key_delimiter: Option<char>,
}

impl Default for CompactOptions {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            key_delimiter: None,
        }
    }
}

impl CompactOptions {
    fn key<'a>(&self, line: &'a str) -> &'a str {
        match self.key_delimiter.and_then(|d| line.rfind(d)) {
            Some(idx) => &line[..idx],
            None => line,
        }
    }
}

/// 压缩统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompactStats {
    pub total: usize,
    pub unique: usize,
    pub removed: usize,
}

/// 按文件顺序去重 `input`，结果写入 `output`
///
/// 空行不计入统计。`input` 先完整读入，结果先写到 `output` 同目录下的临时文件，
/// 写完再替换 `output`，所以 `output` 可以和 `input` 相同，中途出错也不会丢数据。
pub fn compact_file(input: &Path, output: &Path, options: &CompactOptions) -> Result<CompactStats> {
    let mut corpus = Corpus::new(options.threshold)?;
    let mut kept = Vec::new();
    let mut stats = CompactStats::default();

    let reader = BufReader::new(File::open(input)?);
    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        stats.total += 1;

        let key = options.key(line);
        if corpus.find_similar(key).is_similar() {
            continue;
        }
        corpus.insert(key.to_string());
        kept.push(line.to_string());
    }

    stats.unique = kept.len();
    stats.removed = stats.total - stats.unique;

    write_replacing(output, &kept)?;

    tracing::info!(
        "Compacted {}: {} lines, {} unique, {} removed",
        input.display(),
        stats.total,
        stats.unique,
        stats.removed
    );

    Ok(stats)
}

/// 写临时文件再 rename 到 `output`，失败时 `output` 保持原样
fn write_replacing(output: &Path, lines: &[String]) -> std::io::Result<()> {
    let dir = match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let temp = NamedTempFile::new_in(dir)?;
    let mut writer = BufWriter::new(temp);
    for line in lines {
        writeln!(writer, "{}", line)?;
    }
    let temp = writer.into_inner().map_err(|e| e.into_error())?;
    // 临时文件默认 0600，覆盖已有文件时沿用原权限
    if let Some(meta) = fs::metadata(output).ok().filter(|m| m.is_file()) {
        temp.as_file().set_permissions(meta.permissions())?;
    }
    temp.as_file().sync_data()?;
    temp.persist(output).map_err(|e| e.error)?;
    Ok(())
}
