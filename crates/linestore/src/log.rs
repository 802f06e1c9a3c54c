//! 持久化日志 - 只追加的行文件

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// 只追加的持久化行存储
///
/// `LineStore` 只通过这个 trait 访问持久层，测试可以替换成会失败的实现。
pub trait LineLog: Send {
    /// 用于日志和错误信息的位置描述
    fn location(&self) -> String;

    /// 确保存储存在（不存在则创建空存储）
    fn ensure(&mut self) -> io::Result<()>;

    /// 读取全部行（不含行结束符）
    fn read_lines(&mut self) -> io::Result<Vec<String>>;

    /// 追加一行，调用方保证 `line` 不含换行
    ///
    /// 返回错误时不能留下半行。
    fn append_line(&mut self, line: &str) -> io::Result<()>;
}

/// 基于文本文件的日志，每行一条，以 `\n` 结尾
#[derive(Debug, Clone)]
pub struct FileLog {
    path: PathBuf,
    sync: bool,
}

impl FileLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            sync: true,
        }
    }

    /// 每次追加后是否 `sync_data`
    pub fn with_sync(mut self, sync: bool) -> Self {
        self.sync = sync;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_record(&self, file: &mut File, record: &[u8]) -> io::Result<()> {
        file.write_all(record)?;
        file.flush()?;
        if self.sync {
            file.sync_data()?;
        }
        Ok(())
    }
}

impl LineLog for FileLog {
    fn location(&self) -> String {
        self.path.display().to_string()
    }

    fn ensure(&mut self) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        // append 模式打开：已存在则不截断
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        if !file.metadata()?.is_file() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is not a regular file", self.path.display()),
            ));
        }
        Ok(())
    }

    fn read_lines(&mut self) -> io::Result<Vec<String>> {
        let reader = BufReader::new(File::open(&self.path)?);
        reader.lines().collect()
    }

    fn append_line(&mut self, line: &str) -> io::Result<()> {
        let mut file = OpenOptions::new().read(true).append(true).open(&self.path)?;
        let original_len = file.metadata()?.len();

        let mut record = Vec::with_capacity(line.len() + 2);
        // 文件末尾缺换行时先补上，否则新行会接在上一行后面
        if original_len > 0 && !ends_with_newline(&mut file)? {
            record.push(b'\n');
        }
        record.extend_from_slice(line.as_bytes());
        record.push(b'\n');

        if let Err(e) = self.write_record(&mut file, &record) {
            // 回滚可能写入的半行
            if let Err(rollback) = file.set_len(original_len) {
                tracing::warn!(
                    "Failed to roll back partial write to {}: {}",
                    self.path.display(),
                    rollback
                );
            }
            return Err(e);
        }
        Ok(())
    }
}

fn ends_with_newline(file: &mut File) -> io::Result<bool> {
    let mut last = [0u8; 1];
    file.seek(SeekFrom::End(-1))?;
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}
