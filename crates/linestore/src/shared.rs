//! 可跨任务共享的存储句柄

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::corpus::SimilarityResult;
use crate::log::{FileLog, LineLog};
use crate::store::{AppendResult, LineStore, Result, StoreError};

/// `LineStore` 的共享句柄
///
/// 每个操作在整个执行期间持有同一把锁，检查 + 写盘 + 插入对其他调用者是原子的。
/// 相似度扫描和文件 IO 放在 `spawn_blocking` 线程上执行，不占用 runtime 的工作线程。
pub struct SharedStore<L: LineLog = FileLog> {
    inner: Arc<Mutex<LineStore<L>>>,
}

impl<L: LineLog> Clone for SharedStore<L> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<L: LineLog + 'static> From<LineStore<L>> for SharedStore<L> {
    fn from(store: LineStore<L>) -> Self {
        Self::new(store)
    }
}

impl<L: LineLog + 'static> SharedStore<L> {
    pub fn new(store: LineStore<L>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(store)),
        }
    }

    pub async fn initialize(&self) -> Result<()> {
        self.with_store(|store| store.initialize()).await?
    }

    pub async fn check_similar(&self, candidate: &str) -> Result<SimilarityResult> {
        let candidate = candidate.to_string();
        self.with_store(move |store| store.check_similar(&candidate)).await
    }

    pub async fn append(&self, candidate: &str) -> Result<AppendResult> {
        let candidate = candidate.to_string();
        self.with_store(move |store| store.append(&candidate)).await?
    }

    pub async fn refresh(&self) -> Result<()> {
        self.with_store(|store| store.refresh()).await?
    }

    pub async fn line_count(&self) -> usize {
        self.inner.lock().await.line_count()
    }

    pub async fn threshold(&self) -> f64 {
        self.inner.lock().await.threshold()
    }

    /// 拿到锁后把 `op` 交给阻塞线程池
    ///
    /// 锁随 guard 一起移入阻塞任务，调用方的 future 被丢弃时操作仍会完整执行完再释放锁。
    async fn with_store<T, F>(&self, op: F) -> Result<T>
    where
        F: FnOnce(&mut LineStore<L>) -> T + Send + 'static,
        T: Send + 'static,
    {
        let mut guard = Arc::clone(&self.inner).lock_owned().await;
        tokio::task::spawn_blocking(move || op(&mut *guard))
            .await
            .map_err(|e| StoreError::Task(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::time::Duration;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_shared_store_basic() {
        let dir = tempdir().unwrap();
        let store = LineStore::new(dir.path().join("lines.txt"), 0.9).unwrap();
        let shared = SharedStore::from(store);

        assert_eq!(shared.append("SELECT * FROM film").await.unwrap(), AppendResult::Accepted);
        assert!(shared.check_similar("SELECT * FROM films").await.unwrap().is_similar());
        assert_eq!(shared.line_count().await, 1);
        assert_eq!(shared.threshold().await, 0.9);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_near_duplicates_admit_one() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("lines.txt");
        let shared = SharedStore::new(LineStore::new(&path, 0.9).unwrap());

        // 彼此相似度都 >= 0.9，只能进一个
        let mut handles = Vec::new();
        for i in 0..16 {
            let shared = shared.clone();
            handles.push(tokio::spawn(async move {
                let candidate = format!("SELECT * FROM film WHERE id = {}", i % 10);
                shared.append(&candidate).await.unwrap()
            }));
        }

        let mut accepted = 0;
        for handle in handles {
            if handle.await.unwrap().is_accepted() {
                accepted += 1;
            }
        }

        assert_eq!(accepted, 1);
        assert_eq!(shared.line_count().await, 1);
        let on_disk = std::fs::read_to_string(&path).unwrap();
        assert_eq!(on_disk.lines().count(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_distinct_lines_all_admitted() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("lines.txt");
        let shared = SharedStore::new(LineStore::new(&path, 0.9).unwrap());

        let candidates = [
            "SELECT * FROM film",
            "DROP TABLE users",
            "INSERT INTO actor VALUES (1)",
            "UPDATE category SET name = 'x'",
            "DELETE FROM rental",
        ];

        let mut handles = Vec::new();
        for candidate in candidates {
            let shared = shared.clone();
            handles.push(tokio::spawn(async move { shared.append(candidate).await.unwrap() }));
        }
        for handle in handles {
            assert!(handle.await.unwrap().is_accepted());
        }

        assert_eq!(shared.line_count().await, candidates.len());
        let on_disk = std::fs::read_to_string(&path).unwrap();
        assert_eq!(on_disk.lines().count(), candidates.len());
    }

    /// 写盘时阻塞，直到测试放行
    struct GateLog {
        entered: tokio::sync::mpsc::UnboundedSender<()>,
        release: std::sync::mpsc::Receiver<()>,
    }

    impl LineLog for GateLog {
        fn location(&self) -> String {
            "gate".to_string()
        }

        fn ensure(&mut self) -> io::Result<()> {
            Ok(())
        }

        fn read_lines(&mut self) -> io::Result<Vec<String>> {
            Ok(Vec::new())
        }

        fn append_line(&mut self, _line: &str) -> io::Result<()> {
            let _ = self.entered.send(());
            self.release
                .recv_timeout(Duration::from_secs(5))
                .map_err(|e| io::Error::new(io::ErrorKind::TimedOut, e))
        }
    }

    fn gated_store() -> (
        SharedStore<GateLog>,
        tokio::sync::mpsc::UnboundedReceiver<()>,
        std::sync::mpsc::Sender<()>,
    ) {
        let (entered_tx, entered_rx) = tokio::sync::mpsc::unbounded_channel();
        let (release_tx, release_rx) = std::sync::mpsc::channel();
        let log = GateLog {
            entered: entered_tx,
            release: release_rx,
        };
        let store = SharedStore::new(LineStore::with_log(log, 0.9).unwrap());
        (store, entered_rx, release_tx)
    }

    #[tokio::test]
    async fn test_blocked_write_does_not_stall_runtime() {
        // 默认单线程 runtime：写盘卡住时，本任务仍要能被调度去放行
        let (shared, mut entered, release) = gated_store();

        let append = {
            let shared = shared.clone();
            tokio::spawn(async move { shared.append("SELECT * FROM film").await })
        };

        entered.recv().await.unwrap();
        release.send(()).unwrap();

        assert_eq!(append.await.unwrap().unwrap(), AppendResult::Accepted);
        assert_eq!(shared.line_count().await, 1);
    }

    #[tokio::test]
    async fn test_aborted_append_still_completes() {
        let (shared, mut entered, release) = gated_store();

        let append = {
            let shared = shared.clone();
            tokio::spawn(async move { shared.append("SELECT * FROM film").await })
        };

        entered.recv().await.unwrap();
        append.abort();
        assert!(append.await.unwrap_err().is_cancelled());

        // 已开始的写入照常完成，锁在之后才释放
        release.send(()).unwrap();
        assert_eq!(shared.line_count().await, 1);
        assert!(shared.check_similar("SELECT * FROM films").await.unwrap().is_similar());
    }
}
