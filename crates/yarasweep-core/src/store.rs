//! 结果集合（追加式，锁保护，支持并发读快照）
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::types::ScanResult;

/// 线程安全的扫描结果集合。
/// 扫描 worker 负责 `clear`/`append`；UI 与导出只调用读操作。
/// 五个操作都只在自身函数体内持锁；`snapshot` 持锁复制、放锁返回，
/// 调用方迭代或导出期间不会阻塞 worker。
#[derive(Clone, Default)]
pub struct ResultStore {
    inner: Arc<Mutex<Vec<ScanResult>>>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 只在新 sweep 开始时调用（由编排器的互斥保证不与别的 sweep 并发）
    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn append(&self, result: ScanResult) {
        self.lock().push(result);
    }

    /// 按追加顺序复制全部结果
    pub fn snapshot(&self) -> Vec<ScanResult> {
        self.lock().clone()
    }

    /// 所有结果的 pattern 命中总数
    pub fn total_matches(&self) -> usize {
        self.lock().iter().map(ScanResult::total_matches).sum()
    }

    /// 命中过规则的不同文件数
    pub fn unique_file_count(&self) -> usize {
        let guard = self.lock();
        let unique: HashSet<&Path> = guard.iter().map(|r| r.file_path.as_path()).collect();
        unique.len()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<ScanResult>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}
