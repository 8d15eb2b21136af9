//! 扫描会话状态（进行中标志、计数器、诊断日志）
//!
//! 全进程一次只有一个活动会话；状态集中在一个显式的上下文对象里，
//! 以 `Arc` 共享给各组件，避免隐藏的全局单例。
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// 会话句柄（可克隆，克隆共享同一份内部状态）
#[derive(Clone, Default)]
pub struct ScanSession {
    inner: Arc<SessionInner>,
}

#[derive(Default)]
struct SessionInner {
    in_progress: AtomicBool,
    files_scanned: AtomicUsize,
    files_matched: AtomicUsize,
    /// 追加式诊断日志；仅由显式清除或编译开始时清空
    log: Mutex<Vec<String>>,
}

impl ScanSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// test-and-set 进行中标志；已有 sweep 在跑则返回 false
    pub fn try_begin_scan(&self) -> bool {
        !self.inner.in_progress.swap(true, Ordering::SeqCst)
    }

    /// 无条件清除进行中标志（worker 退出路径，包括出错）
    pub fn end_scan(&self) {
        self.inner.in_progress.store(false, Ordering::SeqCst);
    }

    pub fn is_scanning(&self) -> bool {
        self.inner.in_progress.load(Ordering::SeqCst)
    }

    /// 每次新 sweep 开始时将两个计数器归零
    pub fn reset_counters(&self) {
        self.inner.files_scanned.store(0, Ordering::SeqCst);
        self.inner.files_matched.store(0, Ordering::SeqCst);
    }

    /// 成功读取并扫描一个文件后递增，返回递增后的值
    pub fn add_file_scanned(&self) -> usize {
        self.inner.files_scanned.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn add_file_matched(&self) {
        self.inner.files_matched.fetch_add(1, Ordering::SeqCst);
    }

    pub fn files_scanned(&self) -> usize {
        self.inner.files_scanned.load(Ordering::SeqCst)
    }

    pub fn files_matched(&self) -> usize {
        self.inner.files_matched.load(Ordering::SeqCst)
    }

    pub fn info(&self, msg: &str) {
        tracing::info!("{msg}");
        self.push(format!("[INFO] {msg}"));
    }

    pub fn error(&self, msg: &str) {
        tracing::error!("{msg}");
        self.push(format!("[ERR] {msg}"));
    }

    pub fn progress(&self, msg: &str) {
        tracing::info!("{msg}");
        self.push(format!("[PROGRESS] {msg}"));
    }

    pub fn success(&self, msg: &str) {
        tracing::info!("{msg}");
        self.push(format!("[SUCCESS] {msg}"));
    }

    /// 自定义标签（如 [MATCH]、[COMPLETE]）
    pub fn tagged(&self, tag: &str, msg: &str) {
        tracing::info!("[{tag}] {msg}");
        self.push(format!("[{tag}] {msg}"));
    }

    /// 日志快照（复制后立即放锁）
    pub fn log_snapshot(&self) -> Vec<String> {
        self.lock_log().clone()
    }

    pub fn clear_log(&self) {
        self.lock_log().clear();
    }

    fn push(&self, line: String) {
        self.lock_log().push(line);
    }

    fn lock_log(&self) -> std::sync::MutexGuard<'_, Vec<String>> {
        self.inner.log.lock().unwrap_or_else(|e| e.into_inner())
    }
}
