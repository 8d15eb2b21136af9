//! 目录 sweep 编排：单 worker 后台线程 + 互斥的进行中标志
//!
//! worker 由编排器持有 `JoinHandle` 管理（`wait` 或 Drop 时合流），
//! 不做 detach；sweep 无取消机制，启动后运行到遍历结束。
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use walkdir::WalkDir;

use crate::collector::MatchCollector;
use crate::engine::ScannerHandle;
use crate::error::ScanError;
use crate::session::ScanSession;
use crate::store::ResultStore;

pub struct ScanOrchestrator {
    session: ScanSession,
    store: ResultStore,
    worker: Option<JoinHandle<()>>,
}

impl ScanOrchestrator {
    pub fn new(session: ScanSession, store: ResultStore) -> Self {
        Self { session, store, worker: None }
    }

    pub fn session(&self) -> &ScanSession {
        &self.session
    }

    pub fn store(&self) -> &ResultStore {
        &self.store
    }

    pub fn is_scanning(&self) -> bool {
        self.session.is_scanning()
    }

    /// 启动一次目录 sweep，立即返回是否已接受。
    /// 已有 sweep 在跑时返回 false，不排队、不合并；
    /// 前置条件（扫描器存在、目录路径非空）不满足时记日志、
    /// 清标志并返回 false，不遍历任何文件。
    pub fn start_scan<S>(&mut self, scanner: Option<Arc<Mutex<S>>>, dir: &Path) -> bool
    where
        S: ScannerHandle + Send + 'static,
    {
        if !self.session.try_begin_scan() {
            self.session.info("Scan already in progress");
            return false;
        }

        let Some(scanner) = scanner else {
            self.session.error("No compiled rules available");
            self.session.end_scan();
            return false;
        };
        if dir.as_os_str().is_empty() {
            self.session.error("No directory selected");
            self.session.end_scan();
            return false;
        }

        // 上一个 worker 此时必然已经清掉标志，合流只是回收线程
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }

        self.session.reset_counters();
        self.store.clear();

        let session = self.session.clone();
        let store = self.store.clone();
        let dir = dir.to_path_buf();
        let spawned = std::thread::Builder::new()
            .name("yarasweep-sweep".to_string())
            .spawn(move || {
                // 进行中标志无条件在 worker 退出时清除（包括 panic）
                let _guard = SweepGuard(session.clone());
                run_sweep(&scanner, &dir, &session, &store);
            });

        match spawned {
            Ok(handle) => {
                self.worker = Some(handle);
                true
            }
            Err(err) => {
                self.session.error(&format!("Failed to spawn scan worker: {err}"));
                self.session.end_scan();
                false
            }
        }
    }

    /// 阻塞等待当前 sweep 结束（没有在跑则立即返回）
    pub fn wait(&mut self) {
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for ScanOrchestrator {
    fn drop(&mut self) {
        self.wait();
    }
}

struct SweepGuard(ScanSession);

impl Drop for SweepGuard {
    fn drop(&mut self) {
        self.0.end_scan();
    }
}

/// sweep 主体：递归遍历，普通文件逐个扫描，单文件失败只记日志
fn run_sweep<S: ScannerHandle>(
    scanner: &Mutex<S>,
    dir: &Path,
    session: &ScanSession,
    store: &ResultStore,
) {
    session.info("Starting directory scan...");

    for entry in WalkDir::new(dir) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                session.error(&format!("Directory walk error: {err}"));
                continue;
            }
        };
        // 符号链接、目录与特殊文件一律跳过（walkdir 默认不跟随链接）
        if !entry.file_type().is_file() {
            continue;
        }
        match scan_one(scanner, entry.path(), session, store) {
            Ok(matched) => {
                if matched {
                    session.add_file_matched();
                }
            }
            Err(err) => session.error(&err.to_string()),
        }
    }

    session.tagged("COMPLETE", "Scan finished!");
    session.info(&format!("Files scanned: {}", session.files_scanned()));
    session.info(&format!("Files matched: {}", session.files_matched()));
    session.info(&format!("Total pattern matches: {}", store.total_matches()));
}

/// 单文件扫描：整读进内存，交给扫描器，收集器经回调写入结果集合。
/// 返回该文件是否命中了至少一条规则。
fn scan_one<S: ScannerHandle>(
    scanner: &Mutex<S>,
    path: &Path,
    session: &ScanSession,
    store: &ResultStore,
) -> Result<bool, ScanError> {
    let data = std::fs::read(path).map_err(|source| ScanError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::debug!(path = %path.display(), bytes = data.len(), "scanning file");

    let mut collector = MatchCollector::new(path, store, session);
    {
        let mut guard = scanner.lock().unwrap_or_else(|e| e.into_inner());
        guard
            .scan(&data, &mut |rule| collector.on_rule(rule))
            .map_err(|err| match err {
                crate::error::EngineScanError::Timeout => ScanError::Timeout {
                    path: path.to_path_buf(),
                },
                other => ScanError::Engine {
                    path: path.to_path_buf(),
                    message: other.to_string(),
                },
            })?;
    }

    let scanned = session.add_file_scanned();
    if scanned % 10 == 0 {
        session.progress(&format!("Scanned {scanned} files..."));
    }
    Ok(collector.matched_rules() > 0)
}
