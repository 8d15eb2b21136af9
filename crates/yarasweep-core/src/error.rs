//! 错误分类（编译 / 单文件扫描 / 导出 / 引擎）
use std::path::PathBuf;
use thiserror::Error;

/// 规则编译阶段的错误。中止本次编译，但不影响后续重试。
#[derive(Debug, Error)]
pub enum CompileError {
    /// 既没有内联规则文本，也没有可用的规则文件内容
    #[error("no rule content available")]
    EmptySource,
    /// 引擎拒绝了规则语法，携带引擎原始诊断信息
    #[error("rule compilation failed: {0}")]
    Syntax(String),
    /// 规则编译成功但扫描器实例化失败（刚编译出的规则集也会被释放）
    #[error("scanner creation failed: {0}")]
    ScannerCreation(String),
}

/// 单文件扫描错误。只影响当前文件，sweep 继续处理下一个。
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("failed to read file: {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// 引擎内部对单文件扫描超时（系统中唯一的超时语义）
    #[error("scan timeout for: {path}")]
    Timeout { path: PathBuf },
    #[error("engine failed to scan {path}: {message}")]
    Engine { path: PathBuf, message: String },
}

/// 导出错误。只中止当前这一次导出操作。
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to create export file: {path}")]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write export file: {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode JSON export: {0}")]
    Json(#[from] serde_json::Error),
}

/// 引擎绑定层在编译/实例化阶段产生的错误
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{0}")]
    Syntax(String),
    #[error("{0}")]
    ScannerCreation(String),
}

/// 引擎单次扫描调用的错误。
/// 超时单列（上层映射为带路径的 `ScanError::Timeout`），
/// 其余引擎内部错误一律归入 `Other`。
#[derive(Debug, Error)]
pub enum EngineScanError {
    #[error("scan timeout")]
    Timeout,
    #[error("{0}")]
    Other(String),
}
