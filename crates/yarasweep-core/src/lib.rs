//! 目录扫描编排与结果聚合核心库
//!
//! 设计要点：
//! - 模式匹配本身交给外部引擎（默认绑定 YARA-X），核心只消费其
//!   “规则→子模式→具体命中”的三层回调协议。
//! - 一次只允许一个 sweep：进行中标志采用原子 test-and-set，
//!   worker 退出时无条件清除（包括出错路径）。
//! - 结果集合由互斥锁保护；snapshot 持锁复制、放锁迭代，
//!   导出与 UI 读取不会阻塞扫描 worker。
//! - 单文件失败（读失败、引擎超时、引擎内部错误）只记日志并跳过，
//!   绝不中断整个 sweep。

mod collector;
mod compiler;
mod engine;
mod engine_yara;
mod error;
mod export;
mod orchestrator;
mod session;
mod store;
mod types;

#[cfg(test)]
pub(crate) mod test_utils;

pub use collector::MatchCollector;
pub use compiler::{resolve_rule_source, RuleCompiler};
pub use engine::{MatchSpan, PatternRef, RuleEngine, RuleMatch, ScannerHandle};
pub use engine_yara::{YaraEngine, YaraScanner};
pub use error::{CompileError, EngineError, EngineScanError, ExportError, ScanError};
pub use export::{export_csv, export_incident_report, export_json, ScanMetadata, TOOL_NAME};
pub use orchestrator::ScanOrchestrator;
pub use session::ScanSession;
pub use store::ResultStore;
pub use types::{PatternKind, PatternMatch, ScanResult};
