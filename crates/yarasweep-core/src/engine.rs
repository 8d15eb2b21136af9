//! 规则引擎契约（外部匹配引擎的抽象边界）
//!
//! 核心不实现任何模式匹配：引擎负责编译规则源文本、对字节缓冲求值，
//! 并按“规则 → 子模式 → 具体命中”三层协议回报结果。
//! 绑定实现见 `engine_yara`；测试用脚本化替身见 `test_utils`。
use std::sync::Arc;

use crate::error::{EngineError, EngineScanError};

/// 引擎报告的一次具体命中（字节偏移 + 长度）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchSpan {
    pub offset: u64,
    pub length: usize,
}

/// 引擎入口：编译规则源并创建绑定到规则集的扫描器
pub trait RuleEngine {
    type Ruleset: Send + Sync + 'static;
    type Scanner: ScannerHandle + Send + 'static;

    /// 编译 UTF-8 规则源文本；失败时携带引擎的原始诊断信息
    fn compile(&self, source: &str) -> Result<Self::Ruleset, EngineError>;

    /// 创建绑定到指定规则集的扫描器实例
    fn create_scanner(&self, ruleset: &Arc<Self::Ruleset>) -> Result<Self::Scanner, EngineError>;
}

/// 绑定到某个规则集的求值器。只在与其规则集配对期间有效。
pub trait ScannerHandle {
    /// 对一个字节缓冲求值，对每条命中的规则调用一次 `on_rule`
    fn scan(
        &mut self,
        data: &[u8],
        on_rule: &mut dyn FnMut(&dyn RuleMatch),
    ) -> Result<(), EngineScanError>;
}

/// 第一层：一条命中的规则
pub trait RuleMatch {
    /// 规则标识查询可能失败，失败时该规则整条被跳过（不记录）
    fn identifier(&self) -> Option<String>;

    fn namespace(&self) -> String;

    /// 第二层：枚举该规则内每个命名子模式
    fn for_each_pattern(&self, f: &mut dyn FnMut(&dyn PatternRef));
}

/// 第二层元素：一个命名子模式
pub trait PatternRef {
    fn identifier(&self) -> String;

    /// 第三层：枚举该子模式的每次具体命中
    fn for_each_match(&self, f: &mut dyn FnMut(MatchSpan));
}
