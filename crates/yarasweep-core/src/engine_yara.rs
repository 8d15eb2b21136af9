//! YARA-X 引擎绑定
//!
//! `yara_x::Scanner` 以借用方式持有 `Rules`，无法与规则集一起被同一个
//! 结构体拥有；这里的扫描器句柄改为持有 `Arc<yara_x::Rules>`，
//! 在每次 `scan` 调用内临时实例化借用扫描器。
//! 命中结果先物化为自有结构，再驱动三层回调，
//! 使回调期间不再依赖引擎内部生命周期。
use std::sync::Arc;
use std::time::Duration;

use crate::engine::{MatchSpan, PatternRef, RuleEngine, RuleMatch, ScannerHandle};
use crate::error::{EngineError, EngineScanError};

/// YARA-X 引擎入口
#[derive(Debug, Clone, Default)]
pub struct YaraEngine {
    /// 单文件扫描超时；None 表示不限时
    timeout: Option<Duration>,
}

impl YaraEngine {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }
}

impl RuleEngine for YaraEngine {
    type Ruleset = yara_x::Rules;
    type Scanner = YaraScanner;

    fn compile(&self, source: &str) -> Result<Self::Ruleset, EngineError> {
        yara_x::compile(source).map_err(|err| EngineError::Syntax(err.to_string()))
    }

    fn create_scanner(&self, ruleset: &Arc<Self::Ruleset>) -> Result<Self::Scanner, EngineError> {
        Ok(YaraScanner {
            rules: Arc::clone(ruleset),
            timeout: self.timeout,
        })
    }
}

/// 绑定到一个已编译规则集的 YARA-X 扫描器句柄
pub struct YaraScanner {
    rules: Arc<yara_x::Rules>,
    timeout: Option<Duration>,
}

impl ScannerHandle for YaraScanner {
    fn scan(
        &mut self,
        data: &[u8],
        on_rule: &mut dyn FnMut(&dyn RuleMatch),
    ) -> Result<(), EngineScanError> {
        let mut scanner = yara_x::Scanner::new(&self.rules);
        if let Some(timeout) = self.timeout {
            scanner.set_timeout(timeout);
        }
        let results = scanner.scan(data).map_err(|err| match err {
            yara_x::errors::ScanError::Timeout => EngineScanError::Timeout,
            other => EngineScanError::Other(other.to_string()),
        })?;

        // 先物化为自有结构，回调期间不再触碰引擎内部状态
        let mut matched: Vec<OwnedRuleMatch> = Vec::new();
        for rule in results.matching_rules() {
            let patterns = rule
                .patterns()
                .map(|pattern| OwnedPattern {
                    identifier: pattern.identifier().to_string(),
                    spans: pattern
                        .matches()
                        .map(|m| {
                            let range = m.range();
                            MatchSpan {
                                offset: range.start as u64,
                                length: range.len(),
                            }
                        })
                        .collect(),
                })
                .collect();
            matched.push(OwnedRuleMatch {
                identifier: rule.identifier().to_string(),
                namespace: rule.namespace().to_string(),
                patterns,
            });
        }

        for rule in &matched {
            on_rule(rule);
        }
        Ok(())
    }
}

struct OwnedRuleMatch {
    identifier: String,
    namespace: String,
    patterns: Vec<OwnedPattern>,
}

struct OwnedPattern {
    identifier: String,
    spans: Vec<MatchSpan>,
}

impl RuleMatch for OwnedRuleMatch {
    fn identifier(&self) -> Option<String> {
        Some(self.identifier.clone())
    }

    fn namespace(&self) -> String {
        self.namespace.clone()
    }

    fn for_each_pattern(&self, f: &mut dyn FnMut(&dyn PatternRef)) {
        for pattern in &self.patterns {
            f(pattern);
        }
    }
}

impl PatternRef for OwnedPattern {
    fn identifier(&self) -> String {
        self.identifier.clone()
    }

    fn for_each_match(&self, f: &mut dyn FnMut(MatchSpan)) {
        for span in &self.spans {
            f(*span);
        }
    }
}
