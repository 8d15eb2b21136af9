//! 测试工具：脚本化的回调替身与引擎替身
//!
//! `ScriptedRule`/`ScriptedPattern` 直接实现三层回调协议，用于收集器
//! 单元测试；`StubEngine` 是完整的 `RuleEngine` 替身，按字面 needle
//! 查找产生命中，用于不依赖真实引擎的编排/编译测试。
use std::sync::Arc;
use std::time::Duration;

use crate::engine::{MatchSpan, PatternRef, RuleEngine, RuleMatch, ScannerHandle};
use crate::error::{EngineError, EngineScanError};

pub(crate) struct ScriptedPattern {
    pub id: String,
    pub spans: Vec<MatchSpan>,
}

impl ScriptedPattern {
    pub fn new(id: &str) -> Self {
        Self { id: id.to_string(), spans: Vec::new() }
    }

    pub fn with_span(mut self, offset: u64, length: usize) -> Self {
        self.spans.push(MatchSpan { offset, length });
        self
    }
}

impl PatternRef for ScriptedPattern {
    fn identifier(&self) -> String {
        self.id.clone()
    }

    fn for_each_match(&self, f: &mut dyn FnMut(MatchSpan)) {
        for span in &self.spans {
            f(*span);
        }
    }
}

pub(crate) struct ScriptedRule {
    pub identifier: Option<String>,
    pub namespace: String,
    pub patterns: Vec<ScriptedPattern>,
}

impl ScriptedRule {
    pub fn new(identifier: &str, namespace: &str) -> Self {
        Self {
            identifier: Some(identifier.to_string()),
            namespace: namespace.to_string(),
            patterns: Vec::new(),
        }
    }

    /// 标识查询失败的规则（第一层回调应整条跳过）
    pub fn anonymous() -> Self {
        Self { identifier: None, namespace: String::new(), patterns: Vec::new() }
    }

    pub fn with_pattern(mut self, pattern: ScriptedPattern) -> Self {
        self.patterns.push(pattern);
        self
    }
}

impl RuleMatch for ScriptedRule {
    fn identifier(&self) -> Option<String> {
        self.identifier.clone()
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

#[derive(Clone)]
pub(crate) struct StubPattern {
    pub identifier: String,
    pub needle: Vec<u8>,
}

#[derive(Clone)]
pub(crate) struct StubRule {
    pub identifier: Option<String>,
    pub namespace: String,
    /// true 时无论 needle 是否命中都上报（相当于 condition: true）
    pub always_match: bool,
    pub patterns: Vec<StubPattern>,
}

impl StubRule {
    pub fn literal(identifier: &str, pattern_id: &str, needle: &[u8]) -> Self {
        Self {
            identifier: Some(identifier.to_string()),
            namespace: "default".to_string(),
            always_match: false,
            patterns: vec![StubPattern {
                identifier: pattern_id.to_string(),
                needle: needle.to_vec(),
            }],
        }
    }
}

/// 脚本化引擎：needle 子串查找充当“匹配”，源文本含 ")(" 视为语法错误
#[derive(Clone, Default)]
pub(crate) struct StubEngine {
    pub rules: Vec<StubRule>,
    pub scan_delay: Option<Duration>,
    pub fail_scanner: bool,
    /// 设置后每次 scan 调用都返回该消息的引擎内部错误
    pub scan_error: Option<String>,
}

impl RuleEngine for StubEngine {
    type Ruleset = Vec<StubRule>;
    type Scanner = StubScanner;

    fn compile(&self, source: &str) -> Result<Self::Ruleset, EngineError> {
        if source.contains(")(") {
            return Err(EngineError::Syntax("syntax error: unexpected `)(`".to_string()));
        }
        Ok(self.rules.clone())
    }

    fn create_scanner(&self, ruleset: &Arc<Self::Ruleset>) -> Result<Self::Scanner, EngineError> {
        if self.fail_scanner {
            return Err(EngineError::ScannerCreation("stub scanner unavailable".to_string()));
        }
        Ok(StubScanner {
            rules: Arc::clone(ruleset),
            delay: self.scan_delay,
            scan_error: self.scan_error.clone(),
        })
    }
}

pub(crate) struct StubScanner {
    rules: Arc<Vec<StubRule>>,
    delay: Option<Duration>,
    scan_error: Option<String>,
}

impl ScannerHandle for StubScanner {
    fn scan(
        &mut self,
        data: &[u8],
        on_rule: &mut dyn FnMut(&dyn RuleMatch),
    ) -> Result<(), EngineScanError> {
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        if let Some(message) = &self.scan_error {
            return Err(EngineScanError::Other(message.clone()));
        }
        for rule in self.rules.iter() {
            let patterns: Vec<ScriptedPattern> = rule
                .patterns
                .iter()
                .map(|p| ScriptedPattern {
                    id: p.identifier.clone(),
                    spans: find_all(data, &p.needle),
                })
                .filter(|p| !p.spans.is_empty())
                .collect();
            if rule.always_match || !patterns.is_empty() {
                let adapter = ScriptedRule {
                    identifier: rule.identifier.clone(),
                    namespace: rule.namespace.clone(),
                    patterns,
                };
                on_rule(&adapter);
            }
        }
        Ok(())
    }
}

fn find_all(data: &[u8], needle: &[u8]) -> Vec<MatchSpan> {
    if needle.is_empty() || needle.len() > data.len() {
        return Vec::new();
    }
    data.windows(needle.len())
        .enumerate()
        .filter(|(_, window)| *window == needle)
        .map(|(offset, _)| MatchSpan { offset: offset as u64, length: needle.len() })
        .collect()
}
