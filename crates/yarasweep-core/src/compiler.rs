//! 规则编译与扫描器生命周期管理
//!
//! 规则集与扫描器全程最多各存在一个，都由编译器独占持有。
//! 重新编译会在校验新源文本之前无条件释放旧资源；编译失败时
//! 系统将处于“零可用规则集”状态，这是沿用的原始行为，
//! 想要更安全语义的调用方需要自行先行校验。
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::engine::RuleEngine;
use crate::error::CompileError;
use crate::session::ScanSession;

pub struct RuleCompiler<E: RuleEngine> {
    engine: E,
    ruleset: Option<Arc<E::Ruleset>>,
    scanner: Option<Arc<Mutex<E::Scanner>>>,
}

impl<E: RuleEngine> RuleCompiler<E> {
    pub fn new(engine: E) -> Self {
        Self { engine, ruleset: None, scanner: None }
    }

    /// 编译规则源文本并绑定新的扫描器。
    /// 会话日志在编译开始时清空，之后追加进度/诊断行。
    pub fn compile(&mut self, source: &str, session: &ScanSession) -> Result<(), CompileError> {
        session.clear_log();
        session.info("Starting rule compilation...");

        // 先释放旧的扫描器与规则集，再校验新源
        self.scanner = None;
        self.ruleset = None;

        if source.trim().is_empty() {
            session.error("No rule content available");
            return Err(CompileError::EmptySource);
        }

        let ruleset = match self.engine.compile(source) {
            Ok(ruleset) => Arc::new(ruleset),
            Err(err) => {
                // 引擎诊断信息原样透出
                session.error(&format!("Compilation failed: {err}"));
                return Err(CompileError::Syntax(err.to_string()));
            }
        };

        let scanner = match self.engine.create_scanner(&ruleset) {
            Ok(scanner) => scanner,
            Err(err) => {
                session.error(&format!("Scanner creation failed: {err}"));
                return Err(CompileError::ScannerCreation(err.to_string()));
            }
        };

        self.ruleset = Some(ruleset);
        self.scanner = Some(Arc::new(Mutex::new(scanner)));
        session.success("Rules compiled successfully");
        Ok(())
    }

    pub fn has_ruleset(&self) -> bool {
        self.ruleset.is_some()
    }

    /// 当前绑定的扫描器；没有可用规则集时为 None
    pub fn scanner(&self) -> Option<Arc<Mutex<E::Scanner>>> {
        self.scanner.clone()
    }
}

/// 解析“当前规则文本”：内联内容优先于文件内容。
/// 返回 (源文本, 来源标识)；来源标识用于导出元数据
/// （内联为 "Inline Rules"，文件为其路径）。
pub fn resolve_rule_source(
    inline: Option<&str>,
    file: Option<&Path>,
    session: &ScanSession,
) -> Result<(String, String), CompileError> {
    if let Some(text) = inline {
        if !text.trim().is_empty() {
            return Ok((text.to_string(), "Inline Rules".to_string()));
        }
    }
    if let Some(path) = file {
        return match std::fs::read_to_string(path) {
            Ok(text) => Ok((text, path.display().to_string())),
            Err(err) => {
                session.error(&format!("Cannot read rule file {}: {err}", path.display()));
                Err(CompileError::EmptySource)
            }
        };
    }
    session.error("No rule content available");
    Err(CompileError::EmptySource)
}
