//! 三层回调适配器：把引擎的回调序列整理为结构化结果
//!
//! 每个文件一个收集器，结果先在本地组装完整，最后一次性 `append`
//! 到共享集合；这是收集器唯一触碰共享状态的位置，持锁时间最短。
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use crate::engine::{MatchSpan, RuleMatch};
use crate::session::ScanSession;
use crate::store::ResultStore;
use crate::types::{PatternMatch, ScanResult};

pub struct MatchCollector<'a> {
    file_path: &'a Path,
    store: &'a ResultStore,
    session: &'a ScanSession,
    matched_rules: usize,
}

impl<'a> MatchCollector<'a> {
    pub fn new(file_path: &'a Path, store: &'a ResultStore, session: &'a ScanSession) -> Self {
        Self { file_path, store, session, matched_rules: 0 }
    }

    /// 本文件已记录的命中规则条数
    pub fn matched_rules(&self) -> usize {
        self.matched_rules
    }

    /// 第一层回调：引擎报告一条规则命中当前文件
    pub fn on_rule(&mut self, rule: &dyn RuleMatch) {
        // 标识查询失败的规则整条静默跳过
        let Some(rule_name) = rule.identifier() else {
            return;
        };
        let rule_namespace = rule.namespace();

        let mut pattern_matches = Vec::new();
        rule.for_each_pattern(&mut |pattern| {
            let pattern_id = pattern.identifier();
            pattern.for_each_match(&mut |span| {
                pattern_matches.push(self.build_match(&pattern_id, span));
            });
        });

        let result = ScanResult {
            file_path: self.file_path.to_path_buf(),
            rule_name,
            rule_namespace,
            pattern_matches,
        };

        let file_name = self
            .file_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.file_path.display().to_string());
        self.session.tagged(
            "MATCH",
            &format!(
                "{} in {} ({} patterns, {} matches)",
                result.rule_name,
                file_name,
                result.unique_pattern_count(),
                result.total_matches()
            ),
        );

        self.store.append(result);
        self.matched_rules += 1;
    }

    /// 第三层：按引擎报告的 (offset, length) 回读文件字节。
    /// 读取失败退化为 [Read Error] 标记；读到的字节可能短于 length
    /// （偏移 + 长度越过文件末尾时），预览随之变短，不视为错误。
    fn build_match(&self, pattern_id: &str, span: MatchSpan) -> PatternMatch {
        match read_span(self.file_path, span.offset, span.length) {
            Ok(data) => {
                PatternMatch::from_bytes(pattern_id.to_string(), span.offset, span.length, data)
            }
            Err(err) => {
                tracing::debug!(
                    path = %self.file_path.display(),
                    offset = span.offset,
                    "match data read failed: {err}"
                );
                PatternMatch::read_error(pattern_id.to_string(), span.offset, span.length)
            }
        }
    }
}

fn read_span(path: &Path, offset: u64, length: usize) -> std::io::Result<Vec<u8>> {
    let mut file = File::open(path)?;
    file.seek(SeekFrom::Start(offset))?;
    let mut data = Vec::new();
    file.take(length as u64).read_to_end(&mut data)?;
    Ok(data)
}
