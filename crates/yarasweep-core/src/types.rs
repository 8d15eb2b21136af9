//! 扫描结果数据模型与预览渲染
use serde::Serialize;
use std::collections::HashSet;
use std::path::PathBuf;

/// 可读预览最多取前 255 个源字节
pub(crate) const PREVIEW_LIMIT: usize = 255;
/// 十六进制转储最多取前 256 个源字节（独立于预览上限）
pub(crate) const HEX_DUMP_LIMIT: usize = 256;
/// 超出上限时追加的截断标记
pub(crate) const TRUNCATION_MARKER: &str = "...";
/// 读取/定位失败时预览与 hex 均退化为该标记，不让错误外溢
pub(crate) const READ_ERROR_MARKER: &str = "[Read Error]";

/// 某个命名子模式在文件中的一次具体命中
#[derive(Debug, Clone, Serialize)]
pub struct PatternMatch {
    /// 形如 $string1 / $hex1 / $regex1 的子模式标识
    pub pattern_id: String,
    /// 命中在文件内的字节偏移
    pub offset: u64,
    /// 引擎报告的命中长度
    pub length: usize,
    /// 实际读到的原始字节（读取部分成功时可能短于 length）
    #[serde(skip)]
    pub data: Vec<u8>,
    pub data_preview: String,
    pub hex_dump: String,
}

impl PatternMatch {
    /// 由实际读到的字节构造，渲染预览与 hex 转储
    pub fn from_bytes(pattern_id: String, offset: u64, length: usize, data: Vec<u8>) -> Self {
        let data_preview = render_preview(&data);
        let hex_dump = render_hex_dump(&data);
        Self { pattern_id, offset, length, data, data_preview, hex_dump }
    }

    /// 读取失败的退化形式
    pub fn read_error(pattern_id: String, offset: u64, length: usize) -> Self {
        Self {
            pattern_id,
            offset,
            length,
            data: Vec::new(),
            data_preview: READ_ERROR_MARKER.to_string(),
            hex_dump: READ_ERROR_MARKER.to_string(),
        }
    }
}

/// 一条规则在一次 sweep 中命中一个文件
#[derive(Debug, Clone, Serialize)]
pub struct ScanResult {
    pub file_path: PathBuf,
    pub rule_name: String,
    /// 可能为空字符串
    pub rule_namespace: String,
    pub pattern_matches: Vec<PatternMatch>,
}

impl ScanResult {
    pub fn total_matches(&self) -> usize {
        self.pattern_matches.len()
    }

    pub fn unique_pattern_count(&self) -> usize {
        let unique: HashSet<&str> = self
            .pattern_matches
            .iter()
            .map(|m| m.pattern_id.as_str())
            .collect();
        unique.len()
    }
}

/// 从子模式标识推断的模式类别。
/// 注意这是启发式分类（按标识子串猜测），引擎契约并不提供真实类型。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternKind {
    String,
    Hex,
    Regex,
    Unknown,
}

impl PatternKind {
    pub fn infer(pattern_id: &str) -> Self {
        if pattern_id.contains("$string") {
            Self::String
        } else if pattern_id.contains("$hex") {
            Self::Hex
        } else if pattern_id.contains("$regex") {
            Self::Regex
        } else {
            Self::Unknown
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "String",
            Self::Hex => "Hex",
            Self::Regex => "Regex",
            Self::Unknown => "Unknown",
        }
    }

    pub fn as_lower(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Hex => "hex",
            Self::Regex => "regex",
            Self::Unknown => "unknown",
        }
    }
}

/// 可打印 ASCII（0x20..=0x7E）原样保留，其余替换为 '.'
pub(crate) fn render_preview(data: &[u8]) -> String {
    let limit = data.len().min(PREVIEW_LIMIT);
    let mut preview = String::with_capacity(limit + TRUNCATION_MARKER.len());
    for &byte in &data[..limit] {
        if (0x20..=0x7e).contains(&byte) {
            preview.push(byte as char);
        } else {
            preview.push('.');
        }
    }
    if data.len() > limit {
        preview.push_str(TRUNCATION_MARKER);
    }
    preview
}

/// 每字节两位大写十六进制加空格，保持原始顺序
pub(crate) fn render_hex_dump(data: &[u8]) -> String {
    use std::fmt::Write;
    let limit = data.len().min(HEX_DUMP_LIMIT);
    let mut dump = String::with_capacity(limit * 3 + TRUNCATION_MARKER.len());
    for &byte in &data[..limit] {
        // String 的 fmt::Write 不会失败
        let _ = write!(dump, "{byte:02X} ");
    }
    if data.len() > limit {
        dump.push_str(TRUNCATION_MARKER);
    }
    dump
}
