//! 结果导出：CSV / JSON / 事件响应文本报告
//!
//! 三个导出都是“结果快照 + 会话元数据”的纯函数，各写一个文件。
//! 导出失败只中止当前这一次导出，不影响结果集合。
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use chrono::{Local, Utc};
use serde_json::json;

use crate::error::ExportError;
use crate::types::{PatternKind, ScanResult};

pub const TOOL_NAME: &str = "yarasweep";

/// 会话级导出元数据（规则来源标识、扫描目录、三个计数）
#[derive(Debug, Clone)]
pub struct ScanMetadata {
    /// 规则文件路径，内联规则时为 "Inline Rules"
    pub rules_source: String,
    pub scan_directory: String,
    pub files_scanned: usize,
    pub files_matched: usize,
    pub total_matches: usize,
}

/// CSV：固定列序，每个 pattern 命中一行
pub fn export_csv(results: &[ScanResult], path: &Path) -> Result<(), ExportError> {
    let file = File::create(path).map_err(|source| ExportError::Create {
        path: path.to_path_buf(),
        source,
    })?;
    let mut out = BufWriter::new(file);
    write_csv(&mut out, results).map_err(|source| ExportError::Write {
        path: path.to_path_buf(),
        source,
    })
}

/// JSON：scan_metadata 块 + results 数组。
/// 字符串经 serde_json 正常转义（修复原始实现不转义的缺陷）。
pub fn export_json(
    results: &[ScanResult],
    meta: &ScanMetadata,
    path: &Path,
) -> Result<(), ExportError> {
    let file = File::create(path).map_err(|source| ExportError::Create {
        path: path.to_path_buf(),
        source,
    })?;
    let mut out = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut out, &json_value(results, meta))?;
    out.flush().map_err(|source| ExportError::Write {
        path: path.to_path_buf(),
        source,
    })
}

/// 事件响应文本报告：头部元数据、执行摘要、按文件分组的 finding、
/// 固定的处置建议清单
pub fn export_incident_report(
    results: &[ScanResult],
    meta: &ScanMetadata,
    path: &Path,
) -> Result<(), ExportError> {
    let file = File::create(path).map_err(|source| ExportError::Create {
        path: path.to_path_buf(),
        source,
    })?;
    let mut out = BufWriter::new(file);
    write_incident_report(&mut out, results, meta).map_err(|source| ExportError::Write {
        path: path.to_path_buf(),
        source,
    })
}

/// 含逗号/引号/换行的字段加引号包裹，内部引号成对转义
fn escape_csv(field: &str) -> String {
    if field.contains([',', '"', '\n']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn file_size_of(path: &Path) -> Option<u64> {
    std::fs::metadata(path).ok().map(|m| m.len())
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn write_csv(out: &mut impl Write, results: &[ScanResult]) -> std::io::Result<()> {
    writeln!(
        out,
        "Timestamp,File_Path,File_Name,File_Size_Bytes,Rule_Name,Rule_Namespace,\
         Pattern_ID,Pattern_Type,Offset_Hex,Offset_Decimal,Match_Length,\
         Data_Preview,Hex_Dump,MD5_Hash,SHA256_Hash"
    )?;

    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    for result in results {
        let file_size = file_size_of(&result.file_path)
            .map(|s| s.to_string())
            .unwrap_or_else(|| "Unknown".to_string());
        let file_name = file_name_of(&result.file_path);

        for m in &result.pattern_matches {
            writeln!(
                out,
                "{timestamp},{},{},{file_size},{},{},{},{},0x{:x},{},{},{},{},Not_Calculated,Not_Calculated",
                escape_csv(&result.file_path.display().to_string()),
                escape_csv(&file_name),
                escape_csv(&result.rule_name),
                escape_csv(&result.rule_namespace),
                escape_csv(&m.pattern_id),
                PatternKind::infer(&m.pattern_id).as_str(),
                m.offset,
                m.offset,
                m.length,
                escape_csv(&m.data_preview),
                escape_csv(&m.hex_dump),
            )?;
        }
    }
    out.flush()
}

fn json_value(results: &[ScanResult], meta: &ScanMetadata) -> serde_json::Value {
    json!({
        "scan_metadata": {
            "timestamp": Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            "tool": TOOL_NAME,
            "total_files_scanned": meta.files_scanned,
            "total_files_matched": meta.files_matched,
            "total_pattern_matches": meta.total_matches,
            "yara_rules_file": meta.rules_source,
            "scan_directory": meta.scan_directory,
        },
        "results": results.iter().map(|result| json!({
            "file_path": result.file_path.display().to_string(),
            "file_name": file_name_of(&result.file_path),
            "file_size_bytes": file_size_of(&result.file_path),
            "rule_name": result.rule_name,
            "rule_namespace": result.rule_namespace,
            "pattern_matches": result.pattern_matches.iter().map(|m| json!({
                "pattern_id": m.pattern_id,
                "pattern_type": PatternKind::infer(&m.pattern_id).as_lower(),
                "offset_decimal": m.offset,
                "offset_hex": format!("0x{:x}", m.offset),
                "length": m.length,
                "data_preview": m.data_preview,
                "hex_dump": m.hex_dump,
            })).collect::<Vec<_>>(),
        })).collect::<Vec<_>>(),
    })
}

fn write_incident_report(
    out: &mut impl Write,
    results: &[ScanResult],
    meta: &ScanMetadata,
) -> std::io::Result<()> {
    // 分隔线宽度：重分隔 81、元数据分隔 41、finding 分隔 61
    let heavy_bar = "=".repeat(81);
    let timestamp = Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string();

    writeln!(out, "{heavy_bar}")?;
    writeln!(out, "YARA SCAN INCIDENT RESPONSE REPORT")?;
    writeln!(out, "{heavy_bar}")?;
    writeln!(out)?;

    writeln!(out, "SCAN METADATA:")?;
    writeln!(out, "{}", "-".repeat(41))?;
    writeln!(out, "Scan Date/Time:      {timestamp}")?;
    writeln!(out, "Tool:                {TOOL_NAME}")?;
    writeln!(out, "YARA Rules File:     {}", meta.rules_source)?;
    writeln!(out, "Scan Directory:      {}", meta.scan_directory)?;
    writeln!(out, "Total Files Scanned: {}", meta.files_scanned)?;
    writeln!(out, "Files with Matches:  {}", meta.files_matched)?;
    writeln!(out, "Total Pattern Hits:  {}", meta.total_matches)?;
    writeln!(out)?;

    let unique_files: BTreeSet<&Path> = results.iter().map(|r| r.file_path.as_path()).collect();
    let unique_rules: BTreeSet<&str> = results.iter().map(|r| r.rule_name.as_str()).collect();
    let total_matches: usize = results.iter().map(ScanResult::total_matches).sum();

    writeln!(out, "EXECUTIVE SUMMARY:")?;
    writeln!(out, "{}", "-".repeat(41))?;
    writeln!(out, "• {} unique files triggered YARA rules", unique_files.len())?;
    writeln!(out, "• {} different YARA rules were triggered", unique_rules.len())?;
    writeln!(out, "• {total_matches} total pattern matches detected")?;
    writeln!(out)?;

    writeln!(out, "DETAILED FINDINGS:")?;
    writeln!(out, "{heavy_bar}")?;
    writeln!(out)?;

    // 按文件路径分组，BTreeMap 保证确定性输出顺序
    let mut grouped: BTreeMap<&Path, Vec<&ScanResult>> = BTreeMap::new();
    for result in results {
        grouped.entry(result.file_path.as_path()).or_default().push(result);
    }

    for (finding_number, (file_path, file_results)) in grouped.iter().enumerate() {
        writeln!(out, "FINDING #{}", finding_number + 1)?;
        writeln!(out, "{}", "-".repeat(61))?;
        writeln!(out, "File: {}", file_name_of(file_path))?;
        writeln!(out, "Full Path: {}", file_path.display())?;
        if let Some(size) = file_size_of(file_path) {
            write!(out, "File Size: {size} bytes")?;
            if size > 1024 * 1024 {
                write!(out, " ({} MB)", size / (1024 * 1024))?;
            } else if size > 1024 {
                write!(out, " ({} KB)", size / 1024)?;
            }
            writeln!(out)?;
        }

        let rules_hit: BTreeSet<&str> =
            file_results.iter().map(|r| r.rule_name.as_str()).collect();
        let pattern_hits: usize = file_results.iter().map(|r| r.total_matches()).sum();
        writeln!(
            out,
            "Rules Triggered: {} ({pattern_hits} pattern matches)",
            rules_hit.len()
        )?;
        writeln!(out)?;

        for result in file_results {
            writeln!(out, "  RULE: {}", result.rule_name)?;
            if !result.rule_namespace.is_empty() {
                writeln!(out, "  Namespace: {}", result.rule_namespace)?;
            }
            writeln!(out, "  Pattern Matches:")?;
            for m in &result.pattern_matches {
                writeln!(
                    out,
                    "    • {} at offset 0x{:x} (length: {} bytes)",
                    m.pattern_id, m.offset, m.length
                )?;
                writeln!(out, "      Data: {}", m.data_preview)?;
                if !m.hex_dump.is_empty() {
                    // hex 截断到前 60 个字符
                    if m.hex_dump.len() > 60 {
                        writeln!(out, "      Hex:  {}...", &m.hex_dump[..60])?;
                    } else {
                        writeln!(out, "      Hex:  {}", m.hex_dump)?;
                    }
                }
            }
            writeln!(out)?;
        }
        writeln!(out)?;
    }

    writeln!(out, "RECOMMENDATIONS:")?;
    writeln!(out, "{heavy_bar}")?;
    writeln!(out, "1. Quarantine or isolate all flagged files immediately")?;
    writeln!(out, "2. Perform deeper malware analysis on suspicious files")?;
    writeln!(out, "3. Check network logs for communications from affected systems")?;
    writeln!(out, "4. Scan other systems for similar indicators")?;
    writeln!(out, "5. Review file origins and distribution vectors")?;
    writeln!(out, "6. Update detection rules based on findings")?;
    writeln!(out)?;
    writeln!(out, "END OF REPORT")?;
    writeln!(out, "{heavy_bar}")?;
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PatternMatch;
    use std::path::PathBuf;

    fn meta() -> ScanMetadata {
        ScanMetadata {
            rules_source: "Inline Rules".to_string(),
            scan_directory: "/tmp/target".to_string(),
            files_scanned: 12,
            files_matched: 1,
            total_matches: 2,
        }
    }

    fn tricky_result() -> ScanResult {
        let mut m = PatternMatch::from_bytes("$string1".into(), 16, 9, b"a,\"b\"\nc".to_vec());
        // 构造一个同时含逗号、引号、换行的预览
        m.data_preview = "a,\"b\"\nc".to_string();
        ScanResult {
            file_path: PathBuf::from("/evidence/pay,load.bin"),
            rule_name: "Suspicious".to_string(),
            rule_namespace: "default".to_string(),
            pattern_matches: vec![
                m,
                PatternMatch::from_bytes("$hex1".into(), 0x40, 2, vec![0x90, 0x90]),
            ],
        }
    }

    /// 逐字符解析一行 CSV（双引号转义规则），用于回环校验
    fn parse_csv_line(line: &str) -> Vec<String> {
        let mut fields = Vec::new();
        let mut field = String::new();
        let mut in_quotes = false;
        let mut chars = line.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '"' if in_quotes => {
                    if chars.peek() == Some(&'"') {
                        chars.next();
                        field.push('"');
                    } else {
                        in_quotes = false;
                    }
                }
                '"' => in_quotes = true,
                ',' if !in_quotes => fields.push(std::mem::take(&mut field)),
                c => field.push(c),
            }
        }
        fields.push(field);
        fields
    }

    #[test]
    fn csv_fields_round_trip_through_escaping() {
        let results = vec![tricky_result()];
        let mut buf = Vec::new();
        write_csv(&mut buf, &results).unwrap();
        let text = String::from_utf8(buf).unwrap();

        // 预览内含换行：记录跨两条物理行，按未闭合引号拼回
        let mut records: Vec<String> = Vec::new();
        for line in text.lines() {
            let open_quotes = records
                .last()
                .map(|r: &String| r.matches('"').count() % 2 == 1)
                .unwrap_or(false);
            if open_quotes {
                let last = records.last_mut().unwrap();
                last.push('\n');
                last.push_str(line);
            } else {
                records.push(line.to_string());
            }
        }
        assert_eq!(records.len(), 3); // 表头 + 两条命中

        let header = parse_csv_line(&records[0]);
        assert_eq!(header.len(), 15);
        assert_eq!(header[0], "Timestamp");
        assert_eq!(header[14], "SHA256_Hash");

        let row = parse_csv_line(&records[1]);
        assert_eq!(row.len(), 15);
        assert_eq!(row[1], "/evidence/pay,load.bin");
        assert_eq!(row[4], "Suspicious");
        assert_eq!(row[6], "$string1");
        assert_eq!(row[7], "String");
        assert_eq!(row[8], "0x10");
        assert_eq!(row[9], "16");
        assert_eq!(row[11], "a,\"b\"\nc"); // 回环还原
        assert_eq!(row[13], "Not_Calculated");

        let hex_row = parse_csv_line(&records[2]);
        assert_eq!(hex_row[7], "Hex");
        assert_eq!(hex_row[11], "..");
    }

    #[test]
    fn json_export_escapes_strings_and_carries_metadata() {
        let value = json_value(&[tricky_result()], &meta());
        // serde_json 往返：转义正确性由解析成功保证
        let text = serde_json::to_string_pretty(&value).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();

        let m = &parsed["scan_metadata"];
        assert_eq!(m["tool"], TOOL_NAME);
        assert_eq!(m["total_files_scanned"], 12);
        assert_eq!(m["yara_rules_file"], "Inline Rules");
        assert_eq!(m["scan_directory"], "/tmp/target");

        let results = parsed["results"].as_array().unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0]["rule_name"], "Suspicious");
        // 不存在的文件大小为 null
        assert!(results[0]["file_size_bytes"].is_null());
        let matches = results[0]["pattern_matches"].as_array().unwrap();
        assert_eq!(matches[0]["pattern_type"], "string");
        assert_eq!(matches[0]["offset_hex"], "0x10");
        assert_eq!(matches[0]["data_preview"], "a,\"b\"\nc");
        assert_eq!(matches[1]["pattern_type"], "hex");
    }

    #[test]
    fn incident_report_groups_findings_per_file() {
        let mut second = tricky_result();
        second.file_path = PathBuf::from("/evidence/other.bin");
        second.rule_name = "Another".to_string();
        let results = vec![tricky_result(), second];

        let mut buf = Vec::new();
        write_incident_report(&mut buf, &results, &meta()).unwrap();
        let text = String::from_utf8(buf).unwrap();

        assert!(text.contains("YARA SCAN INCIDENT RESPONSE REPORT"));
        assert!(text.contains("Total Files Scanned: 12"));
        assert!(text.contains("• 2 unique files triggered YARA rules"));
        assert!(text.contains("• 2 different YARA rules were triggered"));
        assert!(text.contains("FINDING #1"));
        assert!(text.contains("FINDING #2"));
        assert!(text.contains("RULE: Suspicious"));
        assert!(text.contains("Namespace: default"));
        assert!(text.contains("RECOMMENDATIONS:"));
        assert!(text.contains("END OF REPORT"));
    }

    #[test]
    fn report_separator_widths_match_layout() {
        let mut buf = Vec::new();
        write_incident_report(&mut buf, &[tricky_result()], &meta()).unwrap();
        let text = String::from_utf8(buf).unwrap();

        let widths: Vec<usize> = text
            .lines()
            .filter(|l| !l.is_empty() && l.chars().all(|c| c == '=' || c == '-'))
            .map(str::len)
            .collect();
        assert!(widths.contains(&81)); // 重分隔线
        assert!(widths.contains(&41)); // 元数据 / 摘要分隔线
        assert!(widths.contains(&61)); // finding 分隔线
        assert!(widths.iter().all(|w| [81, 41, 61].contains(w)));
    }

    #[test]
    fn long_hex_dump_is_truncated_in_report() {
        let mut result = tricky_result();
        result.pattern_matches =
            vec![PatternMatch::from_bytes("$hex1".into(), 0, 64, vec![0xAA; 64])];
        let mut buf = Vec::new();
        write_incident_report(&mut buf, &[result], &meta()).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let hex_line = text.lines().find(|l| l.contains("Hex:")).unwrap();
        assert!(hex_line.ends_with("..."));
        // "      Hex:  " + 60 字符 + "..."
        assert_eq!(hex_line.len(), 12 + 60 + 3);
    }
}
