use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use yarasweep_core::{
    export_csv, export_incident_report, export_json, resolve_rule_source, ResultStore,
    RuleCompiler, ScanMetadata, ScanOrchestrator, ScanSession, YaraEngine,
};

/// 命令行入口（基于 clap）
#[derive(Parser, Debug)]
#[command(name = "yarasweep", version, about = "YARA 规则目录扫描与 IR 结果导出")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 仅编译规则文件，校验语法
    Compile {
        /// 规则文件路径（YARA 源文本）
        #[arg(long)]
        rules: PathBuf,
    },
    /// 用规则扫描目录，可选导出 CSV / JSON / IR 报告
    Scan {
        /// 规则文件路径（YARA 源文本）
        #[arg(long)]
        rules: PathBuf,

        /// 待扫描目录（递归遍历，跳过符号链接）
        #[arg(long)]
        dir: PathBuf,

        /// CSV 导出路径
        #[arg(long)]
        csv: Option<PathBuf>,

        /// JSON 导出路径
        #[arg(long)]
        json: Option<PathBuf>,

        /// 事件响应文本报告导出路径
        #[arg(long)]
        report: Option<PathBuf>,

        /// 单文件扫描超时（秒；由引擎内部生效）
        #[arg(long)]
        timeout: Option<u64>,
    },
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Compile { rules } => run_compile(rules),
        Commands::Scan { rules, dir, csv, json, report, timeout } => {
            run_scan(rules, dir, csv, json, report, timeout)
        }
    }
}

fn run_compile(rules: PathBuf) -> Result<()> {
    let session = ScanSession::new();
    let mut compiler = RuleCompiler::new(YaraEngine::default());
    let (source, identity) =
        resolve_rule_source(None, Some(&rules), &session).context("resolve rule source")?;
    compiler.compile(&source, &session).context("compile rules")?;
    info!(rules = %identity, "rules compiled successfully");
    Ok(())
}

fn run_scan(
    rules: PathBuf,
    dir: PathBuf,
    csv: Option<PathBuf>,
    json: Option<PathBuf>,
    report: Option<PathBuf>,
    timeout: Option<u64>,
) -> Result<()> {
    let session = ScanSession::new();
    let store = ResultStore::new();

    let engine = YaraEngine::new(timeout.map(Duration::from_secs));
    let mut compiler = RuleCompiler::new(engine);
    let (source, identity) =
        resolve_rule_source(None, Some(&rules), &session).context("resolve rule source")?;
    compiler.compile(&source, &session).context("compile rules")?;

    let mut orchestrator = ScanOrchestrator::new(session.clone(), store.clone());
    if !orchestrator.start_scan(compiler.scanner(), &dir) {
        bail!("scan could not be started (see session log)");
    }
    // CLI 是同步使用方：直接等 sweep 跑完再导出
    orchestrator.wait();

    let snapshot = store.snapshot();
    let meta = ScanMetadata {
        rules_source: identity,
        scan_directory: dir.display().to_string(),
        files_scanned: session.files_scanned(),
        files_matched: session.files_matched(),
        total_matches: store.total_matches(),
    };

    if let Some(path) = csv {
        export_csv(&snapshot, &path).context("export CSV")?;
        info!(path = %path.display(), "CSV exported");
    }
    if let Some(path) = json {
        export_json(&snapshot, &meta, &path).context("export JSON")?;
        info!(path = %path.display(), "JSON exported");
    }
    if let Some(path) = report {
        export_incident_report(&snapshot, &meta, &path).context("export incident report")?;
        info!(path = %path.display(), "incident report exported");
    }

    info!(
        files_scanned = meta.files_scanned,
        files_matched = meta.files_matched,
        total_matches = meta.total_matches,
        unique_files = store.unique_file_count(),
        "scan finished"
    );
    Ok(())
}

fn init_tracing() {
    use tracing_subscriber::{EnvFilter, FmtSubscriber};
    // 支持通过环境变量 RUST_LOG 控制日志等级，如：RUST_LOG=debug
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(env_filter).finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}
