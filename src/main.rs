//! Plot Director - 终端前端
//!
//! 入口：解析命令行、加载配置、日志写入文件，解析脚本后交给状态机与 TUI 主循环。

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use plot_director::{
    config::load_or_default,
    device::MockDevice,
    notify,
    observability,
    script::{CastTable, ScriptParser},
    ui::{run_app, EventHandler},
    Dispatcher, PlotMachine,
};

/// 按脚本驱动笔式绘图仪
#[derive(Debug, Parser)]
#[command(name = "plot-director", version, about)]
struct Cli {
    /// 绘图脚本文件
    script_file: PathBuf,

    /// 结束/暂停时通知的 webhook 地址（覆盖配置）
    notify_target: Option<String>,

    /// 额外的配置文件
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    if !cli.script_file.exists() {
        eprintln!("{} not found", cli.script_file.display());
        return Ok(ExitCode::from(1));
    }

    let cfg = load_or_default(cli.config.clone());
    observability::init_to_file(&cfg.logging.file)
        .with_context(|| format!("Failed to open log file {}", cfg.logging.file.display()))?;

    let table = CastTable::standard();
    let policy = cfg.script.arity_policy();
    let script = ScriptParser::new(&table)
        .with_policy(policy)
        .with_separator(cfg.script.separator.clone())
        .parse_file(&cli.script_file)
        .with_context(|| format!("Failed to read {}", cli.script_file.display()))?;
    tracing::info!(
        script = %cli.script_file.display(),
        commands = script.queue.len(),
        definitions = script.definitions.len(),
        "script loaded"
    );

    let target = cli.notify_target.or(cfg.notify.webhook.clone());
    let notifier = notify::from_target(target.as_deref(), cfg.notify.timeout_secs);

    // 未链接硬件驱动，使用模拟绘图仪
    tracing::warn!("no hardware driver linked, using simulated plotter");
    let device = Box::new(MockDevice::new());

    let mut machine = PlotMachine::new(
        device,
        script,
        Dispatcher::new(table, policy),
        notifier,
        cfg.plot.machine_settings(),
    );
    let events = EventHandler::new(cfg.plot.tick_interval_ms, cfg.plot.idle_poll_ms);

    tokio::task::block_in_place(|| run_app(&mut machine, &events)).context("App run failed")?;

    Ok(ExitCode::SUCCESS)
}
