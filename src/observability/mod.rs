//! 可观测性：tracing 订阅器初始化
//!
//! 级别默认 info，可用 RUST_LOG 覆盖。TUI 占用终端时日志写入文件。

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// 输出到 stderr（plot-server）
pub fn init() {
    tracing_subscriber::registry()
        .with(filter())
        .with(fmt::layer())
        .init();
}

/// 追加写入日志文件（plot-director）；文件无法打开时返回错误
pub fn init_to_file(path: &Path) -> std::io::Result<()> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    tracing_subscriber::registry()
        .with(filter())
        .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        .init();
    Ok(())
}
