//! Plot Server - 远程绘图服务
//!
//! 运行方式：
//! ```bash
//! cargo run --bin plot-server --features server
//! ```
//!
//! 监听地址取配置 `[server] bind`，可用 `PLOT__SERVER__BIND` 覆盖。

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use plot_director::{
    config::load_or_default,
    device::{MockDevice, PlotDevice},
    observability,
    script::CastTable,
    server::{router, PlotService},
    Dispatcher,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let cfg = load_or_default(config_path);

    tracing::warn!("no hardware driver linked, sessions use the simulated plotter");
    let service = PlotService::new(
        Box::new(|| Box::new(MockDevice::new()) as Box<dyn PlotDevice>),
        Dispatcher::new(CastTable::standard(), cfg.script.arity_policy()),
        cfg.plot.machine_settings(),
    )
    .with_separator(cfg.script.separator.clone());

    let app = router(Arc::new(service));

    let listener = tokio::net::TcpListener::bind(&cfg.server.bind)
        .await
        .with_context(|| format!("Failed to bind {}", cfg.server.bind))?;
    tracing::info!("Plot server listening on http://{}", cfg.server.bind);
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
