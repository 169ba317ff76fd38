//! 远程前端：PlotService（会话与操作）与 axum 路由（需启用 `server` feature）

#[cfg(feature = "server")]
pub mod routes;
pub mod service;

#[cfg(feature = "server")]
pub use routes::router;
pub use service::{
    CommandResponse, DeviceFactory, HasPowerResponse, PlotService, MAX_WALK_MM, NOT_INITIALIZED,
};
