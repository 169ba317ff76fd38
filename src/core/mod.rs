//! 核心编排层：错误与恢复、运行状态、进度统计、控制状态机

pub mod error;
pub mod machine;
pub mod progress;
pub mod recovery;
pub mod state;

pub use error::{PlotError, RecoveryAction};
pub use machine::{MachineSettings, PlotMachine, DEFAULT_PAUSE_MESSAGE};
pub use progress::ProgressTracker;
pub use recovery::RecoveryEngine;
pub use state::{Direction, LogLine, PlotSnapshot, RunEvent, RunState, Transition};
