//! 命令执行器
//!
//! 持有转换表与参数策略；dispatch 针对独占的设备执行一条命令，
//! 宏展开时子命令关闭宏解析，因此宏不会递归。

use std::time::Instant;

use crate::core::PlotError;
use crate::device::{DeviceCall, DeviceFunction, DeviceOption, PlotDevice};
use crate::dispatch::DispatchReport;
use crate::script::{ArityPolicy, CastTable, Command, Definitions, Statement, Value};

pub struct Dispatcher {
    table: CastTable,
    policy: ArityPolicy,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(CastTable::standard(), ArityPolicy::default())
    }
}

impl Dispatcher {
    pub fn new(table: CastTable, policy: ArityPolicy) -> Self {
        Self { table, policy }
    }

    pub fn table(&self) -> &CastTable {
        &self.table
    }

    pub fn policy(&self) -> ArityPolicy {
        self.policy
    }

    /// 先转换原始语句再执行；转换失败为 Failed
    pub fn dispatch_statement(
        &self,
        device: &mut dyn PlotDevice,
        definitions: &Definitions,
        statement: &Statement,
    ) -> DispatchReport {
        // 宏名不经转换表，参数被忽略
        if definitions.contains(&statement.name) {
            return self.audited(&statement.name, &statement.raw_params, || {
                self.run_macro(device, definitions, &statement.name)
            });
        }
        match self.table.cast_statement(statement, self.policy) {
            Ok(command) => self.dispatch(device, definitions, &command),
            Err(e) => {
                let report = DispatchReport::from_error(&e);
                audit(&statement.name, &statement.raw_params, &report, 0);
                report
            }
        }
    }

    /// 执行已转换的命令
    pub fn dispatch(
        &self,
        device: &mut dyn PlotDevice,
        definitions: &Definitions,
        command: &Command,
    ) -> DispatchReport {
        self.audited(command.name(), command.raw_params(), || {
            if definitions.contains(command.name()) {
                self.run_macro(device, definitions, command.name())
            } else {
                resolve_builtin(device, command.name(), command.typed_params())
            }
        })
    }

    fn audited(
        &self,
        name: &str,
        raw_params: &[String],
        run: impl FnOnce() -> DispatchReport,
    ) -> DispatchReport {
        let start = Instant::now();
        let report = run();
        audit(name, raw_params, &report, start.elapsed().as_millis() as u64);
        report
    }

    /// 按定义顺序执行全部子命令；失败不中断后续子命令，报告首个失败
    fn run_macro(
        &self,
        device: &mut dyn PlotDevice,
        definitions: &Definitions,
        name: &str,
    ) -> DispatchReport {
        let Some(body) = definitions.get(name) else {
            return DispatchReport::from_error(&PlotError::UnknownCommand(name.to_string()));
        };
        let mut first_failure = None;
        for sub in body {
            let report = resolve_builtin(device, sub.name(), sub.typed_params());
            if !report.is_success() {
                tracing::warn!(
                    macro_name = name,
                    command = sub.name(),
                    reason = %report.message,
                    "macro step failed"
                );
                first_failure.get_or_insert(report.message);
            }
        }
        if let Some(reason) = first_failure {
            return DispatchReport::from_error(&PlotError::DispatchFailure {
                command: name.to_string(),
                reason,
            });
        }
        DispatchReport::succeeded(format!("Defined command {} executed successfully", name))
    }
}

/// 选项 -> 函数 -> 未知（不含宏）
fn resolve_builtin(device: &mut dyn PlotDevice, name: &str, params: &[Value]) -> DispatchReport {
    if let Some(option) = DeviceOption::from_name(name).filter(|o| device.has_option(*o)) {
        let Some(value) = params.first() else {
            return DispatchReport::from_error(&PlotError::Arity {
                command: name.to_string(),
                expected: 1,
                found: 0,
            });
        };
        return match device.commit_option(option, value) {
            Ok(()) => DispatchReport::succeeded(format!("Option {} set successfully", name)),
            Err(e) => DispatchReport::from_error(&PlotError::dispatch(name, e)),
        };
    }

    if let Some(function) = DeviceFunction::from_name(name) {
        let call = match DeviceCall::build(function, params) {
            Ok(call) => call,
            Err(reason) => {
                return DispatchReport::from_error(&PlotError::DispatchFailure {
                    command: name.to_string(),
                    reason,
                })
            }
        };
        return match device.execute(&call) {
            Ok(_) => DispatchReport::succeeded(format!("Command {} executed successfully", name)),
            Err(e) => DispatchReport::from_error(&PlotError::dispatch(name, e)),
        };
    }

    DispatchReport::from_error(&PlotError::UnknownCommand(name.to_string()))
}

fn audit(name: &str, raw_params: &[String], report: &DispatchReport, duration_ms: u64) {
    let audit = serde_json::json!({
        "event": "command_audit",
        "command": name,
        "params": params_preview(raw_params),
        "outcome": report.outcome.as_str(),
        "duration_ms": duration_ms,
    });
    tracing::info!(audit = %audit.to_string(), "command");
}

fn params_preview(raw_params: &[String]) -> String {
    let s = raw_params.join(" ");
    if s.len() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{DeviceError, DeviceEvent, MockDevice};
    use crate::dispatch::Outcome;
    use crate::script::ScriptParser;

    fn connected() -> MockDevice {
        let mut device = MockDevice::new();
        device.connect().unwrap();
        device
    }

    fn st(line: &str) -> Statement {
        Statement::from_line(line).unwrap()
    }

    #[test]
    fn test_macro_dispatches_calls_in_order() {
        let dispatcher = Dispatcher::default();
        let script = ScriptParser::new(dispatcher.table())
            .parse_str("def sq moveto 0 0|lineto 10 0|lineto 10 10");
        let mut device = connected();
        let journal = device.journal();
        journal.clear();

        for _ in 0..2 {
            let report = dispatcher.dispatch_statement(&mut device, &script.definitions, &st("sq"));
            assert_eq!(report.outcome, Outcome::Succeeded);
            assert_eq!(report.message, "Defined command sq executed successfully");
        }

        let expected = vec![
            DeviceCall::Moveto { x: 0.0, y: 0.0 },
            DeviceCall::Lineto { x: 10.0, y: 0.0 },
            DeviceCall::Lineto { x: 10.0, y: 10.0 },
        ];
        let calls = journal.calls();
        assert_eq!(calls.len(), 6);
        assert_eq!(calls[..3], expected[..]);
        assert_eq!(calls[3..], expected[..]);
    }

    #[test]
    fn test_macro_continues_past_failed_step() {
        let dispatcher = Dispatcher::default();
        let script = ScriptParser::new(dispatcher.table())
            .parse_str("def zig moveto 0 0|lineto 5 5|penup|lineto 6 6");
        let mut device = MockDevice::new().failing_on(DeviceFunction::Lineto);
        device.connect().unwrap();
        let journal = device.journal();

        let report = dispatcher.dispatch_statement(&mut device, &script.definitions, &st("zig"));
        assert_eq!(report.outcome, Outcome::Failed);
        assert!(report.message.contains("zig"));
        assert!(report.message.contains("lineto"));
        assert_eq!(
            journal.calls(),
            vec![DeviceCall::Moveto { x: 0.0, y: 0.0 }, DeviceCall::Penup]
        );
    }

    #[test]
    fn test_macro_failing_first_step_still_runs_rest() {
        let dispatcher = Dispatcher::default();
        let script = ScriptParser::new(dispatcher.table())
            .parse_str("def sq moveto 0 0|lineto 10 0|lineto 10 10");
        let mut device = MockDevice::new().failing_on(DeviceFunction::Moveto);
        device.connect().unwrap();
        let journal = device.journal();

        let report = dispatcher.dispatch_statement(&mut device, &script.definitions, &st("sq"));
        assert_eq!(report.outcome, Outcome::Failed);
        assert_eq!(
            journal.calls(),
            vec![
                DeviceCall::Lineto { x: 10.0, y: 0.0 },
                DeviceCall::Lineto { x: 10.0, y: 10.0 },
            ]
        );
    }

    #[test]
    fn test_unknown_command_is_reported() {
        let dispatcher = Dispatcher::default();
        let mut device = connected();
        let report =
            dispatcher.dispatch_statement(&mut device, &Definitions::new(), &st("wiggle 1 2"));
        assert_eq!(report.outcome, Outcome::Unknown);
        assert_eq!(report.message, "Unknown command: wiggle");
    }

    #[test]
    fn test_option_is_committed() {
        let dispatcher = Dispatcher::default();
        let mut device = connected();
        let journal = device.journal();
        let report = dispatcher.dispatch_statement(
            &mut device,
            &Definitions::new(),
            &st("speed_penup 30"),
        );
        assert_eq!(report.message, "Option speed_penup set successfully");
        assert!(journal
            .events()
            .contains(&DeviceEvent::Commit(DeviceOption::SpeedPenup, Value::Int(30))));
        assert_eq!(device.options().speed_penup, 30);
    }

    #[test]
    fn test_option_not_exposed_is_unknown() {
        let dispatcher = Dispatcher::default();
        let mut device = MockDevice::new().without_option(DeviceOption::Accel);
        device.connect().unwrap();
        let report =
            dispatcher.dispatch_statement(&mut device, &Definitions::new(), &st("accel 50"));
        assert_eq!(report.outcome, Outcome::Unknown);
    }

    #[test]
    fn test_function_success_and_cast_failure() {
        let dispatcher = Dispatcher::default();
        let mut device = connected();
        let ok = dispatcher.dispatch_statement(&mut device, &Definitions::new(), &st("moveto 1 2"));
        assert_eq!(ok.message, "Command moveto executed successfully");

        let bad = dispatcher.dispatch_statement(&mut device, &Definitions::new(), &st("moveto 1"));
        assert_eq!(bad.outcome, Outcome::Failed);
        assert!(bad.message.contains("moveto"));
    }

    #[test]
    fn test_device_error_becomes_failed() {
        let dispatcher = Dispatcher::default();
        let mut device = MockDevice::new();
        let report = dispatcher.dispatch_statement(&mut device, &Definitions::new(), &st("penup"));
        assert_eq!(report.outcome, Outcome::Failed);
        assert!(report.message.contains(&DeviceError::NotConnected.to_string()));
    }

    #[test]
    fn test_bad_draw_path_shape_fails() {
        let dispatcher = Dispatcher::default();
        let mut device = connected();
        let report = dispatcher.dispatch_statement(
            &mut device,
            &Definitions::new(),
            &st("draw_path [1, 2, 3]"),
        );
        assert_eq!(report.outcome, Outcome::Failed);
        let report = dispatcher.dispatch_statement(
            &mut device,
            &Definitions::new(),
            &st("draw_path [[2, 2], [3, 2], [3, 3]]"),
        );
        assert_eq!(report.outcome, Outcome::Succeeded);
        assert_eq!(device.position(), (3.0, 3.0));
    }
}
