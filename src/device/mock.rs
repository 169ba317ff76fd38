//! 模拟绘图仪：在没有硬件时替代真实驱动，并记录每次设备调用
//!
//! 调用日志（DeviceJournal）可在设备被状态机/服务独占后继续读取，便于测试断言调用顺序。

use std::sync::{Arc, Mutex};

use crate::device::{
    Axis, DeviceCall, DeviceError, DeviceFunction, DeviceOption, DeviceOptions, PlotDevice,
    POWER_QUERY,
};
use crate::script::Value;

/// 一次设备交互
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceEvent {
    Interactive,
    Connect,
    Disconnect,
    Stage(DeviceOption, Value),
    Commit(DeviceOption, Value),
    Call(DeviceCall),
    PlotSetup(Option<String>),
    PlotRun,
    Walk(Axis, f64),
}

/// 共享的调用日志句柄
#[derive(Debug, Clone, Default)]
pub struct DeviceJournal {
    events: Arc<Mutex<Vec<DeviceEvent>>>,
}

impl DeviceJournal {
    fn push(&self, event: DeviceEvent) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event);
    }

    pub fn events(&self) -> Vec<DeviceEvent> {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// 只保留 execute 调用
    pub fn calls(&self) -> Vec<DeviceCall> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                DeviceEvent::Call(call) => Some(call),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

/// 模拟绘图仪
#[derive(Debug)]
pub struct MockDevice {
    options: DeviceOptions,
    connected: bool,
    connect_result: Result<bool, DeviceError>,
    power_reading: i64,
    failing: Vec<DeviceFunction>,
    missing_options: Vec<DeviceOption>,
    position: (f64, f64),
    pen_down: bool,
    journal: DeviceJournal,
}

impl Default for MockDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDevice {
    pub fn new() -> Self {
        Self {
            options: DeviceOptions::default(),
            connected: false,
            connect_result: Ok(true),
            power_reading: 300,
            failing: Vec::new(),
            missing_options: Vec::new(),
            position: (0.0, 0.0),
            pen_down: false,
            journal: DeviceJournal::default(),
        }
    }

    /// 与其他实例共享调用日志（服务按请求重建设备时使用）
    pub fn with_journal(journal: DeviceJournal) -> Self {
        Self {
            journal,
            ..Self::new()
        }
    }

    pub fn with_connect_result(mut self, result: Result<bool, DeviceError>) -> Self {
        self.connect_result = result;
        self
    }

    /// 电源查询读数（QC 应答第二字段）
    pub fn with_power_reading(mut self, reading: i64) -> Self {
        self.power_reading = reading;
        self
    }

    /// 指定函数调用时返回 Rejected
    pub fn failing_on(mut self, function: DeviceFunction) -> Self {
        self.failing.push(function);
        self
    }

    /// 模拟不支持某个选项的控制板
    pub fn without_option(mut self, option: DeviceOption) -> Self {
        self.missing_options.push(option);
        self
    }

    pub fn journal(&self) -> DeviceJournal {
        self.journal.clone()
    }

    pub fn options(&self) -> &DeviceOptions {
        &self.options
    }

    pub fn position(&self) -> (f64, f64) {
        self.position
    }

    pub fn pen_is_down(&self) -> bool {
        self.pen_down
    }

    fn function_of(call: &DeviceCall) -> DeviceFunction {
        match call {
            DeviceCall::Goto { .. } => DeviceFunction::Goto,
            DeviceCall::Moveto { .. } => DeviceFunction::Moveto,
            DeviceCall::Lineto { .. } => DeviceFunction::Lineto,
            DeviceCall::Go { .. } => DeviceFunction::Go,
            DeviceCall::Move { .. } => DeviceFunction::Move,
            DeviceCall::Line { .. } => DeviceFunction::Line,
            DeviceCall::Penup => DeviceFunction::Penup,
            DeviceCall::Pendown => DeviceFunction::Pendown,
            DeviceCall::DrawPath(_) => DeviceFunction::DrawPath,
            DeviceCall::Delay(_) => DeviceFunction::Delay,
            DeviceCall::Block => DeviceFunction::Block,
            DeviceCall::UsbCommand(_) => DeviceFunction::UsbCommand,
            DeviceCall::UsbQuery(_) => DeviceFunction::UsbQuery,
            DeviceCall::LoadConfig(_) => DeviceFunction::LoadConfig,
            DeviceCall::Update => DeviceFunction::Update,
        }
    }

    fn apply_motion(&mut self, call: &DeviceCall) {
        let (x, y) = self.position;
        match *call {
            DeviceCall::Goto { x, y } => self.position = (x, y),
            DeviceCall::Moveto { x, y } => {
                self.pen_down = false;
                self.position = (x, y);
            }
            DeviceCall::Lineto { x, y } => {
                self.pen_down = true;
                self.position = (x, y);
            }
            DeviceCall::Go { dx, dy } => self.position = (x + dx, y + dy),
            DeviceCall::Move { dx, dy } => {
                self.pen_down = false;
                self.position = (x + dx, y + dy);
            }
            DeviceCall::Line { dx, dy } => {
                self.pen_down = true;
                self.position = (x + dx, y + dy);
            }
            DeviceCall::Penup => self.pen_down = false,
            DeviceCall::Pendown => self.pen_down = true,
            _ => {}
        }
        if let DeviceCall::DrawPath(points) = call {
            if let Some(&last) = points.last() {
                self.position = last;
            }
            self.pen_down = false;
        }
    }
}

impl PlotDevice for MockDevice {
    fn interactive(&mut self) {
        self.journal.push(DeviceEvent::Interactive);
    }

    fn connect(&mut self) -> Result<bool, DeviceError> {
        self.journal.push(DeviceEvent::Connect);
        let result = self.connect_result.clone();
        self.connected = matches!(result, Ok(true));
        result
    }

    fn disconnect(&mut self) -> Result<(), DeviceError> {
        self.journal.push(DeviceEvent::Disconnect);
        self.connected = false;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn has_option(&self, option: DeviceOption) -> bool {
        !self.missing_options.contains(&option)
    }

    fn stage_option(&mut self, option: DeviceOption, value: &Value) -> Result<(), DeviceError> {
        if !self.has_option(option) {
            return Err(DeviceError::UnsupportedOption(option.name().to_string()));
        }
        self.options.set(option, value)?;
        self.journal.push(DeviceEvent::Stage(option, value.clone()));
        Ok(())
    }

    fn commit_option(&mut self, option: DeviceOption, value: &Value) -> Result<(), DeviceError> {
        if !self.connected {
            return Err(DeviceError::NotConnected);
        }
        if !self.has_option(option) {
            return Err(DeviceError::UnsupportedOption(option.name().to_string()));
        }
        self.options.set(option, value)?;
        self.journal.push(DeviceEvent::Commit(option, value.clone()));
        Ok(())
    }

    fn execute(&mut self, call: &DeviceCall) -> Result<Option<String>, DeviceError> {
        if !self.connected {
            return Err(DeviceError::NotConnected);
        }
        let function = Self::function_of(call);
        if self.failing.contains(&function) {
            return Err(DeviceError::Rejected(format!(
                "{} rejected by plotter",
                function.name()
            )));
        }
        self.journal.push(DeviceEvent::Call(call.clone()));
        self.apply_motion(call);

        match call {
            DeviceCall::UsbQuery(query) if query == POWER_QUERY => {
                Ok(Some(format!("0,{}", self.power_reading)))
            }
            DeviceCall::UsbQuery(_) => Ok(Some("OK".to_string())),
            _ => Ok(None),
        }
    }

    fn plot_setup(&mut self, svg: Option<&str>) -> Result<(), DeviceError> {
        self.journal
            .push(DeviceEvent::PlotSetup(svg.map(str::to_string)));
        Ok(())
    }

    fn plot_run(&mut self) -> Result<(), DeviceError> {
        self.journal.push(DeviceEvent::PlotRun);
        Ok(())
    }

    fn walk(&mut self, axis: Axis, distance_mm: f64) -> Result<(), DeviceError> {
        self.journal.push(DeviceEvent::Walk(axis, distance_mm));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execute_requires_connection() {
        let mut device = MockDevice::new();
        let err = device.execute(&DeviceCall::Penup).unwrap_err();
        assert_eq!(err, DeviceError::NotConnected);
    }

    #[test]
    fn test_power_query_reply() {
        let mut device = MockDevice::new().with_power_reading(280);
        device.connect().unwrap();
        assert_eq!(device.usb_query(POWER_QUERY).unwrap(), "0,280");
    }

    #[test]
    fn test_failure_injection() {
        let mut device = MockDevice::new().failing_on(DeviceFunction::Lineto);
        device.connect().unwrap();
        assert!(device.execute(&DeviceCall::Lineto { x: 1.0, y: 1.0 }).is_err());
        assert!(device.execute(&DeviceCall::Moveto { x: 1.0, y: 1.0 }).is_ok());
        assert_eq!(device.journal().calls(), vec![DeviceCall::Moveto { x: 1.0, y: 1.0 }]);
    }

    #[test]
    fn test_motion_tracking() {
        let mut device = MockDevice::new();
        device.connect().unwrap();
        device.moveto(10.0, 5.0).unwrap();
        device.execute(&DeviceCall::Line { dx: 2.0, dy: -1.0 }).unwrap();
        assert_eq!(device.position(), (12.0, 4.0));
        assert!(device.pen_is_down());
        device.penup().unwrap();
        assert!(!device.pen_is_down());
    }

    #[test]
    fn test_commit_option_updates_record() {
        let mut device = MockDevice::new().without_option(DeviceOption::Port);
        device.connect().unwrap();
        device.commit_option(DeviceOption::SpeedPenup, &Value::Int(30)).unwrap();
        assert_eq!(device.options().speed_penup, 30);
        assert!(!device.has_option(DeviceOption::Port));
        assert!(matches!(
            device.commit_option(DeviceOption::Port, &Value::Text("x".to_string())),
            Err(DeviceError::UnsupportedOption(_))
        ));
    }
}
