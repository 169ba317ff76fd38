//! 设备能力层：绘图仪驱动的显式接口
//!
//! 状态机与 RPC 服务只通过 PlotDevice trait 操作设备：
//! - **交互上下文**：interactive / connect / disconnect / execute(DeviceCall)
//! - **选项**：has_option 能力查询、stage_option（连接前暂存）、commit_option（设置并立即生效）
//! - **绘图上下文**：plot_setup / plot_run / walk（校准时微调原点）
//!
//! 运动规划与 USB 传输不在本层范围内；MockDevice 提供可记录调用的模拟绘图仪。

pub mod mock;
pub mod options;

use serde::Serialize;
use thiserror::Error;

use crate::script::{SetupOptions, Value};

pub use mock::{DeviceEvent, DeviceJournal, MockDevice};
pub use options::{DeviceOption, DeviceOptions};

/// 校准用对位图案：十字线加圆
pub const ALIGNMENT_SVG: &str = r#"<svg width="74mm" height="105mm" viewBox="0 0 74 105" xmlns="http://www.w3.org/2000/svg"><circle style="fill:none;stroke:#000;stroke-width:.2;stroke-dasharray:none" cx="37" cy="40.975" r="24.57"/><path style="fill:none;stroke:#000;stroke-width:.264583px;stroke-linecap:butt;stroke-linejoin:miter;stroke-opacity:1" d="M7.577 40.975h58.846M37 11.551v58.847"/></svg>"#;

/// 电源检测查询命令，应答为逗号分隔，第二字段为电源电压读数
pub const POWER_QUERY: &str = "QC\r";

/// 设备调用失败
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DeviceError {
    #[error("Plotter is not connected")]
    NotConnected,

    #[error("{0}")]
    Rejected(String),

    #[error("Option {0} is not supported by this plotter")]
    UnsupportedOption(String),

    #[error("Unexpected reply from plotter: {0}")]
    BadReply(String),

    #[error("Transport error: {0}")]
    Transport(String),
}

/// 坐标轴（校准微调）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
}

impl Axis {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "x" => Some(Axis::X),
            "y" => Some(Axis::Y),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Axis::X => "x",
            Axis::Y => "y",
        }
    }

    /// 驱动中对应的 utility 命令名
    pub fn walk_command(self) -> &'static str {
        match self {
            Axis::X => "walk_mmx",
            Axis::Y => "walk_mmy",
        }
    }
}

/// 可在交互上下文中调用的设备函数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceFunction {
    Goto,
    Moveto,
    Lineto,
    Go,
    Move,
    Line,
    Penup,
    Pendown,
    DrawPath,
    Delay,
    Block,
    UsbCommand,
    UsbQuery,
    LoadConfig,
    Update,
}

impl DeviceFunction {
    pub const ALL: [DeviceFunction; 15] = [
        DeviceFunction::Goto,
        DeviceFunction::Moveto,
        DeviceFunction::Lineto,
        DeviceFunction::Go,
        DeviceFunction::Move,
        DeviceFunction::Line,
        DeviceFunction::Penup,
        DeviceFunction::Pendown,
        DeviceFunction::DrawPath,
        DeviceFunction::Delay,
        DeviceFunction::Block,
        DeviceFunction::UsbCommand,
        DeviceFunction::UsbQuery,
        DeviceFunction::LoadConfig,
        DeviceFunction::Update,
    ];

    pub fn name(self) -> &'static str {
        match self {
            DeviceFunction::Goto => "goto",
            DeviceFunction::Moveto => "moveto",
            DeviceFunction::Lineto => "lineto",
            DeviceFunction::Go => "go",
            DeviceFunction::Move => "move",
            DeviceFunction::Line => "line",
            DeviceFunction::Penup => "penup",
            DeviceFunction::Pendown => "pendown",
            DeviceFunction::DrawPath => "draw_path",
            DeviceFunction::Delay => "delay",
            DeviceFunction::Block => "block",
            DeviceFunction::UsbCommand => "usb_command",
            DeviceFunction::UsbQuery => "usb_query",
            DeviceFunction::LoadConfig => "load_config",
            DeviceFunction::Update => "update",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.name() == name)
    }
}

/// 类型化的设备调用
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCall {
    /// 绝对移动（保持当前笔状态）
    Goto { x: f64, y: f64 },
    /// 抬笔绝对移动
    Moveto { x: f64, y: f64 },
    /// 落笔绝对移动
    Lineto { x: f64, y: f64 },
    /// 相对移动（保持当前笔状态）
    Go { dx: f64, dy: f64 },
    Move { dx: f64, dy: f64 },
    Line { dx: f64, dy: f64 },
    Penup,
    Pendown,
    DrawPath(Vec<(f64, f64)>),
    /// 毫秒
    Delay(u64),
    /// 等待运动完成
    Block,
    UsbCommand(String),
    UsbQuery(String),
    LoadConfig(String),
    /// 提交挂起的选项修改
    Update,
}

impl DeviceCall {
    /// 由函数名与已转换参数构造调用；参数形状不符时返回描述性错误
    pub fn build(function: DeviceFunction, params: &[Value]) -> Result<Self, String> {
        let number = |i: usize| -> Result<f64, String> {
            params
                .get(i)
                .and_then(Value::as_f64)
                .ok_or_else(|| format!("{} expects a number at position {}", function.name(), i))
        };
        let text = |i: usize| -> Result<String, String> {
            params
                .get(i)
                .map(|v| v.to_string())
                .ok_or_else(|| format!("{} expects a value at position {}", function.name(), i))
        };

        let call = match function {
            DeviceFunction::Goto => DeviceCall::Goto { x: number(0)?, y: number(1)? },
            DeviceFunction::Moveto => DeviceCall::Moveto { x: number(0)?, y: number(1)? },
            DeviceFunction::Lineto => DeviceCall::Lineto { x: number(0)?, y: number(1)? },
            DeviceFunction::Go => DeviceCall::Go { dx: number(0)?, dy: number(1)? },
            DeviceFunction::Move => DeviceCall::Move { dx: number(0)?, dy: number(1)? },
            DeviceFunction::Line => DeviceCall::Line { dx: number(0)?, dy: number(1)? },
            DeviceFunction::Penup => DeviceCall::Penup,
            DeviceFunction::Pendown => DeviceCall::Pendown,
            DeviceFunction::DrawPath => DeviceCall::DrawPath(path_points(params.first())?),
            DeviceFunction::Delay => {
                let ms = params
                    .first()
                    .and_then(Value::as_i64)
                    .and_then(|ms| u64::try_from(ms).ok())
                    .ok_or_else(|| "delay expects a non-negative integer (ms)".to_string())?;
                DeviceCall::Delay(ms)
            }
            DeviceFunction::Block => DeviceCall::Block,
            DeviceFunction::UsbCommand => DeviceCall::UsbCommand(text(0)?),
            DeviceFunction::UsbQuery => DeviceCall::UsbQuery(text(0)?),
            DeviceFunction::LoadConfig => DeviceCall::LoadConfig(text(0)?),
            DeviceFunction::Update => DeviceCall::Update,
        };
        Ok(call)
    }
}

/// draw_path 参数：至少两个 [x, y] 点
fn path_points(value: Option<&Value>) -> Result<Vec<(f64, f64)>, String> {
    let items = value
        .and_then(Value::as_list)
        .ok_or_else(|| "draw_path expects a list of [x, y] points".to_string())?;
    let points = items
        .iter()
        .map(|item| match item.as_list() {
            Some([x, y]) => match (x.as_f64(), y.as_f64()) {
                (Some(x), Some(y)) => Ok((x, y)),
                _ => Err(format!("draw_path point {} is not numeric", item)),
            },
            _ => Err(format!("draw_path point {} is not an [x, y] pair", item)),
        })
        .collect::<Result<Vec<_>, _>>()?;
    if points.len() < 2 {
        return Err("draw_path needs at least two points".to_string());
    }
    Ok(points)
}

/// 绘图仪能力接口。所有方法同步阻塞，调用方独占 &mut self。
pub trait PlotDevice: Send {
    /// 进入交互上下文（连接前调用）
    fn interactive(&mut self);

    /// 连接设备；Ok(false) 表示未找到设备
    fn connect(&mut self) -> Result<bool, DeviceError>;

    fn disconnect(&mut self) -> Result<(), DeviceError>;

    fn is_connected(&self) -> bool;

    /// 设备是否暴露该选项
    fn has_option(&self, option: DeviceOption) -> bool;

    /// 暂存选项，在 connect / plot_run 时生效
    fn stage_option(&mut self, option: DeviceOption, value: &Value) -> Result<(), DeviceError>;

    /// 设置选项并立即提交（set + update 为一个原子操作）
    fn commit_option(&mut self, option: DeviceOption, value: &Value) -> Result<(), DeviceError>;

    /// 执行交互函数；usb_query 返回应答文本
    fn execute(&mut self, call: &DeviceCall) -> Result<Option<String>, DeviceError>;

    /// 进入绘图上下文，可选 SVG 载荷
    fn plot_setup(&mut self, svg: Option<&str>) -> Result<(), DeviceError>;

    fn plot_run(&mut self) -> Result<(), DeviceError>;

    /// 以 utility 模式沿指定轴移动原点（毫米）
    fn walk(&mut self, axis: Axis, distance_mm: f64) -> Result<(), DeviceError>;

    fn usb_query(&mut self, query: &str) -> Result<String, DeviceError> {
        self.execute(&DeviceCall::UsbQuery(query.to_string()))
            .map(Option::unwrap_or_default)
    }

    fn penup(&mut self) -> Result<(), DeviceError> {
        self.execute(&DeviceCall::Penup).map(|_| ())
    }

    fn moveto(&mut self, x: f64, y: f64) -> Result<(), DeviceError> {
        self.execute(&DeviceCall::Moveto { x, y }).map(|_| ())
    }

    fn block(&mut self) -> Result<(), DeviceError> {
        self.execute(&DeviceCall::Block).map(|_| ())
    }
}

/// 解析电源查询应答（第二字段为整数读数）
pub fn parse_power_reading(reply: &str) -> Result<i64, DeviceError> {
    reply
        .trim()
        .split(',')
        .nth(1)
        .and_then(|field| field.trim().parse::<i64>().ok())
        .ok_or_else(|| DeviceError::BadReply(reply.trim().to_string()))
}

/// 发送电源查询并解析读数
pub fn read_power(device: &mut dyn PlotDevice) -> Result<i64, DeviceError> {
    let reply = device.usb_query(POWER_QUERY)?;
    parse_power_reading(&reply)
}

/// 暂存全部启动选项；设备不支持或拒绝的选项返回为警告文本
pub fn stage_setup_options(device: &mut dyn PlotDevice, options: &SetupOptions) -> Vec<String> {
    let mut warnings = Vec::new();
    for (option, value) in options.iter() {
        if !device.has_option(*option) {
            warnings.push(format!("Option {} not supported by plotter", option.name()));
            continue;
        }
        if let Err(e) = device.stage_option(*option, value) {
            warnings.push(format!("Option {} not applied: {}", option.name(), e));
        }
    }
    warnings
}

/// 启动选项中存在且设备支持时暂存单个选项
pub fn stage_setup_option(
    device: &mut dyn PlotDevice,
    options: &SetupOptions,
    option: DeviceOption,
) -> Result<(), DeviceError> {
    match options.get(option) {
        Some(value) if device.has_option(option) => device.stage_option(option, value),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_moveto_from_ints_and_floats() {
        let call = DeviceCall::build(DeviceFunction::Moveto, &[Value::Int(10), Value::Float(2.5)])
            .unwrap();
        assert_eq!(call, DeviceCall::Moveto { x: 10.0, y: 2.5 });
    }

    #[test]
    fn test_build_moveto_with_text_fails() {
        let err = DeviceCall::build(
            DeviceFunction::Moveto,
            &[Value::Text("a".to_string()), Value::Float(1.0)],
        )
        .unwrap_err();
        assert!(err.contains("moveto"));
    }

    #[test]
    fn test_build_draw_path() {
        let path = Value::List(vec![
            Value::List(vec![Value::Int(2), Value::Int(2)]),
            Value::List(vec![Value::Float(3.5), Value::Int(2)]),
        ]);
        let call = DeviceCall::build(DeviceFunction::DrawPath, &[path]).unwrap();
        assert_eq!(call, DeviceCall::DrawPath(vec![(2.0, 2.0), (3.5, 2.0)]));
    }

    #[test]
    fn test_build_draw_path_rejects_flat_list() {
        let path = Value::List(vec![Value::Int(2), Value::Int(2)]);
        assert!(DeviceCall::build(DeviceFunction::DrawPath, &[path]).is_err());
    }

    #[test]
    fn test_build_delay_rejects_negative() {
        assert!(DeviceCall::build(DeviceFunction::Delay, &[Value::Int(-5)]).is_err());
        assert_eq!(
            DeviceCall::build(DeviceFunction::Delay, &[Value::Int(250)]).unwrap(),
            DeviceCall::Delay(250)
        );
    }

    #[test]
    fn test_parse_power_reading() {
        assert_eq!(parse_power_reading("128,300\r\n").unwrap(), 300);
        assert!(parse_power_reading("garbage").is_err());
        assert!(parse_power_reading("1,x").is_err());
    }

    #[test]
    fn test_function_names_round_trip() {
        for f in DeviceFunction::ALL {
            assert_eq!(DeviceFunction::from_name(f.name()), Some(f));
        }
        assert_eq!(DeviceFunction::from_name("walk_mmx"), None);
    }
}
