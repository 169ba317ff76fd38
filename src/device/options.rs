//! 设备选项：固定枚举的选项名与类型化的选项记录

use serde::Serialize;

use crate::device::DeviceError;
use crate::script::Value;

/// 可单独设置的设备选项
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceOption {
    Handling,
    SpeedPendown,
    SpeedPenup,
    Accel,
    PenPosDown,
    PenPosUp,
    PenRateLower,
    PenRateRaise,
    Model,
    Penlift,
    Homing,
    Port,
    PortConfig,
    Units,
}

impl DeviceOption {
    pub const ALL: [DeviceOption; 14] = [
        DeviceOption::Handling,
        DeviceOption::SpeedPendown,
        DeviceOption::SpeedPenup,
        DeviceOption::Accel,
        DeviceOption::PenPosDown,
        DeviceOption::PenPosUp,
        DeviceOption::PenRateLower,
        DeviceOption::PenRateRaise,
        DeviceOption::Model,
        DeviceOption::Penlift,
        DeviceOption::Homing,
        DeviceOption::Port,
        DeviceOption::PortConfig,
        DeviceOption::Units,
    ];

    pub fn name(self) -> &'static str {
        match self {
            DeviceOption::Handling => "handling",
            DeviceOption::SpeedPendown => "speed_pendown",
            DeviceOption::SpeedPenup => "speed_penup",
            DeviceOption::Accel => "accel",
            DeviceOption::PenPosDown => "pen_pos_down",
            DeviceOption::PenPosUp => "pen_pos_up",
            DeviceOption::PenRateLower => "pen_rate_lower",
            DeviceOption::PenRateRaise => "pen_rate_raise",
            DeviceOption::Model => "model",
            DeviceOption::Penlift => "penlift",
            DeviceOption::Homing => "homing",
            DeviceOption::Port => "port",
            DeviceOption::PortConfig => "port_config",
            DeviceOption::Units => "units",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|o| o.name() == name)
    }
}

/// 设备选项记录；默认值与控制板出厂设置一致，units 默认英寸（0）
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceOptions {
    pub handling: i64,
    pub speed_pendown: i64,
    pub speed_penup: i64,
    pub accel: i64,
    pub pen_pos_down: i64,
    pub pen_pos_up: i64,
    pub pen_rate_lower: i64,
    pub pen_rate_raise: i64,
    pub model: i64,
    pub penlift: i64,
    pub homing: bool,
    pub port: Option<String>,
    pub port_config: i64,
    pub units: i64,
}

impl Default for DeviceOptions {
    fn default() -> Self {
        Self {
            handling: 1,
            speed_pendown: 25,
            speed_penup: 75,
            accel: 75,
            pen_pos_down: 40,
            pen_pos_up: 60,
            pen_rate_lower: 50,
            pen_rate_raise: 50,
            model: 1,
            penlift: 1,
            homing: true,
            port: None,
            port_config: 0,
            units: 0,
        }
    }
}

impl DeviceOptions {
    /// 写入单个选项；值类型与选项不符时返回 Rejected
    pub fn set(&mut self, option: DeviceOption, value: &Value) -> Result<(), DeviceError> {
        let rejected = || {
            DeviceError::Rejected(format!("invalid value '{}' for option {}", value, option.name()))
        };
        let slot = match option {
            DeviceOption::Homing => {
                self.homing = value.as_bool().ok_or_else(rejected)?;
                return Ok(());
            }
            DeviceOption::Port => {
                self.port = Some(value.as_str().ok_or_else(rejected)?.to_string());
                return Ok(());
            }
            DeviceOption::Handling => &mut self.handling,
            DeviceOption::SpeedPendown => &mut self.speed_pendown,
            DeviceOption::SpeedPenup => &mut self.speed_penup,
            DeviceOption::Accel => &mut self.accel,
            DeviceOption::PenPosDown => &mut self.pen_pos_down,
            DeviceOption::PenPosUp => &mut self.pen_pos_up,
            DeviceOption::PenRateLower => &mut self.pen_rate_lower,
            DeviceOption::PenRateRaise => &mut self.pen_rate_raise,
            DeviceOption::Model => &mut self.model,
            DeviceOption::Penlift => &mut self.penlift,
            DeviceOption::PortConfig => &mut self.port_config,
            DeviceOption::Units => &mut self.units,
        };
        *slot = value.as_i64().ok_or_else(rejected)?;
        Ok(())
    }

    pub fn get(&self, option: DeviceOption) -> Value {
        match option {
            DeviceOption::Homing => Value::Bool(self.homing),
            DeviceOption::Port => Value::Text(self.port.clone().unwrap_or_default()),
            DeviceOption::Handling => Value::Int(self.handling),
            DeviceOption::SpeedPendown => Value::Int(self.speed_pendown),
            DeviceOption::SpeedPenup => Value::Int(self.speed_penup),
            DeviceOption::Accel => Value::Int(self.accel),
            DeviceOption::PenPosDown => Value::Int(self.pen_pos_down),
            DeviceOption::PenPosUp => Value::Int(self.pen_pos_up),
            DeviceOption::PenRateLower => Value::Int(self.pen_rate_lower),
            DeviceOption::PenRateRaise => Value::Int(self.pen_rate_raise),
            DeviceOption::Model => Value::Int(self.model),
            DeviceOption::Penlift => Value::Int(self.penlift),
            DeviceOption::PortConfig => Value::Int(self.port_config),
            DeviceOption::Units => Value::Int(self.units),
        }
    }
}
