//! 事件类别（EventClass）
//!
//! 封闭枚举，标识事件来源子系统；每个类别同一时刻至多一个发布者。
//! 注册表以 `index()` 作为定长数组下标，避免在 IRQ 路径上做动态查找。
//!
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventClass {
    Irq,
    Bluetooth,
    Zigbee,
    BluetoothMesh,
}

impl EventClass {
    /// 类别总数（注册表槽位数）
    pub const COUNT: usize = 4;

    pub const ALL: [EventClass; Self::COUNT] = [
        EventClass::Irq,
        EventClass::Bluetooth,
        EventClass::Zigbee,
        EventClass::BluetoothMesh,
    ];

    pub const fn index(self) -> usize {
        match self {
            EventClass::Irq => 0,
            EventClass::Bluetooth => 1,
            EventClass::Zigbee => 2,
            EventClass::BluetoothMesh => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EventClass::Irq => "irq",
            EventClass::Bluetooth => "bluetooth",
            EventClass::Zigbee => "zigbee",
            EventClass::BluetoothMesh => "bluetooth_mesh",
        }
    }
}

impl fmt::Display for EventClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
