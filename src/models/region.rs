//! 屏幕区域

use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

/// 截取区域（屏幕绝对像素坐标）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl FromStr for Region {
    type Err = ConfigError;

    /// 解析 `"x,y,w,h"` 形式的区域描述
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidValue {
            name: "capture_region".to_string(),
            value: s.to_string(),
        };

        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        if parts.len() != 4 {
            return Err(invalid());
        }

        let x: i32 = parts[0].parse().map_err(|_| invalid())?;
        let y: i32 = parts[1].parse().map_err(|_| invalid())?;
        let width: u32 = parts[2].parse().map_err(|_| invalid())?;
        let height: u32 = parts[3].parse().map_err(|_| invalid())?;

        if width == 0 || height == 0 {
            return Err(invalid());
        }

        Ok(Region {
            x,
            y,
            width,
            height,
        })
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{} {}x{}", self.x, self.y, self.width, self.height)
    }
}
