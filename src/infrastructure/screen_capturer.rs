//! 屏幕截取 - 基础设施层
//!
//! 持有"读屏幕"这一平台资源，只暴露 capture() 能力。
//! 产物是临时 PNG 文件，被 OCR 消费一次后即删除。

use std::path::{Path, PathBuf};

use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::CaptureError;
use crate::models::Region;

/// 一次屏幕截取的产物
///
/// 下游只消费一次，消费完调用 `cleanup()` 删除临时文件
#[derive(Debug)]
pub struct RawCapture {
    /// 临时 PNG 文件路径
    pub path: PathBuf,
    /// 截取区域（None 表示全屏）
    pub region: Option<Region>,
    /// 截取时间
    pub taken_at: chrono::DateTime<chrono::Local>,
}

impl RawCapture {
    /// 删除临时文件
    pub fn cleanup(&self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            warn!("⚠️ 无法删除临时截图 {}: {}", self.path.display(), e);
        }
    }
}

/// 屏幕截取器
///
/// 职责：
/// - 调用平台截屏工具生成 PNG
/// - 不认识 Question / 缓存
/// - 不处理业务流程
pub struct ScreenCapturer;

impl ScreenCapturer {
    pub fn new() -> Self {
        Self
    }

    /// 截取指定区域（或全屏）
    pub async fn capture(&self, region: Option<Region>) -> Result<RawCapture, CaptureError> {
        let path = temp_png_path();
        run_platform_capture(&path, region).await?;

        if !path.exists() {
            return Err(CaptureError::CommandFailed {
                command: "screenshot".to_string(),
                detail: "截屏工具没有产出文件".to_string(),
            });
        }

        debug!("截屏完成: {}", path.display());
        Ok(RawCapture {
            path,
            region,
            taken_at: chrono::Local::now(),
        })
    }
}

impl Default for ScreenCapturer {
    fn default() -> Self {
        Self::new()
    }
}

fn temp_png_path() -> PathBuf {
    std::env::temp_dir().join(format!(
        "screen_qna_{}.png",
        chrono::Local::now().format("%Y%m%d_%H%M%S_%3f")
    ))
}

#[cfg(target_os = "macos")]
async fn run_platform_capture(path: &Path, region: Option<Region>) -> Result<(), CaptureError> {
    let mut cmd = Command::new("screencapture");
    cmd.arg("-x");
    if let Some(r) = region {
        cmd.arg("-R")
            .arg(format!("{},{},{},{}", r.x, r.y, r.width, r.height));
    }
    cmd.arg(path);
    run_capture_command(cmd, "screencapture").await
}

#[cfg(target_os = "linux")]
async fn run_platform_capture(path: &Path, region: Option<Region>) -> Result<(), CaptureError> {
    // 依次尝试 maim（X11）、grim（Wayland）、ImageMagick import
    let mut reasons = Vec::new();
    for tool in ["maim", "grim", "import"] {
        let mut cmd = Command::new(tool);
        match tool {
            "maim" => {
                if let Some(r) = region {
                    cmd.arg("-g")
                        .arg(format!("{}x{}+{}+{}", r.width, r.height, r.x, r.y));
                }
            }
            "grim" => {
                if let Some(r) = region {
                    cmd.arg("-g")
                        .arg(format!("{},{} {}x{}", r.x, r.y, r.width, r.height));
                }
            }
            _ => {
                cmd.arg("-window").arg("root");
                if let Some(r) = region {
                    cmd.arg("-crop")
                        .arg(format!("{}x{}+{}+{}", r.width, r.height, r.x, r.y));
                }
            }
        }
        cmd.arg(path);

        match run_capture_command(cmd, tool).await {
            Ok(()) => return Ok(()),
            // maim 装了但拿不到显示时还可以换 grim 再试
            Err(e) => reasons.push(e.to_string()),
        }
    }
    Err(CaptureError::Unavailable {
        reason: format!("没有可用的截屏工具: {}", reasons.join("; ")),
    })
}

#[cfg(target_os = "windows")]
async fn run_platform_capture(path: &Path, region: Option<Region>) -> Result<(), CaptureError> {
    // 通过 PowerShell 的 CopyFromScreen 截屏，系统自带无需额外安装
    let script = match region {
        Some(r) => format!(
            "Add-Type -AssemblyName System.Drawing; \
             $b = New-Object System.Drawing.Bitmap({w}, {h}); \
             $g = [System.Drawing.Graphics]::FromImage($b); \
             $g.CopyFromScreen({x}, {y}, 0, 0, $b.Size); \
             $b.Save('{path}');",
            w = r.width,
            h = r.height,
            x = r.x,
            y = r.y,
            path = path.display()
        ),
        None => format!(
            "Add-Type -AssemblyName System.Windows.Forms,System.Drawing; \
             $s = [System.Windows.Forms.Screen]::PrimaryScreen.Bounds; \
             $b = New-Object System.Drawing.Bitmap($s.Width, $s.Height); \
             $g = [System.Drawing.Graphics]::FromImage($b); \
             $g.CopyFromScreen($s.X, $s.Y, 0, 0, $b.Size); \
             $b.Save('{path}');",
            path = path.display()
        ),
    };
    let mut cmd = Command::new("powershell");
    cmd.arg("-NoProfile").arg("-Command").arg(script);
    run_capture_command(cmd, "powershell").await
}

#[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
async fn run_platform_capture(_path: &Path, _region: Option<Region>) -> Result<(), CaptureError> {
    Err(CaptureError::Unavailable {
        reason: "当前平台不支持截屏".to_string(),
    })
}

/// 运行截屏命令并检查退出状态
async fn run_capture_command(mut cmd: Command, name: &str) -> Result<(), CaptureError> {
    let output = cmd.output().await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            CaptureError::Unavailable {
                reason: format!("找不到 {} 命令", name),
            }
        } else {
            CaptureError::CommandFailed {
                command: name.to_string(),
                detail: e.to_string(),
            }
        }
    })?;

    if !output.status.success() {
        return Err(CaptureError::CommandFailed {
            command: name.to_string(),
            detail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(())
}
