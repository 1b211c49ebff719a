//! 离线工具依赖的通用组件.

use log::LevelFilter;
use simple_logger::SimpleLogger;

pub mod loader;

const SEP: &str = "--------------------------------------------------------";

/// 简单分隔线.
#[inline]
pub fn sep_to<W: std::io::Write>(mut w: W) -> std::io::Result<()> {
    writeln!(&mut w, "{SEP}")
}

/// 初始化日志. 默认级别为 `Info`, 可由 `$RUST_LOG` 覆盖.
///
/// 重复调用时忽略后续调用.
pub fn init_logger() {
    let _ = SimpleLogger::new()
        .with_level(LevelFilter::Info)
        .env()
        .init();
}

/// 解析形如 `z,h,w` 的体素分辨率 (毫米). 各分量必须为有限正数.
pub fn parse_spacing(s: &str) -> Option<[f64; 3]> {
    let parts: Vec<f64> = s
        .split(',')
        .map(|p| p.trim().parse::<f64>())
        .collect::<Result<_, _>>()
        .ok()?;
    let spacing: [f64; 3] = parts.try_into().ok()?;
    spacing
        .iter()
        .all(|v| v.is_finite() && *v > 0.0)
        .then_some(spacing)
}
