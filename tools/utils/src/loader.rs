//! 从环境变量读取离线工具的输入输出路径与参数.

use crate::parse_spacing;
use lung_berry::dataset::lung_dataset_dir_with;
use lung_berry::{Connectivity, Error, Result};
use std::env;
use std::path::PathBuf;

/// 读取环境变量 `key` 指定的路径. 若其为空, 则返回
/// `$HOME/dataset/lung` 下由 `fallback` 组成的路径.
fn path_from_env_or_home(key: &str, fallback: &[&str]) -> Result<PathBuf> {
    match env::var(key) {
        Ok(d) if !d.is_empty() => Ok(PathBuf::from(d)),
        _ => lung_dataset_dir_with(fallback)
            .ok_or_else(|| Error::Configuration(format!("未设置 ${key}, 且无法定位用户主目录"))),
    }
}

/// 获取待后处理的预测标签 `.npy` 路径.
///
/// 1. 若环境变量 `$LUNG_PRED_PATH` 非空, 则返回其值;
/// 2. 否则, 返回 `$HOME/dataset/lung/pred.npy`.
pub fn pred_path_from_env_or_home() -> Result<PathBuf> {
    path_from_env_or_home("LUNG_PRED_PATH", &["pred.npy"])
}

/// 获取后处理结果 `.npy` 的输出路径.
///
/// 1. 若环境变量 `$LUNG_OUT_PATH` 非空, 则返回其值;
/// 2. 否则, 返回 `$HOME/dataset/lung/pred_post.npy`.
pub fn out_path_from_env_or_home() -> Result<PathBuf> {
    path_from_env_or_home("LUNG_OUT_PATH", &["pred_post.npy"])
}

/// 获取体素分辨率 `$LUNG_SPACING` (形如 `z,h,w`, 毫米). 未设置时为各向 1 毫米.
pub fn spacing_from_env() -> Result<[f64; 3]> {
    match env::var("LUNG_SPACING") {
        Ok(s) => parse_spacing(&s)
            .ok_or_else(|| Error::Configuration(format!("$LUNG_SPACING 非法: {s}"))),
        Err(_) => Ok([1.0; 3]),
    }
}

/// 获取连通性 `$LUNG_CONNECTIVITY` (6 或 26). 未设置时为 6.
pub fn connectivity_from_env() -> Result<Connectivity> {
    match env::var("LUNG_CONNECTIVITY") {
        Ok(s) => {
            let n = s
                .trim()
                .parse::<u32>()
                .map_err(|_| Error::Configuration(format!("$LUNG_CONNECTIVITY 非法: {s}")))?;
            Connectivity::from_neighbours(n)
        }
        Err(_) => Ok(Connectivity::default()),
    }
}
