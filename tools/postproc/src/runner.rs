//! 程序运行函数.

use crate::result::PostprocResult;
use log::{info, warn};
use lung_berry::post_proc::Postprocessor;
use lung_berry::consts::gray::{LEFT_LUNG, RIGHT_LUNG};
use lung_berry::{io, LabelVolume, PostprocConfig, Result, VoxelGrid};
use std::time::Instant;
use utils::loader;

/// 实际运行.
pub fn run() -> Result<PostprocResult> {
    let pred_path = loader::pred_path_from_env_or_home()?;
    let out_path = loader::out_path_from_env_or_home()?;
    let spacing = loader::spacing_from_env()?;
    let config = PostprocConfig {
        connectivity: loader::connectivity_from_env()?,
        ..Default::default()
    };

    info!("读取 {}", pred_path.display());
    let mut volume = LabelVolume::from_raw(io::read_labels(&pred_path)?, spacing)?;
    if volume.is_background() {
        warn!("{} 中没有任何前景体素", pred_path.display());
    }
    let before = volume.foreground_volume();

    let processor = Postprocessor::new(config)?;
    let start = Instant::now();
    let report = processor.run_volume(&mut volume)?;
    let elapsed = start.elapsed();

    io::write_labels(&out_path, volume.data())?;
    info!("写入 {}", out_path.display());

    Ok(PostprocResult {
        shape: volume.shape(),
        foreground_before_mm3: before,
        foreground_after_mm3: volume.foreground_volume(),
        lung_voxels: [volume.count(RIGHT_LUNG), volume.count(LEFT_LUNG)],
        report,
        elapsed,
    })
}
