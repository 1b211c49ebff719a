//! 三维标签体数据后处理.
//!
//! 算法流程依次为:
//!
//! 1. 按配置的连通性标记同标签连通分量;
//! 2. 逐分量填充空洞;
//! 3. 按体素个数从小到大, 将小分量 (以及 spare 标签分量) 并入接触最多的邻居;
//! 4. 反复重新标记并填充空洞, 直到没有新的空洞;
//! 5. 残留的 spare 标签置为背景.
//!
//! 第 4 步保证对已处理的体数据再次处理不会产生任何变化.

mod components;
mod holes;
mod relabel;

pub use components::{label_components, Component, ComponentId, ComponentMap};
pub use holes::fill_holes;
pub use relabel::{absorb_small_components, Absorption};

use crate::consts::gray::*;
use crate::error::{Error, Result};
use crate::{LabelVolume, PostprocConfig, VoxelGrid};
use log::{debug, info};
use ndarray::Array3;

/// 一次后处理的统计信息.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct PostprocReport {
    /// 初次标记得到的连通分量个数.
    pub components: usize,

    /// 被并入邻居的分量个数.
    pub absorbed: usize,

    /// 被置为背景的分量个数.
    pub dropped: usize,

    /// 被填充的空洞体素个数.
    pub holes_filled: usize,
}

/// 体数据后处理器.
#[derive(Clone, Debug)]
pub struct Postprocessor {
    config: PostprocConfig,
}

impl Postprocessor {
    /// 若配置非法则返回 `Configuration` 错误.
    pub fn new(config: PostprocConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// 当前配置.
    #[inline]
    pub fn config(&self) -> &PostprocConfig {
        &self.config
    }

    /// 就地处理 (z, H, W) 的标签体数据. `voxel_mm3` 为单个体素的实际体积.
    ///
    /// 关闭后处理时直接返回. 全背景或零尺寸体数据原样返回, 不视为错误.
    pub fn run(&self, labels: &mut Array3<u8>, voxel_mm3: f64) -> Result<PostprocReport> {
        if !(voxel_mm3.is_finite() && voxel_mm3 > 0.0) {
            return Err(Error::Configuration(format!("体素体积非法: {voxel_mm3}")));
        }
        let mut report = PostprocReport::default();
        if !self.config.enabled {
            debug!("后处理已关闭");
            return Ok(report);
        }
        if labels.iter().copied().all(is_background) {
            debug!("全背景体数据, 跳过后处理");
            return Ok(report);
        }

        let conn = self.config.connectivity;
        let max_hole = self.config.max_hole_voxels;

        let map = label_components(labels.view(), conn);
        report.components = map.len();
        report.holes_filled += fill_holes(labels, &map, max_hole);

        if self.config.filters_volume() || !self.config.spare_labels.is_empty() {
            let map = label_components(labels.view(), conn);
            let stat = absorb_small_components(labels, map, &self.config, voxel_mm3);
            report.absorbed = stat.absorbed;
            report.dropped = stat.dropped;
        }

        loop {
            let map = label_components(labels.view(), conn);
            let filled = fill_holes(labels, &map, max_hole);
            report.holes_filled += filled;
            if filled == 0 {
                break;
            }
        }

        for &spare in self.config.spare_labels.iter() {
            labels.mapv_inplace(|p| if p == spare { BACKGROUND } else { p });
        }

        info!(
            "后处理完成: 分量 {}, 并入 {}, 置背景 {}, 填充空洞体素 {}",
            report.components, report.absorbed, report.dropped, report.holes_filled
        );
        Ok(report)
    }

    /// 就地处理 `volume`, 体素体积取自其体素分辨率.
    pub fn run_volume(&self, volume: &mut LabelVolume) -> Result<PostprocReport> {
        let voxel = volume.voxel();
        self.run(volume.raw_mut(), voxel)
    }
}
