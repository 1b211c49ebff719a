//! 流水线配置.
//!
//! 所有参数在构造各组件时显式传入, 不存在全局状态.

use crate::consts::*;
use crate::error::{Error, Result};
use crate::{CtWindow, Idx2d};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 三维连通性.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Connectivity {
    /// 6-邻域 (仅面相邻).
    #[default]
    Six,

    /// 26-邻域 (面、棱、角相邻).
    TwentySix,
}

impl Connectivity {
    /// 由邻居个数构造. 只接受 6 或 26.
    pub fn from_neighbours(n: u32) -> Result<Self> {
        match n {
            6 => Ok(Self::Six),
            26 => Ok(Self::TwentySix),
            _ => Err(Error::Configuration(format!(
                "连通性只能为 6 或 26, 实际为 {n}"
            ))),
        }
    }

    /// 邻居个数.
    #[inline]
    pub const fn neighbours(&self) -> u32 {
        match self {
            Self::Six => 6,
            Self::TwentySix => 26,
        }
    }
}

/// 体数据后处理参数.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PostprocConfig {
    /// 是否启用体数据后处理. 关闭时后处理为直通.
    pub enabled: bool,

    /// 最小连通分量实际体积, 单位为立方毫米. 小于等于 0 时不做体积过滤.
    pub min_component_volume_mm3: f64,

    /// 连通性.
    pub connectivity: Connectivity,

    /// 可被填充的空洞的最大体素数.
    pub max_hole_voxels: usize,

    /// 总被并入邻居, 且最终置为背景的标签.
    pub spare_labels: Vec<u8>,
}

impl Default for PostprocConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_component_volume_mm3: DEFAULT_MIN_COMPONENT_VOLUME_MM3,
            connectivity: Connectivity::Six,
            max_hole_voxels: usize::MAX,
            spare_labels: vec![],
        }
    }
}

impl PostprocConfig {
    /// 是否按体积过滤小分量.
    #[inline]
    pub fn filters_volume(&self) -> bool {
        self.min_component_volume_mm3 > 0.0
    }

    /// 给定体素实际体积 `voxel_mm3`, 换算最小分量体积阈值 (以体素个数计).
    #[inline]
    pub fn min_voxels(&self, voxel_mm3: f64) -> f64 {
        self.min_component_volume_mm3 / voxel_mm3
    }

    /// 标签是否为 spare 标签.
    #[inline]
    pub fn is_spare(&self, label: u8) -> bool {
        self.spare_labels.contains(&label)
    }

    /// 检查参数合法性.
    pub fn validate(&self) -> Result<()> {
        if self.min_component_volume_mm3.is_nan() {
            return Err(Error::Configuration("最小分量体积不能为 NaN".into()));
        }
        if self.spare_labels.contains(&gray::BACKGROUND) {
            return Err(Error::Configuration("背景不能作为 spare 标签".into()));
        }
        Ok(())
    }
}

/// 整条分割流水线的配置.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Config {
    /// 网络输入分辨率 (高, 宽).
    pub target_resolution: Idx2d,

    /// 批大小.
    pub batch_size: usize,

    /// 输入规范化窗口.
    pub window: CtWindow,

    /// 人体掩膜的 HU 阈值.
    pub body_threshold_hu: f32,

    /// 裁剪框向外扩张的像素数.
    pub crop_margin: usize,

    /// 是否在输出中保留分类器的原始分数.
    pub keep_scores: bool,

    /// 是否使用多线程. 需要打开 `rayon` feature 才会生效.
    pub parallel: bool,

    /// 体数据后处理参数.
    pub postproc: PostprocConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            target_resolution: DEFAULT_TARGET_RESOLUTION,
            batch_size: DEFAULT_BATCH_SIZE,
            window: CtWindow::lung_input(),
            body_threshold_hu: BODY_THRESHOLD_HU,
            crop_margin: DEFAULT_CROP_MARGIN,
            keep_scores: true,
            parallel: true,
            postproc: PostprocConfig::default(),
        }
    }
}

impl Config {
    /// 检查参数合法性.
    pub fn validate(&self) -> Result<()> {
        let (h, w) = self.target_resolution;
        if h == 0 || w == 0 {
            return Err(Error::Configuration(format!(
                "目标分辨率非法: {:?}",
                self.target_resolution
            )));
        }
        if self.batch_size == 0 {
            return Err(Error::Configuration("批大小必须为正".into()));
        }
        if !self.body_threshold_hu.is_finite() {
            return Err(Error::Configuration("人体掩膜阈值必须为有限值".into()));
        }
        // `CtWindow` 只能通过检查过的构造函数生成, 但反序列化可绕过检查.
        if CtWindow::new(self.window.level(), self.window.width()).is_none() {
            return Err(Error::Configuration(format!(
                "CT 窗口非法: {:?}",
                self.window
            )));
        }
        self.postproc.validate()
    }
}
