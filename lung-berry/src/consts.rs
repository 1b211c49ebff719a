//! 通用常量.

/// 单通道标签值.
pub mod gray {
    /// 背景的像素值. 所有模型共用.
    pub const BACKGROUND: u8 = 0;

    /// R231 类模型中, 右肺的像素值.
    pub const RIGHT_LUNG: u8 = 1;

    /// R231 类模型中, 左肺的像素值.
    pub const LEFT_LUNG: u8 = 2;

    /// 像素是否是背景?
    #[inline]
    pub const fn is_background(p: u8) -> bool {
        matches!(p, BACKGROUND)
    }

    /// 像素是否是前景 (任意非背景标签)?
    #[inline]
    pub const fn is_foreground(p: u8) -> bool {
        !is_background(p)
    }
}

/// 默认的网络输入分辨率 (高, 宽).
pub const DEFAULT_TARGET_RESOLUTION: (usize, usize) = (256, 256);

/// 默认批大小.
pub const DEFAULT_BATCH_SIZE: usize = 20;

/// 默认最小连通分量体积, 立方毫米.
pub const DEFAULT_MIN_COMPONENT_VOLUME_MM3: f64 = 25_000.0;

/// 人体掩膜的 CT HU 阈值.
pub const BODY_THRESHOLD_HU: f32 = -500.0;

/// 裁剪框向外扩张的默认像素数.
pub const DEFAULT_CROP_MARGIN: usize = 10;

/// 人体掩膜检测时使用的低分辨率边长.
pub const BODY_MASK_RESOLUTION: usize = 128;

/// 体素/像素类型.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ElemType {
    /// `BACKGROUND`, 代表背景.
    Background,

    /// 任意非零标签, 代表前景.
    Foreground,
}

impl ElemType {
    /// 由标签值判断类型.
    #[inline]
    pub const fn of(label: u8) -> Self {
        if gray::is_background(label) {
            Self::Background
        } else {
            Self::Foreground
        }
    }

    /// 是否为前景.
    #[inline]
    pub fn is_foreground(&self) -> bool {
        matches!(self, Self::Foreground)
    }

    /// 是否为背景.
    #[inline]
    pub fn is_background(&self) -> bool {
        !self.is_foreground()
    }
}
