//! 运行时错误.

use crate::{Idx2d, Idx3d};
use thiserror::Error;

/// 外部分类器返回的不透明错误.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// 单个 3D 体数据处理过程中的致命错误.
///
/// 所有错误都会中止当前体数据的处理, 不存在部分输出.
/// 调用者可以自行决定是否重试整个流程.
#[derive(Debug, Error)]
pub enum Error {
    /// 切片尺寸为零或退化.
    #[error("第 {z} 层切片尺寸非法: {shape:?}")]
    InvalidSlice {
        /// 切片所在的 z 索引.
        z: usize,

        /// 切片形状 (高, 宽).
        shape: Idx2d,
    },

    /// 逆变换无法复原原始尺寸, 或上下游数据形状不一致.
    #[error("形状不匹配: 期望 {expected:?}, 实际 {found:?}")]
    ShapeMismatch {
        /// 期望形状 (z, 高, 宽). 二维情形下 z 分量为切片索引.
        expected: Idx3d,

        /// 实际形状.
        found: Idx3d,
    },

    /// 外部分类器调用失败. 本库不会自动重试.
    #[error("分类器在第 {batch} 批次调用失败: {source}")]
    ClassifierInvocation {
        /// 失败批次的索引.
        batch: usize,

        /// 分类器给出的底层错误.
        #[source]
        source: BoxError,
    },

    /// 配置值非法.
    #[error("配置错误: {0}")]
    Configuration(String),

    /// 读取 nii 文件失败.
    #[error("nifti 读取错误: {0}")]
    Nifti(#[from] nifti::error::NiftiError),

    /// 读写 npy 文件失败.
    #[error("npy 读写错误: {0}")]
    Npy(String),
}

/// 本 crate 的通用返回类型.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// 便捷构造: 二维切片形状不匹配. `z` 为切片索引.
    #[inline]
    pub(crate) fn slice_mismatch(z: usize, (eh, ew): Idx2d, (fh, fw): Idx2d) -> Self {
        Self::ShapeMismatch {
            expected: (z, eh, ew),
            found: (z, fh, fw),
        }
    }
}
