use crate::error::{Error, Result};
use crate::Idx2d;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 二维切片上的非空轴对齐裁剪框, 左闭右开: `[h0, h1) × [w0, w1)`.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BBox {
    h0: usize,
    w0: usize,
    h1: usize,
    w1: usize,
}

impl BBox {
    /// 由左上角 (含) 和右下角 (不含) 构建. 若框为空则返回 `None`.
    #[inline]
    pub fn new((h0, w0): Idx2d, (h1, w1): Idx2d) -> Option<Self> {
        (h0 < h1 && w0 < w1).then_some(Self { h0, w0, h1, w1 })
    }

    /// 覆盖整个 `shape` 的裁剪框. 若 `shape` 含零则返回 `Err`.
    #[inline]
    pub fn full(shape: Idx2d) -> Result<Self> {
        Self::new((0, 0), shape).ok_or(Error::InvalidSlice { z: 0, shape })
    }

    /// 由闭区间外接矩形构建, 四周各扩张 `margin` 像素, 并截断到 `shape` 内.
    pub fn from_inclusive(
        (h_min, w_min): Idx2d,
        (h_max, w_max): Idx2d,
        margin: usize,
        (h, w): Idx2d,
    ) -> Option<Self> {
        Self::new(
            (h_min.saturating_sub(margin), w_min.saturating_sub(margin)),
            (
                h_max.saturating_add(margin + 1).min(h),
                w_max.saturating_add(margin + 1).min(w),
            ),
        )
    }

    /// 左上角 (含).
    #[inline]
    pub fn origin(&self) -> Idx2d {
        (self.h0, self.w0)
    }

    /// 右下角 (不含).
    #[inline]
    pub fn end(&self) -> Idx2d {
        (self.h1, self.w1)
    }

    /// 框的尺寸 (高, 宽). 两个分量都为正.
    #[inline]
    pub fn shape(&self) -> Idx2d {
        (self.h1 - self.h0, self.w1 - self.w0)
    }

    /// 判断框是否完全位于尺寸为 `shape` 的切片内.
    #[inline]
    pub fn fits(&self, (h, w): Idx2d) -> bool {
        self.h1 <= h && self.w1 <= w
    }

    /// 判断 `(h, w)` 是否位于框内.
    #[inline]
    pub fn contains(&self, (h, w): Idx2d) -> bool {
        (self.h0..self.h1).contains(&h) && (self.w0..self.w1).contains(&w)
    }
}
