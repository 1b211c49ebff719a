//! 二维/三维邻域.

use crate::config::Connectivity;
use crate::{Idx2d, Idx3d};
use itertools::iproduct;
use once_cell::sync::Lazy;

/// 获得 `(h, w)` 的 4-邻居索引. 不检查越界.
#[inline]
pub(crate) fn neighbour4((h, w): Idx2d) -> [Idx2d; 4] {
    [
        (h.wrapping_sub(1), w),
        (h.saturating_add(1), w),
        (h, w.wrapping_sub(1)),
        (h, w.saturating_add(1)),
    ]
}

/// 获得 `(h, w)` 的 8-邻居索引. 不检查越界.
#[inline]
pub(crate) fn neighbour8((h, w): Idx2d) -> [Idx2d; 8] {
    [
        (h.wrapping_sub(1), w.wrapping_sub(1)),
        (h.wrapping_sub(1), w),
        (h.wrapping_sub(1), w.saturating_add(1)),
        (h, w.wrapping_sub(1)),
        (h, w.saturating_add(1)),
        (h.saturating_add(1), w.wrapping_sub(1)),
        (h.saturating_add(1), w),
        (h.saturating_add(1), w.saturating_add(1)),
    ]
}

/// 三维偏移量 (dz, dh, dw).
pub(crate) type Offset3d = (isize, isize, isize);

/// 6-邻域 (面相邻) 偏移量.
static OFFSETS_6: [Offset3d; 6] = [
    (-1, 0, 0),
    (1, 0, 0),
    (0, -1, 0),
    (0, 1, 0),
    (0, 0, -1),
    (0, 0, 1),
];

/// 26-邻域 (面/棱/角相邻) 偏移量. 按 (dz, dh, dw) 字典序排列.
static OFFSETS_26: Lazy<Vec<Offset3d>> = Lazy::new(|| {
    iproduct!(-1..=1, -1..=1, -1..=1)
        .filter(|&d| d != (0, 0, 0))
        .collect()
});

/// 获取给定连通性下的全部三维偏移量.
#[inline]
pub(crate) fn offsets_3d(connectivity: Connectivity) -> &'static [Offset3d] {
    match connectivity {
        Connectivity::Six => &OFFSETS_6,
        Connectivity::TwentySix => OFFSETS_26.as_slice(),
    }
}

/// 三维网格上的邻居枚举器. 保证返回的索引都不越界.
#[derive(Copy, Clone, Debug)]
pub(crate) struct Grid3d {
    shape: Idx3d,
    offsets: &'static [Offset3d],
}

impl Grid3d {
    #[inline]
    pub fn new(shape: Idx3d, connectivity: Connectivity) -> Self {
        Self {
            shape,
            offsets: offsets_3d(connectivity),
        }
    }

    /// 获取 `pos` 在数据范围内的所有邻居.
    #[inline]
    pub fn neighbours(&self, (z, h, w): Idx3d) -> impl Iterator<Item = Idx3d> + '_ {
        let (lz, lh, lw) = self.shape;
        self.offsets.iter().filter_map(move |&(dz, dh, dw)| {
            let nz = z.checked_add_signed(dz)?;
            let nh = h.checked_add_signed(dh)?;
            let nw = w.checked_add_signed(dw)?;
            (nz < lz && nh < lh && nw < lw).then_some((nz, nh, nw))
        })
    }
}
