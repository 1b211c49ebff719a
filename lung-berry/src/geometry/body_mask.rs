//! 人体掩膜检测. 用于确定切片中需要保留的区域.

use super::resize::resize_nearest;
use crate::consts::gray::*;
use crate::consts::BODY_MASK_RESOLUTION;
use crate::{LabelSlice, OwnedLabelSlice, ScanSlice};

const MASK_ON: u8 = 1;

/// 以 4-邻域 (十字形) 为结构元做一次二值腐蚀. 图像外部视为背景.
fn erode(mask: LabelSlice) -> OwnedLabelSlice {
    let mut out = mask.to_owned();
    let mut view = out.as_mutable();
    for (pos, &p) in mask.indexed_iter() {
        if is_foreground(p) && !mask.is_n4_all(pos, is_foreground) {
            view[pos] = BACKGROUND;
        }
    }
    out
}

/// 以 4-邻域 (十字形) 为结构元做一次二值膨胀.
fn dilate(mask: LabelSlice) -> OwnedLabelSlice {
    let mut out = mask.to_owned();
    let mut view = out.as_mutable();
    for (pos, &p) in mask.indexed_iter() {
        if is_background(p) && mask.is_n4_having(pos, is_foreground) {
            view[pos] = MASK_ON;
        }
    }
    out
}

/// 连续做 `n` 次同一形态学操作.
fn repeat(
    mask: OwnedLabelSlice,
    n: usize,
    op: fn(LabelSlice) -> OwnedLabelSlice,
) -> OwnedLabelSlice {
    (0..n).fold(mask, |m, _| op(m.as_immut()))
}

/// 计算 CT 水平切片的人体掩膜. 掩膜中 1 为人体, 0 为背景.
///
/// 算法流程依次为:
///
/// 1. 最近邻降采样到 128 × 128;
/// 2. 以 `threshold` (HU) 二值化, 大于阈值者为前景;
/// 3. 闭运算;
/// 4. 填充与图像边缘不连通的背景空洞;
/// 5. 腐蚀两次;
/// 6. 只保留 8-相邻意义下的最大前景区域;
/// 7. 膨胀两次;
/// 8. 最近邻上采样回原尺寸.
///
/// 任一维度为零的切片得到同形状的空掩膜.
pub fn body_mask(scan: ScanSlice, threshold: f32) -> OwnedLabelSlice {
    let shape = scan.shape();
    if shape.0 == 0 || shape.1 == 0 {
        return OwnedLabelSlice::background(shape);
    }
    let small = resize_nearest(scan.data(), (BODY_MASK_RESOLUTION, BODY_MASK_RESOLUTION));
    let mask = OwnedLabelSlice::from_raw(small.mapv(|hu| u8::from(hu > threshold)));

    let mut mask = erode(dilate(mask.as_immut()).as_immut());
    mask.as_mutable().fill_enclosed_background(MASK_ON);

    let mut mask = repeat(mask, 2, erode);
    let regions = mask.as_immut().foreground_areas();
    mask.as_mutable().non_max_filling(regions, BACKGROUND);
    let mask = repeat(mask, 2, dilate);

    OwnedLabelSlice::from_raw(resize_nearest(mask.as_immut().array_view(), shape))
}
