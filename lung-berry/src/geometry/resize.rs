//! 二维重采样核.
//!
//! 两种核都采用角点对齐的坐标映射: 输出坐标 `d` 对应输入坐标
//! `d * (in - 1) / (out - 1)`. 当 `out == 1` 时映射到 0.
//! 因此输出的四个角点总是精确取自输入的四个角点.

use crate::Idx2d;
use ndarray::{Array2, ArrayView2};

/// 计算一维方向上从输出坐标到输入坐标的缩放系数.
#[inline]
fn scale(input: usize, output: usize) -> f64 {
    if output <= 1 {
        0.0
    } else {
        (input - 1) as f64 / (output - 1) as f64
    }
}

/// 双线性插值. 用于 CT 强度.
///
/// `src` 的两个维度和 `shape` 的两个分量都必须为正, 否则程序 panic.
pub(crate) fn resize_bilinear(src: ArrayView2<f32>, shape: Idx2d) -> Array2<f32> {
    let (in_h, in_w) = src.dim();
    assert!(in_h > 0 && in_w > 0 && shape.0 > 0 && shape.1 > 0);

    let (sh, sw) = (scale(in_h, shape.0), scale(in_w, shape.1));
    Array2::from_shape_fn(shape, |(y, x)| {
        let fy = y as f64 * sh;
        let fx = x as f64 * sw;
        let (y0, x0) = (fy.floor() as usize, fx.floor() as usize);
        let (y1, x1) = ((y0 + 1).min(in_h - 1), (x0 + 1).min(in_w - 1));
        let (dy, dx) = (fy - y0 as f64, fx - x0 as f64);

        let top = src[(y0, x0)] as f64 * (1.0 - dx) + src[(y0, x1)] as f64 * dx;
        let bottom = src[(y1, x0)] as f64 * (1.0 - dx) + src[(y1, x1)] as f64 * dx;
        (top * (1.0 - dy) + bottom * dy) as f32
    })
}

/// 最近邻插值. 用于标签, 保证不会产生原图中不存在的标签值.
///
/// `src` 的两个维度和 `shape` 的两个分量都必须为正, 否则程序 panic.
pub(crate) fn resize_nearest<T: Copy>(src: ArrayView2<T>, shape: Idx2d) -> Array2<T> {
    let (in_h, in_w) = src.dim();
    assert!(in_h > 0 && in_w > 0 && shape.0 > 0 && shape.1 > 0);

    let (sh, sw) = (scale(in_h, shape.0), scale(in_w, shape.1));
    let near = |d: usize, s: f64, len: usize| ((d as f64 * s).round() as usize).min(len - 1);
    Array2::from_shape_fn(shape, |(y, x)| {
        src[(near(y, sh, in_h), near(x, sw, in_w))]
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use std::collections::HashSet;

    #[test]
    fn test_identity_resize() {
        let a = array![[1.0f32, 2.0, 3.0], [4.0, 5.0, 6.0]];
        assert_eq!(resize_bilinear(a.view(), (2, 3)), a);
        let l = array![[0u8, 1, 2], [2, 1, 0]];
        assert_eq!(resize_nearest(l.view(), (2, 3)), l);
    }

    #[test]
    fn test_bilinear_midpoint() {
        let a = array![[0.0f32, 10.0], [20.0, 30.0]];
        let r = resize_bilinear(a.view(), (3, 3));
        assert_eq!(r[(0, 0)], 0.0);
        assert_eq!(r[(2, 2)], 30.0);
        assert!((r[(1, 1)] - 15.0).abs() < 1e-5);
        assert!((r[(0, 1)] - 5.0).abs() < 1e-5);
    }

    #[test]
    fn test_nearest_never_invents_labels() {
        let l = array![[0u8, 3, 3, 0], [1, 1, 2, 2], [0, 0, 2, 0]];
        let src: HashSet<u8> = l.iter().copied().collect();
        for shape in [(1, 1), (7, 5), (256, 256), (2, 9)] {
            let r = resize_nearest(l.view(), shape);
            assert_eq!(r.dim(), shape);
            assert!(r.iter().all(|v| src.contains(v)));
        }
    }

    #[test]
    fn test_single_pixel_output() {
        let a = array![[7.0f32, 1.0], [1.0, 1.0]];
        assert_eq!(resize_bilinear(a.view(), (1, 1))[(0, 0)], 7.0);
    }
}
