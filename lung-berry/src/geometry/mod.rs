//! 逐切片几何变换.
//!
//! 正变换把原始水平切片裁剪到人体所在区域, 并缩放到网络输入分辨率;
//! 逆变换把网络输出的标签切片放回原始切片网格. 二者由 [`SliceTransform`] 连接.

mod bbox;
mod body_mask;
mod resize;

pub use bbox::BBox;
pub use body_mask::body_mask;

use crate::consts::gray::*;
use crate::error::{Error, Result};
use crate::parallel::try_map_indexed;
use crate::{Config, CtScan, Idx2d, ScanSlice, VoxelGrid};
use log::{debug, warn};
use ndarray::{s, Array2, Array3, ArrayView2, ArrayView3, Axis};
use resize::{resize_bilinear, resize_nearest};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 单张切片的裁剪/缩放记录.
///
/// 保存了正变换所用的裁剪框、原始切片尺寸和目标分辨率, 足以精确复原原始切片尺寸.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SliceTransform {
    z: usize,
    bbox: BBox,
    source_shape: Idx2d,
    target: Idx2d,
}

impl SliceTransform {
    /// 直接构建变换记录.
    ///
    /// 若任一尺寸为零则返回 `InvalidSlice`; 若 `bbox` 超出 `source_shape`
    /// 则返回 `ShapeMismatch`.
    pub fn new(z: usize, bbox: BBox, source_shape: Idx2d, target: Idx2d) -> Result<Self> {
        check_shape(z, source_shape)?;
        check_shape(z, target)?;
        if !bbox.fits(source_shape) {
            return Err(Error::slice_mismatch(z, source_shape, bbox.end()));
        }
        Ok(Self {
            z,
            bbox,
            source_shape,
            target,
        })
    }

    /// 检测第 `z` 层切片 `slice` 中的人体区域, 得到正变换.
    ///
    /// 若未检测到人体, 则退化为整张切片.
    pub fn locate(slice: ScanSlice, z: usize, config: &Config) -> Result<Self> {
        let shape = slice.shape();
        check_shape(z, shape)?;

        let mask = body_mask(slice, config.body_threshold_hu);
        let bbox = match mask.as_immut().bounding_box(is_foreground) {
            Some((min, max)) => BBox::from_inclusive(min, max, config.crop_margin, shape),
            None => None,
        };
        let bbox = match bbox {
            Some(b) => b,
            None => {
                warn!("第 {z} 层切片未检测到人体, 使用整张切片");
                BBox::full(shape).map_err(|_| Error::InvalidSlice { z, shape })?
            }
        };
        Self::new(z, bbox, shape, config.target_resolution)
    }

    /// 正变换: 计算变换记录, 并得到规范化到 `[0, 1]` 的网络输入切片.
    ///
    /// 裁剪后的 HU 值先按 `config.window` 截断, 再做双线性缩放.
    pub fn forward(slice: ScanSlice, z: usize, config: &Config) -> Result<(Array2<f32>, Self)> {
        let t = Self::locate(slice, z, config)?;
        Ok((t.apply(slice, config)?, t))
    }

    /// 对 `slice` 实施本变换记录的裁剪与缩放, 并规范化强度.
    ///
    /// `slice` 的形状必须与 `source_shape` 相同, 否则返回 `ShapeMismatch`.
    pub fn apply(&self, slice: ScanSlice, config: &Config) -> Result<Array2<f32>> {
        if slice.shape() != self.source_shape {
            return Err(Error::slice_mismatch(self.z, self.source_shape, slice.shape()));
        }
        if !self.bbox.fits(self.source_shape) {
            return Err(Error::slice_mismatch(self.z, self.source_shape, self.bbox.end()));
        }
        check_shape(self.z, self.target)?;

        let window = config.window;
        let (h0, w0) = self.bbox.origin();
        let (h1, w1) = self.bbox.end();
        let cropped = slice
            .data()
            .slice(s![h0..h1, w0..w1])
            .mapv(|hu| window.clip(hu));
        Ok(resize_bilinear(cropped.view(), self.target).mapv_into(|hu| window.normalize(hu)))
    }

    /// 该变换作用的切片 z 索引.
    #[inline]
    pub fn z(&self) -> usize {
        self.z
    }

    /// 裁剪框.
    #[inline]
    pub fn bbox(&self) -> BBox {
        self.bbox
    }

    /// 原始切片尺寸 (高, 宽).
    #[inline]
    pub fn source_shape(&self) -> Idx2d {
        self.source_shape
    }

    /// 网络输入分辨率 (高, 宽).
    #[inline]
    pub fn target(&self) -> Idx2d {
        self.target
    }
}

#[inline]
fn check_shape(z: usize, shape: Idx2d) -> Result<()> {
    if shape.0 == 0 || shape.1 == 0 {
        Err(Error::InvalidSlice { z, shape })
    } else {
        Ok(())
    }
}

/// 逆变换单张标签切片: 最近邻缩放回裁剪框尺寸, 放回原始切片网格,
/// 框外全部置为背景.
///
/// `slice` 的形状必须与 `transform.target()` 一致, 否则返回 `ShapeMismatch`.
pub fn reshape_mask(slice: ArrayView2<u8>, transform: &SliceTransform) -> Result<Array2<u8>> {
    let z = transform.z;
    if slice.dim() != transform.target {
        return Err(Error::slice_mismatch(z, transform.target, slice.dim()));
    }
    let bbox = transform.bbox;
    if !bbox.fits(transform.source_shape) {
        return Err(Error::slice_mismatch(z, transform.source_shape, bbox.end()));
    }

    let (h0, w0) = bbox.origin();
    let (h1, w1) = bbox.end();
    let mut out = Array2::from_elem(transform.source_shape, BACKGROUND);
    out.slice_mut(s![h0..h1, w0..w1])
        .assign(&resize_nearest(slice, bbox.shape()));
    Ok(out)
}

/// 将整个标签体数据逆变换回原始体素网格.
#[derive(Copy, Clone, Debug)]
pub struct InverseReshaper {
    source_shape: Idx2d,
    parallel: bool,
}

impl InverseReshaper {
    /// 原始切片尺寸为 `source_shape`. `parallel` 仅在启用 `rayon` feature 时生效.
    #[inline]
    pub fn new(source_shape: Idx2d, parallel: bool) -> Self {
        Self {
            source_shape,
            parallel,
        }
    }

    /// 对每层切片应用对应的逆变换, 得到 (z, h, w) 的最终标签体数据.
    ///
    /// 切片个数与 `transforms` 个数不一致, 或任一变换的原始尺寸与
    /// `source_shape` 不一致时, 返回 `ShapeMismatch`.
    pub fn reshape_volume(
        &self,
        labels: ArrayView3<u8>,
        transforms: &[SliceTransform],
    ) -> Result<Array3<u8>> {
        let (n, th, tw) = labels.dim();
        if n != transforms.len() {
            let (eh, ew) = transforms.first().map_or((th, tw), |t| t.target);
            return Err(Error::ShapeMismatch {
                expected: (transforms.len(), eh, ew),
                found: (n, th, tw),
            });
        }
        if let Some(t) = transforms.iter().find(|t| t.source_shape != self.source_shape) {
            return Err(Error::slice_mismatch(t.z, self.source_shape, t.source_shape));
        }

        let slices = try_map_indexed(n, self.parallel, |z| {
            reshape_mask(labels.index_axis(Axis(0), z), &transforms[z])
        })?;

        let (h, w) = self.source_shape;
        let mut out = Array3::from_elem((n, h, w), BACKGROUND);
        for (mut dst, src) in out.axis_iter_mut(Axis(0)).zip(slices.iter()) {
            dst.assign(src);
        }
        debug!("逆变换完成, 输出形状 {:?}", out.dim());
        Ok(out)
    }
}

/// 对整个 CT 扫描逐层实施正变换.
///
/// 返回 (z, H, W) 的网络输入, 以及每层对应的变换记录.
pub fn preprocess_volume(scan: &CtScan, config: &Config) -> Result<(Array3<f32>, Vec<SliceTransform>)> {
    let n = scan.len_z();
    let pairs = try_map_indexed(n, config.parallel, |z| {
        SliceTransform::forward(scan.slice_at(z), z, config)
    })?;

    let (th, tw) = config.target_resolution;
    let mut input = Array3::<f32>::zeros((n, th, tw));
    let mut transforms = Vec::with_capacity(n);
    for (mut dst, (src, t)) in input.axis_iter_mut(Axis(0)).zip(pairs) {
        dst.assign(&src);
        transforms.push(t);
    }
    debug!("正变换完成: {n} 层切片, 目标分辨率 {:?}", config.target_resolution);
    Ok((input, transforms))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 空气背景中放置一块 `[h0, h1) × [w0, w1)` 的软组织.
    fn phantom(shape: Idx2d, (h0, h1): Idx2d, (w0, w1): Idx2d) -> Array2<f32> {
        Array2::from_shape_fn(shape, |(h, w)| {
            if (h0..h1).contains(&h) && (w0..w1).contains(&w) {
                40.0
            } else {
                -1000.0
            }
        })
    }

    #[test]
    fn test_zero_sized_slice_is_invalid() {
        let data = Array2::<f32>::zeros((0, 12));
        let err = SliceTransform::forward(ScanSlice::new(data.view()), 7, &Config::default());
        assert!(matches!(err, Err(Error::InvalidSlice { z: 7, shape: (0, 12) })));
    }

    #[test]
    fn test_empty_slice_falls_back_to_full_extent() {
        let data = Array2::from_elem((40, 30), -2000.0f32);
        let (input, t) =
            SliceTransform::forward(ScanSlice::new(data.view()), 0, &Config::default()).unwrap();
        assert_eq!(t.bbox(), BBox::full((40, 30)).unwrap());
        assert_eq!(input.dim(), (256, 256));
        assert!(input.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_forward_output_is_normalized() {
        let mut data = phantom((64, 64), (10, 50), (10, 50));
        data[(30, 30)] = 3000.0;
        data[(31, 31)] = f32::NAN;
        let cfg = Config {
            target_resolution: (32, 32),
            ..Default::default()
        };
        let (input, t) = SliceTransform::forward(ScanSlice::new(data.view()), 0, &cfg).unwrap();
        assert_eq!(input.dim(), (32, 32));
        assert!(input.iter().all(|&v| (0.0..=1.0).contains(&v)));
        // 人体外扩 10 像素后仍在切片内部.
        assert_eq!(t.bbox().origin(), (0, 0));
        assert_eq!(t.bbox().end(), (60, 60));
    }

    #[test]
    fn test_round_trip_restores_shape() {
        let cfg = Config {
            target_resolution: (48, 40),
            ..Default::default()
        };
        for shape in [(100, 80), (37, 91), (1, 1), (256, 256)] {
            let data = phantom(shape, (0, shape.0 / 2 + 1), (0, shape.1));
            let (_, t) = SliceTransform::forward(ScanSlice::new(data.view()), 3, &cfg).unwrap();
            let pred = Array2::from_elem(cfg.target_resolution, RIGHT_LUNG);
            let back = reshape_mask(pred.view(), &t).unwrap();
            assert_eq!(back.dim(), shape);
            for ((h, w), &v) in back.indexed_iter() {
                assert_eq!(v != BACKGROUND, t.bbox().contains((h, w)));
            }
        }
    }

    #[test]
    fn test_box_in_large_slice_round_trip() {
        // 512 × 512 原始切片中 100 × 80 的裁剪框, 缩放到 256 × 256.
        let bbox = BBox::new((200, 150), (300, 230)).unwrap();
        let t = SliceTransform::new(0, bbox, (512, 512), (256, 256)).unwrap();
        let mut pred = Array2::from_elem((256, 256), BACKGROUND);
        pred.slice_mut(s![64..192, 64..192]).fill(LEFT_LUNG);

        let back = reshape_mask(pred.view(), &t).unwrap();
        assert_eq!(back.dim(), (512, 512));
        for ((h, w), &v) in back.indexed_iter() {
            if v != BACKGROUND {
                assert!(bbox.contains((h, w)));
                assert_eq!(v, LEFT_LUNG);
            }
        }
        assert!(back[(250, 190)] == LEFT_LUNG);
    }

    #[test]
    fn test_reshape_mask_rejects_wrong_shape() {
        let t = SliceTransform::new(2, BBox::full((10, 10)).unwrap(), (10, 10), (4, 4)).unwrap();
        let pred = Array2::from_elem((5, 4), BACKGROUND);
        assert!(matches!(
            reshape_mask(pred.view(), &t),
            Err(Error::ShapeMismatch { .. })
        ));
        let bbox = BBox::new((0, 0), (11, 10)).unwrap();
        assert!(SliceTransform::new(0, bbox, (10, 10), (4, 4)).is_err());
    }

    #[test]
    fn test_apply_rejects_wrong_slice_shape() {
        let cfg = Config::default();
        let t = SliceTransform::new(4, BBox::full((20, 30)).unwrap(), (20, 30), (8, 8)).unwrap();
        let data = phantom((20, 31), (5, 15), (5, 25));
        assert!(matches!(
            t.apply(ScanSlice::new(data.view()), &cfg),
            Err(Error::ShapeMismatch { .. })
        ));

        let data = phantom((20, 30), (5, 15), (5, 25));
        assert_eq!(t.apply(ScanSlice::new(data.view()), &cfg).unwrap().dim(), (8, 8));
    }

    #[test]
    fn test_volume_round_trip() {
        let (z, h, w) = (5, 60, 50);
        let mut data = Array3::from_elem((z, h, w), -1000.0f32);
        data.slice_mut(s![.., 20..40, 15..35]).fill(40.0);
        let scan = CtScan::from_raw(data, [2.0, 0.7, 0.7]).unwrap();
        let cfg = Config {
            target_resolution: (32, 32),
            ..Default::default()
        };

        let (input, transforms) = preprocess_volume(&scan, &cfg).unwrap();
        assert_eq!(input.dim(), (5, 32, 32));
        assert_eq!(transforms.len(), 5);
        assert!(transforms.iter().enumerate().all(|(i, t)| t.z() == i));

        let labels = Array3::from_elem((z, 32, 32), RIGHT_LUNG);
        let reshaper = InverseReshaper::new((h, w), true);
        let out = reshaper.reshape_volume(labels.view(), &transforms).unwrap();
        assert_eq!(out.dim(), (z, h, w));

        let short = Array3::from_elem((z - 1, 32, 32), RIGHT_LUNG);
        assert!(matches!(
            reshaper.reshape_volume(short.view(), &transforms),
            Err(Error::ShapeMismatch { .. })
        ));
    }
}
