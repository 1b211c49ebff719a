use std::ops::Index;
use std::path::Path;

use ndarray::{Array3, ArrayView3, Axis, Ix3};
use nifti::{IntoNdArray, NiftiHeader, NiftiObject, ReaderOptions};

use crate::consts::gray::*;
use crate::error::{Error, Result};
use crate::{Idx2d, Idx3d};

pub mod slice;
pub mod window;

pub use slice::{LabelSlice, LabelSliceMut, OwnedLabelSlice, ScanSlice};

pub use window::CtWindow;

/// 从 header 中读出 (W, H, z) 并转换成 (z, H, W). 以后均按照该模式访问.
#[inline]
fn get_shape_from_header(h: &NiftiHeader) -> Idx3d {
    // [W, H, z]. 体素个数数组.
    let [_, w, h, z, ..] = h.dim;
    (z as usize, h as usize, w as usize)
}

/// 从 header 中读出 (W, H, z) 方向的体素分辨率并转换成 \[z, H, W\].
#[inline]
fn get_spacing_from_header(h: &NiftiHeader) -> [f64; 3] {
    let [_, w, h, z, ..] = h.pixdim;
    [z as f64, h as f64, w as f64]
}

/// 检查体素分辨率是否为有限正数.
fn check_spacing(spacing: &[f64; 3]) -> Result<()> {
    if spacing.iter().all(|s| s.is_finite() && *s > 0.0) {
        Ok(())
    } else {
        Err(Error::Configuration(format!("体素分辨率非法: {spacing:?}")))
    }
}

/// 3D 体数据的体素分辨率和形状相关的共用属性.
pub trait VoxelGrid {
    /// 获取数据形状大小 (z, H, W).
    fn shape(&self) -> Idx3d;

    /// 获取单个体素分辨率. 该分辨率以毫米为单位, 分别代表空间 (相邻切片方向),
    /// 高 (自然图像的垂直方向), 宽 (自然图像的水平方向).
    fn pix_dim(&self) -> [f64; 3];

    /// 获取数据水平切片形状大小.
    #[inline]
    fn slice_shape(&self) -> Idx2d {
        let (_, h, w) = self.shape();
        (h, w)
    }

    /// 获取水平切片个数.
    #[inline]
    fn len_z(&self) -> usize {
        self.shape().0
    }

    /// 获取体素的实际体积值, 以立方毫米为单位.
    #[inline]
    fn voxel(&self) -> f64 {
        self.pix_dim().iter().product()
    }
}

/// 3D CT 扫描 (HU), 以 `f32` 保存, 按 (z, H, W) 组织.
///
/// 载入后不再修改.
#[derive(Debug, Clone)]
pub struct CtScan {
    spacing: [f64; 3],
    data: Array3<f32>,
}

impl VoxelGrid for CtScan {
    #[inline]
    fn shape(&self) -> Idx3d {
        self.data.dim()
    }

    #[inline]
    fn pix_dim(&self) -> [f64; 3] {
        self.spacing
    }
}

impl Index<Idx3d> for CtScan {
    type Output = f32;

    #[inline]
    fn index(&self, index: Idx3d) -> &Self::Output {
        &self.data[index]
    }
}

impl CtScan {
    /// 打开 nii 文件格式的 3D CT 扫描. `path` 为 nii 文件的本地路径.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let obj = ReaderOptions::new().read_file(path.as_ref())?;
        let header = obj.header().clone();
        let shape = get_shape_from_header(&header);

        // [W, H, z] -> [z, H, W].
        // hint: 原第一维向下增长, 原第二维向右增长.
        let data = obj
            .into_volume()
            .into_ndarray::<f32>()?
            .permuted_axes([2, 1, 0].as_slice());
        let found = match data.shape() {
            [z, h, w] => (*z, *h, *w),
            _ => (data.len(), 0, 0),
        };
        let data = data
            .as_standard_layout()
            .into_owned()
            .into_dimensionality::<Ix3>()
            .map_err(|_| Error::ShapeMismatch {
                expected: shape,
                found,
            })?;

        Self::from_raw(data, get_spacing_from_header(&header))
    }

    /// 根据裸数据和体素分辨率直接创建 `CtScan`.
    ///
    /// `data` 按照 (z, H, W) 组织, `spacing` 按照 \[z, H, W\] 组织, 单位为毫米.
    /// 若分辨率不是有限正数, 则返回 `Err`.
    pub fn from_raw(data: Array3<f32>, spacing: [f64; 3]) -> Result<Self> {
        check_spacing(&spacing)?;
        Ok(Self { spacing, data })
    }

    /// 获取 3D 扫描 z 空间的第 `z_index` 层切片视图.
    ///
    /// 当 `z_index` 越界时 panic.
    #[inline]
    pub fn slice_at(&self, z_index: usize) -> ScanSlice<'_> {
        ScanSlice::new(self.data.index_axis(Axis(0), z_index))
    }

    /// 获得数据的一份不可变 shallow copy.
    #[inline]
    pub fn data(&self) -> ArrayView3<'_, f32> {
        self.data.view()
    }
}

/// 3D 标签体数据, 标签值以 `u8` 保存, 按 (z, H, W) 组织. 0 代表背景.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelVolume {
    spacing: [f64; 3],
    data: Array3<u8>,
}

impl VoxelGrid for LabelVolume {
    #[inline]
    fn shape(&self) -> Idx3d {
        self.data.dim()
    }

    #[inline]
    fn pix_dim(&self) -> [f64; 3] {
        self.spacing
    }
}

impl Index<Idx3d> for LabelVolume {
    type Output = u8;

    #[inline]
    fn index(&self, index: Idx3d) -> &Self::Output {
        &self.data[index]
    }
}

impl LabelVolume {
    /// 根据裸标签数据和体素分辨率直接创建 `LabelVolume`.
    ///
    /// 若分辨率不是有限正数, 则返回 `Err`.
    pub fn from_raw(data: Array3<u8>, spacing: [f64; 3]) -> Result<Self> {
        check_spacing(&spacing)?;
        Ok(Self { spacing, data })
    }

    /// 获得数据的一份不可变 shallow copy.
    #[inline]
    pub fn data(&self) -> ArrayView3<'_, u8> {
        self.data.view()
    }

    /// 获得底层数据的可变引用.
    #[inline]
    pub(crate) fn raw_mut(&mut self) -> &mut Array3<u8> {
        &mut self.data
    }

    /// 获取 3D 标注中值为 `label` 的体素个数.
    #[inline]
    pub fn count(&self, label: u8) -> usize {
        self.data.iter().filter(|p| **p == label).count()
    }

    /// 获取前景 (非背景) 体素的实际体积, 以立方毫米为单位.
    #[inline]
    pub fn foreground_volume(&self) -> f64 {
        let cnt = self.data.iter().filter(|p| is_foreground(**p)).count();
        cnt as f64 * self.voxel()
    }

    /// 该体数据是否为全背景?
    #[inline]
    pub fn is_background(&self) -> bool {
        self.data.iter().copied().all(is_background)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spacing_must_be_positive() {
        let data = Array3::<f32>::zeros((1, 2, 2));
        assert!(CtScan::from_raw(data.clone(), [1.0, 0.0, 1.0]).is_err());
        assert!(CtScan::from_raw(data.clone(), [1.0, f64::NAN, 1.0]).is_err());
        let scan = CtScan::from_raw(data, [2.5, 0.5, 0.5]).unwrap();
        assert_eq!(scan.shape(), (1, 2, 2));
        assert!((scan.voxel() - 0.625).abs() < 1e-12);
    }

    #[test]
    fn test_label_volume_statistics() {
        let mut data = Array3::<u8>::zeros((2, 3, 3));
        data[(0, 1, 1)] = RIGHT_LUNG;
        data[(1, 1, 1)] = LEFT_LUNG;
        data[(1, 2, 2)] = LEFT_LUNG;
        let vol = LabelVolume::from_raw(data, [2.0, 1.0, 1.0]).unwrap();
        assert_eq!(vol.count(LEFT_LUNG), 2);
        assert!((vol.foreground_volume() - 6.0).abs() < 1e-12);
        assert_eq!(vol.count(RIGHT_LUNG), 1);
        assert!(!vol.is_background());
    }

    #[test]
    fn test_open_permutes_axes_and_spacing() {
        use nifti::writer::WriterOptions;

        // 文件内按 [W, H, z] = [4, 3, 2] 存储, 体素值编码其 (w, h, z) 坐标.
        let raw = Array3::from_shape_fn((4, 3, 2), |(w, h, z)| (100 * z + 10 * h + w) as f32);
        let header = NiftiHeader {
            pixdim: [1.0, 0.5, 0.75, 2.5, 1.0, 1.0, 1.0, 1.0],
            scl_slope: 1.0,
            ..Default::default()
        };
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.nii");
        WriterOptions::new(&path)
            .reference_header(&header)
            .write_nifti(&raw)
            .unwrap();

        let scan = CtScan::open(&path).unwrap();
        assert_eq!(scan.shape(), (2, 3, 4));
        assert_eq!(scan.pix_dim(), [2.5, 0.75, 0.5]);
        assert_eq!(scan[(1, 2, 3)], 123.0);
        assert_eq!(scan[(0, 1, 2)], 12.0);
        assert_eq!(scan.slice_at(1).shape(), (3, 4));
    }

    #[test]
    fn test_open_missing_file() {
        assert!(matches!(
            CtScan::open("/definitely/not/here.nii.gz"),
            Err(Error::Nifti(_))
        ));
    }
}
