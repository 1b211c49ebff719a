//! 标签与分数的 `.npy` 读写.

use crate::error::{Error, Result};
use ndarray::{Array3, Array4, ArrayView3, ArrayView4};
use ndarray_npy::{read_npy, write_npy};
use std::path::Path;

#[inline]
fn npy_error<E: std::fmt::Display>(path: &Path, e: E) -> Error {
    Error::Npy(format!("{}: {e}", path.display()))
}

/// 读取 (z, H, W) 的 `u8` 标签.
pub fn read_labels<P: AsRef<Path>>(path: P) -> Result<Array3<u8>> {
    let path = path.as_ref();
    read_npy(path).map_err(|e| npy_error(path, e))
}

/// 写入 (z, H, W) 的 `u8` 标签.
pub fn write_labels<P: AsRef<Path>>(path: P, labels: ArrayView3<u8>) -> Result<()> {
    let path = path.as_ref();
    write_npy(path, &labels).map_err(|e| npy_error(path, e))
}

/// 读取 (z, 类别数, H, W) 的 `f32` 分数.
pub fn read_scores<P: AsRef<Path>>(path: P) -> Result<Array4<f32>> {
    let path = path.as_ref();
    read_npy(path).map_err(|e| npy_error(path, e))
}

/// 写入 (z, 类别数, H, W) 的 `f32` 分数.
pub fn write_scores<P: AsRef<Path>>(path: P, scores: ArrayView4<f32>) -> Result<()> {
    let path = path.as_ref();
    write_npy(path, &scores).map_err(|e| npy_error(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::gray::*;

    #[test]
    fn test_labels_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pred.npy");
        let mut labels = Array3::<u8>::zeros((3, 4, 5));
        labels[(1, 2, 3)] = LEFT_LUNG;
        write_labels(&path, labels.view()).unwrap();
        assert_eq!(read_labels(&path).unwrap(), labels);

        // 类型不符时报错.
        assert!(matches!(read_scores(&path), Err(Error::Npy(_))));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_labels(dir.path().join("nope.npy")).unwrap_err();
        assert!(err.to_string().contains("nope.npy"));
    }
}
