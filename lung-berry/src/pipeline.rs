//! 完整的分割流水线.

use crate::batch::{assemble, dispatch, Classifier, SliceBatches};
use crate::error::Result;
use crate::geometry::{preprocess_volume, InverseReshaper};
use crate::post_proc::{PostprocReport, Postprocessor};
use crate::{Config, CtScan, LabelVolume, VoxelGrid};
use log::{debug, info};
use ndarray::Array4;

/// 一个 CT 扫描的分割结果.
#[derive(Debug, Clone)]
pub struct Segmentation {
    /// 与原始扫描形状、体素分辨率一致的最终标签.
    pub labels: LabelVolume,

    /// 分类器原样输出的 (z, 类别数, H, W) 分数. 仅在分类器输出分数,
    /// 且 `Config::keep_scores` 为真时存在. 位于网络输入分辨率, 不做任何后处理.
    pub scores: Option<Array4<f32>>,

    /// 后处理统计.
    pub report: PostprocReport,
}

/// 肺部分割流水线: 正变换 → 分批分类 → 体数据后处理 → 逆变换.
pub struct LungMask<C> {
    config: Config,
    classifier: C,
    postproc: Postprocessor,
}

impl<C: Classifier> LungMask<C> {
    /// 检查配置并构建流水线. 配置非法时返回 `Configuration` 错误.
    pub fn new(config: Config, classifier: C) -> Result<Self> {
        config.validate()?;
        let postproc = Postprocessor::new(config.postproc.clone())?;
        Ok(Self {
            config,
            classifier,
            postproc,
        })
    }

    /// 当前配置.
    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// 注入的分类器.
    #[inline]
    pub fn classifier(&self) -> &C {
        &self.classifier
    }

    /// 分割 `scan`. 任何一步失败都会中止整个流程, 不存在部分输出.
    pub fn apply(&self, scan: &CtScan) -> Result<Segmentation> {
        let cfg = &self.config;
        let (input, transforms) = preprocess_volume(scan, cfg)?;

        let batches = SliceBatches::new(input.view(), cfg.batch_size)?;
        let predictions = dispatch(&self.classifier, &batches, cfg.parallel)?;
        let (mut labels, scores) = assemble(&predictions, &batches, cfg.keep_scores);
        debug!("分类完成, 预测形状 {:?}", labels.dim());

        // 阈值按原始扫描的体素体积换算.
        let report = self.postproc.run(&mut labels, scan.voxel())?;

        let reshaper = InverseReshaper::new(scan.slice_shape(), cfg.parallel);
        let out = reshaper.reshape_volume(labels.view(), &transforms)?;
        let labels = LabelVolume::from_raw(out, scan.pix_dim())?;
        info!(
            "分割完成: 形状 {:?}, 前景体积 {:.1} mm³",
            labels.shape(),
            labels.foreground_volume()
        );
        Ok(Segmentation {
            labels,
            scores,
            report,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::{Prediction, ThresholdClassifier};
    use crate::consts::gray::*;
    use crate::{BoxError, Error, PostprocConfig};
    use ndarray::{s, Array3, ArrayView3};

    /// 软组织躯干中包含两块充气肺.
    fn chest() -> CtScan {
        let mut data = Array3::from_elem((6, 64, 64), -1000.0f32);
        data.slice_mut(s![.., 8..56, 4..60]).fill(40.0);
        data.slice_mut(s![.., 16..48, 10..28]).fill(-800.0);
        data.slice_mut(s![.., 16..48, 36..54]).fill(-800.0);
        CtScan::from_raw(data, [5.0, 1.0, 1.0]).unwrap()
    }

    fn config() -> Config {
        Config {
            target_resolution: (64, 64),
            batch_size: 4,
            postproc: PostprocConfig {
                min_component_volume_mm3: 1_000.0,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_chest_phantom_segmentation() {
        let _ = simple_logger::SimpleLogger::new().init();
        let scan = chest();
        let pipe = LungMask::new(config(), ThresholdClassifier::lung()).unwrap();
        let seg = pipe.apply(&scan).unwrap();
        assert_eq!(seg.labels.shape(), scan.shape());
        assert!(seg.scores.is_none());
        assert_eq!(seg.labels[(3, 32, 19)], RIGHT_LUNG);
        assert_eq!(seg.labels[(3, 32, 45)], RIGHT_LUNG);
        assert_eq!(seg.labels[(3, 32, 32)], BACKGROUND);
        assert_eq!(seg.labels[(0, 0, 0)], BACKGROUND);
        assert_eq!(seg.report.dropped + seg.report.absorbed, 0);
    }

    #[test]
    fn test_scores_are_passed_through() {
        let scan = chest();
        let pipe = LungMask::new(config(), ThresholdClassifier::lung().with_scores()).unwrap();
        let seg = pipe.apply(&scan).unwrap();
        assert_eq!(seg.scores.unwrap().dim(), (6, 2, 64, 64));

        let cfg = Config {
            keep_scores: false,
            ..config()
        };
        let pipe = LungMask::new(cfg, ThresholdClassifier::lung().with_scores()).unwrap();
        assert!(pipe.apply(&scan).unwrap().scores.is_none());
    }

    #[test]
    fn test_classifier_failure_aborts() {
        struct Broken;
        impl Classifier for Broken {
            fn n_classes(&self) -> usize {
                2
            }
            fn classify(&self, _: ArrayView3<f32>) -> std::result::Result<Prediction, BoxError> {
                Err("device lost".into())
            }
        }
        let cfg = Config {
            parallel: false,
            ..config()
        };
        let pipe = LungMask::new(cfg, Broken).unwrap();
        assert!(matches!(
            pipe.apply(&chest()),
            Err(Error::ClassifierInvocation { batch: 0, .. })
        ));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let cfg = Config {
            batch_size: 0,
            ..config()
        };
        assert!(matches!(
            LungMask::new(cfg, ThresholdClassifier::lung()),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_boxed_classifier() {
        let c: Box<dyn Classifier> = Box::new(ThresholdClassifier::lung());
        let pipe = LungMask::new(config(), c).unwrap();
        assert_eq!(pipe.apply(&chest()).unwrap().labels.shape(), (6, 64, 64));
    }
}
