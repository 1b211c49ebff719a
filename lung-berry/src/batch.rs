//! 分批、调用外部分类器, 并按切片索引回收预测结果.
//!
//! 分类网络被抽象为 [`Classifier`]. 本模块不关心它如何实现,
//! 只要求它对一批规范化切片返回逐像素标签或逐像素逐类分数.

use crate::consts::gray::BACKGROUND;
use crate::error::{BoxError, Error, Result};
use crate::Idx2d;
use log::debug;
use ndarray::{s, Array3, Array4, ArrayView3, Axis};

/// 外部分类器对一个批次的输出.
#[derive(Clone, Debug, PartialEq)]
pub enum Prediction {
    /// 逐像素标签, 形状为 (批大小, H, W).
    Labels(Array3<u8>),

    /// 逐像素逐类分数, 形状为 (批大小, 类别数, H, W).
    Scores(Array4<f32>),
}

impl Prediction {
    /// 切片个数和分辨率.
    fn dim(&self) -> (usize, Idx2d) {
        match self {
            Self::Labels(l) => {
                let (n, h, w) = l.dim();
                (n, (h, w))
            }
            Self::Scores(s) => {
                let (n, _, h, w) = s.dim();
                (n, (h, w))
            }
        }
    }

    /// 获得逐像素标签. 对分数取 argmax, 并列时取较小的类别.
    pub fn labels(&self) -> Array3<u8> {
        match self {
            Self::Labels(l) => l.clone(),
            Self::Scores(s) => argmax(s),
        }
    }
}

/// 沿类别维度求 argmax. 并列时取较小的类别, NaN 永不胜出.
pub fn argmax(scores: &Array4<f32>) -> Array3<u8> {
    let (n, c, h, w) = scores.dim();
    Array3::from_shape_fn((n, h, w), |(z, y, x)| {
        let mut best = BACKGROUND;
        let mut best_score = f32::NEG_INFINITY;
        for class in 0..c {
            let v = scores[(z, class, y, x)];
            if v > best_score {
                best_score = v;
                best = class as u8;
            }
        }
        best
    })
}

/// 逐批次的切片分类器.
///
/// 输入为 (批大小, H, W), 取值位于 `[0, 1]` 的单通道规范化切片.
pub trait Classifier: Send + Sync {
    /// 类别数 (含背景).
    fn n_classes(&self) -> usize;

    /// 对一个批次分类.
    fn classify(&self, batch: ArrayView3<f32>) -> std::result::Result<Prediction, BoxError>;
}

impl<C: Classifier + ?Sized> Classifier for Box<C> {
    #[inline]
    fn n_classes(&self) -> usize {
        (**self).n_classes()
    }

    #[inline]
    fn classify(&self, batch: ArrayView3<f32>) -> std::result::Result<Prediction, BoxError> {
        (**self).classify(batch)
    }
}

/// 将 (z, H, W) 的规范化切片按顺序分为大小固定的批次. 最后一批可以更小.
#[derive(Clone, Debug)]
pub struct SliceBatches<'a> {
    slices: ArrayView3<'a, f32>,
    batch_size: usize,
}

impl<'a> SliceBatches<'a> {
    /// 若 `batch_size` 为零则返回 `Configuration` 错误.
    pub fn new(slices: ArrayView3<'a, f32>, batch_size: usize) -> Result<Self> {
        if batch_size == 0 {
            return Err(Error::Configuration("批大小必须为正".into()));
        }
        Ok(Self { slices, batch_size })
    }

    /// 批次个数.
    #[inline]
    pub fn len(&self) -> usize {
        self.n_slices().div_ceil(self.batch_size)
    }

    /// 是否没有任何批次?
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 切片总数.
    #[inline]
    pub fn n_slices(&self) -> usize {
        self.slices.len_of(Axis(0))
    }

    /// 切片分辨率 (H, W).
    #[inline]
    pub fn resolution(&self) -> Idx2d {
        let (_, h, w) = self.slices.dim();
        (h, w)
    }

    /// 第 `index` 批的首个切片索引.
    #[inline]
    pub fn start_of(&self, index: usize) -> usize {
        index * self.batch_size
    }

    /// 第 `index` 批的切片视图. 越界时返回 `None`.
    pub fn get(&self, index: usize) -> Option<ArrayView3<'a, f32>> {
        if index >= self.len() {
            return None;
        }
        let start = self.start_of(index);
        let end = (start + self.batch_size).min(self.n_slices());
        Some(self.slices.slice_move(s![start..end, .., ..]))
    }

    /// 按顺序迭代 `(首个切片索引, 批次视图)`.
    pub fn iter(&self) -> impl Iterator<Item = (usize, ArrayView3<'a, f32>)> + '_ {
        (0..self.len()).filter_map(move |i| self.get(i).map(|b| (self.start_of(i), b)))
    }
}

/// 调用分类器处理第 `index` 批, 并检查输出形状.
fn classify_one<C: Classifier + ?Sized>(
    classifier: &C,
    batches: &SliceBatches,
    index: usize,
) -> Result<Prediction> {
    let Some(batch) = batches.get(index) else {
        return Err(Error::Configuration(format!("批次索引 {index} 越界")));
    };
    let prediction = classifier
        .classify(batch)
        .map_err(|source| Error::ClassifierInvocation {
            batch: index,
            source,
        })?;

    let expected = (batch.len_of(Axis(0)), batches.resolution());
    let found = prediction.dim();
    if found != expected {
        let start = batches.start_of(index);
        let ((en, (eh, ew)), (fn_, (fh, fw))) = (expected, found);
        return Err(Error::ShapeMismatch {
            expected: (start + en, eh, ew),
            found: (start + fn_, fh, fw),
        });
    }
    let n_classes = classifier.n_classes();
    match &prediction {
        Prediction::Scores(s) => {
            let classes = s.len_of(Axis(1));
            if classes != n_classes {
                return Err(Error::Configuration(format!(
                    "分类器声明 {n_classes} 个类别, 实际输出 {classes} 个"
                )));
            }
        }
        Prediction::Labels(l) => {
            if let Some(&bad) = l.iter().find(|&&v| usize::from(v) >= n_classes) {
                return Err(Error::Configuration(format!(
                    "第 {index} 批输出标签 {bad}, 超出 {n_classes} 个类别"
                )));
            }
        }
    }
    Ok(prediction)
}

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use rayon::iter::{IntoParallelIterator, ParallelIterator};
        use std::sync::atomic::{AtomicBool, Ordering};

        fn dispatch_parallel<C: Classifier + ?Sized>(
            classifier: &C,
            batches: &SliceBatches,
        ) -> Result<Vec<Prediction>> {
            let stop = AtomicBool::new(false);
            let results: Vec<Option<Result<Prediction>>> = (0..batches.len())
                .into_par_iter()
                .map(|i| {
                    if stop.load(Ordering::Acquire) {
                        return None;
                    }
                    let res = classify_one(classifier, batches, i);
                    if res.is_err() {
                        stop.store(true, Ordering::Release);
                    }
                    Some(res)
                })
                .collect();

            // 被跳过的批次之后必然存在失败的批次, 按索引返回第一个错误.
            let mut predictions = Vec::with_capacity(results.len());
            for res in results.into_iter().flatten() {
                predictions.push(res?);
            }
            Ok(predictions)
        }
    } else {
        fn dispatch_parallel<C: Classifier + ?Sized>(
            classifier: &C,
            batches: &SliceBatches,
        ) -> Result<Vec<Prediction>> {
            dispatch_sequential(classifier, batches)
        }
    }
}

fn dispatch_sequential<C: Classifier + ?Sized>(
    classifier: &C,
    batches: &SliceBatches,
) -> Result<Vec<Prediction>> {
    (0..batches.len())
        .map(|i| classify_one(classifier, batches, i))
        .collect()
}

/// 将所有批次交给分类器, 并按批次索引 (而非完成顺序) 返回预测.
///
/// 任一批次失败都会停止后续批次的调度, 已完成的结果被丢弃.
/// 各批次必须同为标签或同为分数, 否则返回 `Configuration` 错误.
/// `parallel` 仅在启用 `rayon` feature 时生效.
pub fn dispatch<C: Classifier + ?Sized>(
    classifier: &C,
    batches: &SliceBatches,
    parallel: bool,
) -> Result<Vec<Prediction>> {
    let n_classes = classifier.n_classes();
    if n_classes == 0 || n_classes > usize::from(u8::MAX) + 1 {
        return Err(Error::Configuration(format!("类别数非法: {n_classes}")));
    }
    debug!(
        "分派 {} 层切片, 共 {} 批, 并行 = {parallel}",
        batches.n_slices(),
        batches.len()
    );
    let predictions = if parallel {
        dispatch_parallel(classifier, batches)?
    } else {
        dispatch_sequential(classifier, batches)?
    };

    let n_labels = predictions
        .iter()
        .filter(|p| matches!(p, Prediction::Labels(_)))
        .count();
    if n_labels != 0 && n_labels != predictions.len() {
        return Err(Error::Configuration(format!(
            "{} 个批次中 {n_labels} 个输出标签, 其余输出分数",
            predictions.len()
        )));
    }
    Ok(predictions)
}

/// 按切片顺序拼接各批次的预测.
///
/// 返回 (z, H, W) 的标签. 当 `keep_scores` 为 `true` 且所有批次都给出分数时,
/// 同时返回原样拼接的 (z, 类别数, H, W) 分数. 经 [`dispatch`] 得到的预测不会混有
/// 两种输出; 若直接传入混合的预测, 则只返回标签.
pub fn assemble(
    predictions: &[Prediction],
    batches: &SliceBatches,
    keep_scores: bool,
) -> (Array3<u8>, Option<Array4<f32>>) {
    let (h, w) = batches.resolution();
    let mut labels = Array3::from_elem((batches.n_slices(), h, w), BACKGROUND);
    for ((start, _), p) in batches.iter().zip(predictions) {
        let part = p.labels();
        let end = start + part.len_of(Axis(0));
        labels.slice_mut(s![start..end, .., ..]).assign(&part);
    }

    let all_scores = !predictions.is_empty()
        && predictions
            .iter()
            .all(|p| matches!(p, Prediction::Scores(_)));
    let scores = (keep_scores && all_scores)
        .then(|| {
            let views: Vec<_> = predictions
                .iter()
                .filter_map(|p| match p {
                    Prediction::Scores(s) => Some(s.view()),
                    Prediction::Labels(_) => None,
                })
                .collect();
            ndarray::concatenate(Axis(0), &views).ok()
        })
        .flatten();
    (labels, scores)
}

/// 基于强度区间的参考分类器: 规范化强度位于 `[lower, upper)` 的像素标为 `label`.
///
/// 用于测试和离线工具, 不代表任何网络模型.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ThresholdClassifier {
    lower: f32,
    upper: f32,
    label: u8,
    emit_scores: bool,
}

impl ThresholdClassifier {
    /// 若 `label` 为背景, 或区间为空, 则返回 `None`.
    pub fn new(lower: f32, upper: f32, label: u8) -> Option<Self> {
        (label != BACKGROUND && lower < upper).then_some(Self {
            lower,
            upper,
            label,
            emit_scores: false,
        })
    }

    /// 在默认肺窗 `[-1024, 600]` 下约对应 -940 ~ -490 HU 的充气肺组织.
    #[inline]
    pub fn lung() -> Self {
        Self {
            lower: 0.05,
            upper: 0.33,
            label: crate::consts::gray::RIGHT_LUNG,
            emit_scores: false,
        }
    }

    /// 改为输出 one-hot 分数而不是标签.
    #[inline]
    pub fn with_scores(mut self) -> Self {
        self.emit_scores = true;
        self
    }

    #[inline]
    fn hit(&self, v: f32) -> bool {
        (self.lower..self.upper).contains(&v)
    }
}

impl Classifier for ThresholdClassifier {
    #[inline]
    fn n_classes(&self) -> usize {
        usize::from(self.label) + 1
    }

    fn classify(&self, batch: ArrayView3<f32>) -> std::result::Result<Prediction, BoxError> {
        if !self.emit_scores {
            let label = self.label;
            return Ok(Prediction::Labels(
                batch.mapv(|v| if self.hit(v) { label } else { BACKGROUND }),
            ));
        }
        let (n, h, w) = batch.dim();
        let classes = self.n_classes();
        let label = usize::from(self.label);
        Ok(Prediction::Scores(Array4::from_shape_fn(
            (n, classes, h, w),
            |(z, c, y, x)| {
                let hit = self.hit(batch[(z, y, x)]);
                let on = if hit { c == label } else { c == 0 };
                if on {
                    1.0
                } else {
                    0.0
                }
            },
        )))
    }
}
