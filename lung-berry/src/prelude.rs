//! 🍇欢迎光临🍓
//!
//! 涵盖了本 crate 一系列常用的功能.

pub use crate::{Idx2d, Idx3d};

pub use crate::data::{
    CtScan, CtWindow, LabelSlice, LabelSliceMut, LabelVolume, OwnedLabelSlice, ScanSlice,
    VoxelGrid,
};

pub use crate::consts::gray::{BACKGROUND, LEFT_LUNG, RIGHT_LUNG};
pub use crate::consts::ElemType;

pub use crate::batch::{Classifier, Prediction, ThresholdClassifier};
pub use crate::config::{Config, Connectivity, PostprocConfig};
pub use crate::error::{BoxError, Error, Result};
pub use crate::geometry::{BBox, InverseReshaper, SliceTransform};
pub use crate::pipeline::{LungMask, Segmentation};
pub use crate::post_proc::{PostprocReport, Postprocessor};

pub use crate::dataset::home_dataset_dir_with;
