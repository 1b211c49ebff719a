//! CT scan/label 切片对象的操作.

mod core;

pub use self::core::{LabelSlice, LabelSliceMut, OwnedLabelSlice, ScanSlice};
