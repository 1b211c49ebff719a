#![warn(missing_docs)] // <= 合适时移除它.

//! 核心库. 将 3D 肺部 CT 的逐切片语义分割结果整理为空间一致、无噪声的三维标签,
//! 并将在归一化分辨率上得到的预测逆变换回原始体素网格.
//!
//! 分类网络本身不在本 crate 内. 它被抽象为 [`batch::Classifier`] trait,
//! 由调用者注入具体实现.
//!
//! # 数据流
//!
//! 原始体数据 → 几何变换 ([`geometry`]) → 强度规范化 ([`CtWindow`])
//! → 分批 ([`batch`]) → \[外部分类器\] → 体数据后处理 ([`post_proc`])
//! → 逆变换 ([`geometry::InverseReshaper`]) → 最终标签体数据.
//!
//! 整条流程由 [`pipeline::LungMask`] 驱动.
//!
//! # 注意
//!
//! 1. 所有体数据均按 (z, H, W) 组织, 体素分辨率按 \[z, H, W\] 给出, 单位为毫米.
//! 2. 所有错误都是致命的, 不存在降级输出. 见 [`Error`].
//!
//! # 开发计划
//!
//! ### 逐切片裁剪/缩放及其精确逆变换 ✅
//!
//! 实现位于 `lung-berry/src/geometry`.
//!
//! ### 三维连通分量标记、空洞填充、小分量并入邻居 ✅
//!
//! 实现位于 `lung-berry/src/post_proc`.
//!
//! ### 分批调度与按索引回收 ✅
//!
//! 实现位于 `lung-berry/src/batch.rs`.

/// 二维索引, 同时也可一定程度上用作非负整数向量.
pub type Idx2d = (usize, usize);

/// 三维索引, 同时也可一定程度上用作非负整数向量.
pub type Idx3d = (usize, usize, usize);

type Predicate = fn(u8) -> bool;

type Area2d = Vec<Idx2d>;
type Areas2d = Vec<Area2d>;

/// 3D CT 基础数据结构.
mod data;

pub use data::{
    CtScan, CtWindow, LabelSlice, LabelSliceMut, LabelVolume, OwnedLabelSlice, ScanSlice,
    VoxelGrid,
};

pub mod batch;
pub mod config;
pub mod consts;
pub mod dataset;
mod error;
pub mod geometry;
pub mod io;
mod neighbour;
mod parallel;
pub mod pipeline;
pub mod post_proc;
pub mod prelude;

pub use config::{Config, Connectivity, PostprocConfig};
pub use error::{BoxError, Error, Result};
