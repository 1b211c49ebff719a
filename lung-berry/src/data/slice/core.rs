use crate::consts::gray::*;
use crate::neighbour::{neighbour4, neighbour8};
use crate::{Area2d, Areas2d, Idx2d, Predicate};
use ndarray::{Array2, ArrayView2, ArrayViewMut2};
use std::collections::VecDeque;
use std::ops::{Index, IndexMut};

/// 不可变、借用的二维水平标签切片.
pub struct LabelSlice<'a> {
    /// 底层数据的轻量级视图.
    ///
    /// 这里有意把代码写死为 `ArrayView` 降低灵活性, 但使结构的意图更加明确.
    data: ArrayView2<'a, u8>,
}

impl Index<Idx2d> for LabelSlice<'_> {
    type Output = u8;

    #[inline]
    fn index(&self, index: Idx2d) -> &Self::Output {
        &self.data[index]
    }
}

/// 可变、借用的二维水平标签切片.
pub struct LabelSliceMut<'a> {
    /// 底层数据的轻量级视图.
    ///
    /// 这里有意把代码写死为 `ArrayViewMut` 降低灵活性, 但使结构的意图更加明确.
    data: ArrayViewMut2<'a, u8>,
}

/// 可变方法集合.
impl<'a> LabelSliceMut<'a> {
    /// 将 `it` 中的每个索引对应的像素改为 `new`.
    pub fn fill_batch<I: IntoIterator<Item = Idx2d>>(&mut self, it: I, new: u8) {
        for pos in it.into_iter() {
            self[pos] = new;
        }
    }

    /// 获取 `groups` 中第一个最大的区域并返回. 同时将其它区域都填充为 `fill_with`.
    ///
    /// 如果 `groups` 为空, 则返回 `None`.
    pub fn non_max_filling(&mut self, mut groups: Areas2d, fill_with: u8) -> Option<Area2d> {
        // `max_by_key` 在并列时取最后一个, 这里需要第一个.
        let index = groups
            .iter()
            .enumerate()
            .rev()
            .max_by_key(|v| v.1.len())?
            .0;
        for (_, area) in groups.iter().enumerate().filter(|(idx, _)| *idx != index) {
            area.iter().copied().for_each(|p| self[p] = fill_with);
        }
        Some(std::mem::take(&mut groups[index]))
    }

    /// 将 4-相邻意义下不与图像边缘连通的背景区域 (空洞) 填充为 `fill_with`.
    ///
    /// 返回被填充的像素个数.
    pub fn fill_enclosed_background(&mut self, fill_with: u8) -> usize {
        let holes: Vec<Area2d> = self
            .areas(is_background, false)
            .into_iter()
            .filter(|area| !area.iter().any(|p| self.is_at_border(*p)))
            .collect();
        let mut cnt = 0;
        for area in holes {
            cnt += area.len();
            self.fill_batch(area, fill_with);
        }
        cnt
    }
}

impl Index<Idx2d> for LabelSliceMut<'_> {
    type Output = u8;

    #[inline]
    fn index(&self, index: Idx2d) -> &Self::Output {
        &self.data[index]
    }
}

impl IndexMut<Idx2d> for LabelSliceMut<'_> {
    #[inline]
    fn index_mut(&mut self, index: Idx2d) -> &mut Self::Output {
        &mut self.data[index]
    }
}

/// label 不可变方法集合.
macro_rules! impl_label_slice_immut {
    ($life: lifetime, $slice: ty, $array: ty) => {
        /// 不可变方法集合.
        impl<$life> $slice {
            /// 直接初始化.
            #[inline]
            pub(crate) fn new(data: $array) -> Self {
                Self { data }
            }

            /// 获得 **底层** 数据的一份不可变 shallow copy.
            #[inline]
            pub fn array_view(&self) -> ArrayView2<u8> {
                self.data.view()
            }

            /// 获取给定位置 (高, 宽) 的像素值. 越界时返回 `None`.
            #[inline]
            pub fn get(&self, pos: Idx2d) -> Option<&u8> {
                self.data.get(pos)
            }

            /// 该图是否为全背景图?
            #[inline]
            pub fn is_background(&self) -> bool {
                self.data.iter().copied().all(is_background)
            }

            /// 图像的分辨率 (高, 宽).
            #[inline]
            pub fn shape(&self) -> Idx2d {
                self.data.dim()
            }

            /// 判断一个索引是否合法 (未越界).
            #[inline]
            pub fn check(&self, (h, w): Idx2d) -> bool {
                let (h_len, w_len) = self.shape();
                h < h_len && w < w_len
            }

            /// 统计图像中值为 `label` 的像素总个数.
            #[inline]
            pub fn count(&self, label: u8) -> usize {
                self.data.iter().filter(|&p| *p == label).count()
            }

            /// 克隆自己, 获得一个拥有所有权的切片对象.
            pub fn to_owned(&self) -> OwnedLabelSlice {
                OwnedLabelSlice {
                    data: self.data.to_owned(),
                }
            }

            /// 获得图像的高.
            #[inline]
            pub fn height(&self) -> usize {
                self.shape().0
            }

            /// 获得图像的宽.
            #[inline]
            pub fn width(&self) -> usize {
                self.shape().1
            }

            /// 判断一个索引是否位于图像的边缘.
            #[inline]
            pub fn is_at_border(&self, (h, w): Idx2d) -> bool {
                h == 0
                    || h.saturating_add(1) == self.height()
                    || w == 0
                    || w.saturating_add(1) == self.width()
            }

            /// 获得 `pos` 的 4-邻域像素索引. 保证返回的索引都不越界.
            pub fn n4_positions(&self, pos: Idx2d) -> Vec<Idx2d> {
                neighbour4(pos)
                    .into_iter()
                    .filter(|p| self.check(*p))
                    .collect()
            }

            /// 获得 `pos` 的 8-邻域像素索引. 保证返回的索引都不越界.
            pub fn n8_positions(&self, pos: Idx2d) -> Vec<Idx2d> {
                neighbour8(pos)
                    .into_iter()
                    .filter(|p| self.check(*p))
                    .collect()
            }

            /// 判断 `pos` 的 4-邻域 (越界部分视为不满足) 是否全部满足谓词 `pred`.
            pub fn is_n4_all(&self, pos: Idx2d, pred: Predicate) -> bool {
                neighbour4(pos)
                    .into_iter()
                    .all(|p| matches!(self.get(p), Some(&v) if pred(v)))
            }

            /// 判断 `pos` 的 4-邻域是否有满足谓词 `pred` 的像素.
            pub fn is_n4_having(&self, pos: Idx2d, pred: Predicate) -> bool {
                neighbour4(pos)
                    .into_iter()
                    .any(|p| matches!(self.get(p), Some(&v) if pred(v)))
            }

            /// 以行优先规则, 获取能迭代图像所有 `(索引, 像素值)` 的迭代器.
            #[inline]
            pub fn indexed_iter(&self) -> impl Iterator<Item = (Idx2d, &u8)> {
                self.data.indexed_iter()
            }

            /// 获取所有满足谓词 `pred` 的像素的最小外接矩形,
            /// 以 `(左上角, 右下角)` 闭区间形式给出. 若不存在则返回 `None`.
            pub fn bounding_box(&self, pred: Predicate) -> Option<(Idx2d, Idx2d)> {
                self.indexed_iter()
                    .filter(|(_, p)| pred(**p))
                    .fold(None, |acc, ((h, w), _)| match acc {
                        None => Some(((h, w), (h, w))),
                        Some(((h0, w0), (h1, w1))) => {
                            Some(((h0.min(h), w0.min(w)), (h1.max(h), w1.max(w))))
                        }
                    })
            }

            /// 获取所有区域. 两个像素 `p1` 和 `p2` 属于同一个区域,
            /// 当且仅当存在一条从 `p1` 到 `p2` 的相邻路径, 且路径上的所有像素
            /// (包括 `p1` 和 `p2`) 都满足谓词 `pred`. `eight` 为 `true`
            /// 时使用 8-相邻规则, 否则使用 4-相邻规则.
            ///
            /// 区域按其首个像素的行优先顺序排列.
            pub fn areas(&self, pred: Predicate, eight: bool) -> Areas2d {
                let mut ans = Areas2d::with_capacity(1);
                let mut bfs_q = VecDeque::with_capacity(4);
                let mut visited = Array2::<bool>::default(self.shape());

                for (pos, &pixel) in self.indexed_iter() {
                    if visited[pos] || !pred(pixel) {
                        continue;
                    }
                    visited[pos] = true;
                    bfs_q.push_back(pos);
                    let mut this_area = Area2d::with_capacity(1);
                    while let Some(cur_pos) = bfs_q.pop_front() {
                        this_area.push(cur_pos);

                        // bfs
                        let neighbours = if eight {
                            self.n8_positions(cur_pos)
                        } else {
                            self.n4_positions(cur_pos)
                        };
                        for neigh in neighbours {
                            if !visited[neigh] && pred(self[neigh]) {
                                visited[neigh] = true;
                                bfs_q.push_back(neigh);
                            }
                        }
                    }
                    ans.push(this_area);
                }
                ans
            }

            /// 按照 4-相邻原则获得图像中所有背景区域.
            #[inline]
            pub fn background_areas(&self) -> Areas2d {
                self.areas(is_background, false)
            }

            /// 按照 8-相邻原则获得图像中所有前景区域 (不区分标签).
            #[inline]
            pub fn foreground_areas(&self) -> Areas2d {
                self.areas(is_foreground, true)
            }
        }
    };
}
impl_label_slice_immut!('a, LabelSlice<'a>, ArrayView2<'a, u8>);
impl_label_slice_immut!('a, LabelSliceMut<'a>, ArrayViewMut2<'a, u8>);

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 拥有所有权的二维水平标签切片.
///
/// `OwnedLabelSlice` 仅提供到 `LabelSlice` 和 `LabelSliceMut`
/// 的轻量转换和底层数据移动, 不提供任何其它方法.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct OwnedLabelSlice {
    data: Array2<u8>,
}

impl OwnedLabelSlice {
    /// 创建全背景切片.
    #[inline]
    pub fn background(shape: Idx2d) -> Self {
        Self {
            data: Array2::from_elem(shape, BACKGROUND),
        }
    }

    /// 直接由底层数据创建.
    #[inline]
    pub fn from_raw(data: Array2<u8>) -> Self {
        Self { data }
    }

    /// 获得不可变切片引用.
    #[inline]
    pub fn as_immut(&self) -> LabelSlice<'_> {
        LabelSlice::new(self.data.view())
    }

    /// 获得可变切片引用.
    #[inline]
    pub fn as_mutable(&mut self) -> LabelSliceMut<'_> {
        LabelSliceMut::new(self.data.view_mut())
    }
}

/// 不可变、借用的二维水平 CT 扫描切片.
#[derive(Clone, Copy)]
pub struct ScanSlice<'a> {
    /// 底层数据的轻量级视图, 借用于 [`crate::CtScan`].
    data: ArrayView2<'a, f32>,
}

impl Index<Idx2d> for ScanSlice<'_> {
    type Output = f32;

    #[inline]
    fn index(&self, index: Idx2d) -> &Self::Output {
        &self.data[index]
    }
}

impl<'a> ScanSlice<'a> {
    /// 直接初始化.
    #[inline]
    pub fn new(data: ArrayView2<'a, f32>) -> Self {
        Self { data }
    }

    /// 获得数据的一份不可变 shallow copy.
    #[inline]
    pub fn data(&self) -> ArrayView2<'a, f32> {
        self.data
    }

    /// 图像的分辨率 (高, 宽).
    #[inline]
    pub fn shape(&self) -> Idx2d {
        self.data.dim()
    }
}
