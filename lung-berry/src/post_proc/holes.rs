//! 逐分量三维空洞填充.

use super::components::{Component, ComponentId, ComponentMap};
use crate::config::Connectivity;
use crate::consts::gray::*;
use crate::neighbour::Grid3d;
use crate::Idx3d;
use ndarray::Array3;
use std::collections::VecDeque;

/// 将 `map` 中每个分量内部被其完全包围的背景空洞填充为该分量的标签.
///
/// 空洞以 6-相邻规则判定. 体数据外部视为背景, 因此与体数据边界连通的凹陷不是空洞.
/// 不经过本分量就无法到达外部的背景按 6-相邻分组, 只有与本分量直接相邻的组才会被填充.
/// 因此被嵌套在内部的其它分量所包围的空洞归属那个分量, 填充得到的体素总与其分量连通.
///
/// 背景体素个数超过 `max_hole_voxels` 的空洞保持不变, 空洞中其它分量的体素也保持不变.
///
/// 返回被填充的体素个数.
///
/// # 注意
///
/// `map` 必须由 `labels` 的当前内容标记得到, 否则程序行为未定义 (可能 panic).
pub fn fill_holes(labels: &mut Array3<u8>, map: &ComponentMap, max_hole_voxels: usize) -> usize {
    map.components()
        .iter()
        .map(|c| HoleFiller::new(map.ids(), c, labels.dim()).fill(labels, max_hole_voxels))
        .sum()
}

/// 单个分量外接长方体 (四周各扩张一个体素) 内的空洞搜索.
///
/// 局部坐标 `p` 对应全局坐标 `p + origin - 1`.
struct HoleFiller<'a> {
    ids: &'a Array3<ComponentId>,
    id: ComponentId,
    label: u8,
    origin: Idx3d,
    volume_shape: Idx3d,
    grid: Grid3d,
    visited: Array3<bool>,

    /// 尚未分组的空洞背景体素.
    pending: Array3<bool>,
}

impl<'a> HoleFiller<'a> {
    fn new(ids: &'a Array3<ComponentId>, c: &Component, volume_shape: Idx3d) -> Self {
        let (lo, hi) = c.bounds;
        let local = (hi.0 - lo.0 + 3, hi.1 - lo.1 + 3, hi.2 - lo.2 + 3);
        Self {
            ids,
            id: c.id,
            label: c.label,
            origin: lo,
            volume_shape,
            grid: Grid3d::new(local, Connectivity::Six),
            visited: Array3::default(local),
            pending: Array3::default(local),
        }
    }

    /// 局部坐标转全局坐标. 落在体数据外时返回 `None`.
    #[inline]
    fn to_global(&self, (z, h, w): Idx3d) -> Option<Idx3d> {
        let (oz, oh, ow) = self.origin;
        let (lz, lh, lw) = self.volume_shape;
        let g = (
            (z + oz).checked_sub(1)?,
            (h + oh).checked_sub(1)?,
            (w + ow).checked_sub(1)?,
        );
        (g.0 < lz && g.1 < lh && g.2 < lw).then_some(g)
    }

    #[inline]
    fn is_member(&self, p: Idx3d) -> bool {
        self.to_global(p).is_some_and(|g| self.ids[g] == self.id)
    }

    /// 从 `seed` 出发, 遍历所有未访问且不属于本分量的体素, 并返回它们.
    fn flood(&mut self, seed: Idx3d) -> Vec<Idx3d> {
        let mut region = Vec::new();
        let mut bfs_q = VecDeque::from([seed]);
        self.visited[seed] = true;
        while let Some(cur) = bfs_q.pop_front() {
            region.push(cur);
            let next: Vec<Idx3d> = self
                .grid
                .neighbours(cur)
                .filter(|&n| !self.visited[n] && !self.is_member(n))
                .collect();
            for n in next {
                self.visited[n] = true;
                bfs_q.push_back(n);
            }
        }
        region
    }

    /// 将 `region` 中的背景体素按 6-相邻分组.
    fn pockets(&mut self, region: Vec<Idx3d>, labels: &Array3<u8>) -> Vec<Vec<Idx3d>> {
        let seeds: Vec<Idx3d> = region
            .into_iter()
            .filter(|&q| self.to_global(q).is_some_and(|g| is_background(labels[g])))
            .collect();
        for &q in seeds.iter() {
            self.pending[q] = true;
        }

        let mut pockets = Vec::new();
        for seed in seeds {
            if !self.pending[seed] {
                continue;
            }
            self.pending[seed] = false;
            let mut pocket = Vec::new();
            let mut bfs_q = VecDeque::from([seed]);
            while let Some(cur) = bfs_q.pop_front() {
                pocket.push(cur);
                for n in self.grid.neighbours(cur) {
                    if self.pending[n] {
                        self.pending[n] = false;
                        bfs_q.push_back(n);
                    }
                }
            }
            pockets.push(pocket);
        }
        pockets
    }

    #[inline]
    fn touches_member(&self, pocket: &[Idx3d]) -> bool {
        pocket
            .iter()
            .any(|&q| self.grid.neighbours(q).any(|n| self.is_member(n)))
    }

    fn fill(mut self, labels: &mut Array3<u8>, max_hole_voxels: usize) -> usize {
        // 扩张出的外壳全部可达, 且相互连通.
        self.flood((0, 0, 0));

        let mut filled = 0;
        let (lz, lh, lw) = self.visited.dim();
        for z in 1..lz - 1 {
            for h in 1..lh - 1 {
                for w in 1..lw - 1 {
                    let p = (z, h, w);
                    if self.visited[p] || self.is_member(p) {
                        continue;
                    }
                    let region = self.flood(p);
                    for pocket in self.pockets(region, labels) {
                        if pocket.len() > max_hole_voxels || !self.touches_member(&pocket) {
                            continue;
                        }
                        filled += pocket.len();
                        for q in pocket {
                            if let Some(g) = self.to_global(q) {
                                labels[g] = self.label;
                            }
                        }
                    }
                }
            }
        }
        filled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::post_proc::components::label_components;
    use ndarray::s;

    /// 边长为 5 的实心立方体, 内部 3 × 3 × 3 挖空.
    fn hollow_cube() -> Array3<u8> {
        let mut v = Array3::<u8>::zeros((7, 7, 7));
        v.slice_mut(s![1..6, 1..6, 1..6]).fill(RIGHT_LUNG);
        v.slice_mut(s![2..5, 2..5, 2..5]).fill(BACKGROUND);
        v
    }

    #[test]
    fn test_enclosed_cavity_is_filled() {
        let mut v = hollow_cube();
        v[(3, 3, 3)] = LEFT_LUNG;
        let map = label_components(v.view(), Connectivity::Six);
        assert_eq!(fill_holes(&mut v, &map, usize::MAX), 26);
        assert_eq!(v[(3, 3, 3)], LEFT_LUNG);
        assert_eq!(v[(2, 2, 2)], RIGHT_LUNG);
        assert_eq!(v.iter().filter(|&&p| p == RIGHT_LUNG).count(), 124);
    }

    #[test]
    fn test_large_cavity_is_kept() {
        let mut v = hollow_cube();
        let map = label_components(v.view(), Connectivity::Six);
        assert_eq!(fill_holes(&mut v, &map, 26), 0);
        assert_eq!(fill_holes(&mut v, &map, 27), 27);
    }

    #[test]
    fn test_nested_cavity_keeps_inner_label() {
        // LEFT_LUNG 外壳紧贴包裹 RIGHT_LUNG 实心块, 实心块内部有 3 × 3 × 3 空腔.
        let mut v = Array3::<u8>::zeros((13, 13, 13));
        v.slice_mut(s![1..12, 1..12, 1..12]).fill(LEFT_LUNG);
        v.slice_mut(s![2..11, 2..11, 2..11]).fill(RIGHT_LUNG);
        v.slice_mut(s![5..8, 5..8, 5..8]).fill(BACKGROUND);
        let map = label_components(v.view(), Connectivity::Six);
        // 外壳先于实心块被标记.
        assert_eq!(map.components()[0].label, LEFT_LUNG);
        assert_eq!(fill_holes(&mut v, &map, usize::MAX), 27);
        assert!(v.slice(s![5..8, 5..8, 5..8]).iter().all(|&p| p == RIGHT_LUNG));
        assert_eq!(v.iter().filter(|&&p| p == LEFT_LUNG).count(), 11 * 11 * 11 - 9 * 9 * 9);
    }

    #[test]
    fn test_cavity_open_to_border_is_not_a_hole() {
        let mut v = Array3::<u8>::zeros((1, 3, 3));
        v.fill(RIGHT_LUNG);
        v[(0, 1, 1)] = BACKGROUND;
        let map = label_components(v.view(), Connectivity::Six);
        assert_eq!(fill_holes(&mut v, &map, usize::MAX), 0);

        // 挖穿一面的立方体.
        let mut v = hollow_cube();
        v[(3, 3, 1)] = BACKGROUND;
        let map = label_components(v.view(), Connectivity::Six);
        assert_eq!(fill_holes(&mut v, &map, usize::MAX), 0);
    }
}
