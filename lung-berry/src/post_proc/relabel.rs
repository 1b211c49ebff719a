//! 小分量并入邻居.

use super::components::{ComponentId, ComponentMap};
use crate::consts::gray::BACKGROUND;
use crate::neighbour::Grid3d;
use crate::{Idx3d, PostprocConfig};
use binary_heap_plus::BinaryHeap;
use log::debug;
use ndarray::Array3;
use std::cmp::Reverse;
use std::collections::{BTreeMap, HashSet};

/// 小分量处理结果统计.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct Absorption {
    /// 被并入邻居的分量个数.
    pub absorbed: usize,

    /// 没有可用邻居、被置为背景的分量个数.
    pub dropped: usize,
}

/// 单个分量在合并过程中的状态.
struct Node {
    label: u8,
    voxel_count: usize,
    voxels: Vec<Idx3d>,
    alive: bool,
}

/// 将体积小于阈值的分量, 以及标签属于 `config.spare_labels` 的分量并入相邻分量.
///
/// 分量按体素个数从小到大处理. 对每个小分量, 统计与它相邻的每个分量的
/// 接触体素个数 (不重复计数), 并入接触最多者; 并列时取体积更大者, 再并列取编号更小者.
/// spare 标签的分量不会作为并入目标. 没有可用邻居的小分量被置为背景.
/// 被并入的邻居会以新的体素个数重新入队, 因此合并是可传递的.
///
/// `voxel_mm3` 为单个体素的实际体积. `map` 必须由 `labels` 的当前内容标记得到.
pub fn absorb_small_components(
    labels: &mut Array3<u8>,
    map: ComponentMap,
    config: &PostprocConfig,
    voxel_mm3: f64,
) -> Absorption {
    let min_voxels = if config.filters_volume() {
        config.min_voxels(voxel_mm3)
    } else {
        0.0
    };
    let grid = Grid3d::new(labels.dim(), map.connectivity());
    let (mut ids, components, members) = map.into_parts();

    // 下标 0 占位, 使下标与分量编号一致.
    let mut nodes: Vec<Node> = Vec::with_capacity(components.len() + 1);
    nodes.push(Node {
        label: BACKGROUND,
        voxel_count: 0,
        voxels: Vec::new(),
        alive: false,
    });
    nodes.extend(components.iter().zip(members).map(|(c, voxels)| Node {
        label: c.label,
        voxel_count: c.voxel_count,
        voxels,
        alive: true,
    }));

    let is_small = |n: &Node| config.is_spare(n.label) || (n.voxel_count as f64) < min_voxels;

    // 堆顶为体素个数最少的分量, 并列时编号更小者优先.
    let mut heap: BinaryHeap<(usize, ComponentId), _> =
        BinaryHeap::new_by(|a: &(usize, ComponentId), b: &(usize, ComponentId)| b.cmp(a));
    heap.reserve(components.len());
    for c in components.iter() {
        heap.push((c.voxel_count, c.id));
    }

    let mut stat = Absorption::default();
    while let Some((count, id)) = heap.pop() {
        let node = &nodes[id as usize];
        // 惰性删除: 已被合并或体积已变化的条目作废.
        if !node.alive || node.voxel_count != count || !is_small(node) {
            continue;
        }

        let mut seen = HashSet::new();
        let mut contact: BTreeMap<ComponentId, usize> = BTreeMap::new();
        for &v in node.voxels.iter() {
            for n in grid.neighbours(v) {
                let nid = ids[n];
                if nid != 0 && nid != id && seen.insert(n) {
                    *contact.entry(nid).or_default() += 1;
                }
            }
        }
        let target = contact
            .into_iter()
            .filter(|(nid, _)| !config.is_spare(nodes[*nid as usize].label))
            .max_by_key(|&(nid, shared)| (shared, nodes[nid as usize].voxel_count, Reverse(nid)))
            .map(|(nid, _)| nid);

        let voxels = std::mem::take(&mut nodes[id as usize].voxels);
        nodes[id as usize].alive = false;
        match target {
            Some(t) => {
                let label = nodes[t as usize].label;
                for &v in voxels.iter() {
                    labels[v] = label;
                    ids[v] = t;
                }
                let dst = &mut nodes[t as usize];
                dst.voxel_count += voxels.len();
                dst.voxels.extend(voxels);
                heap.push((dst.voxel_count, t));
                stat.absorbed += 1;
            }
            None => {
                for &v in voxels.iter() {
                    labels[v] = BACKGROUND;
                    ids[v] = 0;
                }
                stat.dropped += 1;
            }
        }
    }

    debug!(
        "小分量处理: 阈值 {min_voxels:.1} 体素, 并入 {}, 置背景 {}",
        stat.absorbed, stat.dropped
    );
    stat
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Connectivity;
    use crate::consts::gray::*;
    use crate::post_proc::components::label_components;
    use ndarray::s;

    fn run(v: &mut Array3<u8>, cfg: &PostprocConfig) -> Absorption {
        let map = label_components(v.view(), cfg.connectivity);
        absorb_small_components(v, map, cfg, 1.0)
    }

    fn with_threshold(mm3: f64) -> PostprocConfig {
        PostprocConfig {
            min_component_volume_mm3: mm3,
            ..Default::default()
        }
    }

    #[test]
    fn test_small_component_joins_largest_contact() {
        // 左侧 RIGHT_LUNG (79 体素) 与右侧 LEFT_LUNG (96 体素) 之间夹着 5 个 3 号体素,
        // 与两侧各接触 4 个体素, 因此并入体积更大的 LEFT_LUNG.
        let mut v = Array3::<u8>::zeros((4, 4, 12));
        v.slice_mut(s![.., .., 0..5]).fill(RIGHT_LUNG);
        v.slice_mut(s![.., .., 6..12]).fill(LEFT_LUNG);
        v.slice_mut(s![0..2, 0..2, 5..6]).fill(3);
        v[(0, 0, 4)] = 3;
        let stat = run(&mut v, &with_threshold(20.0));
        assert_eq!(stat, Absorption { absorbed: 1, dropped: 0 });
        assert!(v.iter().all(|&p| p != 3));
        assert_eq!(v[(0, 0, 4)], LEFT_LUNG);
        assert_eq!(v[(1, 1, 5)], LEFT_LUNG);

        // 接触更多者优先, 即使体积更小.
        let mut v = Array3::<u8>::zeros((1, 3, 12));
        v.slice_mut(s![.., 1..3, 0..4]).fill(RIGHT_LUNG);
        v.slice_mut(s![.., 0..1, 5..12]).fill(LEFT_LUNG);
        v.slice_mut(s![.., 1..3, 7..12]).fill(LEFT_LUNG);
        v.slice_mut(s![.., 1..3, 4..5]).fill(3);
        v.slice_mut(s![.., 1..3, 5..6]).fill(3);
        run(&mut v, &with_threshold(5.0));
        assert_eq!(v[(0, 2, 5)], RIGHT_LUNG);
    }

    #[test]
    fn test_isolated_small_component_is_dropped() {
        let mut v = Array3::<u8>::zeros((5, 5, 5));
        v[(0, 0, 0)] = RIGHT_LUNG;
        v.slice_mut(s![3..5, 3..5, 3..5]).fill(LEFT_LUNG);
        let stat = run(&mut v, &with_threshold(100.0));
        assert_eq!(stat, Absorption { absorbed: 0, dropped: 2 });
        assert!(v.iter().all(|&p| p == BACKGROUND));
    }

    #[test]
    fn test_absorption_is_transitive() {
        // 1 号 (1 体素) 只接触 2 号 (2 体素), 2 号只接触 3 号 (大).
        let mut v = Array3::<u8>::zeros((1, 1, 13));
        v[(0, 0, 0)] = 4;
        v.slice_mut(s![.., .., 1..3]).fill(LEFT_LUNG);
        v.slice_mut(s![.., .., 3..13]).fill(RIGHT_LUNG);
        let stat = run(&mut v, &with_threshold(5.0));
        assert_eq!(stat.absorbed, 2);
        assert!(v.iter().all(|&p| p == RIGHT_LUNG));
    }

    #[test]
    fn test_tie_prefers_larger_then_lower_id() {
        // 中心体素同时接触左右两个分量各一个体素.
        let mut v = Array3::<u8>::zeros((1, 1, 9));
        v.slice_mut(s![.., .., 0..3]).fill(RIGHT_LUNG);
        v[(0, 0, 3)] = 5;
        v.slice_mut(s![.., .., 4..9]).fill(LEFT_LUNG);
        run(&mut v, &with_threshold(2.0));
        assert_eq!(v[(0, 0, 3)], LEFT_LUNG);

        let mut v = Array3::<u8>::zeros((1, 1, 7));
        v.slice_mut(s![.., .., 0..3]).fill(RIGHT_LUNG);
        v[(0, 0, 3)] = 5;
        v.slice_mut(s![.., .., 4..7]).fill(LEFT_LUNG);
        run(&mut v, &with_threshold(2.0));
        assert_eq!(v[(0, 0, 3)], RIGHT_LUNG);
    }

    #[test]
    fn test_spare_label_is_absorbed_but_never_a_target() {
        let mut v = Array3::<u8>::zeros((1, 1, 10));
        v.slice_mut(s![.., .., 0..6]).fill(3);
        v.slice_mut(s![.., .., 6..8]).fill(RIGHT_LUNG);
        let cfg = PostprocConfig {
            min_component_volume_mm3: 0.0,
            spare_labels: vec![3],
            ..Default::default()
        };
        let stat = run(&mut v, &cfg);
        assert_eq!(stat.absorbed, 1);
        assert_eq!(v.slice(s![0, 0, 0..8]).iter().filter(|&&p| p == RIGHT_LUNG).count(), 8);

        // 只与 spare 分量相邻的小分量被置为背景.
        let mut v = Array3::<u8>::zeros((1, 1, 4));
        v[(0, 0, 0)] = RIGHT_LUNG;
        v.slice_mut(s![.., .., 1..4]).fill(3);
        let cfg = PostprocConfig {
            min_component_volume_mm3: 2.0,
            spare_labels: vec![3],
            ..Default::default()
        };
        run(&mut v, &cfg);
        assert!(v.iter().all(|&p| p == BACKGROUND || p == 3));
        assert_eq!(v[(0, 0, 0)], BACKGROUND);
    }

    #[test]
    fn test_twenty_six_connectivity_counts_diagonal_contact() {
        let mut v = Array3::<u8>::zeros((2, 2, 2));
        v[(0, 0, 0)] = LEFT_LUNG;
        v[(1, 1, 1)] = RIGHT_LUNG;
        v[(1, 1, 0)] = RIGHT_LUNG;
        let cfg = PostprocConfig {
            min_component_volume_mm3: 2.0,
            connectivity: Connectivity::TwentySix,
            ..Default::default()
        };
        let stat = run(&mut v, &cfg);
        assert_eq!(stat.absorbed, 1);
        assert_eq!(v[(0, 0, 0)], RIGHT_LUNG);
    }
}
