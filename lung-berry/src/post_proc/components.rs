//! 三维同标签连通分量标记.

use crate::config::Connectivity;
use crate::consts::ElemType;
use crate::neighbour::Grid3d;
use crate::Idx3d;
use ndarray::{Array3, ArrayView3};
use std::collections::VecDeque;

/// 分量编号. 0 代表背景, 有效编号从 1 开始.
pub type ComponentId = u32;

/// 一个三维连通分量: 标签相同且相互连通的前景体素的极大集合.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Component {
    /// 分量编号, 从 1 开始.
    pub id: ComponentId,

    /// 分量内所有体素共同的标签.
    pub label: u8,

    /// 体素个数.
    pub voxel_count: usize,

    /// 闭区间外接长方体 `(最小角, 最大角)`.
    pub bounds: (Idx3d, Idx3d),
}

impl Component {
    /// 分量的实际体积, 立方毫米. `voxel_mm3` 为单个体素的实际体积.
    #[inline]
    pub fn volume_mm3(&self, voxel_mm3: f64) -> f64 {
        self.voxel_count as f64 * voxel_mm3
    }
}

/// 连通分量标记结果.
#[derive(Clone, Debug)]
pub struct ComponentMap {
    ids: Array3<ComponentId>,
    components: Vec<Component>,
    members: Vec<Vec<Idx3d>>,
    connectivity: Connectivity,
}

impl ComponentMap {
    /// 每个体素所属的分量编号. 背景为 0.
    #[inline]
    pub fn ids(&self) -> &Array3<ComponentId> {
        &self.ids
    }

    /// 所有分量, 按编号升序排列.
    #[inline]
    pub fn components(&self) -> &[Component] {
        &self.components
    }

    /// 获取编号为 `id` 的分量.
    #[inline]
    pub fn get(&self, id: ComponentId) -> Option<&Component> {
        (id as usize)
            .checked_sub(1)
            .and_then(|i| self.components.get(i))
    }

    /// 编号为 `id` 的分量的全部体素, 按 BFS 访问顺序给出.
    #[inline]
    pub fn voxels(&self, id: ComponentId) -> &[Idx3d] {
        (id as usize)
            .checked_sub(1)
            .and_then(|i| self.members.get(i))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// 标记时使用的连通性.
    #[inline]
    pub fn connectivity(&self) -> Connectivity {
        self.connectivity
    }

    /// 分量个数.
    #[inline]
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// 是否不含任何分量?
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// 拆分为编号图、分量列表和各分量的体素列表.
    #[inline]
    pub(crate) fn into_parts(self) -> (Array3<ComponentId>, Vec<Component>, Vec<Vec<Idx3d>>) {
        (self.ids, self.components, self.members)
    }
}

/// 按 `connectivity` 标记 `labels` 中所有同标签连通分量.
///
/// 分量只由标签相同的体素组成, 不会先把所有前景合并成一体再按多数票确定标签.
/// 因此相邻的不同标签区域互为邻居分量.
///
/// 分量编号从 1 开始, 按各分量首个体素的行优先顺序分配. 使用迭代 BFS, 不会递归.
pub fn label_components(labels: ArrayView3<u8>, connectivity: Connectivity) -> ComponentMap {
    let grid = Grid3d::new(labels.dim(), connectivity);
    let mut ids = Array3::<ComponentId>::zeros(labels.dim());
    let mut components = Vec::new();
    let mut members = Vec::new();
    let mut bfs_q = VecDeque::new();

    for (pos, &label) in labels.indexed_iter() {
        if ElemType::of(label).is_background() || ids[pos] != 0 {
            continue;
        }
        let id = components.len() as ComponentId + 1;
        ids[pos] = id;
        bfs_q.push_back(pos);

        let mut voxels = Vec::new();
        let (mut lo, mut hi) = (pos, pos);
        while let Some(cur) = bfs_q.pop_front() {
            voxels.push(cur);
            lo = (lo.0.min(cur.0), lo.1.min(cur.1), lo.2.min(cur.2));
            hi = (hi.0.max(cur.0), hi.1.max(cur.1), hi.2.max(cur.2));
            for neigh in grid.neighbours(cur) {
                if ids[neigh] == 0 && labels[neigh] == label {
                    ids[neigh] = id;
                    bfs_q.push_back(neigh);
                }
            }
        }

        components.push(Component {
            id,
            label,
            voxel_count: voxels.len(),
            bounds: (lo, hi),
        });
        members.push(voxels);
    }

    ComponentMap {
        ids,
        components,
        members,
        connectivity,
    }
}
