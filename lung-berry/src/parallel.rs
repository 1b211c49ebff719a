//! 按索引的 (可选) 并行映射.

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use rayon::iter::{IntoParallelIterator, ParallelIterator};

        /// 对 `0..n` 的每个索引执行 `op`, 并按索引顺序收集结果.
        /// 任意一次失败即返回 `Err`.
        ///
        /// `parallel` 为 `true` 时借助 `rayon` 并行执行.
        pub(crate) fn try_map_indexed<T, E, F>(n: usize, parallel: bool, op: F) -> Result<Vec<T>, E>
        where
            T: Send,
            E: Send,
            F: Fn(usize) -> Result<T, E> + Sync + Send,
        {
            if parallel {
                (0..n).into_par_iter().map(op).collect()
            } else {
                (0..n).map(op).collect()
            }
        }
    } else {
        /// 对 `0..n` 的每个索引执行 `op`, 并按索引顺序收集结果.
        /// 任意一次失败即返回 `Err`.
        ///
        /// 未启用 `rayon` feature, 因此 `parallel` 被忽略.
        pub(crate) fn try_map_indexed<T, E, F>(n: usize, _parallel: bool, op: F) -> Result<Vec<T>, E>
        where
            F: Fn(usize) -> Result<T, E>,
        {
            (0..n).map(op).collect()
        }
    }
}
