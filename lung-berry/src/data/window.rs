/// CT 窗口, 包含窗位 (window level) 和窗宽 (window width).
///
/// 该窗口是只读的. 若要修改窗口参数, 你应该创建新的实例.
///
/// 该窗口负责把 CT HU 值规范化到 `[0, 1]`, 作为分类网络的输入.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CtWindow {
    level: f32,
    width: f32,
}

impl CtWindow {
    /// 构建 CT 窗.
    ///
    /// `level` 和 `width` 必须在合理范围内, 否则返回 `None`.
    pub fn new(level: f32, width: f32) -> Option<CtWindow> {
        if (-1e5..=1e5).contains(&level) && 0.0 < width && width <= 1e5 {
            Some(Self { level, width })
        } else {
            None
        }
    }

    /// 由窗下限 `lower` 和窗上限 `upper` 构建 CT 窗.
    ///
    /// 要求 `lower < upper`, 否则返回 `None`.
    pub fn from_bounds(lower: f32, upper: f32) -> Option<CtWindow> {
        if !(lower.is_finite() && upper.is_finite()) || lower >= upper {
            return None;
        }
        Self::new((lower + upper) / 2.0, upper - lower)
    }

    /// 构建分类网络输入使用的 CT 窗口. 窗下限为 -1024 (空气),
    /// 窗上限为 600, 即窗位 -212, 窗宽 1624.
    #[inline]
    pub const fn lung_input() -> CtWindow {
        Self {
            level: -212.0,
            width: 1624.0,
        }
    }

    /// 窗下限.
    #[inline]
    pub fn lower_bound(&self) -> f32 {
        self.level - self.width / 2.0
    }

    /// 窗上限.
    #[inline]
    pub fn upper_bound(&self) -> f32 {
        self.level + self.width / 2.0
    }

    /// 窗位.
    #[inline]
    pub fn level(&self) -> f32 {
        self.level
    }

    /// 窗宽.
    #[inline]
    pub fn width(&self) -> f32 {
        self.width
    }

    /// 将 `ct` 截断到窗口范围内. 非有限值被视为窗下限.
    #[inline]
    pub fn clip(&self, ct: f32) -> f32 {
        if ct.is_nan() {
            return self.lower_bound();
        }
        num::clamp(ct, self.lower_bound(), self.upper_bound())
    }

    /// 将 `ct` 截断后线性映射到 `[0, 1]`.
    ///
    /// 越界值饱和到 0 或 1, 不会报错. NaN 映射为 0.
    #[inline]
    pub fn normalize(&self, ct: f32) -> f32 {
        (self.clip(ct) - self.lower_bound()) / self.width
    }
}

impl Default for CtWindow {
    #[inline]
    fn default() -> Self {
        Self::lung_input()
    }
}

#[cfg(test)]
mod tests {
    use crate::CtWindow;

    fn is_valid_init(level: f32, width: f32) -> bool {
        CtWindow::new(level, width).is_some()
    }

    #[test]
    fn test_ct_window_invalid_input() {
        assert!(!is_valid_init(0.0, -1.0));
        assert!(!is_valid_init(0.0, 0.0));
        assert!(CtWindow::from_bounds(10.0, 10.0).is_none());
        assert!(CtWindow::from_bounds(f32::NAN, 10.0).is_none());
    }

    #[test]
    fn test_lung_input_bounds() {
        let w = CtWindow::lung_input();
        assert_eq!(w.lower_bound(), -1024.0);
        assert_eq!(w.upper_bound(), 600.0);
        assert_eq!(CtWindow::from_bounds(-1024.0, 600.0), Some(w));
    }

    #[test]
    fn test_normalize_saturates() {
        let w = CtWindow::lung_input();
        assert_eq!(w.normalize(-3000.0), 0.0);
        assert_eq!(w.normalize(-1024.0), 0.0);
        assert_eq!(w.normalize(600.0), 1.0);
        assert_eq!(w.normalize(3000.0), 1.0);
        assert_eq!(w.normalize(f32::NAN), 0.0);
        assert_eq!(w.normalize(f32::INFINITY), 1.0);
        assert!((w.normalize(-212.0) - 0.5).abs() < 1e-6);
    }
}
