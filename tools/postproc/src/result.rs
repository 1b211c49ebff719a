//! 运行结果.

use lung_berry::post_proc::PostprocReport;
use lung_berry::Idx3d;
use std::io::{self, Write};
use std::time::Duration;

/// 后处理运行结果.
pub struct PostprocResult {
    pub shape: Idx3d,
    pub foreground_before_mm3: f64,
    pub foreground_after_mm3: f64,

    /// 处理后右肺与左肺的体素个数.
    pub lung_voxels: [usize; 2],
    pub report: PostprocReport,
    pub elapsed: Duration,
}

impl PostprocResult {
    /// 将结果写进 `w` 中.
    fn describe_into<W: Write>(&self, w: &mut W) -> io::Result<()> {
        const S4: &str = "    ";

        let r = &self.report;
        writeln!(w, "Postprocessing of {:?}:", self.shape)?;
        writeln!(w, "{S4}Components: {}", r.components)?;
        writeln!(w, "{S4}Absorbed into neighbours: {}", r.absorbed)?;
        writeln!(w, "{S4}Dropped to background: {}", r.dropped)?;
        writeln!(w, "{S4}Hole voxels filled: {}", r.holes_filled)?;
        writeln!(
            w,
            "{S4}Foreground: {:.1} mm3 -> {:.1} mm3",
            self.foreground_before_mm3, self.foreground_after_mm3
        )?;
        let [right, left] = self.lung_voxels;
        writeln!(w, "{S4}Lung voxels (right, left): ({right}, {left})")?;
        write!(w, "{S4}Time: {} us", self.elapsed.as_micros())?;
        Ok(())
    }

    /// 打印运行结果.
    pub fn analyze(&self) {
        let mut out = io::stdout().lock();
        let _ = utils::sep_to(&mut out)
            .and_then(|_| self.describe_into(&mut out))
            .and_then(|_| writeln!(out))
            .and_then(|_| utils::sep_to(&mut out));
    }
}
