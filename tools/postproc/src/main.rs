//! 对磁盘上的逐切片预测标签执行三维后处理.
//!
//! 输入输出路径与参数见 `utils::loader`.

mod result;
mod runner;

use log::error;

fn main() {
    utils::init_logger();
    match runner::run() {
        Ok(r) => r.analyze(),
        Err(e) => {
            error!("{e}");
            std::process::exit(1);
        }
    }
}
