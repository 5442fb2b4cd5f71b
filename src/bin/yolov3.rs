/// YOLOv3 检测演示 (图片 / 视频 / 摄像头 + 视线追踪)
///
/// 主程序入口 - 直接运行: cargo run --bin yolov3 --release -- -i dog.jpg
use clap::Parser;
use log::error;
use mimalloc::MiMalloc;

use yolov3_gaze::Args;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    if let Err(e) = yolov3_gaze::pipeline::run(args) {
        error!("❌ {:#}", e);
        std::process::exit(1);
    }
}
