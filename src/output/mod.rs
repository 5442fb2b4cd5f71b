/// 输出系统
///
/// - VideoWriter: 标注帧 → MJPEG `.avi` (视频模式)
/// - DetectionLog: 逐对象检测记录 → CSV (摄像头模式)
pub mod detection_log;
pub mod video_writer;

pub use detection_log::{DetectionLog, DetectionLogRecord};
pub use video_writer::{FrameFeed, VideoWriter, AVERROR_EOF, DEFAULT_OUTPUT_FPS};
