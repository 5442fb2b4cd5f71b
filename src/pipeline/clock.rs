//! 帧计时: 瞬时 FPS (相邻两帧间隔的倒数) 与会话运行时长

use std::time::Instant;

#[derive(Debug, Clone)]
pub struct FrameClock {
    start: Instant,
    prev: Option<Instant>,
}

impl FrameClock {
    pub fn new(start: Instant) -> Self {
        Self { start, prev: None }
    }

    /// 记录一帧, 返回瞬时 FPS; 第一帧或时间未前进时为 0
    pub fn tick(&mut self, now: Instant) -> f64 {
        let fps = match self.prev {
            Some(prev) => {
                let dt = now.saturating_duration_since(prev).as_secs_f64();
                if dt > 0.0 {
                    1.0 / dt
                } else {
                    0.0
                }
            }
            None => 0.0,
        };
        self.prev = Some(now);
        fps
    }

    /// 会话开始至今的秒数
    pub fn elapsed(&self, now: Instant) -> f64 {
        now.saturating_duration_since(self.start).as_secs_f64()
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new(Instant::now())
    }
}
