//! 检测节流器
//!
//! 每 K 帧运行一次检测器 (第 0, K, 2K ... 帧), 中间的帧复用上一次检测结果.
//! 复用的结果与检测帧产出的是同一个 `Arc`, 不会重新计算或拷贝.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use image::RgbImage;

use super::{Detector, DetectorError};
use crate::DetectionResult;

/// 默认检测间隔
pub const DEFAULT_DETECT_INTERVAL: usize = 6;

/// 节流状态机
#[derive(Debug, Clone, Default)]
pub enum ThrottleState {
    /// 还没有可用结果 (第一帧之前, 或上一次检测失败之后)
    #[default]
    NeedsDetection,
    /// 持有最近一次检测帧的结果
    HasCachedResult {
        result: Arc<DetectionResult>,
        /// 产生该结果的那次检测耗时
        latency: Duration,
        /// 下一帧在周期内的位置, 达到周期长度时重新检测
        phase: usize,
    },
}

/// 单帧节流结果
#[derive(Debug, Clone)]
pub struct ThrottleOutcome {
    /// 会话内帧序号 (从 0 开始)
    pub frame_index: u64,
    pub result: Arc<DetectionResult>,
    /// true 表示本帧运行了检测器
    pub fresh: bool,
    /// 产生 `result` 的那次检测耗时
    pub latency: Duration,
}

pub struct DetectionThrottler {
    period: NonZeroUsize,
    state: ThrottleState,
    frame_index: u64,
    detections: u64,
}

impl DetectionThrottler {
    pub fn new(period: NonZeroUsize) -> Self {
        Self {
            period,
            state: ThrottleState::NeedsDetection,
            frame_index: 0,
            detections: 0,
        }
    }

    /// 从配置值创建, 0 是非法间隔
    pub fn from_interval(interval: usize) -> Result<Self> {
        let period =
            NonZeroUsize::new(interval).ok_or_else(|| anyhow!("检测间隔必须 >= 1, 当前: 0"))?;
        Ok(Self::new(period))
    }

    /// 处理一帧: 检测帧调用检测器, 其余帧返回缓存结果
    ///
    /// 检测失败时丢弃缓存并回到 `NeedsDetection`, 帧序号不前进, 下一次调用会重试同一个检测位
    pub fn step<D: Detector + ?Sized>(
        &mut self,
        detector: &mut D,
        frame: &RgbImage,
    ) -> Result<ThrottleOutcome, DetectorError> {
        let frame_index = self.frame_index;
        let state = std::mem::take(&mut self.state);

        let outcome = match state {
            ThrottleState::HasCachedResult {
                result,
                latency,
                phase,
            } if phase < self.period.get() => {
                self.state = ThrottleState::HasCachedResult {
                    result: Arc::clone(&result),
                    latency,
                    phase: phase + 1,
                };
                ThrottleOutcome {
                    frame_index,
                    result,
                    fresh: false,
                    latency,
                }
            }
            _ => {
                let t = Instant::now();
                let result = Arc::new(detector.detect(frame)?);
                let latency = t.elapsed();
                self.detections += 1;
                self.state = ThrottleState::HasCachedResult {
                    result: Arc::clone(&result),
                    latency,
                    phase: 1,
                };
                ThrottleOutcome {
                    frame_index,
                    result,
                    fresh: true,
                    latency,
                }
            }
        };

        self.frame_index += 1;
        Ok(outcome)
    }

    /// 下一帧是否需要检测
    pub fn needs_detection(&self) -> bool {
        match &self.state {
            ThrottleState::NeedsDetection => true,
            ThrottleState::HasCachedResult { phase, .. } => *phase >= self.period.get(),
        }
    }

    /// 清空缓存, 下一帧强制检测
    pub fn reset(&mut self) {
        self.state = ThrottleState::NeedsDetection;
    }

    pub fn state(&self) -> &ThrottleState {
        &self.state
    }

    pub fn cached(&self) -> Option<&Arc<DetectionResult>> {
        match &self.state {
            ThrottleState::HasCachedResult { result, .. } => Some(result),
            ThrottleState::NeedsDetection => None,
        }
    }

    pub fn period(&self) -> usize {
        self.period.get()
    }

    /// 已处理的帧数
    pub fn frames(&self) -> u64 {
        self.frame_index
    }

    /// 检测器实际运行次数
    pub fn detections(&self) -> u64 {
        self.detections
    }
}

impl Default for DetectionThrottler {
    fn default() -> Self {
        Self::new(NonZeroUsize::new(DEFAULT_DETECT_INTERVAL).unwrap_or(NonZeroUsize::MIN))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Bbox;

    /// 每次调用返回一个新结果, 并记录被调用的帧序号
    struct CountingDetector {
        calls: Vec<u64>,
        next: u64,
        fail_on_call: Option<usize>,
    }

    impl CountingDetector {
        fn new() -> Self {
            Self {
                calls: Vec::new(),
                next: 0,
                fail_on_call: None,
            }
        }
    }

    impl Detector for CountingDetector {
        fn detect(&mut self, _frame: &RgbImage) -> Result<DetectionResult, DetectorError> {
            let call = self.calls.len();
            let seq = self.next;
            self.next += 1;
            if self.fail_on_call == Some(call) {
                self.fail_on_call = None;
                return Err(DetectorError::Inference("模型不可读".into()));
            }
            self.calls.push(seq);
            Ok(DetectionResult::new(vec![Bbox::new(
                seq as f32, 0., 10., 10., 0, 0.9,
            )]))
        }
    }

    fn frame() -> RgbImage {
        RgbImage::new(4, 4)
    }

    #[test]
    fn first_frame_always_detects() {
        let mut det = CountingDetector::new();
        let mut t = DetectionThrottler::from_interval(6).unwrap();
        assert!(t.needs_detection());
        let out = t.step(&mut det, &frame()).unwrap();
        assert!(out.fresh);
        assert_eq!(out.frame_index, 0);
        assert_eq!(det.calls.len(), 1);
    }

    #[test]
    fn thirteen_frames_with_period_six_detect_twice() {
        let mut det = CountingDetector::new();
        let mut t = DetectionThrottler::from_interval(6).unwrap();
        let fresh: Vec<u64> = (0..13)
            .map(|_| t.step(&mut det, &frame()).unwrap())
            .filter(|o| o.fresh)
            .map(|o| o.frame_index)
            .collect();
        assert_eq!(fresh, vec![0, 6]);
        assert_eq!(t.detections(), 2);
        assert_eq!(t.frames(), 13);
    }

    #[test]
    fn detection_runs_exactly_on_multiples_of_period() {
        for period in 1..=7usize {
            let mut det = CountingDetector::new();
            let mut t = DetectionThrottler::from_interval(period).unwrap();
            for i in 0..40u64 {
                let out = t.step(&mut det, &frame()).unwrap();
                assert_eq!(out.fresh, i % period as u64 == 0, "period={period} frame={i}");
            }
        }
    }

    #[test]
    fn skip_frames_share_the_same_allocation() {
        let mut det = CountingDetector::new();
        let mut t = DetectionThrottler::from_interval(3).unwrap();
        let first = t.step(&mut det, &frame()).unwrap();
        let second = t.step(&mut det, &frame()).unwrap();
        let third = t.step(&mut det, &frame()).unwrap();
        assert!(Arc::ptr_eq(&first.result, &second.result));
        assert!(Arc::ptr_eq(&first.result, &third.result));
        assert_eq!(second.latency, first.latency);

        let fourth = t.step(&mut det, &frame()).unwrap();
        assert!(fourth.fresh);
        assert!(!Arc::ptr_eq(&first.result, &fourth.result));
    }

    #[test]
    fn empty_result_is_cached_like_any_other() {
        struct Nothing(usize);
        impl Detector for Nothing {
            fn detect(&mut self, _: &RgbImage) -> Result<DetectionResult, DetectorError> {
                self.0 += 1;
                Ok(DetectionResult::empty())
            }
        }

        let mut det = Nothing(0);
        let mut t = DetectionThrottler::from_interval(4).unwrap();
        let a = t.step(&mut det, &frame()).unwrap();
        let b = t.step(&mut det, &frame()).unwrap();
        assert!(a.result.is_empty());
        assert!(Arc::ptr_eq(&a.result, &b.result));
        assert_eq!(det.0, 1);
    }

    #[test]
    fn failure_on_detect_frame_is_not_masked_by_cache() {
        let mut det = CountingDetector::new();
        let mut t = DetectionThrottler::from_interval(2).unwrap();
        t.step(&mut det, &frame()).unwrap();
        t.step(&mut det, &frame()).unwrap();

        det.fail_on_call = Some(1);
        let err = t.step(&mut det, &frame()).unwrap_err();
        assert!(matches!(err, DetectorError::Inference(_)));
        assert!(t.cached().is_none());
        assert_eq!(t.frames(), 2);

        // 重试同一个检测位
        let out = t.step(&mut det, &frame()).unwrap();
        assert!(out.fresh);
        assert_eq!(out.frame_index, 2);
    }

    #[test]
    fn zero_interval_is_rejected() {
        assert!(DetectionThrottler::from_interval(0).is_err());
    }

    #[test]
    fn reset_forces_detection_on_next_frame() {
        let mut det = CountingDetector::new();
        let mut t = DetectionThrottler::from_interval(6).unwrap();
        t.step(&mut det, &frame()).unwrap();
        assert!(!t.needs_detection());
        t.reset();
        assert!(t.needs_detection());
        assert!(t.step(&mut det, &frame()).unwrap().fresh);
    }
}
