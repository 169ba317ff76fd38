//! 队列进度：按剩余命令数检测变化，避免每帧重绘统计面板

#[derive(Debug, Clone)]
pub struct ProgressTracker {
    total: usize,
    remaining: usize,
    changed: bool,
}

impl ProgressTracker {
    /// 初始 changed = true，保证首帧绘制
    pub fn new(total: usize) -> Self {
        Self {
            total,
            remaining: total,
            changed: true,
        }
    }

    /// 记录最新剩余数；与上次不同时返回 true
    pub fn update(&mut self, remaining: usize) -> bool {
        self.changed = remaining != self.remaining;
        self.remaining = remaining;
        self.changed
    }

    pub fn changed(&self) -> bool {
        self.changed
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn remaining(&self) -> usize {
        self.remaining
    }

    pub fn processed(&self) -> usize {
        self.total.saturating_sub(self.remaining)
    }

    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        self.processed() as f64 * 100.0 / self.total as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_changed_once_per_shrink() {
        let mut tracker = ProgressTracker::new(10);
        assert!(tracker.changed());
        assert!(!tracker.update(10));
        assert!(tracker.update(9));
        assert!(!tracker.update(9));
        assert!(!tracker.update(9));
        assert!(tracker.update(8));
        assert_eq!(tracker.processed(), 2);
        assert!((tracker.percent() - 20.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_empty_queue_is_complete() {
        let tracker = ProgressTracker::new(0);
        assert_eq!(tracker.percent(), 100.0);
        assert_eq!(tracker.processed(), 0);
    }
}
