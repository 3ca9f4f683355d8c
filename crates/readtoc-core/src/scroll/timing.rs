//! Animation clock helpers
//!
//! Built on `tokio::time::Instant` so animations follow a paused test clock.

use std::time::Duration;

use tokio::time::Instant;

use crate::config::ScrollConfig;

/// Fraction of `duration` elapsed since `start`, clamped to [0, 1]
#[inline]
pub fn progress(start: Instant, duration: Duration) -> f64 {
    if duration.is_zero() {
        return 1.0;
    }
    let ratio = start.elapsed().as_secs_f64() / duration.as_secs_f64();
    ratio.clamp(0.0, 1.0)
}

#[inline]
pub fn is_complete(start: Instant, duration: Duration) -> bool {
    start.elapsed() >= duration
}

#[inline]
pub fn lerp(from: f64, to: f64, t: f64) -> f64 {
    from + (to - from) * t
}

impl ScrollConfig {
    #[inline]
    pub fn animation_duration(&self) -> Duration {
        Duration::from_millis(self.animation_duration_ms)
    }

    /// Frame period for the configured FPS
    #[inline]
    pub fn frame_duration(&self) -> Duration {
        if self.animation_fps == 0 {
            Duration::from_millis(16) // ~60fps fallback
        } else {
            Duration::from_millis(1000 / self.animation_fps as u64)
        }
    }

    /// Smooth scrolling is on and has a non-zero duration
    #[inline]
    pub fn is_smooth(&self) -> bool {
        self.smooth_enabled && self.animation_duration_ms > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lerp() {
        assert_eq!(lerp(0.0, 100.0, 0.0), 0.0);
        assert_eq!(lerp(0.0, 100.0, 0.5), 50.0);
        assert_eq!(lerp(200.0, 100.0, 1.0), 100.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_progress_follows_clock() {
        let start = Instant::now();
        let duration = Duration::from_millis(200);
        assert_eq!(progress(start, Duration::ZERO), 1.0);
        assert!(!is_complete(start, duration));

        tokio::time::advance(Duration::from_millis(50)).await;
        assert!((progress(start, duration) - 0.25).abs() < 0.001);

        tokio::time::advance(Duration::from_millis(500)).await;
        assert_eq!(progress(start, duration), 1.0);
        assert!(is_complete(start, duration));
    }

    #[test]
    fn test_frame_duration() {
        let mut config = ScrollConfig::default();
        assert_eq!(config.frame_duration(), Duration::from_millis(16));
        config.animation_fps = 0;
        assert_eq!(config.frame_duration(), Duration::from_millis(16));
        config.animation_fps = 30;
        assert_eq!(config.frame_duration(), Duration::from_millis(33));
    }

    #[test]
    fn test_is_smooth() {
        let mut config = ScrollConfig::default();
        assert!(config.is_smooth());

        config.smooth_enabled = false;
        assert!(!config.is_smooth());

        config.smooth_enabled = true;
        config.animation_duration_ms = 0;
        assert!(!config.is_smooth());
    }
}
