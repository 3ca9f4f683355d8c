//! Scroll animation state
//!
//! `scroll_to` starts an animation, `update` advances it to the current
//! instant and returns the interpolated offset.

use std::time::Duration;

use tokio::time::Instant;

use super::timing::{is_complete, lerp, progress};
use crate::config::{EasingType, ScrollConfig};

#[derive(Debug, Clone)]
struct ActiveAnimation {
    start: Instant,
    from: f64,
    to: f64,
    duration: Duration,
    easing: EasingType,
}

#[derive(Debug, Clone)]
pub struct ScrollAnimator {
    animation: Option<ActiveAnimation>,
    config: ScrollConfig,
    /// Always up to date with the last `update`
    current_scroll: f64,
}

impl ScrollAnimator {
    pub fn new(config: ScrollConfig) -> Self {
        Self {
            animation: None,
            config,
            current_scroll: 0.0,
        }
    }

    #[inline]
    pub fn is_animating(&self) -> bool {
        self.animation.is_some()
    }

    /// Final offset of the running animation, or the current one
    pub fn target_scroll(&self) -> f64 {
        self.animation
            .as_ref()
            .map(|a| a.to)
            .unwrap_or(self.current_scroll)
    }

    #[inline]
    pub fn current_scroll(&self) -> f64 {
        self.current_scroll
    }

    /// Jump without animating
    pub fn set_scroll(&mut self, scroll: f64) {
        self.animation = None;
        self.current_scroll = scroll;
    }

    /// Start animating towards `target` from the current offset
    ///
    /// Jumps straight there when smooth scrolling is off.
    pub fn scroll_to(&mut self, target: f64) {
        let target = target.max(0.0);

        if !self.config.is_smooth() {
            self.set_scroll(target);
            return;
        }

        let from = self.current_scroll;
        if (from - target).abs() < 0.5 {
            self.set_scroll(target);
            return;
        }

        self.animation = Some(ActiveAnimation {
            start: Instant::now(),
            from,
            to: target,
            duration: self.config.animation_duration(),
            easing: self.config.easing,
        });
    }

    /// Advance the animation and return the current offset
    pub fn update(&mut self) -> f64 {
        if let Some(ref anim) = self.animation {
            if is_complete(anim.start, anim.duration) {
                self.current_scroll = anim.to;
                self.animation = None;
            } else {
                let t = anim.easing.apply(progress(anim.start, anim.duration));
                self.current_scroll = lerp(anim.from, anim.to, t).round();
            }
        }
        self.current_scroll
    }

    pub fn cancel(&mut self) {
        self.animation = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instant_scroll_when_disabled() {
        let config = ScrollConfig {
            smooth_enabled: false,
            ..Default::default()
        };
        let mut animator = ScrollAnimator::new(config);

        animator.scroll_to(100.0);
        assert_eq!(animator.current_scroll(), 100.0);
        assert!(!animator.is_animating());
    }

    #[test]
    fn test_negative_target_is_clamped() {
        let mut animator = ScrollAnimator::new(ScrollConfig::default());
        animator.set_scroll(40.0);
        animator.scroll_to(-30.0);
        assert_eq!(animator.target_scroll(), 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_animation_reaches_target() {
        let config = ScrollConfig {
            animation_duration_ms: 100,
            easing: EasingType::Linear,
            ..Default::default()
        };
        let mut animator = ScrollAnimator::new(config);
        animator.scroll_to(200.0);
        assert!(animator.is_animating());
        assert_eq!(animator.target_scroll(), 200.0);

        tokio::time::advance(Duration::from_millis(50)).await;
        assert_eq!(animator.update(), 100.0);

        tokio::time::advance(Duration::from_millis(60)).await;
        assert_eq!(animator.update(), 200.0);
        assert!(!animator.is_animating());
    }

    #[test]
    fn test_cancel_stops_in_place() {
        let mut animator = ScrollAnimator::new(ScrollConfig::default());
        animator.scroll_to(500.0);
        animator.cancel();
        assert!(!animator.is_animating());
        assert_eq!(animator.update(), 0.0);
    }
}
