use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::core::{ReplayError, ReplayResult};

const SECOND: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateAction {
    Capture,
    Wait,
}

/// How the per-second reference point moves once a second has elapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryPolicy {
    /// Advance by exactly one second per closed second (drift-free).
    #[default]
    FixedStep,
    /// Re-anchor at the observation time. Lets late ticks accumulate drift.
    ResetToNow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RateStats {
    pub frames_this_second: u32,
    pub completed_seconds: u64,
    pub total_frames_in_completed_seconds: u64,
}

/// Caps captures at `target_rate` per wall-clock second and measures the
/// rate actually achieved.
pub struct RateController {
    target_rate: u32,
    policy: BoundaryPolicy,
    boundary: Option<Instant>,
    stats: RateStats,
}

impl RateController {
    pub fn new(target_rate: u32, policy: BoundaryPolicy) -> Self {
        Self {
            target_rate,
            policy,
            boundary: None,
            stats: RateStats::default(),
        }
    }

    pub fn target_rate(&self) -> u32 {
        self.target_rate
    }

    pub fn policy(&self) -> BoundaryPolicy {
        self.policy
    }

    pub fn tick(&mut self) -> RateAction {
        self.tick_at(Instant::now())
    }

    /// One loop iteration observed at `now`. The first call anchors the
    /// second boundary. Only decides; a frame counts once `record_capture`
    /// confirms it was stored.
    pub fn tick_at(&mut self, now: Instant) -> RateAction {
        let boundary = *self.boundary.get_or_insert(now);
        self.close_elapsed_seconds(boundary, now);

        if self.stats.frames_this_second < self.target_rate {
            RateAction::Capture
        } else {
            RateAction::Wait
        }
    }

    /// Counts one frame that made it into the buffer in the current second.
    pub fn record_capture(&mut self) {
        self.stats.frames_this_second = self.stats.frames_this_second.saturating_add(1);
    }

    fn close_elapsed_seconds(&mut self, mut boundary: Instant, now: Instant) {
        while now.saturating_duration_since(boundary) >= SECOND {
            self.stats.completed_seconds += 1;
            self.stats.total_frames_in_completed_seconds += self.stats.frames_this_second as u64;
            self.stats.frames_this_second = 0;

            match self.policy {
                BoundaryPolicy::FixedStep => boundary += SECOND,
                BoundaryPolicy::ResetToNow => {
                    boundary = now;
                    break;
                }
            }
        }
        self.boundary = Some(boundary);
    }

    /// Mean captures per completed second, truncated.
    pub fn realized_average_rate(&self) -> ReplayResult<u32> {
        if self.stats.completed_seconds == 0 {
            return Err(ReplayError::InsufficientData {
                completed_seconds: 0,
            });
        }
        let avg = self.stats.total_frames_in_completed_seconds / self.stats.completed_seconds;
        Ok(avg.min(u32::MAX as u64) as u32)
    }

    pub fn stats(&self) -> RateStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    // tick and, on Capture, pretend the grab succeeded
    fn capture_at(rc: &mut RateController, now: Instant) -> RateAction {
        let action = rc.tick_at(now);
        if action == RateAction::Capture {
            rc.record_capture();
        }
        action
    }

    #[test]
    fn test_caps_at_target_within_one_second() {
        let mut rc = RateController::new(3, BoundaryPolicy::FixedStep);
        let t0 = Instant::now();

        for i in 0..3 {
            assert_eq!(capture_at(&mut rc, t0 + ms(i * 10)), RateAction::Capture);
        }
        for i in 3..50 {
            assert_eq!(capture_at(&mut rc, t0 + ms(i * 10)), RateAction::Wait);
        }
        assert_eq!(rc.stats().frames_this_second, 3);
    }

    #[test]
    fn test_unrecorded_ticks_do_not_count() {
        let mut rc = RateController::new(3, BoundaryPolicy::FixedStep);
        let t0 = Instant::now();

        // every grab failed: the controller keeps asking for frames
        for i in 0..10 {
            assert_eq!(rc.tick_at(t0 + ms(i * 10)), RateAction::Capture);
        }
        assert_eq!(rc.stats().frames_this_second, 0);

        rc.record_capture();
        rc.tick_at(t0 + ms(1000));
        assert_eq!(rc.stats().total_frames_in_completed_seconds, 1);
        assert_eq!(rc.realized_average_rate().unwrap(), 1);
    }

    #[test]
    fn test_boundary_resets_per_second_counter() {
        let mut rc = RateController::new(2, BoundaryPolicy::FixedStep);
        let t0 = Instant::now();

        capture_at(&mut rc, t0);
        capture_at(&mut rc, t0 + ms(100));
        assert_eq!(capture_at(&mut rc, t0 + ms(200)), RateAction::Wait);

        assert_eq!(capture_at(&mut rc, t0 + ms(1000)), RateAction::Capture);
        let stats = rc.stats();
        assert_eq!(stats.completed_seconds, 1);
        assert_eq!(stats.total_frames_in_completed_seconds, 2);
        assert_eq!(stats.frames_this_second, 1);
    }

    #[test]
    fn test_average_needs_a_completed_second() {
        let mut rc = RateController::new(10, BoundaryPolicy::FixedStep);
        let t0 = Instant::now();
        capture_at(&mut rc, t0);
        assert!(matches!(
            rc.realized_average_rate(),
            Err(ReplayError::InsufficientData { .. })
        ));

        for i in 1..7 {
            capture_at(&mut rc, t0 + ms(i * 100));
        }
        // 7 captures in the first second, the boundary tick opens the second one
        capture_at(&mut rc, t0 + ms(1000));
        assert_eq!(rc.realized_average_rate().unwrap(), 7);
    }

    #[test]
    fn test_average_truncates() {
        let mut rc = RateController::new(100, BoundaryPolicy::FixedStep);
        let t0 = Instant::now();

        for i in 0..5 {
            capture_at(&mut rc, t0 + ms(i));
        }
        // boundary tick counts as the first capture of second two
        capture_at(&mut rc, t0 + ms(1000));
        capture_at(&mut rc, t0 + ms(1001));
        capture_at(&mut rc, t0 + ms(2000));
        // (5 + 2) / 2
        assert_eq!(rc.realized_average_rate().unwrap(), 3);
    }

    #[test]
    fn test_fixed_step_does_not_drift() {
        let mut rc = RateController::new(1000, BoundaryPolicy::FixedStep);
        let t0 = Instant::now();
        capture_at(&mut rc, t0);
        // late observation, 300 ms past the boundary
        capture_at(&mut rc, t0 + ms(1300));
        assert_eq!(rc.stats().completed_seconds, 1);
        // next boundary still at t0 + 2s
        capture_at(&mut rc, t0 + ms(2000));
        assert_eq!(rc.stats().completed_seconds, 2);
    }

    #[test]
    fn test_reset_to_now_drifts() {
        let mut rc = RateController::new(1000, BoundaryPolicy::ResetToNow);
        let t0 = Instant::now();
        capture_at(&mut rc, t0);
        capture_at(&mut rc, t0 + ms(1300));
        capture_at(&mut rc, t0 + ms(2000));
        assert_eq!(rc.stats().completed_seconds, 1);
        capture_at(&mut rc, t0 + ms(2300));
        assert_eq!(rc.stats().completed_seconds, 2);
    }

    #[test]
    fn test_fixed_step_closes_every_second_of_a_stall() {
        let mut rc = RateController::new(10, BoundaryPolicy::FixedStep);
        let t0 = Instant::now();
        for i in 0..4 {
            capture_at(&mut rc, t0 + ms(i));
        }
        capture_at(&mut rc, t0 + ms(3500));

        let stats = rc.stats();
        assert_eq!(stats.completed_seconds, 3);
        assert_eq!(stats.total_frames_in_completed_seconds, 4);
        assert_eq!(rc.realized_average_rate().unwrap(), 1);

        let mut parity = RateController::new(10, BoundaryPolicy::ResetToNow);
        for i in 0..4 {
            capture_at(&mut parity, t0 + ms(i));
        }
        capture_at(&mut parity, t0 + ms(3500));
        assert_eq!(parity.stats().completed_seconds, 1);
        assert_eq!(parity.realized_average_rate().unwrap(), 4);
    }
}
