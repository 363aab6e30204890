//! [`TorqueLimiter`] – absolute, per-step and real-time torque envelope.
//!
//! Three checks run on every steering command while controls are allowed:
//!
//! 1. **Absolute**: `|desired| <= max_steer`.
//! 2. **Per-step** ([`LimitMode::DriverLimited`]): the command may grow by at
//!    most `max_rate_up` and must shrink by at least what the driver's
//!    counter-torque demands, never faster than `max_rate_down` is required.
//! 3. **Real-time**: the command may not drift more than `max_rt_delta` from
//!    the anchor value latched at the start of the current real-time
//!    interval.  This catches many compliant small steps adding up to an
//!    unsafe jump.
//!
//! While controls are not allowed only a zero command is admissible.  Any
//! violation, and any command while not allowed, resets the limiter to zero.

use steergate_types::{GatewayError, RateWindow};

use crate::profile::{LimitMode, SteeringLimits};
use crate::telemetry::SampleRing;

/// Rate-limit memory carried between steering commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TorqueLimiter {
    desired_last: i32,
    rt_anchor: i32,
    rt_anchor_ts_us: u64,
}

impl TorqueLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last torque admitted (zero after a reset).
    pub fn desired_last(&self) -> i32 {
        self.desired_last
    }

    /// Torque latched at the start of the current real-time interval.
    pub fn rt_anchor(&self) -> i32 {
        self.rt_anchor
    }

    /// Check `desired` at `now_us` against `limits`, updating the rate memory.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::TorqueLimitExceeded`] – outside `±max_steer`.
    /// - [`GatewayError::TorqueRateExceeded`] – outside the per-step or
    ///   real-time window.
    /// - [`GatewayError::UnauthorizedCommand`] – nonzero torque while
    ///   controls are not allowed.
    pub fn check(
        &mut self,
        address: u32,
        desired: i32,
        now_us: u64,
        controls_allowed: bool,
        driver: &SampleRing,
        limits: &SteeringLimits,
    ) -> Result<(), GatewayError> {
        let outcome = if controls_allowed {
            let outcome = check_max(desired, limits.max_steer)
                .and_then(|()| match limits.mode {
                    LimitMode::DriverLimited => {
                        check_driver_limited(desired, self.desired_last, driver, limits)
                    }
                })
                .and_then(|()| check_rt(desired, self.rt_anchor, limits.max_rt_delta));

            self.desired_last = desired;
            if now_us.saturating_sub(self.rt_anchor_ts_us) > limits.max_rt_interval_us {
                self.rt_anchor = desired;
                self.rt_anchor_ts_us = now_us;
            }
            outcome
        } else if desired != 0 {
            Err(GatewayError::UnauthorizedCommand {
                address,
                details: format!("torque {desired} while controls not allowed"),
            })
        } else {
            Ok(())
        };

        if outcome.is_err() || !controls_allowed {
            self.reset(now_us);
        }
        outcome
    }

    /// Zero the rate memory and restart the real-time interval at `now_us`.
    pub fn reset(&mut self, now_us: u64) {
        self.desired_last = 0;
        self.rt_anchor = 0;
        self.rt_anchor_ts_us = now_us;
    }
}

fn check_max(desired: i32, max_steer: i32) -> Result<(), GatewayError> {
    if desired.abs() > max_steer {
        return Err(GatewayError::TorqueLimitExceeded {
            requested: desired,
            max: max_steer,
        });
    }
    Ok(())
}

fn check_window(desired: i32, lowest: i32, highest: i32, window: RateWindow) -> Result<(), GatewayError> {
    if desired < lowest || desired > highest {
        return Err(GatewayError::TorqueRateExceeded {
            requested: desired,
            lowest,
            highest,
            window,
        });
    }
    Ok(())
}

/// Per-step envelope with driver override.
///
/// The driver's counter-torque lowers the ceiling on the side it opposes;
/// once the last command sits above that ceiling it must unwind toward zero,
/// but is never forced down faster than `max_rate_down`.
fn check_driver_limited(
    desired: i32,
    last: i32,
    driver: &SampleRing,
    limits: &SteeringLimits,
) -> Result<(), GatewayError> {
    let highest_rl = last.max(0) + limits.max_rate_up;
    let lowest_rl = last.min(0) - limits.max_rate_up;

    let driver_max = limits.max_steer
        + (limits.driver_torque_allowance + driver.max()) * limits.driver_torque_factor;
    let driver_min = -limits.max_steer
        + (-limits.driver_torque_allowance + driver.min()) * limits.driver_torque_factor;

    let highest = highest_rl.min((last - limits.max_rate_down).max(driver_max.max(0)));
    let lowest = lowest_rl.max((last + limits.max_rate_down).min(driver_min.min(0)));

    check_window(desired, lowest, highest, RateWindow::PerStep)
}

fn check_rt(desired: i32, anchor: i32, max_rt_delta: i32) -> Result<(), GatewayError> {
    let highest = anchor.max(0) + max_rt_delta;
    let lowest = anchor.min(0) - max_rt_delta;
    check_window(desired, lowest, highest, RateWindow::RealTime)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADDR: u32 = 0x243;

    fn limits() -> SteeringLimits {
        SteeringLimits {
            max_steer: 100,
            max_rate_up: 10,
            max_rate_down: 25,
            max_rt_delta: 30,
            max_rt_interval_us: 250_000,
            driver_torque_factor: 1,
            driver_torque_allowance: 15,
            mode: LimitMode::DriverLimited,
        }
    }

    /// Limiter that last admitted `torque`, anchored at `torque` at t = 0.
    fn primed(torque: i32) -> TorqueLimiter {
        TorqueLimiter {
            desired_last: torque,
            rt_anchor: torque,
            rt_anchor_ts_us: 0,
        }
    }

    fn quiet_driver() -> SampleRing {
        SampleRing::new(6)
    }

    #[test]
    fn zero_is_always_admissible() {
        let ring = quiet_driver();
        for engaged in [false, true] {
            let mut l = primed(90);
            assert!(l.check(ADDR, 0, 1_000, engaged, &ring, &limits()).is_ok());
        }
    }

    #[test]
    fn nonzero_without_controls_is_unauthorized_and_resets() {
        let mut l = primed(50);
        let result = l.check(ADDR, 5, 1_000, false, &quiet_driver(), &limits());
        assert!(matches!(result, Err(GatewayError::UnauthorizedCommand { .. })));
        assert_eq!(l.desired_last(), 0);
        assert_eq!(l.rt_anchor(), 0);
    }

    #[test]
    fn over_max_steer_is_rejected() {
        let mut l = primed(100);
        let result = l.check(ADDR, 101, 1_000, true, &quiet_driver(), &limits());
        assert!(matches!(result, Err(GatewayError::TorqueLimitExceeded { requested: 101, max: 100 })));
    }

    #[test]
    fn step_up_within_rate_passes_and_over_rate_fails() {
        let ring = quiet_driver();
        let mut l = primed(0);
        assert!(l.check(ADDR, 10, 1_000, true, &ring, &limits()).is_ok());
        let result = l.check(ADDR, 21, 2_000, true, &ring, &limits());
        assert!(matches!(
            result,
            Err(GatewayError::TorqueRateExceeded { window: RateWindow::PerStep, .. })
        ));
        // Violation resets the memory.
        assert_eq!(l.desired_last(), 0);
    }

    #[test]
    fn unwinding_is_never_forced_faster_than_rate_down() {
        let ring = quiet_driver();
        let mut l = primed(20);
        // Dropping all the way to zero is allowed.
        assert!(l.check(ADDR, 0, 1_000, true, &ring, &limits()).is_ok());
        // Crossing zero is bounded by rate-up on the other side.
        let mut l = primed(5);
        assert!(l.check(ADDR, -5, 1_000, true, &ring, &limits()).is_ok());
        let mut l = primed(5);
        assert!(l.check(ADDR, -11, 1_000, true, &ring, &limits()).is_err());
    }

    #[test]
    fn driver_counter_torque_forces_unwind() {
        let mut l = primed(80);
        let mut ring = SampleRing::new(6);
        for _ in 0..6 {
            ring.push(-60);
        }
        // Ceiling: 100 + (15 - 60) = 55; from 80 the command may drop to 55 at once.
        let l_before = l;
        let result = l.check(ADDR, 80, 1_000, true, &ring, &limits());
        assert!(matches!(
            result,
            Err(GatewayError::TorqueRateExceeded { highest: 55, window: RateWindow::PerStep, .. })
        ));
        l = l_before;
        assert!(l.check(ADDR, 55, 1_000, true, &ring, &limits()).is_ok());

        // Without the driver the same hold is fine.
        let mut l = primed(80);
        assert!(l.check(ADDR, 80, 1_000, true, &quiet_driver(), &limits()).is_ok());
    }

    #[test]
    fn small_steps_summing_past_rt_delta_are_rejected() {
        let ring = quiet_driver();
        let mut l = primed(0);
        // Each +10 step is within rate-up; the fourth crosses the 30 rt window.
        for (i, torque) in [10, 20, 30].into_iter().enumerate() {
            assert!(l.check(ADDR, torque, 1_000 * (i as u64 + 1), true, &ring, &limits()).is_ok());
        }
        let result = l.check(ADDR, 40, 4_000, true, &ring, &limits());
        assert!(matches!(
            result,
            Err(GatewayError::TorqueRateExceeded { window: RateWindow::RealTime, .. })
        ));
    }

    #[test]
    fn rt_anchor_moves_after_interval() {
        let ring = quiet_driver();
        let mut l = primed(0);
        for (i, torque) in [10, 20, 30].into_iter().enumerate() {
            l.check(ADDR, torque, 1_000 * (i as u64 + 1), true, &ring, &limits()).unwrap();
        }
        // Past the interval the anchor re-latches at the admitted value.
        l.check(ADDR, 30, 260_000, true, &ring, &limits()).unwrap();
        assert_eq!(l.rt_anchor(), 30);
        assert!(l.check(ADDR, 40, 261_000, true, &ring, &limits()).is_ok());
    }
}
