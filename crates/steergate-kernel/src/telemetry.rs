//! [`TelemetryState`] – the vehicle's motion, pedal and cruise picture.
//!
//! One instance lives inside each [`Gateway`][crate::gateway::Gateway].  Only
//! the ingress path mutates it (through the `pub(crate)` setters below); the
//! admission path and external callers get read-only accessors.  Ingress
//! works on a clone and commits it whole, so a failed cycle never leaves a
//! half-updated record behind.

use std::collections::VecDeque;

/// Number of driver-torque samples retained.
pub const DRIVER_TORQUE_SAMPLES: usize = 6;

// ────────────────────────────────────────────────────────────────────────────
// SampleRing
// ────────────────────────────────────────────────────────────────────────────

/// Bounded window of the most recent driver-torque samples.
///
/// The window starts filled with zeros and the oldest sample is evicted on
/// every push, so a fresh ring reads as `min == max == 0` and zero stays in
/// the range until [`capacity`][SampleRing::capacity] real samples arrived.
///
/// ```
/// use steergate_kernel::telemetry::SampleRing;
///
/// let mut ring = SampleRing::new(2);
/// ring.push(5);
/// ring.push(-3);
/// ring.push(7); // evicts 5
/// assert_eq!((ring.min(), ring.max()), (-3, 7));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleRing {
    capacity: usize,
    values: VecDeque<i32>,
}

impl SampleRing {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            values: std::iter::repeat_n(0, capacity).collect(),
        }
    }

    /// Append `sample`, evicting the oldest one on overflow.
    pub fn push(&mut self, sample: i32) {
        if self.capacity == 0 {
            return;
        }
        while self.values.len() >= self.capacity {
            self.values.pop_front();
        }
        self.values.push_back(sample);
    }

    pub fn min(&self) -> i32 {
        self.values.iter().copied().min().unwrap_or(0)
    }

    pub fn max(&self) -> i32 {
        self.values.iter().copied().max().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Samples from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &i32> {
        self.values.iter()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Engagement
// ────────────────────────────────────────────────────────────────────────────

/// Whether the assist module currently holds control authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EngagementState {
    #[default]
    Disengaged,
    Engaged,
}

// ────────────────────────────────────────────────────────────────────────────
// TelemetryState
// ────────────────────────────────────────────────────────────────────────────

/// Single source of truth for one vehicle session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryState {
    vehicle_moving: bool,
    brake_pressed: bool,
    gas_pressed: bool,
    cruise_engaged: bool,
    engagement: EngagementState,
    driver_torque: SampleRing,
    relay_malfunction: bool,
    // Edge-detector memory.
    cruise_engaged_prev: bool,
    gas_pressed_prev: bool,
    brake_pressed_prev: bool,
}

impl Default for TelemetryState {
    fn default() -> Self {
        Self {
            vehicle_moving: false,
            brake_pressed: false,
            gas_pressed: false,
            cruise_engaged: false,
            engagement: EngagementState::Disengaged,
            driver_torque: SampleRing::new(DRIVER_TORQUE_SAMPLES),
            relay_malfunction: false,
            cruise_engaged_prev: false,
            gas_pressed_prev: false,
            brake_pressed_prev: false,
        }
    }
}

impl TelemetryState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn vehicle_moving(&self) -> bool {
        self.vehicle_moving
    }

    pub fn brake_pressed(&self) -> bool {
        self.brake_pressed
    }

    pub fn gas_pressed(&self) -> bool {
        self.gas_pressed
    }

    pub fn cruise_engaged(&self) -> bool {
        self.cruise_engaged
    }

    pub fn engagement(&self) -> EngagementState {
        self.engagement
    }

    /// `true` while the engagement state machine is [`EngagementState::Engaged`].
    pub fn controls_allowed(&self) -> bool {
        self.engagement == EngagementState::Engaged
    }

    pub fn driver_torque(&self) -> &SampleRing {
        &self.driver_torque
    }

    pub fn relay_malfunction(&self) -> bool {
        self.relay_malfunction
    }

    // ── ingress-only mutation ────────────────────────────────────────────

    pub(crate) fn set_vehicle_moving(&mut self, moving: bool) {
        self.vehicle_moving = moving;
    }

    pub(crate) fn set_gas_pressed(&mut self, pressed: bool) {
        self.gas_pressed = pressed;
    }

    pub(crate) fn set_brake_pressed(&mut self, pressed: bool) {
        self.brake_pressed = pressed;
    }

    pub(crate) fn push_driver_torque(&mut self, sample: i32) {
        self.driver_torque.push(sample);
    }

    pub(crate) fn latch_relay_malfunction(&mut self) {
        self.relay_malfunction = true;
    }

    /// Feed the raw cruise flag to the engagement edge detector.
    ///
    /// Disengaged cruise always drops control; a false→true edge grants it.
    pub(crate) fn cruise_check(&mut self, engaged: bool) {
        self.cruise_engaged = engaged;
        if !engaged {
            self.engagement = EngagementState::Disengaged;
        } else if !self.cruise_engaged_prev {
            self.engagement = EngagementState::Engaged;
        }
        self.cruise_engaged_prev = engaged;
    }

    /// Pedal-based disengagement, run after every accepted main-bus frame.
    ///
    /// Gas drops control on its rising edge.  Brake drops control on its
    /// rising edge, or continuously while the vehicle is moving.
    pub(crate) fn pedal_checks(&mut self) {
        if self.gas_pressed && !self.gas_pressed_prev {
            self.engagement = EngagementState::Disengaged;
        }
        self.gas_pressed_prev = self.gas_pressed;

        if self.brake_pressed && (!self.brake_pressed_prev || self.vehicle_moving) {
            self.engagement = EngagementState::Disengaged;
        }
        self.brake_pressed_prev = self.brake_pressed;
    }

    /// Force the most restrictive state, e.g. after a lagging address.
    pub(crate) fn disengage(&mut self) {
        self.engagement = EngagementState::Disengaged;
    }
}
