//! [`WatchTable`] – per-address arrival-period monitor.
//!
//! Every monitored (bus, address) has an expected timestep taken from the
//! vehicle profile.  [`WatchTable::check`] runs on each ingress frame and
//! rejects arrivals outside the tolerance band:
//!
//! - faster than half the expected period → flooding or a replayed frame;
//! - slower than [`MAX_MISSED_MSGS`] periods → the real sender went silent.
//!
//! [`WatchTable::lagging`] is the periodic counterpart, called from a
//! supervisor tick to catch senders that stopped altogether.
//!
//! All times are microseconds from an externally supplied monotonic clock.

use steergate_types::{Bus, Frame, GatewayError};

use crate::profile::WatchSpec;

/// Silence longer than this many expected periods is a timing violation.
pub const MAX_MISSED_MSGS: u64 = 10;

/// Arrivals closer than `expected / MIN_PERIOD_DIVISOR` are a timing violation.
pub const MIN_PERIOD_DIVISOR: u64 = 2;

// ────────────────────────────────────────────────────────────────────────────
// Public types
// ────────────────────────────────────────────────────────────────────────────

/// Timing state of one monitored address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    /// Never received since initialisation.
    Unseen,
    /// Last arrival was within the tolerance band.
    Ok,
    /// Last arrival came too soon after the previous accepted one.
    TooEarly,
    /// The sender exceeded its silence budget.
    Lagging,
}

/// Tracking entry for one monitored address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressWatch {
    pub bus: Bus,
    pub address: u32,
    pub expected_timestep_us: u64,
    last_seen_us: Option<u64>,
    state: WatchState,
}

impl AddressWatch {
    fn new(spec: &WatchSpec) -> Self {
        Self {
            bus: spec.bus,
            address: spec.address,
            expected_timestep_us: spec.expected_timestep_us,
            last_seen_us: None,
            state: WatchState::Unseen,
        }
    }

    pub fn last_seen_us(&self) -> Option<u64> {
        self.last_seen_us
    }

    pub fn state(&self) -> WatchState {
        self.state
    }

    fn silence_budget_us(&self) -> u64 {
        self.expected_timestep_us.saturating_mul(MAX_MISSED_MSGS)
    }

    fn min_period_us(&self) -> u64 {
        self.expected_timestep_us / MIN_PERIOD_DIVISOR
    }
}

// ────────────────────────────────────────────────────────────────────────────
// WatchTable
// ────────────────────────────────────────────────────────────────────────────

/// All address watches derived from one vehicle profile.
///
/// # Example
///
/// ```
/// use steergate_kernel::address_watch::WatchTable;
/// use steergate_kernel::profile::VehicleProfile;
/// use steergate_types::{Bus, Frame, Generation};
///
/// let profile = VehicleProfile::for_generation(Generation::Gen1);
/// let mut watches = WatchTable::from_specs(profile.watches);
///
/// let frame = Frame::new(Bus::Main, 0x21C, &[0; 8]).unwrap();
/// assert!(watches.check(&frame, 1_000_000).is_ok());
/// // Same frame again with no time elapsed looks like a replay.
/// assert!(watches.check(&frame, 1_000_000).is_err());
/// assert!(watches.check(&frame, 1_020_000).is_ok());
/// ```
#[derive(Debug, Clone, Default)]
pub struct WatchTable {
    entries: Vec<AddressWatch>,
}

impl WatchTable {
    pub fn from_specs(specs: &[WatchSpec]) -> Self {
        Self {
            entries: specs.iter().map(AddressWatch::new).collect(),
        }
    }

    /// Check `frame`'s arrival at `now_us` against its expected period.
    ///
    /// Frames on unmonitored addresses always pass.  A too-early arrival
    /// leaves the last-seen time untouched; a late one records it so the
    /// following in-band frame recovers.
    ///
    /// # Errors
    ///
    /// [`GatewayError::AddressTimingViolation`] when the arrival is outside
    /// the tolerance band.
    pub fn check(&mut self, frame: &Frame, now_us: u64) -> Result<(), GatewayError> {
        let Some(entry) = self
            .entries
            .iter_mut()
            .find(|e| e.bus == frame.bus && e.address == frame.address)
        else {
            return Ok(());
        };

        let Some(last) = entry.last_seen_us else {
            entry.last_seen_us = Some(now_us);
            entry.state = WatchState::Ok;
            return Ok(());
        };

        let elapsed_us = now_us.saturating_sub(last);
        let violation = GatewayError::AddressTimingViolation {
            bus: entry.bus,
            address: entry.address,
            elapsed_us,
            expected_us: entry.expected_timestep_us,
        };

        if elapsed_us < entry.min_period_us() {
            entry.state = WatchState::TooEarly;
            return Err(violation);
        }

        entry.last_seen_us = Some(now_us);
        if elapsed_us > entry.silence_budget_us() {
            entry.state = WatchState::Lagging;
            return Err(violation);
        }

        entry.state = WatchState::Ok;
        Ok(())
    }

    /// Mark and return every seen address whose silence at `now_us` exceeds
    /// its budget.  Unseen addresses are not reported.
    pub fn lagging(&mut self, now_us: u64) -> Vec<(Bus, u32)> {
        let mut out = Vec::new();
        for entry in &mut self.entries {
            if let Some(last) = entry.last_seen_us
                && now_us.saturating_sub(last) > entry.silence_budget_us()
            {
                entry.state = WatchState::Lagging;
                out.push((entry.bus, entry.address));
            }
        }
        out
    }

    /// Look up the watch for a (bus, address).
    pub fn get(&self, bus: Bus, address: u32) -> Option<&AddressWatch> {
        self.entries
            .iter()
            .find(|e| e.bus == bus && e.address == address)
    }

    pub fn iter(&self) -> impl Iterator<Item = &AddressWatch> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADDR: u32 = 0x100;

    fn table(expected_us: u64) -> WatchTable {
        WatchTable::from_specs(&[WatchSpec {
            bus: Bus::Main,
            address: ADDR,
            expected_timestep_us: expected_us,
        }])
    }

    fn frame(bus: Bus, address: u32) -> Frame {
        Frame::new(bus, address, &[0; 8]).unwrap()
    }

    #[test]
    fn first_arrival_is_accepted() {
        let mut t = table(10_000);
        assert!(t.check(&frame(Bus::Main, ADDR), 5).is_ok());
        assert_eq!(t.get(Bus::Main, ADDR).unwrap().state(), WatchState::Ok);
    }

    #[test]
    fn in_band_arrivals_pass() {
        let mut t = table(10_000);
        let f = frame(Bus::Main, ADDR);
        for i in 0..10 {
            assert!(t.check(&f, i * 10_000).is_ok());
        }
    }

    #[test]
    fn flooding_is_rejected_without_moving_baseline() {
        let mut t = table(10_000);
        let f = frame(Bus::Main, ADDR);
        t.check(&f, 100_000).unwrap();
        assert!(matches!(
            t.check(&f, 101_000),
            Err(GatewayError::AddressTimingViolation { elapsed_us: 1_000, .. })
        ));
        assert_eq!(t.get(Bus::Main, ADDR).unwrap().last_seen_us(), Some(100_000));
        assert_eq!(t.get(Bus::Main, ADDR).unwrap().state(), WatchState::TooEarly);
        // The genuine sender's next frame is still in band.
        assert!(t.check(&f, 110_000).is_ok());
    }

    #[test]
    fn late_arrival_is_rejected_then_recovers() {
        let mut t = table(10_000);
        let f = frame(Bus::Main, ADDR);
        t.check(&f, 0).unwrap();
        assert!(t.check(&f, 200_000).is_err());
        assert_eq!(t.get(Bus::Main, ADDR).unwrap().state(), WatchState::Lagging);
        assert!(t.check(&f, 210_000).is_ok());
    }

    #[test]
    fn unmonitored_address_and_bus_pass() {
        let mut t = table(10_000);
        assert!(t.check(&frame(Bus::Main, 0x999), 0).is_ok());
        assert!(t.check(&frame(Bus::Main, 0x999), 0).is_ok());
        // Same address on another bus is a different stream.
        assert!(t.check(&frame(Bus::Camera, ADDR), 0).is_ok());
        assert!(t.check(&frame(Bus::Camera, ADDR), 0).is_ok());
    }

    #[test]
    fn lagging_reports_silent_seen_addresses_only() {
        let mut t = WatchTable::from_specs(&[
            WatchSpec { bus: Bus::Main, address: 1, expected_timestep_us: 10_000 },
            WatchSpec { bus: Bus::Main, address: 2, expected_timestep_us: 10_000 },
        ]);
        t.check(&frame(Bus::Main, 1), 0).unwrap();
        assert!(t.lagging(50_000).is_empty());
        assert_eq!(t.lagging(150_000), vec![(Bus::Main, 1)]);
        assert_eq!(t.get(Bus::Main, 2).unwrap().state(), WatchState::Unseen);
    }
}
