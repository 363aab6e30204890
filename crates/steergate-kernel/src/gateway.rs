//! [`Gateway`] – the per-vehicle gating engine.
//!
//! The gateway owns the session state (telemetry, address watches, steering
//! rate memory) and is the single place frames pass through:
//!
//! - [`Gateway::rx`] – every received frame: timing check, telemetry update.
//! - [`Gateway::forward`] – every received frame: where to bridge it.
//! - [`Gateway::tx`] – every frame the assist module wants to send.
//! - [`Gateway::tick`] – periodic supervisor call detecting silent senders.
//!
//! Processing is frame-at-a-time on one thread; callers supply a monotonic
//! timestamp in microseconds with each call.
//!
//! # Example
//!
//! ```
//! use steergate_kernel::Gateway;
//! use steergate_kernel::profile::gen1;
//! use steergate_types::{Bus, Frame, Generation};
//!
//! let mut gw = Gateway::new(Generation::Gen1);
//!
//! // Cruise engages on the main bus.
//! let cruise_on = Frame::new(Bus::Main, gen1::CRZ_CTRL, &[0x08, 0, 0, 0, 0, 0, 0, 0]).unwrap();
//! assert!(gw.rx(&cruise_on, 1_000_000));
//! assert!(gw.telemetry().controls_allowed());
//!
//! // A small steering command is now admitted; a huge one is not.
//! let steer = Frame::new(Bus::Main, gen1::LKAS, &[0x08, 0x05, 0, 0, 0, 0, 0, 0]).unwrap();
//! assert!(gw.tx(&steer, 1_010_000));
//! let yank = Frame::new(Bus::Main, gen1::LKAS, &[0x0F, 0xFF, 0, 0, 0, 0, 0, 0]).unwrap();
//! assert!(!gw.tx(&yank, 1_020_000));
//! ```

use steergate_types::{Bus, Frame, GatewayError, Generation};
use tracing::{debug, info, warn};

use crate::address_watch::WatchTable;
use crate::admission::CommandAdmission;
use crate::ingress::IngressValidator;
use crate::profile::VehicleProfile;
use crate::router;
use crate::telemetry::TelemetryState;

/// Default time after the first frame before stock-ECU detection arms.
pub const DEFAULT_RELAY_GRACE_US: u64 = 1_000_000;

/// Gating engine for one vehicle session.
#[derive(Debug, Clone)]
pub struct Gateway {
    profile: &'static VehicleProfile,
    ingress: IngressValidator,
    admission: CommandAdmission,
    watches: WatchTable,
    telemetry: TelemetryState,
    relay_grace_us: u64,
    started_at_us: Option<u64>,
}

impl Gateway {
    /// Build a gateway for `generation` with the default relay grace period.
    pub fn new(generation: Generation) -> Self {
        Self::with_relay_grace(generation, DEFAULT_RELAY_GRACE_US)
    }

    /// Build a gateway with an explicit relay grace period.
    pub fn with_relay_grace(generation: Generation, relay_grace_us: u64) -> Self {
        let profile = VehicleProfile::for_generation(generation);
        Self {
            profile,
            ingress: IngressValidator::new(profile),
            admission: CommandAdmission::new(profile),
            watches: WatchTable::from_specs(profile.watches),
            telemetry: TelemetryState::new(),
            relay_grace_us,
            started_at_us: None,
        }
    }

    pub fn profile(&self) -> &'static VehicleProfile {
        self.profile
    }

    /// Read-only view of the session telemetry.
    pub fn telemetry(&self) -> &TelemetryState {
        &self.telemetry
    }

    pub fn watches(&self) -> &WatchTable {
        &self.watches
    }

    pub fn admission(&self) -> &CommandAdmission {
        &self.admission
    }

    /// Validate a received frame; `false` means this cycle's telemetry was
    /// discarded.
    pub fn rx(&mut self, frame: &Frame, now_us: u64) -> bool {
        self.rx_checked(frame, now_us).is_ok()
    }

    /// [`Gateway::rx`] with the reason for a rejection.
    ///
    /// A timing violation also drops control; the rest of the telemetry is
    /// left as it was.
    ///
    /// # Errors
    ///
    /// See [`IngressValidator::validate`].
    pub fn rx_checked(&mut self, frame: &Frame, now_us: u64) -> Result<(), GatewayError> {
        let started = *self.started_at_us.get_or_insert(now_us);
        let armed = now_us.saturating_sub(started) > self.relay_grace_us;
        let was_malfunctioning = self.telemetry.relay_malfunction();

        let result = self
            .ingress
            .validate(frame, now_us, &mut self.watches, &mut self.telemetry, armed);

        if let Err(ref e) = result {
            warn!(bus = %frame.bus, address = frame.address, error = %e, "ingress rejected");
            if matches!(e, GatewayError::AddressTimingViolation { .. }) {
                if self.telemetry.controls_allowed() {
                    info!(bus = %frame.bus, address = frame.address, "timing violation; dropping control");
                }
                self.telemetry.disengage();
            }
        } else if !was_malfunctioning && self.telemetry.relay_malfunction() {
            info!(generation = %self.profile.generation, "relay malfunction latched");
        }
        result
    }

    /// Forwarding decision for a received frame.
    ///
    /// Everything is dropped once a relay malfunction has latched.
    pub fn forward(&self, source: Bus, address: u32) -> Option<Bus> {
        if self.telemetry.relay_malfunction() {
            return None;
        }
        router::route(source, address, self.profile)
    }

    /// Decide whether an outbound frame may be transmitted.
    pub fn tx(&mut self, frame: &Frame, now_us: u64) -> bool {
        self.tx_checked(frame, now_us).is_ok()
    }

    /// [`Gateway::tx`] with the reason for a refusal.
    ///
    /// # Errors
    ///
    /// [`GatewayError::RelayMalfunction`] once latched, otherwise see
    /// [`CommandAdmission::admit`].
    pub fn tx_checked(&mut self, frame: &Frame, now_us: u64) -> Result<(), GatewayError> {
        let result = if self.telemetry.relay_malfunction() {
            Err(GatewayError::RelayMalfunction)
        } else {
            self.admission.admit(frame, &self.telemetry, now_us)
        };

        match &result {
            Ok(()) => debug!(bus = %frame.bus, address = frame.address, "tx admitted"),
            Err(e) => warn!(bus = %frame.bus, address = frame.address, error = %e, "tx refused"),
        }
        result
    }

    /// Periodic supervision: any monitored sender silent past its budget
    /// drops control.  Returns the lagging (bus, address) pairs.
    pub fn tick(&mut self, now_us: u64) -> Vec<(Bus, u32)> {
        let lagging = self.watches.lagging(now_us);
        if !lagging.is_empty() {
            if self.telemetry.controls_allowed() {
                info!(count = lagging.len(), "lagging addresses; dropping control");
            }
            self.telemetry.disengage();
        }
        lagging
    }

    /// Re-initialise the session with the same profile.
    pub fn reset(&mut self) {
        self.watches = WatchTable::from_specs(self.profile.watches);
        self.telemetry = TelemetryState::new();
        self.admission = CommandAdmission::new(self.profile);
        self.started_at_us = None;
    }
}
