//! [`IngressValidator`] – timing check and telemetry extraction for received frames.
//!
//! Each received frame goes through three steps:
//!
//! 1. **Timing**: the [`WatchTable`] rejects arrivals outside the expected
//!    period of a monitored address.
//! 2. **Extraction**: the profile's [`RxBinding`] for the frame's
//!    (bus, address) lists the signals to decode; each one updates a *copy*
//!    of the [`TelemetryState`].
//! 3. **Commit**: only when every step succeeded is the copy written back.
//!
//! A failure anywhere leaves the caller's telemetry exactly as it was.

use steergate_types::{Bus, Frame, GatewayError};
use tracing::{info, warn};

use crate::address_watch::WatchTable;
use crate::profile::{DriverTorqueLayout, Signal, VehicleProfile};
use crate::telemetry::TelemetryState;

/// Raw speed above which the vehicle counts as moving (0.01 kph units).
pub const MOVING_SPEED_RAW: u16 = 10;

/// Stateless ingress checker bound to one vehicle profile.
#[derive(Debug, Clone, Copy)]
pub struct IngressValidator {
    profile: &'static VehicleProfile,
}

impl IngressValidator {
    pub fn new(profile: &'static VehicleProfile) -> Self {
        Self { profile }
    }

    /// Validate `frame` received at `now_us` and fold its telemetry into
    /// `telemetry`.
    ///
    /// `stock_ecu_armed` enables relay-malfunction latching for frames bound
    /// to [`Signal::StockSteer`]; the gateway clears it during the relay
    /// transition grace period.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::AddressTimingViolation`] – arrival outside tolerance.
    /// - [`GatewayError::MalformedFrame`] – payload too short for a bound signal.
    pub fn validate(
        &self,
        frame: &Frame,
        now_us: u64,
        watches: &mut WatchTable,
        telemetry: &mut TelemetryState,
        stock_ecu_armed: bool,
    ) -> Result<(), GatewayError> {
        watches.check(frame, now_us)?;

        let mut next = telemetry.clone();
        if let Some(binding) = self.profile.rx_binding(frame.bus, frame.address) {
            for signal in binding.signals {
                apply_signal(signal, frame, &mut next, stock_ecu_armed)?;
            }
        }
        if frame.bus == Bus::Main {
            next.pedal_checks();
        }

        if next.controls_allowed() != telemetry.controls_allowed() {
            info!(
                address = frame.address,
                engaged = next.controls_allowed(),
                "engagement changed"
            );
        }
        *telemetry = next;
        Ok(())
    }
}

fn apply_signal(
    signal: &Signal,
    frame: &Frame,
    next: &mut TelemetryState,
    stock_ecu_armed: bool,
) -> Result<(), GatewayError> {
    match *signal {
        Signal::Speed { hi } => {
            next.set_vehicle_moving(frame.be_u16(hi)? > MOVING_SPEED_RAW);
        }
        Signal::Gas { byte, mask_byte, mask } => {
            let pressed = frame.byte(byte)? != 0 || (frame.byte(mask_byte)? & mask) != 0;
            next.set_gas_pressed(pressed);
        }
        Signal::Brake { byte, mask } => {
            next.set_brake_pressed((frame.byte(byte)? & mask) != 0);
        }
        Signal::Cruise {
            byte,
            engaged_mask,
            pre_enable_mask,
        } => {
            let raw = frame.byte(byte)?;
            let pre_enable = pre_enable_mask.is_some_and(|m| (raw & m) != 0);
            next.cruise_check((raw & engaged_mask) != 0 || pre_enable);
        }
        Signal::DriverTorque(layout) => {
            next.push_driver_torque(decode_driver_torque(layout, frame)?);
        }
        Signal::StockSteer => {
            if stock_ecu_armed && !next.relay_malfunction() {
                warn!(bus = %frame.bus, address = frame.address, "stock steering command on harness side");
                next.latch_relay_malfunction();
            }
        }
    }
    Ok(())
}

fn decode_driver_torque(layout: DriverTorqueLayout, frame: &Frame) -> Result<i32, GatewayError> {
    match layout {
        DriverTorqueLayout::OffsetByte { byte, offset } => Ok(i32::from(frame.byte(byte)?) - offset),
        DriverTorqueLayout::SignedWord { hi } => Ok(i32::from(frame.be_u16(hi)? as i16)),
    }
}
