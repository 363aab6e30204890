//! [`CommandAdmission`] – default-deny gate for outbound frames.
//!
//! Every frame the assist module wants to transmit must pass two checks in
//! order:
//!
//! 1. **Allow-list**: the (address, bus, length) triple must appear in the
//!    profile's transmit table.  Anything else is a
//!    [`GatewayError::UnknownOrDisallowedAddress`] and no role check runs.
//! 2. **Role check**: steering commands go through the [`TorqueLimiter`];
//!    button frames admit a cancel unconditionally and everything else only
//!    while controls are allowed.  HUD and ACC-state frames need nothing more.

use steergate_types::{Frame, GatewayError};

use crate::profile::{SteerLayout, TxRole, VehicleProfile};
use crate::telemetry::TelemetryState;
use crate::torque::TorqueLimiter;

/// Outbound admission control bound to one vehicle profile.
///
/// # Example
///
/// ```
/// use steergate_kernel::admission::CommandAdmission;
/// use steergate_kernel::profile::VehicleProfile;
/// use steergate_kernel::telemetry::TelemetryState;
/// use steergate_types::{Bus, Frame, Generation};
///
/// let mut admission = CommandAdmission::new(VehicleProfile::for_generation(Generation::Gen1));
/// let telemetry = TelemetryState::new();
///
/// // Raw 0x800 is zero torque: fine even while disengaged.
/// let zero = Frame::new(Bus::Main, 0x243, &[0x08, 0x00, 0, 0, 0, 0, 0, 0]).unwrap();
/// assert!(admission.admit(&zero, &telemetry, 1_000).is_ok());
///
/// // Not on the allow-list.
/// let rogue = Frame::new(Bus::Main, 0x123, &[0; 8]).unwrap();
/// assert!(admission.admit(&rogue, &telemetry, 1_000).is_err());
/// ```
#[derive(Debug, Clone)]
pub struct CommandAdmission {
    profile: &'static VehicleProfile,
    limiter: TorqueLimiter,
}

impl CommandAdmission {
    pub fn new(profile: &'static VehicleProfile) -> Self {
        Self {
            profile,
            limiter: TorqueLimiter::new(),
        }
    }

    /// Rate memory of the steering limiter.
    pub fn limiter(&self) -> &TorqueLimiter {
        &self.limiter
    }

    /// Decide whether `frame` may be transmitted at `now_us`.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::UnknownOrDisallowedAddress`] – not allow-listed.
    /// - [`GatewayError::MalformedFrame`] – steering payload undecodable.
    /// - [`GatewayError::TorqueLimitExceeded`] / [`GatewayError::TorqueRateExceeded`]
    ///   – steering command outside the envelope.
    /// - [`GatewayError::UnauthorizedCommand`] – button press or nonzero
    ///   torque while controls are not allowed.
    pub fn admit(
        &mut self,
        frame: &Frame,
        telemetry: &TelemetryState,
        now_us: u64,
    ) -> Result<(), GatewayError> {
        let binding = self
            .profile
            .tx_binding(frame.bus, frame.address)
            .filter(|b| b.len == frame.len())
            .ok_or_else(|| GatewayError::UnknownOrDisallowedAddress {
                bus: frame.bus,
                address: frame.address,
                len: frame.len(),
            })?;

        match binding.role {
            TxRole::SteerCommand(layout) => {
                let desired = decode_steer(layout, frame)?;
                self.limiter.check(
                    frame.address,
                    desired,
                    now_us,
                    telemetry.controls_allowed(),
                    telemetry.driver_torque(),
                    &self.profile.limits,
                )
            }
            TxRole::CruiseButtons { byte, cancel } => {
                let code = frame.byte(byte)?;
                if code == cancel || telemetry.controls_allowed() {
                    Ok(())
                } else {
                    Err(GatewayError::UnauthorizedCommand {
                        address: frame.address,
                        details: format!("button 0x{code:02X} while controls not allowed"),
                    })
                }
            }
            TxRole::Hud | TxRole::AccState => Ok(()),
        }
    }

    /// Forget all steering rate memory.
    pub fn reset(&mut self, now_us: u64) {
        self.limiter.reset(now_us);
    }
}

/// Desired torque carried by a steering command.
pub fn decode_steer(layout: SteerLayout, frame: &Frame) -> Result<i32, GatewayError> {
    let b0 = frame.byte(0)?;
    let b1 = frame.byte(1)?;
    Ok(match layout {
        SteerLayout::Nibble12 { offset } => ((i32::from(b0 & 0x0F) << 8) | i32::from(b1)) - offset,
        SteerLayout::SignedWord => i32::from(i16::from_be_bytes([b0, b1])),
    })
}
