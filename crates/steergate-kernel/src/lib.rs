//! `steergate-kernel` – Safety gating between the assist module and the vehicle buses
//!
//! The kernel does not steer; it decides which frames are trusted, which are
//! forwarded, and which commands may reach the actuators.
//!
//! # Modules
//!
//! - [`profile`] – [`VehicleProfile`][profile::VehicleProfile]:
//!   per-generation tables of signal bindings, transmit allow-list, steering
//!   limits, watched addresses and forwarding block lists.
//! - [`telemetry`] – [`TelemetryState`][telemetry::TelemetryState]:
//!   speed, pedal and cruise flags, the driver-torque sample window and the
//!   engagement state machine.
//! - [`address_watch`] – [`WatchTable`][address_watch::WatchTable]:
//!   expected-period tracking per monitored address to catch spoofing,
//!   flooding and silent senders.
//! - [`ingress`] – [`IngressValidator`][ingress::IngressValidator]:
//!   timing check plus all-or-nothing telemetry extraction.
//! - [`torque`] – [`TorqueLimiter`][torque::TorqueLimiter]:
//!   absolute, driver-limited per-step and real-time torque envelope.
//! - [`admission`] – [`CommandAdmission`][admission::CommandAdmission]:
//!   default-deny admission of outbound frames.
//! - [`router`] – [`route`][router::route]: pure forwarding decision.
//! - [`gateway`] – [`Gateway`]: the engine that owns the session state and
//!   wires the pieces together.

pub mod address_watch;
pub mod admission;
pub mod gateway;
pub mod ingress;
pub mod profile;
pub mod router;
pub mod telemetry;
pub mod torque;

pub use address_watch::{AddressWatch, WatchState, WatchTable};
pub use admission::CommandAdmission;
pub use gateway::Gateway;
pub use ingress::IngressValidator;
pub use profile::{SteeringLimits, VehicleProfile};
pub use router::route;
pub use telemetry::{EngagementState, SampleRing, TelemetryState};
pub use torque::TorqueLimiter;
