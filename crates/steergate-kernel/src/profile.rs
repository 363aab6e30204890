//! [`VehicleProfile`] – static per-generation data the engine is parameterised by.
//!
//! A profile is pure data: which (bus, address) pairs carry which telemetry
//! signals, which frames the assist module may transmit and how to check
//! them, the steering envelope, the expected arrival period of every
//! monitored address, and the forwarding block lists.  The engine never
//! branches on [`Generation`]; every difference lives in these tables.

use steergate_types::{Bus, Generation};

// ────────────────────────────────────────────────────────────────────────────
// Steering limits
// ────────────────────────────────────────────────────────────────────────────

/// How the per-step torque envelope reacts to the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitMode {
    /// Driver-applied torque from the feedback samples shrinks the allowed
    /// command in the direction the driver is countering.
    DriverLimited,
}

/// Physical steering envelope for outbound torque commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SteeringLimits {
    pub max_steer: i32,
    pub max_rate_up: i32,
    pub max_rate_down: i32,
    pub max_rt_delta: i32,
    pub max_rt_interval_us: u64,
    pub driver_torque_factor: i32,
    pub driver_torque_allowance: i32,
    pub mode: LimitMode,
}

// ────────────────────────────────────────────────────────────────────────────
// Ingress bindings
// ────────────────────────────────────────────────────────────────────────────

/// Layout of the driver-torque sample in a feedback frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverTorqueLayout {
    /// Unsigned byte with a fixed offset subtracted.
    OffsetByte { byte: usize, offset: i32 },
    /// Signed big-endian 16-bit word.
    SignedWord { hi: usize },
}

/// One telemetry signal decoded from an ingress frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// Big-endian speed word in 0.01 kph units starting at byte `hi`.
    Speed { hi: usize },
    /// Gas is pressed when byte `byte` is nonzero or `mask_byte & mask` is set.
    Gas { byte: usize, mask_byte: usize, mask: u8 },
    /// Brake is pressed when `byte & mask` is set.
    Brake { byte: usize, mask: u8 },
    /// Cruise engagement bits in byte `byte`; pre-enable counts as engaged.
    Cruise {
        byte: usize,
        engaged_mask: u8,
        pre_enable_mask: Option<u8>,
    },
    /// Driver-applied steering torque sample.
    DriverTorque(DriverTorqueLayout),
    /// The factory ECU's steering command showing up on the harness side.
    StockSteer,
}

/// Signals carried by one (bus, address) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RxBinding {
    pub bus: Bus,
    pub address: u32,
    pub signals: &'static [Signal],
}

// ────────────────────────────────────────────────────────────────────────────
// Egress bindings
// ────────────────────────────────────────────────────────────────────────────

/// Layout of the desired torque in a steering command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SteerLayout {
    /// 12-bit value from the low nibble of byte 0 and byte 1, minus `offset`.
    Nibble12 { offset: i32 },
    /// Signed big-endian 16-bit word in bytes 0 and 1.
    SignedWord,
}

/// Role-specific admission check for an allow-listed outbound frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxRole {
    SteerCommand(SteerLayout),
    /// Cancel is always admitted; anything else needs controls allowed.
    CruiseButtons { byte: usize, cancel: u8 },
    Hud,
    AccState,
}

/// One allow-listed (address, bus, length) triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxBinding {
    pub bus: Bus,
    pub address: u32,
    pub len: usize,
    pub role: TxRole,
}

/// Expected arrival period of a monitored address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchSpec {
    pub bus: Bus,
    pub address: u32,
    pub expected_timestep_us: u64,
}

/// Addresses withheld from each forwarding direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForwardPolicy {
    pub main_to_camera_block: &'static [u32],
    pub camera_to_main_block: &'static [u32],
}

// ────────────────────────────────────────────────────────────────────────────
// VehicleProfile
// ────────────────────────────────────────────────────────────────────────────

/// Everything generation-specific the gating engine needs.
///
/// # Example
///
/// ```
/// use steergate_kernel::profile::VehicleProfile;
/// use steergate_types::{Bus, Generation};
///
/// let profile = VehicleProfile::for_generation(Generation::Gen1);
/// assert_eq!(profile.limits.max_steer, 800);
/// assert!(profile.tx_binding(Bus::Main, 0x243).is_some());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VehicleProfile {
    pub generation: Generation,
    pub limits: SteeringLimits,
    pub rx: &'static [RxBinding],
    pub tx: &'static [TxBinding],
    pub watches: &'static [WatchSpec],
    pub forwarding: ForwardPolicy,
}

impl VehicleProfile {
    /// The built-in profile for `generation`.
    pub fn for_generation(generation: Generation) -> &'static VehicleProfile {
        match generation {
            Generation::Gen1 => &GEN1,
            Generation::Gen2 => &GEN2,
        }
    }

    /// Telemetry bindings for a received (bus, address), if any.
    pub fn rx_binding(&self, bus: Bus, address: u32) -> Option<&RxBinding> {
        self.rx
            .iter()
            .find(|b| b.bus == bus && b.address == address)
    }

    /// Allow-list entry for an outbound (bus, address), if any.
    pub fn tx_binding(&self, bus: Bus, address: u32) -> Option<&TxBinding> {
        self.tx
            .iter()
            .find(|b| b.bus == bus && b.address == address)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Generation 1
// ────────────────────────────────────────────────────────────────────────────

pub mod gen1 {
    pub const LKAS: u32 = 0x243;
    pub const LKAS_HUD: u32 = 0x440;
    pub const CRZ_CTRL: u32 = 0x21C;
    pub const CRZ_BTNS: u32 = 0x09D;
    pub const STEER_TORQUE: u32 = 0x240;
    pub const ENGINE_DATA: u32 = 0x202;
    pub const PEDALS: u32 = 0x165;

    pub const BTN_CANCEL: u8 = 0x01;
}

static GEN1: VehicleProfile = VehicleProfile {
    generation: Generation::Gen1,
    limits: SteeringLimits {
        max_steer: 800,
        max_rate_up: 10,
        max_rate_down: 25,
        max_rt_delta: 300,
        max_rt_interval_us: 250_000,
        driver_torque_factor: 1,
        driver_torque_allowance: 15,
        mode: LimitMode::DriverLimited,
    },
    rx: &[
        RxBinding {
            bus: Bus::Main,
            address: gen1::ENGINE_DATA,
            signals: &[
                Signal::Speed { hi: 2 },
                Signal::Gas { byte: 4, mask_byte: 5, mask: 0xF0 },
            ],
        },
        RxBinding {
            bus: Bus::Main,
            address: gen1::STEER_TORQUE,
            signals: &[Signal::DriverTorque(DriverTorqueLayout::OffsetByte {
                byte: 0,
                offset: 127,
            })],
        },
        RxBinding {
            bus: Bus::Main,
            address: gen1::CRZ_CTRL,
            signals: &[Signal::Cruise {
                byte: 0,
                engaged_mask: 0x08,
                pre_enable_mask: None,
            }],
        },
        RxBinding {
            bus: Bus::Main,
            address: gen1::PEDALS,
            signals: &[Signal::Brake { byte: 0, mask: 0x10 }],
        },
        RxBinding {
            bus: Bus::Main,
            address: gen1::LKAS,
            signals: &[Signal::StockSteer],
        },
    ],
    tx: &[
        TxBinding {
            bus: Bus::Main,
            address: gen1::LKAS,
            len: 8,
            role: TxRole::SteerCommand(SteerLayout::Nibble12 { offset: 2048 }),
        },
        TxBinding {
            bus: Bus::Main,
            address: gen1::CRZ_BTNS,
            len: 8,
            role: TxRole::CruiseButtons {
                byte: 0,
                cancel: gen1::BTN_CANCEL,
            },
        },
        TxBinding {
            bus: Bus::Main,
            address: gen1::LKAS_HUD,
            len: 8,
            role: TxRole::Hud,
        },
    ],
    watches: &[
        WatchSpec { bus: Bus::Main, address: gen1::CRZ_CTRL, expected_timestep_us: 20_000 },
        WatchSpec { bus: Bus::Main, address: gen1::CRZ_BTNS, expected_timestep_us: 100_000 },
        WatchSpec { bus: Bus::Main, address: gen1::STEER_TORQUE, expected_timestep_us: 12_000 },
        WatchSpec { bus: Bus::Main, address: gen1::ENGINE_DATA, expected_timestep_us: 10_000 },
        WatchSpec { bus: Bus::Main, address: gen1::PEDALS, expected_timestep_us: 20_000 },
    ],
    forwarding: ForwardPolicy {
        main_to_camera_block: &[],
        camera_to_main_block: &[gen1::LKAS, gen1::LKAS_HUD],
    },
};

// ────────────────────────────────────────────────────────────────────────────
// Generation 2
// ────────────────────────────────────────────────────────────────────────────

pub mod gen2 {
    pub const BRAKE: u32 = 0x43F;
    pub const GAS: u32 = 0x202;
    pub const CRUISE: u32 = 0x44A;
    pub const SPEED: u32 = 0x217;
    pub const STEER_TORQUE: u32 = 0x24B;
    pub const LKAS: u32 = 0x249;
    pub const CRZ_BTNS: u32 = 0x09D;
    pub const ACC: u32 = 0x220;
}

static GEN2: VehicleProfile = VehicleProfile {
    generation: Generation::Gen2,
    limits: SteeringLimits {
        max_steer: 8000,
        max_rate_up: 45,
        max_rate_down: 80,
        // 45 per 10 ms step over 250 ms, with 1.5x headroom.
        max_rt_delta: 1125,
        max_rt_interval_us: 250_000,
        driver_torque_factor: 1,
        driver_torque_allowance: 1400,
        mode: LimitMode::DriverLimited,
    },
    rx: &[
        RxBinding {
            bus: Bus::Main,
            address: gen2::BRAKE,
            signals: &[Signal::Brake { byte: 5, mask: 0x04 }],
        },
        RxBinding {
            bus: Bus::Main,
            address: gen2::CRUISE,
            signals: &[Signal::Cruise {
                byte: 0,
                engaged_mask: 0x20,
                pre_enable_mask: Some(0x40),
            }],
        },
        RxBinding {
            bus: Bus::Camera,
            address: gen2::GAS,
            signals: &[Signal::Gas { byte: 4, mask_byte: 5, mask: 0xC0 }],
        },
        RxBinding {
            bus: Bus::Camera,
            address: gen2::SPEED,
            signals: &[Signal::Speed { hi: 4 }],
        },
        RxBinding {
            bus: Bus::Aux,
            address: gen2::STEER_TORQUE,
            signals: &[Signal::DriverTorque(DriverTorqueLayout::SignedWord { hi: 0 })],
        },
    ],
    tx: &[
        TxBinding {
            bus: Bus::Aux,
            address: gen2::LKAS,
            len: 8,
            role: TxRole::SteerCommand(SteerLayout::SignedWord),
        },
        TxBinding {
            bus: Bus::Camera,
            address: gen2::ACC,
            len: 8,
            role: TxRole::AccState,
        },
    ],
    watches: &[
        WatchSpec { bus: Bus::Main, address: gen2::BRAKE, expected_timestep_us: 50_000 },
        WatchSpec { bus: Bus::Camera, address: gen2::GAS, expected_timestep_us: 10_000 },
        WatchSpec { bus: Bus::Main, address: gen2::CRUISE, expected_timestep_us: 100_000 },
        WatchSpec { bus: Bus::Camera, address: gen2::SPEED, expected_timestep_us: 30_000 },
        WatchSpec { bus: Bus::Aux, address: gen2::STEER_TORQUE, expected_timestep_us: 50_000 },
    ],
    forwarding: ForwardPolicy {
        main_to_camera_block: &[gen2::ACC],
        camera_to_main_block: &[],
    },
};
