use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum payload carried by a classic CAN frame.
pub const MAX_PAYLOAD: usize = 8;

/// Logical vehicle buses the gateway sits between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bus {
    /// Vehicle main bus (powertrain, brakes, cruise).
    Main,
    /// Auxiliary bus carrying the steering actuator and its feedback.
    Aux,
    /// Camera bus behind the factory forward camera.
    Camera,
}

impl Bus {
    /// Map a transport-level bus index to a [`Bus`].
    ///
    /// Returns `None` for indices this gateway does not own.
    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(Bus::Main),
            1 => Some(Bus::Aux),
            2 => Some(Bus::Camera),
            _ => None,
        }
    }

    /// Transport-level index of this bus.
    pub fn index(self) -> u8 {
        match self {
            Bus::Main => 0,
            Bus::Aux => 1,
            Bus::Camera => 2,
        }
    }
}

impl std::fmt::Display for Bus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Bus::Main => f.pad("main"),
            Bus::Aux => f.pad("aux"),
            Bus::Camera => f.pad("camera"),
        }
    }
}

/// Vehicle generation selector; picks the profile the engine runs with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Generation {
    /// Pre-2019 platform: steering and HUD on the main bus.
    #[default]
    Gen1,
    /// 2019+ platform: steering actuator isolated on the auxiliary bus.
    Gen2,
}

impl std::fmt::Display for Generation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Generation::Gen1 => write!(f, "gen1"),
            Generation::Gen2 => write!(f, "gen2"),
        }
    }
}

impl std::str::FromStr for Generation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gen1" => Ok(Generation::Gen1),
            "gen2" => Ok(Generation::Gen2),
            other => Err(format!("unknown generation '{other}'")),
        }
    }
}

/// An addressed bus frame, either received or about to be sent.
///
/// Immutable once built; the payload is stored inline and `len` bytes of it
/// are meaningful.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    pub bus: Bus,
    pub address: u32,
    data: [u8; MAX_PAYLOAD],
    len: u8,
}

impl Frame {
    /// Build a frame from a payload slice.
    ///
    /// # Errors
    ///
    /// [`GatewayError::MalformedFrame`] when `payload` exceeds
    /// [`MAX_PAYLOAD`] bytes.
    pub fn new(bus: Bus, address: u32, payload: &[u8]) -> Result<Self, GatewayError> {
        if payload.len() > MAX_PAYLOAD {
            return Err(GatewayError::MalformedFrame {
                address,
                details: format!("payload of {} bytes exceeds {MAX_PAYLOAD}", payload.len()),
            });
        }
        let mut data = [0u8; MAX_PAYLOAD];
        data[..payload.len()].copy_from_slice(payload);
        Ok(Self {
            bus,
            address,
            data,
            len: payload.len() as u8,
        })
    }

    /// Meaningful payload bytes.
    pub fn payload(&self) -> &[u8] {
        &self.data[..self.len()]
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        // A deserialized frame may carry an out-of-range length.
        (self.len as usize).min(MAX_PAYLOAD)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Byte `index` of the payload, or [`GatewayError::MalformedFrame`] when
    /// the frame is too short to carry it.
    pub fn byte(&self, index: usize) -> Result<u8, GatewayError> {
        self.payload()
            .get(index)
            .copied()
            .ok_or_else(|| GatewayError::MalformedFrame {
                address: self.address,
                details: format!("byte {index} missing from {}-byte payload", self.len()),
            })
    }

    /// Big-endian 16-bit word starting at byte `hi`.
    pub fn be_u16(&self, hi: usize) -> Result<u16, GatewayError> {
        Ok(u16::from_be_bytes([self.byte(hi)?, self.byte(hi + 1)?]))
    }
}

/// Which torque rate window a command violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RateWindow {
    /// Change relative to the previously admitted command.
    PerStep,
    /// Cumulative change over the real-time interval.
    RealTime,
}

impl std::fmt::Display for RateWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RateWindow::PerStep => write!(f, "per-step"),
            RateWindow::RealTime => write!(f, "real-time"),
        }
    }
}

/// Every way a frame can be refused by the gateway.
///
/// All variants are local to a single frame: an ingress error discards that
/// cycle's telemetry, an egress error drops that frame.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GatewayError {
    #[error("Timing violation on {bus} 0x{address:03X}: {elapsed_us}us since last, expected {expected_us}us")]
    AddressTimingViolation {
        bus: Bus,
        address: u32,
        elapsed_us: u64,
        expected_us: u64,
    },

    #[error("Address 0x{address:03X} ({len} bytes) not allowed on {bus}")]
    UnknownOrDisallowedAddress { bus: Bus, address: u32, len: usize },

    #[error("Torque {requested} exceeds limit {max}")]
    TorqueLimitExceeded { requested: i32, max: i32 },

    #[error("Torque {requested} outside {window} window [{lowest}, {highest}]")]
    TorqueRateExceeded {
        requested: i32,
        lowest: i32,
        highest: i32,
        window: RateWindow,
    },

    #[error("Unauthorized command 0x{address:03X}: {details}")]
    UnauthorizedCommand { address: u32, details: String },

    #[error("Malformed frame 0x{address:03X}: {details}")]
    MalformedFrame { address: u32, details: String },

    #[error("Relay malfunction latched; stock ECU traffic seen on the harness side")]
    RelayMalfunction,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bus_index_roundtrip() {
        for bus in [Bus::Main, Bus::Aux, Bus::Camera] {
            assert_eq!(Bus::from_index(bus.index()), Some(bus));
        }
        assert_eq!(Bus::from_index(3), None);
    }

    #[test]
    fn frame_rejects_oversized_payload() {
        let result = Frame::new(Bus::Main, 0x243, &[0u8; 9]);
        assert!(matches!(result, Err(GatewayError::MalformedFrame { address: 0x243, .. })));
    }

    #[test]
    fn frame_exposes_only_meaningful_bytes() {
        let frame = Frame::new(Bus::Camera, 0x217, &[1, 2, 3]).unwrap();
        assert_eq!(frame.payload(), &[1, 2, 3]);
        assert_eq!(frame.len(), 3);
        assert_eq!(frame.byte(2).unwrap(), 3);
        assert!(frame.byte(3).is_err());
    }

    #[test]
    fn be_u16_reads_big_endian() {
        let frame = Frame::new(Bus::Main, 0x202, &[0, 0, 0x12, 0x34]).unwrap();
        assert_eq!(frame.be_u16(2).unwrap(), 0x1234);
        assert!(frame.be_u16(3).is_err());
    }

    #[test]
    fn generation_parses_case_insensitively() {
        assert_eq!("GEN2".parse::<Generation>().unwrap(), Generation::Gen2);
        assert_eq!(" gen1 ".parse::<Generation>().unwrap(), Generation::Gen1);
        assert!("gen3".parse::<Generation>().is_err());
    }

    #[test]
    fn frame_json_roundtrip() {
        let frame = Frame::new(Bus::Aux, 0x24B, &[0xFF, 0x38]).unwrap();
        let json = serde_json::to_string(&frame).unwrap();
        let back: Frame = serde_json::from_str(&json).unwrap();
        assert_eq!(frame, back);
    }

    #[test]
    fn gateway_error_display() {
        let err = GatewayError::AddressTimingViolation {
            bus: Bus::Main,
            address: 0x21C,
            elapsed_us: 0,
            expected_us: 20_000,
        };
        assert!(err.to_string().contains("0x21C"));

        let err = GatewayError::TorqueRateExceeded {
            requested: 310,
            lowest: -300,
            highest: 300,
            window: RateWindow::RealTime,
        };
        assert!(err.to_string().contains("real-time"));
    }
}
