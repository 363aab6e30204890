//! Frame-log replay through a [`Gateway`].
//!
//! The log is newline-delimited JSON, one frame per line:
//!
//! ```text
//! {"t_us": 1000000, "dir": "rx", "bus": 0, "addr": 540, "data": [8,0,0,0,0,0,0,0]}
//! {"t_us": 1010000, "dir": "tx", "bus": 0, "addr": 579, "data": [8,5,0,0,0,0,0,0]}
//! ```
//!
//! Blank lines and lines starting with `#` are skipped.  Before each record the
//! gateway is ticked at the record's timestamp, so a silent sender drops
//! control exactly as it would on the vehicle.

use std::io::BufRead;

use serde::Deserialize;
use steergate_kernel::Gateway;
use steergate_types::{Bus, Frame, GatewayError};

/// Direction of a logged frame relative to the assist module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Rx,
    Tx,
}

/// One line of the frame log.
#[derive(Debug, Clone, Deserialize)]
pub struct Record {
    pub t_us: u64,
    pub dir: Direction,
    pub bus: u8,
    pub addr: u32,
    #[serde(default)]
    pub data: Vec<u8>,
}

impl Record {
    fn frame(&self) -> Result<Frame, GatewayError> {
        let bus = Bus::from_index(self.bus).ok_or_else(|| GatewayError::MalformedFrame {
            address: self.addr,
            details: format!("unknown bus index {}", self.bus),
        })?;
        Frame::new(bus, self.addr, &self.data)
    }
}

/// What the gateway decided for one line.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Ingress accepted; `forward` is the bridging decision.
    Received { frame: Frame, forward: Option<Bus> },
    /// Ingress rejected; telemetry for this cycle was discarded.
    RxRejected { frame: Frame, error: GatewayError },
    Admitted { frame: Frame },
    Refused { frame: Frame, error: GatewayError },
    /// The line could not be turned into a frame.
    Skipped { line: usize, reason: String },
    /// Monitored senders silent past their budget at `t_us`.
    Lagging { t_us: u64, addresses: Vec<(Bus, u32)> },
}

impl Outcome {
    pub fn accepted(&self) -> bool {
        matches!(self, Outcome::Received { .. } | Outcome::Admitted { .. })
    }
}

/// Totals over a replay run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    pub accepted: usize,
    pub rejected: usize,
    pub skipped: usize,
    pub lagging: usize,
}

impl Summary {
    fn record(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Skipped { .. } => self.skipped += 1,
            Outcome::Lagging { .. } => self.lagging += 1,
            o if o.accepted() => self.accepted += 1,
            _ => self.rejected += 1,
        }
    }
}

/// Process a single record.  Rx records are forwarded only when accepted.
pub fn process(gateway: &mut Gateway, record: &Record, line: usize) -> Outcome {
    let frame = match record.frame() {
        Ok(f) => f,
        Err(e) => {
            return Outcome::Skipped {
                line,
                reason: e.to_string(),
            };
        }
    };
    match record.dir {
        Direction::Rx => match gateway.rx_checked(&frame, record.t_us) {
            Ok(()) => Outcome::Received {
                frame,
                forward: gateway.forward(frame.bus, frame.address),
            },
            Err(error) => Outcome::RxRejected { frame, error },
        },
        Direction::Tx => match gateway.tx_checked(&frame, record.t_us) {
            Ok(()) => Outcome::Admitted { frame },
            Err(error) => Outcome::Refused { frame, error },
        },
    }
}

/// Replay every line of `reader`, handing each outcome to `sink`.
pub fn run<R: BufRead>(
    gateway: &mut Gateway,
    reader: R,
    mut sink: impl FnMut(&Outcome),
) -> Result<Summary, String> {
    let mut summary = Summary::default();
    for (idx, line) in reader.lines().enumerate() {
        let line_no = idx + 1;
        let line = line.map_err(|e| format!("Failed to read line {line_no}: {e}"))?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let outcome = match serde_json::from_str::<Record>(trimmed) {
            Ok(record) => {
                let addresses = gateway.tick(record.t_us);
                if !addresses.is_empty() {
                    let lagging = Outcome::Lagging {
                        t_us: record.t_us,
                        addresses,
                    };
                    summary.record(&lagging);
                    sink(&lagging);
                }
                process(gateway, &record, line_no)
            }
            Err(e) => Outcome::Skipped {
                line: line_no,
                reason: e.to_string(),
            },
        };
        summary.record(&outcome);
        sink(&outcome);
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use steergate_types::Generation;

    const LOG: &str = r#"
# cruise engages, one compliant and one oversized steering command
{"t_us": 1000000, "dir": "rx", "bus": 0, "addr": 540, "data": [8,0,0,0,0,0,0,0]}
{"t_us": 1010000, "dir": "tx", "bus": 0, "addr": 579, "data": [8,5,0,0,0,0,0,0]}
{"t_us": 1020000, "dir": "tx", "bus": 0, "addr": 579, "data": [15,255,0,0,0,0,0,0]}
{"t_us": 1030000, "dir": "rx", "bus": 2, "addr": 579, "data": [0,0,0,0,0,0,0,0]}
{"t_us": 1040000, "dir": "rx", "bus": 7, "addr": 1, "data": []}
not json
"#;

    #[test]
    fn replay_counts_and_decisions() {
        let mut gw = Gateway::new(Generation::Gen1);
        let mut outcomes = Vec::new();
        let summary = run(&mut gw, LOG.as_bytes(), |o| outcomes.push(o.clone())).unwrap();

        assert_eq!(
            summary,
            Summary {
                accepted: 3,
                rejected: 1,
                skipped: 2,
                lagging: 0
            }
        );
        assert!(matches!(outcomes[0], Outcome::Received { forward: Some(Bus::Camera), .. }));
        assert!(matches!(outcomes[1], Outcome::Admitted { .. }));
        assert!(matches!(
            outcomes[2],
            Outcome::Refused { error: GatewayError::TorqueLimitExceeded { .. }, .. }
        ));
        // Camera-side steering is received but never bridged to main.
        assert!(matches!(outcomes[3], Outcome::Received { forward: None, .. }));
        assert!(matches!(outcomes[4], Outcome::Skipped { line: 7, .. }));
    }

    #[test]
    fn silent_sender_is_reported_and_drops_control() {
        use steergate_kernel::profile::gen1;

        // Cruise control is watched every 20 ms; 300 ms of silence exceeds 10x.
        let log = r#"
{"t_us": 1000000, "dir": "rx", "bus": 0, "addr": 540, "data": [8,0,0,0,0,0,0,0]}
{"t_us": 1010000, "dir": "tx", "bus": 0, "addr": 579, "data": [8,5,0,0,0,0,0,0]}
{"t_us": 1300000, "dir": "tx", "bus": 0, "addr": 579, "data": [8,5,0,0,0,0,0,0]}
"#;
        let mut gw = Gateway::new(Generation::Gen1);
        let mut outcomes = Vec::new();
        let summary = run(&mut gw, log.as_bytes(), |o| outcomes.push(o.clone())).unwrap();

        assert_eq!(summary.lagging, 1);
        assert!(matches!(outcomes[1], Outcome::Admitted { .. }));
        assert_eq!(
            outcomes[2],
            Outcome::Lagging {
                t_us: 1_300_000,
                addresses: vec![(Bus::Main, gen1::CRZ_CTRL)]
            }
        );
        assert!(matches!(
            outcomes[3],
            Outcome::Refused { error: GatewayError::UnauthorizedCommand { .. }, .. }
        ));
        assert!(!gw.telemetry().controls_allowed());
    }

    #[test]
    fn oversized_payload_is_skipped() {
        let mut gw = Gateway::new(Generation::Gen2);
        let record = Record {
            t_us: 0,
            dir: Direction::Tx,
            bus: 1,
            addr: 0x249,
            data: vec![0; 9],
        };
        assert!(matches!(process(&mut gw, &record, 1), Outcome::Skipped { .. }));
    }
}
