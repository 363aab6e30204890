//! Bus forwarding arbitration.
//!
//! [`route`] decides where a received frame is bridged to.  Main and camera
//! buses bridge to each other minus the profile's per-direction block list;
//! the auxiliary bus is never bridged.

use steergate_types::Bus;

use crate::profile::VehicleProfile;

/// Forwarding destination for a frame received on `source` with `address`,
/// or `None` to drop it.
///
/// Pure and total: no state is read beyond the profile.
///
/// ```
/// use steergate_kernel::profile::{gen1, VehicleProfile};
/// use steergate_kernel::router::route;
/// use steergate_types::{Bus, Generation};
///
/// let p = VehicleProfile::for_generation(Generation::Gen1);
/// assert_eq!(route(Bus::Camera, gen1::LKAS, p), None);
/// assert_eq!(route(Bus::Main, gen1::LKAS, p), Some(Bus::Camera));
/// assert_eq!(route(Bus::Camera, gen1::PEDALS, p), Some(Bus::Main));
/// ```
pub fn route(source: Bus, address: u32, profile: &VehicleProfile) -> Option<Bus> {
    let (destination, blocked) = match source {
        Bus::Main => (Bus::Camera, profile.forwarding.main_to_camera_block),
        Bus::Camera => (Bus::Main, profile.forwarding.camera_to_main_block),
        Bus::Aux => return None,
    };
    (!blocked.contains(&address)).then_some(destination)
}
