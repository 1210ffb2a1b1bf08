// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Express sky directions in the earth-fixed (ITRF) frame.
//!
//! Antenna positions are earth-fixed, so rather than rotating every baseline
//! into the sky we rotate the (source, north) unit vectors down to the earth
//! once per timestamp and take dot products. Polar motion is ignored.

use erfa::{
    aliases::{eraGst06a, eraPnm06a, eraRxp, eraRz},
    constants::ERFA_DJM0,
};
use hifitime::{Duration, Epoch};

use crate::{RADec, XyzGeocentric, UVW};

/// Greenwich apparent sidereal time \[radians\]. `dut1` is UT1 - UTC; use a
/// zero [`Duration`] when it isn't known.
pub fn gast(time: Epoch, dut1: Duration) -> f64 {
    let ut1 = (time + dut1).to_mjd_utc_days();
    let tt = time.to_mjd_tt_days();
    eraGst06a(ERFA_DJM0, ut1, ERFA_DJM0, tt)
}

/// The rotation matrix taking a GCRS vector to the earth-fixed frame at
/// `time`: precession-nutation followed by the sidereal rotation.
pub fn celestial_to_terrestrial(time: Epoch, dut1: Duration) -> [[f64; 3]; 3] {
    let mut r = eraPnm06a(ERFA_DJM0, time.to_mjd_tt_days());
    eraRz(gast(time, dut1), &mut r);
    r
}

fn cross(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

/// Unit vectors of the tracked source's (east, north, line-of-sight) frame in
/// earth-fixed axes at one instant.
#[derive(Clone, Copy, Debug)]
pub struct SkyFrame {
    pub source: [f64; 3],
    pub north: [f64; 3],
    pub east: [f64; 3],
}

impl SkyFrame {
    pub fn new(phase_centre: RADec, time: Epoch, dut1: Duration) -> Self {
        let r = celestial_to_terrestrial(time, dut1);
        let source = eraRxp(r, phase_centre.to_unit_vector());
        let north = eraRxp(r, phase_centre.north_reference().to_unit_vector());
        let east = cross(north, source);
        Self {
            source,
            north,
            east,
        }
    }

    /// Project an earth-fixed baseline vector into this frame.
    #[inline]
    pub fn uvw(&self, baseline: XyzGeocentric) -> UVW {
        UVW::from_projection(baseline, self.east, self.north, self.source)
    }
}
