// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Super module for all positional code.

pub mod earth;
pub mod enh;
pub mod itrs;
pub mod radec;
pub mod uvw;
pub mod xyz;

use thiserror::Error;

/// An error from ERFA's geodetic-to-geocentric conversion. This only happens
/// when the supplied latitude is outside of ±90°.
#[derive(Error, Debug)]
#[error("Could not convert the geodetic position (lat {latitude_deg}°, long {longitude_deg}°, height {height_metres}m) to geocentric coordinates")]
pub struct GeodeticError {
    pub latitude_deg: f64,
    pub longitude_deg: f64,
    pub height_metres: f64,
}
