// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Reconstruct interferometric visibilities from X-engine correlator dumps.
//!
//! The pipeline is strictly sequential at file granularity:
//! [`descriptor`] → [`dump`] → [`reorder`] → ([`fringe`]) → [`assemble`] →
//! [`io::uvfits`]. [`convert`] wires these stages together.

#[allow(non_camel_case_types)]
pub type c32 = num_complex::Complex<f32>;
#[allow(non_camel_case_types)]
pub type c64 = num_complex::Complex<f64>;

pub mod antenna;
pub mod assemble;
pub mod catalog;
pub mod cli;
pub mod constants;
pub mod convert;
pub mod descriptor;
pub mod dump;
pub mod error;
pub mod fringe;
pub mod io;
pub mod math;
pub mod pos;
pub mod reorder;

#[cfg(test)]
pub(crate) mod test_utils;

// Re-exports.
pub use assemble::{FinalisedDataset, VisibilityAssembler, VisibilityDataset};
pub use descriptor::ObservationDescriptor;
pub use error::ConvertError;
pub use math::Baseline;
pub use pos::{
    earth::LatLngHeight,
    enh::ENH,
    radec::RADec,
    uvw::UVW,
    xyz::{XyzGeocentric, XyzGeodetic},
};

pub use hifitime;
pub use ndarray;
pub use num_complex;
pub use num_complex::Complex;
pub use rayon;

#[cfg(test)]
#[test]
fn hifitime_works_as_expected() {
    use hifitime::Epoch;

    let jd_utc = 2459396.5;
    let epoch = Epoch::from_jde_utc(jd_utc);
    approx::assert_abs_diff_eq!(epoch.to_jde_utc_days(), jd_utc, epsilon = 1e-9);
    approx::assert_abs_diff_eq!(epoch.to_mjd_utc_days(), jd_utc - 2400000.5, epsilon = 1e-9);

    let (year, month, day, hour, ..) = epoch.to_gregorian_utc();
    assert_eq!((year, month, day, hour), (2021, 7, 1, 0));
}
