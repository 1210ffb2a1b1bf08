// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Useful constants.

/// Speed of light \[metres/second\]
pub const VEL_C: f64 = 299_792_458.0;

/// Earth's rotation rate \[degrees/day\], as written to `DEGPDY` in the
/// antenna table.
pub const EARTH_ROTATION_DEG_PER_DAY: f64 = 3.60985e2;

/// The AIPS code of the first linear polarisation product (XX). Subsequent
/// products count down: YY = -6, XY = -7, YX = -8.
pub const UVFITS_LINEAR_POL_START: i64 = -5;

/// Correlator dumps are complex64: two little-endian f32 values per sample.
pub const BYTES_PER_SAMPLE: usize = 8;

/// The coordinate table read when the descriptor doesn't name one.
pub const DEFAULT_COORDINATE_TABLE: &str = "antenna_coordinates_ecef.txt";

/// Antenna delays are supplied in nanoseconds.
pub const NS_TO_S: f64 = 1e-9;
