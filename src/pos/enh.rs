// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! East, North and Height offsets, the local frame antenna coordinate tables
//! may be written in.

use crate::XyzGeodetic;

/// An offset from the array centre in the local tangent plane.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[allow(clippy::upper_case_acronyms)]
pub struct ENH {
    /// East \[metres\]
    pub e: f64,
    /// North \[metres\]
    pub n: f64,
    /// Height \[metres\]
    pub h: f64,
}

impl ENH {
    /// Rotate into the array's local [`XyzGeodetic`] frame (X through the
    /// local meridian at the equator, Y east, Z to the pole). `latitude_rad`
    /// is geodetic.
    pub fn to_xyz(self, latitude_rad: f64) -> XyzGeodetic {
        let (s_lat, c_lat) = latitude_rad.sin_cos();
        self.to_xyz_inner(s_lat, c_lat)
    }

    /// As [`ENH::to_xyz`], for callers converting many offsets at one
    /// latitude.
    pub fn to_xyz_inner(self, sin_latitude: f64, cos_latitude: f64) -> XyzGeodetic {
        XyzGeodetic {
            x: self.h * cos_latitude - self.n * sin_latitude,
            y: self.e,
            z: self.h * sin_latitude + self.n * cos_latitude,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_enh_at_equator_and_pole() {
        let enh = ENH {
            e: 1.0,
            n: 2.0,
            h: 3.0,
        };
        // At the equator, up is along x and north is along z.
        let xyz = enh.to_xyz(0.0);
        assert_abs_diff_eq!(xyz, XyzGeodetic { x: 3.0, y: 1.0, z: 2.0 }, epsilon = 1e-12);

        // At the north pole, up is along z and north points to -x.
        let xyz = enh.to_xyz(std::f64::consts::FRAC_PI_2);
        assert_abs_diff_eq!(xyz, XyzGeodetic { x: -2.0, y: 1.0, z: 3.0 }, epsilon = 1e-12);
    }

    #[test]
    fn test_enh_mid_latitude_keeps_length() {
        let enh = ENH {
            e: -585.675,
            n: -101.530,
            h: 375.212,
        };
        let xyz = enh.to_xyz(40.8_f64.to_radians());
        let len = |x: f64, y: f64, z: f64| (x * x + y * y + z * z).sqrt();
        assert_abs_diff_eq!(len(xyz.x, xyz.y, xyz.z), len(enh.e, enh.n, enh.h), epsilon = 1e-9);
        assert_abs_diff_eq!(xyz.y, enh.e);
    }
}
