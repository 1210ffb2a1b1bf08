// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Some helper mathematics, mostly about triangular baseline ordering.
//!
//! The correlator emits baselines in lower-triangular, row-major order:
//! `(0,0), (1,0), (1,1), (2,0), (2,1), (2,2), ...`. The first antenna index is
//! always greater than or equal to the second, and auto-correlations are
//! included as baselines.

/// A pair of antenna indices. `ant1 >= ant2` always holds for baselines
/// produced by this crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Baseline {
    pub ant1: usize,
    pub ant2: usize,
}

impl Baseline {
    /// Is this baseline an auto-correlation?
    #[inline]
    pub fn is_auto(self) -> bool {
        self.ant1 == self.ant2
    }

    /// The position of this baseline in the triangular order.
    #[inline]
    pub fn index(self) -> usize {
        ants_to_baseline(self.ant1, self.ant2)
    }
}

impl std::fmt::Display for Baseline {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}-{}", self.ant1, self.ant2)
    }
}

/// The number of baselines formed by `num_ants` antennas, including
/// auto-correlations.
#[inline]
pub const fn num_baselines(num_ants: usize) -> usize {
    num_ants * (num_ants + 1) / 2
}

/// Get the triangular baseline index of antennas `i` and `j`. The order of the
/// arguments doesn't matter.
#[inline]
pub fn ants_to_baseline(i: usize, j: usize) -> usize {
    let (i, j) = if i >= j { (i, j) } else { (j, i) };
    i * (i + 1) / 2 + j
}

/// Convert a triangular baseline index into its constituent antenna indices.
/// Baseline 0 is between antenna 0 and antenna 0.
#[inline]
pub fn baseline_to_ants(baseline: usize) -> (usize, usize) {
    let mut i = ((((8 * baseline + 1) as f64).sqrt() - 1.0) / 2.0).floor() as usize;
    // Guard against floating-point error for large indices.
    while i * (i + 1) / 2 > baseline {
        i -= 1;
    }
    while (i + 1) * (i + 2) / 2 <= baseline {
        i += 1;
    }
    (i, baseline - i * (i + 1) / 2)
}

/// From the number of baselines (which also include auto-correlations as
/// baselines), get the number of antennas. Returns `None` if the number isn't
/// triangular.
// From the definition of how many baselines there are in an array of N tiles,
// this is just the solved quadratic.
#[inline]
pub fn num_ants_from_num_baselines(num_baselines: usize) -> Option<usize> {
    let n = (((1 + 8 * num_baselines) as f64).sqrt() as usize).saturating_sub(1) / 2;
    (self::num_baselines(n) == num_baselines).then_some(n)
}

/// All baselines of `num_ants` antennas in triangular order.
pub fn triangular_baselines(num_ants: usize) -> Vec<Baseline> {
    let mut baselines = Vec::with_capacity(num_baselines(num_ants));
    for ant1 in 0..num_ants {
        for ant2 in 0..=ant1 {
            baselines.push(Baseline { ant1, ant2 });
        }
    }
    baselines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_baseline_to_ants() {
        // Let's pretend we have 128 tiles, therefore 8256 baselines. Check that
        // our function does the right thing.
        for n in [1, 3, 42, 128, 256] {
            let mut bl_index = 0;
            for ant1 in 0..n {
                for ant2 in 0..=ant1 {
                    let (a1, a2) = baseline_to_ants(bl_index);
                    assert_eq!(ant1, a1, "Expected ant1 = {ant1}, got {a1}. bl = {bl_index}");
                    assert_eq!(ant2, a2, "Expected ant2 = {ant2}, got {a2}. bl = {bl_index}");
                    assert_eq!(ants_to_baseline(ant1, ant2), bl_index);
                    assert_eq!(ants_to_baseline(ant2, ant1), bl_index);
                    bl_index += 1;
                }
            }
            assert_eq!(bl_index, num_baselines(n));
        }
    }

    #[test]
    fn test_num_baselines() {
        assert_eq!(num_baselines(0), 0);
        assert_eq!(num_baselines(1), 1);
        assert_eq!(num_baselines(3), 6);
        assert_eq!(num_baselines(42), 903);
        for n in 0..300 {
            assert_eq!(num_baselines(n), n * (n + 1) / 2);
        }
    }

    #[test]
    fn test_num_ants_from_num_baselines() {
        assert_eq!(num_ants_from_num_baselines(8256), Some(128));
        assert_eq!(num_ants_from_num_baselines(8128), Some(127));
        assert_eq!(num_ants_from_num_baselines(21), Some(6));
        assert_eq!(num_ants_from_num_baselines(1), Some(1));
        assert_eq!(num_ants_from_num_baselines(0), Some(0));
        assert_eq!(num_ants_from_num_baselines(5), None);
        assert_eq!(num_ants_from_num_baselines(8000), None);
    }

    #[test]
    fn test_triangular_baselines() {
        let bls = triangular_baselines(3);
        let pairs: Vec<(usize, usize)> = bls.iter().map(|b| (b.ant1, b.ant2)).collect();
        assert_eq!(pairs, vec![(0, 0), (1, 0), (1, 1), (2, 0), (2, 1), (2, 2)]);
        assert!(bls[0].is_auto());
        assert!(!bls[1].is_auto());
        for (i, bl) in bls.iter().enumerate() {
            assert_eq!(bl.index(), i);
        }
    }
}
