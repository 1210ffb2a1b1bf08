// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Reorder correlator blocks from frequency-major to baseline-major layout.
//!
//! The correlator writes each block as `[chan][baseline][pol product]`, with
//! baselines in lower-triangular order and the products of a dual-linear
//! pair as XX, XY, YX, YY. Everything downstream wants
//! `[baseline][chan][pol product]` with the products as XX, YY, XY, YX, which
//! is the order of the AIPS linear codes -5..-8.

use ndarray::prelude::*;
use rayon::prelude::*;

use crate::{c32, io::error::BadBufferLength, math::ants_to_baseline};

/// The shape of one correlator block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockLayout {
    pub num_baselines: usize,
    pub num_chans: usize,
    /// The number of polarisations per antenna (`P`); each baseline has `P²`
    /// products.
    pub num_pols: usize,
}

impl BlockLayout {
    /// `P²`
    #[inline]
    pub fn num_pol_products(&self) -> usize {
        self.num_pols * self.num_pols
    }

    /// The number of complex samples in one block.
    #[inline]
    pub fn num_samples(&self) -> usize {
        self.num_baselines * self.num_chans * self.num_pol_products()
    }

    /// As [`BlockLayout::num_samples`], or `None` if that overflows.
    pub fn checked_num_samples(&self) -> Option<usize> {
        self.num_pols
            .checked_mul(self.num_pols)?
            .checked_mul(self.num_chans)?
            .checked_mul(self.num_baselines)
    }

    /// For each output product slot, the correlator slot it comes from.
    pub fn pol_map(&self) -> Vec<usize> {
        if self.num_pols == 2 {
            vec![0, 3, 1, 2]
        } else {
            (0..self.num_pol_products()).collect()
        }
    }
}

/// Permute one correlator block into baseline-major order.
///
/// `input[(B·P²)·f + b·P² + pol_map[s]]` lands in `output[(F·P²)·b + f·P² + s]`.
/// Baselines are filled in parallel.
pub fn reorder_block(
    input: &[c32],
    layout: BlockLayout,
    output: &mut [c32],
) -> Result<(), BadBufferLength> {
    BadBufferLength::check("input", "reorder_block", layout.num_samples(), input.len())?;
    BadBufferLength::check("output", "reorder_block", layout.num_samples(), output.len())?;
    if layout.num_samples() == 0 {
        return Ok(());
    }

    let num_prods = layout.num_pol_products();
    let chan_stride = layout.num_baselines * num_prods;
    let pol_map = layout.pol_map();
    output
        .par_chunks_exact_mut(layout.num_chans * num_prods)
        .enumerate()
        .for_each(|(i_bl, bl_out)| {
            for (i_chan, chan_out) in bl_out.chunks_exact_mut(num_prods).enumerate() {
                let offset = chan_stride * i_chan + i_bl * num_prods;
                let src = &input[offset..offset + num_prods];
                for (out, &s) in chan_out.iter_mut().zip(pol_map.iter()) {
                    *out = src[s];
                }
            }
        });
    Ok(())
}

/// The inverse of [`reorder_block`]: take a baseline-major block back to the
/// correlator's layout.
pub fn restore_block(
    input: &[c32],
    layout: BlockLayout,
    output: &mut [c32],
) -> Result<(), BadBufferLength> {
    BadBufferLength::check("input", "restore_block", layout.num_samples(), input.len())?;
    BadBufferLength::check("output", "restore_block", layout.num_samples(), output.len())?;
    if layout.num_samples() == 0 {
        return Ok(());
    }

    let num_prods = layout.num_pol_products();
    let bl_stride = layout.num_chans * num_prods;
    let pol_map = layout.pol_map();
    output
        .par_chunks_exact_mut(layout.num_baselines * num_prods)
        .enumerate()
        .for_each(|(i_chan, chan_out)| {
            for (i_bl, bl_out) in chan_out.chunks_exact_mut(num_prods).enumerate() {
                let offset = bl_stride * i_bl + i_chan * num_prods;
                let src = &input[offset..offset + num_prods];
                for (&v, &s) in src.iter().zip(pol_map.iter()) {
                    bl_out[s] = v;
                }
            }
        });
    Ok(())
}

/// Reorder a block into a new `[baseline][chan][pol product]` array.
pub fn reorder_to_array(input: &[c32], layout: BlockLayout) -> Result<Array3<c32>, BadBufferLength> {
    let mut out = Array3::zeros((
        layout.num_baselines,
        layout.num_chans,
        layout.num_pol_products(),
    ));
    let out_slice = out
        .as_slice_mut()
        .ok_or(BadBufferLength {
            argument: "out",
            function: "reorder_to_array",
            expected: layout.num_samples(),
            received: 0,
        })?;
    reorder_block(input, layout, out_slice)?;
    Ok(out)
}

/// Expand a raw correlator block into full `[chan][ant i][ant j][p1][p2]`
/// correlation matrices.
///
/// Only the lower triangle (`i >= j`) is stored by the correlator; the upper
/// triangle is synthesised with `M[i,j,p1,p2] = conj(M[j,i,p2,p1])`. For
/// auto-correlations the products with `p1 >= p2` are used and the rest are
/// their conjugates.
pub fn expand_hermitian(
    raw: &[c32],
    layout: BlockLayout,
    num_ants: usize,
) -> Result<Array5<c32>, BadBufferLength> {
    BadBufferLength::check("raw", "expand_hermitian", layout.num_samples(), raw.len())?;
    BadBufferLength::check(
        "layout.num_baselines",
        "expand_hermitian",
        crate::math::num_baselines(num_ants),
        layout.num_baselines,
    )?;

    let p = layout.num_pols;
    let num_prods = layout.num_pol_products();
    let mut out = Array5::zeros((layout.num_chans, num_ants, num_ants, p, p));
    for (i_chan, mut chan) in out.outer_iter_mut().enumerate() {
        let chan_raw = &raw[i_chan * layout.num_baselines * num_prods..];
        for i in 0..num_ants {
            for j in 0..=i {
                let b = ants_to_baseline(i, j);
                let prods = &chan_raw[b * num_prods..(b + 1) * num_prods];
                for p1 in 0..p {
                    for p2 in 0..p {
                        if i == j && p1 < p2 {
                            continue;
                        }
                        let v = prods[p1 * p + p2];
                        chan[[j, i, p2, p1]] = v.conj();
                        chan[[i, j, p1, p2]] = v;
                    }
                }
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    fn ramp(n: usize) -> Vec<c32> {
        (0..n).map(|i| c32::new(i as f32, -(i as f32) * 0.5)).collect()
    }

    #[test]
    fn test_three_antennas_two_channels_single_pol() {
        // 6 baselines x 2 channels; input index is 6f + b, output is 2b + f.
        let layout = BlockLayout {
            num_baselines: 6,
            num_chans: 2,
            num_pols: 1,
        };
        let input: Vec<c32> = (0..12).map(|i| c32::new(i as f32, 0.0)).collect();
        let mut output = vec![c32::default(); 12];
        reorder_block(&input, layout, &mut output).unwrap();

        let expected = [0, 6, 1, 7, 2, 8, 3, 9, 4, 10, 5, 11];
        let got: Vec<usize> = output.iter().map(|c| c.re as usize).collect();
        assert_eq!(got, expected);
    }

    #[test]
    fn test_dual_pol_slots_are_remapped() {
        let layout = BlockLayout {
            num_baselines: 1,
            num_chans: 1,
            num_pols: 2,
        };
        // Correlator order XX, XY, YX, YY.
        let input = vec![
            c32::new(1.0, 0.0),
            c32::new(2.0, 0.0),
            c32::new(3.0, 0.0),
            c32::new(4.0, 0.0),
        ];
        let mut output = vec![c32::default(); 4];
        reorder_block(&input, layout, &mut output).unwrap();
        // XX, YY, XY, YX.
        let got: Vec<f32> = output.iter().map(|c| c.re).collect();
        assert_eq!(got, vec![1.0, 4.0, 2.0, 3.0]);
    }

    #[test]
    fn test_restore_inverts_reorder() {
        for (num_baselines, num_chans, num_pols) in [(6, 2, 1), (10, 7, 2), (3, 4, 3), (1, 1, 2)] {
            let layout = BlockLayout {
                num_baselines,
                num_chans,
                num_pols,
            };
            let input = ramp(layout.num_samples());
            let mut reordered = vec![c32::default(); input.len()];
            let mut restored = vec![c32::default(); input.len()];
            reorder_block(&input, layout, &mut reordered).unwrap();
            restore_block(&reordered, layout, &mut restored).unwrap();
            assert_eq!(restored, input, "{layout:?}");
        }
    }

    #[test]
    fn test_reorder_to_array_indexing() {
        let layout = BlockLayout {
            num_baselines: 3,
            num_chans: 4,
            num_pols: 2,
        };
        let input = ramp(layout.num_samples());
        let arr = reorder_to_array(&input, layout).unwrap();
        assert_eq!(arr.dim(), (3, 4, 4));
        // baseline 2, chan 3, YY comes from correlator slot 3.
        assert_eq!(arr[[2, 3, 1]], input[3 * 3 * 4 + 2 * 4 + 3]);
    }

    #[test]
    fn test_bad_lengths_are_rejected() {
        let layout = BlockLayout {
            num_baselines: 3,
            num_chans: 2,
            num_pols: 1,
        };
        let mut output = vec![c32::default(); 6];
        let result = reorder_block(&ramp(5), layout, &mut output);
        assert!(matches!(
            result,
            Err(BadBufferLength {
                argument: "input",
                expected: 6,
                received: 5,
                ..
            })
        ));
    }

    #[test]
    fn test_hermitian_expansion() {
        let layout = BlockLayout {
            num_baselines: 6,
            num_chans: 3,
            num_pols: 2,
        };
        let mut raw = ramp(layout.num_samples());
        // Self-products of an auto-correlation are real.
        for chan in raw.chunks_exact_mut(6 * 4) {
            for b in [0, 2, 5] {
                chan[b * 4].im = 0.0;
                chan[b * 4 + 3].im = 0.0;
            }
        }
        let m = expand_hermitian(&raw, layout, 3).unwrap();
        assert_eq!(m.dim(), (3, 3, 3, 2, 2));

        for ((f, i, j, p1, p2), v) in m.indexed_iter() {
            let mirror = m[[f, j, i, p2, p1]].conj();
            assert_abs_diff_eq!(v.re, mirror.re);
            assert_abs_diff_eq!(v.im, mirror.im);
        }
        // Lower triangle comes straight from the block: chan 1, baseline
        // (2, 1) is index 4, product XY is slot 1.
        assert_eq!(m[[1, 2, 1, 0, 1]], raw[6 * 4 + 4 * 4 + 1]);

        assert!(expand_hermitian(&raw, layout, 4).is_err());
    }
}
