// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Baseline UVWs and fringe-stopping.
//!
//! Fringe-stopping removes the geometric delay towards the phase centre (and
//! any instrumental delay difference) from each cross-correlation:
//!
//! ```text
//! phase  = exp(-2πi w/c f_obs)
//! delay  = exp( 2πi (Δτ - w/c) k Δf)
//! ```
//!
//! where `f_obs` is the centre frequency of channel `⌈F/2⌉`, `k` runs from
//! `-⌈F/2⌉` and `Δf` is the channel width. Each time step is independent, so time steps are
//! handled in parallel.

use std::f64::consts::TAU;

use hifitime::{Duration, Epoch};
use log::debug;
use ndarray::prelude::*;
use rayon::prelude::*;

use crate::{
    antenna::AntennaPosition,
    c32, c64,
    constants::{NS_TO_S, VEL_C},
    io::error::BadBufferLength,
    pos::itrs::SkyFrame,
    Baseline, RADec, UVW,
};

/// Everything needed to place baselines on the sky.
#[derive(Clone, Copy, Debug)]
pub struct ArrayGeometry<'a> {
    pub antennas: &'a [AntennaPosition],
    pub baselines: &'a [Baseline],
    pub phase_centre: RADec,
    /// UT1 - UTC
    pub dut1: Duration,
}

/// The observing band, as fringe-stopping sees it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Band {
    /// Centre frequency of the first channel \[Hz\]
    pub first_freq_hz: f64,
    /// \[Hz\]
    pub channel_width_hz: f64,
    pub num_chans: usize,
}

impl Band {
    /// The channel the phase correction is referenced to, `⌈F/2⌉`.
    #[inline]
    fn reference_chan(&self) -> usize {
        (self.num_chans + 1) / 2
    }

    /// The frequency the phase correction is referenced to \[Hz\]: the
    /// centre of the reference channel.
    pub fn reference_freq_hz(&self) -> f64 {
        self.first_freq_hz + self.reference_chan() as f64 * self.channel_width_hz
    }

    /// The offset of channel `chan` from the reference channel, in channels.
    #[inline]
    pub fn channel_offset(&self, chan: usize) -> f64 {
        chan as f64 - self.reference_chan() as f64
    }
}

impl<'a> ArrayGeometry<'a> {
    /// The earth-fixed vector of a baseline, `ant1 - ant2`.
    #[inline]
    fn baseline_vector(&self, bl: Baseline) -> crate::XyzGeocentric {
        self.antennas[bl.ant1].position - self.antennas[bl.ant2].position
    }

    /// Fill `uvws` with every baseline's UVW at `time`. Auto-correlations get
    /// zero.
    fn fill_uvws(&self, time: Epoch, mut uvws: ArrayViewMut1<UVW>) {
        let frame = SkyFrame::new(self.phase_centre, time, self.dut1);
        for (uvw, &bl) in uvws.iter_mut().zip(self.baselines) {
            *uvw = if bl.is_auto() {
                UVW::default()
            } else {
                frame.uvw(self.baseline_vector(bl))
            };
        }
    }

    /// Geometric UVWs \[metres\] for every (timestamp, baseline).
    pub fn compute_uvws(&self, timestamps: &[Epoch]) -> Array2<UVW> {
        let mut uvws = Array2::default((timestamps.len(), self.baselines.len()));
        uvws.axis_iter_mut(Axis(0))
            .into_par_iter()
            .zip(timestamps.par_iter())
            .for_each(|(row, &time)| self.fill_uvws(time, row));
        uvws
    }

    /// Fringe-stop `vis` (`[time][baseline][chan][pol product]`) in place and
    /// return the UVWs used.
    pub fn fringe_stop(
        &self,
        timestamps: &[Epoch],
        band: Band,
        mut vis: ArrayViewMut4<c32>,
    ) -> Result<Array2<UVW>, BadBufferLength> {
        let (num_times, num_baselines, num_chans, _) = vis.dim();
        BadBufferLength::check("timestamps", "fringe_stop", num_times, timestamps.len())?;
        BadBufferLength::check(
            "baselines",
            "fringe_stop",
            num_baselines,
            self.baselines.len(),
        )?;
        BadBufferLength::check("band.num_chans", "fringe_stop", num_chans, band.num_chans)?;
        debug!(
            "Fringe-stopping {num_times} timesteps x {num_baselines} baselines towards {}",
            self.phase_centre
        );

        let mut uvws = Array2::default((num_times, num_baselines));
        uvws.axis_iter_mut(Axis(0))
            .into_par_iter()
            .zip(vis.axis_iter_mut(Axis(0)).into_par_iter())
            .zip(timestamps.par_iter())
            .for_each(|((mut uvw_row, mut vis_t), &time)| {
                self.fill_uvws(time, uvw_row.view_mut());
                let mut corrections = vec![c64::default(); num_chans];
                for ((&bl, uvw), mut vis_bl) in self
                    .baselines
                    .iter()
                    .zip(uvw_row.iter())
                    .zip(vis_t.outer_iter_mut())
                {
                    if bl.is_auto() {
                        continue;
                    }
                    let delta_delay_s = (self.antennas[bl.ant1].delay_ns
                        - self.antennas[bl.ant2].delay_ns)
                        * NS_TO_S;
                    fill_corrections(uvw.w / VEL_C, delta_delay_s, band, &mut corrections);
                    for (mut chan, corr) in vis_bl.outer_iter_mut().zip(corrections.iter()) {
                        let corr = c32::new(corr.re as f32, corr.im as f32);
                        chan.map_inplace(|v| *v *= corr);
                    }
                }
            });
        Ok(uvws)
    }
}

/// The per-channel correction for one baseline: the phase towards the phase
/// centre at the reference frequency times the residual delay across the
/// band. `w_seconds` is the baseline's `w` divided by the speed of light.
pub fn fill_corrections(w_seconds: f64, delta_delay_s: f64, band: Band, out: &mut [c64]) {
    let phase = c64::from_polar(1.0, -TAU * w_seconds * band.reference_freq_hz());
    let residual = delta_delay_s - w_seconds;
    for (chan, c) in out.iter_mut().enumerate() {
        let angle = TAU * residual * band.channel_offset(chan) * band.channel_width_hz;
        *c = phase * c64::from_polar(1.0, angle);
    }
}
