// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Module for writing the uvfits file format.

use std::{
    ffi::CString,
    path::{Path, PathBuf},
};

use erfa::{aliases::eraGst06a, constants::ERFA_DJM0};
use fitsio::errors::check_status as fits_check_status;
use hifitime::{Duration, Epoch, Unit};
use itertools::izip;
use log::{debug, trace};
use ndarray::prelude::*;

use super::error::{BadBufferLength, UvfitsWriteError};
use crate::{
    assemble::FinalisedDataset,
    c32,
    constants::{EARTH_ROTATION_DEG_PER_DAY, UVFITS_LINEAR_POL_START, VEL_C},
    error::ExportError,
    LatLngHeight, RADec, XyzGeodetic, UVW,
};

const NUM_FLOATS_PER_POL: usize = 3;
const GROUP_PARAMS: [&str; 7] = ["UU", "VV", "WW", "BASELINE", "DATE", "DATE", "INTTIM"];

/// From a `hifitime` [`Epoch`], get a formatted date string with the hours,
/// minutes and seconds set to 0.
fn get_truncated_date_string(epoch: Epoch) -> String {
    let (year, month, day, _, _, _, _) = epoch.to_gregorian_utc();
    format!("{year}-{month:02}-{day:02}T00:00:00.0")
}

/// The Julian date that `DATE` group parameters are counted from: the
/// midnight starting the day of `epoch`.
fn jd_zero(epoch: Epoch) -> f64 {
    epoch.to_jde_utc_days().floor() + 0.5
}

/// Helper function to convert strings into pointers of C strings.
fn rust_strings_to_c_strings<T: AsRef<str>>(
    strings: &[T],
) -> Result<Vec<*mut i8>, std::ffi::NulError> {
    let mut c_strings = Vec::with_capacity(strings.len());
    for s in strings {
        c_strings.push(CString::new(s.as_ref())?.into_raw());
    }
    Ok(c_strings)
}

fn deallocate_rust_c_strings(c_string_ptrs: Vec<*mut i8>) {
    unsafe {
        for ptr in c_string_ptrs {
            drop(CString::from_raw(ptr));
        }
    }
}

/// Encode a baseline into the uvfits format. Use the miriad convention to
/// handle more than 255 antennas (up to 2048). This is backwards compatible
/// with the standard UVFITS convention. Antenna indices start at 1.
pub const fn encode_uvfits_baseline(ant1: usize, ant2: usize) -> usize {
    if ant2 > 255 {
        ant1 * 2048 + ant2 + 65_536
    } else {
        ant1 * 256 + ant2
    }
}

/// Decode a uvfits baseline into the antennas that formed it. Antenna indices
/// start at 1.
pub const fn decode_uvfits_baseline(bl: usize) -> (usize, usize) {
    if bl < 65_535 {
        let ant2 = bl % 256;
        let ant1 = (bl - ant2) / 256;
        (ant1, ant2)
    } else {
        let ant2 = (bl - 65_536) % 2048;
        let ant1 = (bl - ant2 - 65_536) / 2048;
        (ant1, ant2)
    }
}

/// What goes into a uvfits file's headers.
#[derive(Clone, Debug)]
pub struct UvfitsHeader {
    pub num_timesteps: usize,
    pub num_baselines: usize,
    pub num_chans: usize,
    /// Polarisation products per visibility (1 or 4).
    pub num_pol_products: usize,
    /// The first timestep.
    pub start_epoch: Epoch,
    /// \[Hz\]
    pub channel_width_hz: f64,
    /// The centre frequency of channel `centre_freq_chan` \[Hz\]
    pub centre_freq_hz: f64,
    pub centre_freq_chan: usize,
    pub phase_centre: RADec,
    pub object_name: String,
    pub telescope_name: String,
    pub instrument: String,
    pub array_pos: LatLngHeight,
    pub antenna_names: Vec<String>,
    /// Antenna positions relative to `array_pos`.
    pub antenna_positions: Vec<XyzGeodetic>,
    /// UT1 - UTC
    pub dut1: Duration,
}

/// A helper struct to write out a uvfits file.
///
/// Note: only a single contiguous spectral window is supported.
pub struct UvfitsWriter {
    /// The path to the uvfits file.
    path: PathBuf,

    /// The FITS file pointer.
    fptr: *mut fitsio_sys::fitsfile,

    /// Reused for every row so that writing doesn't allocate.
    buffer: Vec<f32>,

    /// `num_timesteps * num_baselines`
    total_num_rows: usize,

    /// The number of uvfits rows that have currently been written.
    current_num_rows: usize,

    header: UvfitsHeader,
}

impl UvfitsWriter {
    /// Create a new uvfits file at the specified path and write its primary
    /// header. Any existing file at that path is destroyed.
    ///
    /// # Errors
    ///
    /// Will return an [`UvfitsWriteError`] if:
    /// - there is an existing file at `path` which cannot be removed.
    /// - a fits operation fails.
    pub fn new<T: AsRef<Path>>(
        path: T,
        header: UvfitsHeader,
    ) -> Result<UvfitsWriter, UvfitsWriteError> {
        let path = path.as_ref();
        // Delete any file that already exists.
        if path.exists() {
            trace!("file {} exists, deleting", path.display());
            std::fs::remove_file(path)?;
        }

        // Create a new fits file.
        let mut status = 0;
        let c_path = CString::new(
            path.to_str()
                .ok_or_else(|| UvfitsWriteError::NonUtf8Path(path.to_path_buf()))?,
        )?;
        let mut fptr = std::ptr::null_mut();
        trace!("initialising fits file with fitsio_sys ({})", path.display());
        unsafe {
            // ffinit = fits_create_file
            fitsio_sys::ffinit(
                &mut fptr,       /* O - FITS file pointer                   */
                c_path.as_ptr(), /* I - name of file to create              */
                &mut status,     /* IO - error status                       */
            );
        }
        fits_check_status(status)?;

        // Initialise the group header. -32 means FLOAT_IMG.
        let mut naxes = [
            0,
            NUM_FLOATS_PER_POL as i64,
            header.num_pol_products as i64,
            header.num_chans as i64,
            1,
            1,
        ];
        let total_num_rows = header.num_timesteps * header.num_baselines;
        unsafe {
            // ffphpr = fits_write_grphdr
            fitsio_sys::ffphpr(
                fptr,                     /* I - FITS file pointer                        */
                1,                        /* I - does file conform to FITS standard? 1/0  */
                -32,                      /* I - number of bits per data value pixel      */
                naxes.len() as _,         /* I - number of axes in the data array         */
                naxes.as_mut_ptr(),       /* I - length of each data axis                 */
                GROUP_PARAMS.len() as i64, /* I - number of group parameters (usually 0)  */
                total_num_rows as i64,    /* I - number of random groups (usually 1 or 0) */
                1,                        /* I - may FITS file have extensions?           */
                &mut status,              /* IO - error status                            */
            );
        }
        fits_check_status(status)?;

        fits_write_double(fptr, "BSCALE", 1.0, None)?;

        // Set header names and scales. Only the first DATE carries the offset.
        let mut pzero_date_set = false;
        for (i, &param) in GROUP_PARAMS.iter().enumerate() {
            let i = i + 1;
            let pzero = if param == "DATE" && !pzero_date_set {
                pzero_date_set = true;
                jd_zero(header.start_epoch)
            } else {
                0.0
            };
            fits_write_string(fptr, &format!("PTYPE{i}"), param, None)?;
            fits_write_double(fptr, &format!("PSCAL{i}"), 1.0, None)?;
            fits_write_double(fptr, &format!("PZERO{i}"), pzero, None)?;
        }
        fits_write_string(
            fptr,
            "DATE-OBS",
            &get_truncated_date_string(header.start_epoch),
            None,
        )?;

        // Dimensions.
        fits_write_string(fptr, "CTYPE2", "COMPLEX", None)?;
        fits_write_double(fptr, "CRVAL2", 1.0, None)?;
        fits_write_double(fptr, "CRPIX2", 1.0, None)?;
        fits_write_double(fptr, "CDELT2", 1.0, None)?;

        // Linearly polarised: XX, YY, XY, YX.
        fits_write_string(fptr, "CTYPE3", "STOKES", None)?;
        fits_write_int(fptr, "CRVAL3", UVFITS_LINEAR_POL_START, None)?;
        fits_write_int(fptr, "CDELT3", -1, None)?;
        fits_write_double(fptr, "CRPIX3", 1.0, None)?;

        fits_write_string(fptr, "CTYPE4", "FREQ", None)?;
        fits_write_double(fptr, "CRVAL4", header.centre_freq_hz, None)?;
        fits_write_double(fptr, "CDELT4", header.channel_width_hz, None)?;
        fits_write_int(fptr, "CRPIX4", header.centre_freq_chan as i64 + 1, None)?;

        fits_write_string(fptr, "CTYPE5", "RA", None)?;
        fits_write_double(fptr, "CRVAL5", header.phase_centre.ra.to_degrees(), None)?;
        fits_write_int(fptr, "CDELT5", 1, None)?;
        fits_write_int(fptr, "CRPIX5", 1, None)?;

        fits_write_string(fptr, "CTYPE6", "DEC", None)?;
        fits_write_double(fptr, "CRVAL6", header.phase_centre.dec.to_degrees(), None)?;
        fits_write_int(fptr, "CDELT6", 1, None)?;
        fits_write_int(fptr, "CRPIX6", 1, None)?;

        fits_write_double(fptr, "OBSRA", header.phase_centre.ra.to_degrees(), None)?;
        fits_write_double(fptr, "OBSDEC", header.phase_centre.dec.to_degrees(), None)?;
        fits_write_double(fptr, "EPOCH", 2000.0, None)?;

        fits_write_string(fptr, "OBJECT", &header.object_name, None)?;
        fits_write_string(fptr, "TELESCOP", &header.telescope_name, None)?;
        fits_write_string(fptr, "INSTRUME", &header.instrument, None)?;

        // This is apparently required...
        fits_write_history(fptr, "AIPS WTSCAL =  1.0")?;

        let software = format!("{} v{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
        fits_write_comment(fptr, &format!("Created by {software}"))?;
        fits_write_string(fptr, "SOFTWARE", &software, None)?;

        Ok(UvfitsWriter {
            path: path.to_path_buf(),
            fptr,
            buffer: Vec::with_capacity(
                GROUP_PARAMS.len()
                    + header.num_chans * header.num_pol_products * NUM_FLOATS_PER_POL,
            ),
            total_num_rows,
            current_num_rows: 0,
            header,
        })
    }

    /// Write one visibility row (group).
    ///
    /// `ant1` and `ant2` are zero indexed; they are made into the one-indexed
    /// uvfits convention here. `uvw` is in metres. `vis` is
    /// `[chan][pol product]`, as is `weights`.
    #[allow(clippy::too_many_arguments)]
    pub fn write_row(
        &mut self,
        uvw: UVW,
        ant1: usize,
        ant2: usize,
        epoch: Epoch,
        inttim: f64,
        vis: ArrayView2<c32>,
        weights: ArrayView2<f32>,
    ) -> Result<(), UvfitsWriteError> {
        if self.current_num_rows + 1 > self.total_num_rows {
            return Err(UvfitsWriteError::BadRowNum {
                row_num: self.current_num_rows,
                num_rows: self.total_num_rows,
            });
        }
        let (num_chans, num_prods) = vis.dim();
        BadBufferLength::check("vis", "write_row", self.header.num_chans, num_chans)?;
        BadBufferLength::check(
            "vis",
            "write_row",
            self.header.num_pol_products,
            num_prods,
        )?;
        BadBufferLength::check("weights", "write_row", num_chans * num_prods, weights.len())?;

        // The DATE split keeps as much precision as two f32s allow.
        let jd_trunc = Epoch::from_jde_utc(jd_zero(self.header.start_epoch));
        let jd_frac = epoch - jd_trunc;
        let jd_frac_f32 = jd_frac.to_unit(Unit::Day) as f32;
        let jd_remainder_f32 =
            (jd_frac - Duration::from_days(jd_frac_f32 as f64)).to_unit(Unit::Day) as f32;

        let uvw = uvw / VEL_C;
        self.buffer.clear();
        self.buffer.extend_from_slice(&[
            uvw.u as f32,
            uvw.v as f32,
            uvw.w as f32,
            encode_uvfits_baseline(ant1 + 1, ant2 + 1) as f32,
            jd_frac_f32,
            jd_remainder_f32,
            inttim as f32,
        ]);
        for (v, &weight) in vis.iter().zip(weights.iter()) {
            self.buffer.extend_from_slice(&[v.re, v.im, weight]);
        }

        let mut status = 0;
        unsafe {
            // ffpgpe = fits_write_grppar_flt
            fitsio_sys::ffpgpe(
                self.fptr,                         /* I - FITS file pointer                      */
                self.current_num_rows as i64 + 1,  /* I - group to write(1 = 1st group)          */
                1,                                 /* I - first vector element to write(1 = 1st) */
                self.buffer.len() as i64,          /* I - number of values to write              */
                self.buffer.as_mut_ptr(),          /* I - array of values that are written       */
                &mut status,                       /* IO - error status                          */
            );
        }
        fits_check_status(status)?;
        self.current_num_rows += 1;
        Ok(())
    }

    /// Write the antenna table and close the file. This consumes the
    /// [`UvfitsWriter`], preventing any further modifications.
    ///
    /// # Errors
    ///
    /// Will return an [`UvfitsWriteError`] if not every row has been written,
    /// or a fits operation fails.
    pub fn finalise(self) -> Result<(), UvfitsWriteError> {
        if self.current_num_rows != self.total_num_rows {
            return Err(UvfitsWriteError::NotEnoughRowsWritten {
                current: self.current_num_rows,
                total: self.total_num_rows,
            });
        }
        self.write_antenna_table()?;

        trace!("closing fits file ({})", self.path.display());
        let mut status = 0;
        unsafe {
            // ffclos = fits_close_file
            fitsio_sys::ffclos(self.fptr, &mut status);
        }
        fits_check_status(status)?;
        Ok(())
    }

    /// Write the `AIPS AN` table. This must be the second HDU.
    fn write_antenna_table(&self) -> Result<(), UvfitsWriteError> {
        let h = &self.header;
        let col_names = [
            "ANNAME", "STABXYZ", "NOSTA", "MNTSTA", "STAXOF", "POLTYA", "POLAA", "POLCALA",
            "POLTYB", "POLAB", "POLCALB",
        ];
        let col_formats = [
            "8A", "3D", "1J", "1J", "1E", "1A", "1E", "3E", "1A", "1E", "3E",
        ];
        let col_units = [
            "", "METERS", "", "", "METERS", "", "DEGREES", "", "", "DEGREES", "",
        ];
        let mut c_col_names = rust_strings_to_c_strings(&col_names)?;
        let mut c_col_formats = rust_strings_to_c_strings(&col_formats)?;
        let mut c_col_units = rust_strings_to_c_strings(&col_units)?;
        let extname = CString::new("AIPS AN")?;

        let mut status = 0;
        unsafe {
            // ffcrtb = fits_create_tbl. BINARY_TBL is 2.
            fitsio_sys::ffcrtb(
                self.fptr,                  /* I - FITS file pointer                        */
                2,                          /* I - type of table to create                  */
                0,                          /* I - number of rows in the table              */
                col_names.len() as i32,     /* I - number of columns in the table           */
                c_col_names.as_mut_ptr(),   /* I - name of each column                      */
                c_col_formats.as_mut_ptr(), /* I - value of TFORMn keyword for each column  */
                c_col_units.as_mut_ptr(),   /* I - value of TUNITn keyword for each column  */
                extname.as_ptr(),           /* I - value of EXTNAME keyword, if any         */
                &mut status,                /* IO - error status                            */
            );
        }
        deallocate_rust_c_strings(c_col_names);
        deallocate_rust_c_strings(c_col_formats);
        deallocate_rust_c_strings(c_col_units);
        fits_check_status(status)?;

        unsafe {
            // ffmahd = fits_movabs_hdu
            fitsio_sys::ffmahd(
                self.fptr,            /* I - FITS file pointer             */
                2,                    /* I - number of the HDU to move to  */
                std::ptr::null_mut(), /* O - type of extension, 0, 1, or 2 */
                &mut status,          /* IO - error status                 */
            );
        }
        fits_check_status(status)?;

        let array_xyz = h.array_pos.to_geocentric_wgs84()?;
        fits_write_double(self.fptr, "ARRAYX", array_xyz.x, None)?;
        fits_write_double(self.fptr, "ARRAYY", array_xyz.y, None)?;
        fits_write_double(self.fptr, "ARRAYZ", array_xyz.z, None)?;

        fits_write_double(self.fptr, "FREQ", h.centre_freq_hz, None)?;
        fits_write_string(self.fptr, "FRAME", "ITRF", None)?;

        // Greenwich apparent sidereal time at 0h on the first day.
        let mjd = h.start_epoch.to_mjd_utc_days();
        let gst = eraGst06a(ERFA_DJM0, mjd.floor(), ERFA_DJM0, mjd.floor()).to_degrees();
        fits_write_double(self.fptr, "GSTIA0", gst, None)?;
        fits_write_double(self.fptr, "DEGPDY", EARTH_ROTATION_DEG_PER_DAY, None)?;

        let date_truncated = get_truncated_date_string(h.start_epoch);
        fits_write_string(self.fptr, "RDATE", &date_truncated, None)?;

        fits_write_double(self.fptr, "POLARX", 0.0, None)?;
        fits_write_double(self.fptr, "POLARY", 0.0, None)?;
        fits_write_double(
            self.fptr,
            "UT1UTC",
            h.dut1.to_seconds(),
            Some("UT1 - UTC, a.k.a. DUT1"),
        )?;
        fits_write_double(self.fptr, "DATUTC", 0.0, None)?;

        // AIPS 117 calls this TIMESYS; some readers want TIMSYS.
        fits_write_string(self.fptr, "TIMSYS", "UTC", None)?;
        fits_write_string(self.fptr, "TIMESYS", "UTC", None)?;
        fits_write_string(self.fptr, "ARRNAM", &h.telescope_name, None)?;
        fits_write_int(self.fptr, "NUMORB", 0, None)?;
        fits_write_int(self.fptr, "NOPCAL", 3, None)?;
        fits_write_int(self.fptr, "FREQID", -1, None)?;
        let leap_seconds = (h.start_epoch.to_tai_seconds() - h.start_epoch.to_utc_seconds()).round();
        fits_write_double(self.fptr, "IATUTC", leap_seconds, None)?;
        fits_write_int(self.fptr, "EXTVER", 1, None)?;
        fits_write_int(self.fptr, "NO_IF", 1, None)?;
        fits_write_string(self.fptr, "XYZHAND", "RIGHT", None)?;

        let x_c_str = CString::new("X")?.into_raw();
        let y_c_str = CString::new("Y")?.into_raw();
        let result = self.write_antenna_rows(x_c_str, y_c_str);
        unsafe {
            drop(CString::from_raw(x_c_str));
            drop(CString::from_raw(y_c_str));
        }
        result
    }

    fn write_antenna_rows(
        &self,
        mut x_c_str: *mut i8,
        mut y_c_str: *mut i8,
    ) -> Result<(), UvfitsWriteError> {
        let mut status = 0;
        for (i, (pos, name)) in self
            .header
            .antenna_positions
            .iter()
            .zip(self.header.antenna_names.iter())
            .enumerate()
        {
            let row = i as i64 + 1;
            let c_antenna_name = CString::new(name.as_str())?;
            unsafe {
                // ANNAME. ffpcls = fits_write_col_str
                let mut name_ptr = c_antenna_name.as_ptr() as *mut i8;
                fitsio_sys::ffpcls(self.fptr, 1, row, 1, 1, &mut name_ptr, &mut status);
                fits_check_status(status)?;

                // STABXYZ. ffpcld = fits_write_col_dbl
                let mut c_xyz = [pos.x, pos.y, pos.z];
                fitsio_sys::ffpcld(self.fptr, 2, row, 1, 3, c_xyz.as_mut_ptr(), &mut status);
                fits_check_status(status)?;

                // NOSTA. ffpclk = fits_write_col_int
                fitsio_sys::ffpclk(self.fptr, 3, row, 1, 1, &mut (row as i32), &mut status);
                fits_check_status(status)?;

                // MNTSTA
                fitsio_sys::ffpclk(self.fptr, 4, row, 1, 1, &mut 0, &mut status);
                fits_check_status(status)?;

                // POLTYA
                fitsio_sys::ffpcls(self.fptr, 6, row, 1, 1, &mut x_c_str, &mut status);
                fits_check_status(status)?;

                // POLAA. ffpcle = fits_write_col_flt
                fitsio_sys::ffpcle(self.fptr, 7, row, 1, 1, &mut 0.0, &mut status);
                fits_check_status(status)?;

                // POLCALA
                fitsio_sys::ffpcle(self.fptr, 8, row, 1, 1, &mut 0.0, &mut status);
                fits_check_status(status)?;

                // POLTYB
                fitsio_sys::ffpcls(self.fptr, 9, row, 1, 1, &mut y_c_str, &mut status);
                fits_check_status(status)?;

                // POLAB
                fitsio_sys::ffpcle(self.fptr, 10, row, 1, 1, &mut 90.0, &mut status);
                fits_check_status(status)?;

                // POLCALB
                fitsio_sys::ffpcle(self.fptr, 11, row, 1, 1, &mut 0.0, &mut status);
                fits_check_status(status)?;
            }
        }
        Ok(())
    }
}

fn fits_write_int(
    fptr: *mut fitsio_sys::fitsfile,
    keyname: &str,
    value: i64,
    comment: Option<&str>,
) -> Result<(), UvfitsWriteError> {
    let mut status = 0;
    let keyname = CString::new(keyname)?;
    let comment = comment.map(CString::new).transpose()?;
    unsafe {
        // ffukyj = fits_update_key_lng
        fitsio_sys::ffukyj(
            fptr,
            keyname.as_ptr(),
            value,
            comment.as_ref().map_or(std::ptr::null(), |c| c.as_ptr()),
            &mut status,
        );
    }
    fits_check_status(status)?;
    Ok(())
}

fn fits_write_double(
    fptr: *mut fitsio_sys::fitsfile,
    keyname: &str,
    value: f64,
    comment: Option<&str>,
) -> Result<(), UvfitsWriteError> {
    let mut status = 0;
    let keyname = CString::new(keyname)?;
    let comment = comment.map(CString::new).transpose()?;
    unsafe {
        // ffukyd = fits_update_key_dbl; -15 decimals means %G formatting.
        fitsio_sys::ffukyd(
            fptr,
            keyname.as_ptr(),
            value,
            -15,
            comment.as_ref().map_or(std::ptr::null(), |c| c.as_ptr()),
            &mut status,
        );
    }
    fits_check_status(status)?;
    Ok(())
}

fn fits_write_string(
    fptr: *mut fitsio_sys::fitsfile,
    keyname: &str,
    value: &str,
    comment: Option<&str>,
) -> Result<(), UvfitsWriteError> {
    let mut status = 0;
    let keyname = CString::new(keyname)?;
    let value = CString::new(value)?;
    let comment = comment.map(CString::new).transpose()?;
    unsafe {
        // ffukys = fits_update_key_str
        fitsio_sys::ffukys(
            fptr,
            keyname.as_ptr(),
            value.as_ptr(),
            comment.as_ref().map_or(std::ptr::null(), |c| c.as_ptr()),
            &mut status,
        );
    }
    fits_check_status(status)?;
    Ok(())
}

fn fits_write_comment(fptr: *mut fitsio_sys::fitsfile, comment: &str) -> Result<(), UvfitsWriteError> {
    let mut status = 0;
    let comment = CString::new(comment)?;
    unsafe {
        // ffpcom = fits_write_comment
        fitsio_sys::ffpcom(fptr, comment.as_ptr(), &mut status);
    }
    fits_check_status(status)?;
    Ok(())
}

fn fits_write_history(fptr: *mut fitsio_sys::fitsfile, history: &str) -> Result<(), UvfitsWriteError> {
    let mut status = 0;
    let history = CString::new(history)?;
    unsafe {
        // ffphis = fits_write_history
        fitsio_sys::ffphis(fptr, history.as_ptr(), &mut status);
    }
    fits_check_status(status)?;
    Ok(())
}

/// The stricter checks run before export when asked.
fn validate(dataset: &FinalisedDataset) -> Result<(), String> {
    let d = &dataset.data;
    let (t, b, c, p) = (
        d.num_times(),
        d.num_baselines(),
        d.num_chans(),
        d.num_pol_products(),
    );
    if d.vis.dim() != (t, b, c, p) {
        return Err(format!(
            "visibilities have shape {:?}, expected {:?}",
            d.vis.dim(),
            (t, b, c, p)
        ));
    }
    if d.flags.dim() != (t, b, c, p) || d.nsamples.dim() != (t, b, c, p) {
        return Err("flags or sample counts don't match the visibilities".to_string());
    }
    if d.uvws.dim() != (t, b) || d.integration_times.len() != t {
        return Err("UVWs or integration times don't match the time axis".to_string());
    }
    if let Some(((i_t, i_b, i_c, i_p), v)) = d
        .vis
        .indexed_iter()
        .find(|(_, v)| !(v.re.is_finite() && v.im.is_finite()))
    {
        return Err(format!(
            "visibility at timestep {i_t}, baseline {i_b}, channel {i_c}, product {i_p} is {v}"
        ));
    }
    if d.nsamples.iter().any(|n| !n.is_finite() || *n < 0.0) {
        return Err("sample counts must be finite and non-negative".to_string());
    }
    for ((i_t, i_b), uvw) in d.uvws.indexed_iter() {
        if !uvw.to_array().iter().all(|x| x.is_finite()) {
            return Err(format!("UVW at timestep {i_t}, baseline {i_b} isn't finite"));
        }
        if d.baselines[i_b].is_auto() && *uvw != UVW::default() {
            return Err(format!(
                "auto-correlation {} has a non-zero UVW at timestep {i_t}",
                d.baselines[i_b]
            ));
        }
    }
    if let Some(w) = d.timestamps.windows(2).position(|w| w[1] < w[0]) {
        return Err(format!("timestep {} is earlier than timestep {w}", w + 1));
    }
    Ok(())
}

/// Write every row of `dataset` to a new uvfits file at `path`.
fn write_dataset(dataset: &FinalisedDataset, path: &Path) -> Result<(), UvfitsWriteError> {
    let d = &dataset.data;
    let centre_freq_chan = d.num_chans() / 2;
    let antenna_positions = d
        .antennas
        .iter()
        .map(|a| a.position.to_geodetic(dataset.telescope_location))
        .collect::<Result<Vec<_>, _>>()?;
    let header = UvfitsHeader {
        num_timesteps: d.num_times(),
        num_baselines: d.num_baselines(),
        num_chans: d.num_chans(),
        num_pol_products: d.num_pol_products(),
        start_epoch: d.timestamps[0],
        channel_width_hz: d.channel_width_hz,
        centre_freq_hz: d.freqs_hz[centre_freq_chan],
        centre_freq_chan,
        phase_centre: dataset.phase_centre,
        object_name: dataset.object_name.clone(),
        telescope_name: dataset.telescope_name.clone(),
        instrument: dataset.instrument.clone(),
        array_pos: dataset.telescope_location,
        antenna_names: d.antennas.iter().map(|a| a.name.clone()).collect(),
        antenna_positions,
        dut1: dataset.dut1,
    };
    let mut writer = UvfitsWriter::new(path, header)?;

    let mut weights = Array2::zeros((d.num_chans(), d.num_pol_products()));
    for (i_t, (&epoch, &inttim)) in d.timestamps.iter().zip(&d.integration_times).enumerate() {
        for (i_b, bl) in d.baselines.iter().enumerate() {
            for (w, &n, &flag) in izip!(
                weights.iter_mut(),
                d.nsamples.slice(s![i_t, i_b, .., ..]),
                d.flags.slice(s![i_t, i_b, .., ..])
            ) {
                *w = if flag { -n } else { n };
            }
            writer.write_row(
                d.uvws[[i_t, i_b]],
                bl.ant1,
                bl.ant2,
                epoch,
                inttim,
                d.vis.slice(s![i_t, i_b, .., ..]),
                weights.view(),
            )?;
        }
    }
    writer.finalise()
}

/// Export a finalised dataset to a uvfits file at `dest`.
///
/// The file is written under a temporary name in the destination directory
/// and renamed into place once complete, so a failed export never leaves a
/// partial file at `dest`. With `validate`, the dataset is checked for
/// non-finite values, non-zero auto-correlation UVWs and time going
/// backwards before anything is written.
pub fn export_uvfits(
    dataset: &FinalisedDataset,
    dest: &Path,
    validate_first: bool,
) -> Result<(), ExportError> {
    let num_pols = dataset.data.num_pols;
    if !(1..=2).contains(&num_pols) {
        return Err(ExportError::UnsupportedPolarisations(num_pols));
    }
    if dataset.data.num_rows() == 0 || dataset.data.num_chans() == 0 {
        return Err(ExportError::Validation("there is nothing to write".to_string()));
    }
    if validate_first {
        validate(dataset).map_err(ExportError::Validation)?;
        debug!("Dataset passed validation");
    }

    let dir = match dest.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let temp = tempfile::Builder::new()
        .prefix(".xengine-vis-")
        .suffix(".uvfits")
        .tempfile_in(dir)
        .map_err(UvfitsWriteError::from)?
        .into_temp_path();
    trace!("Writing to temporary file {}", temp.display());
    write_dataset(dataset, &temp)?;

    temp.persist(dest).map_err(|e| ExportError::Persist {
        dest: dest.to_path_buf(),
        err: e.error,
    })?;
    debug!("Wrote {}", dest.display());
    Ok(())
}
