// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The observation descriptor: a JSON file describing the array, the
//! spectral setup and where the correlator dumps live.

use std::{
    collections::{HashMap, HashSet},
    path::{Path, PathBuf},
    time::SystemTime,
};

use chrono::{DateTime, Datelike, NaiveDateTime, Timelike, Utc};
use hifitime::{Duration, Epoch};
use log::debug;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::{
    constants::DEFAULT_COORDINATE_TABLE,
    error::ConfigError,
    math::{num_baselines, triangular_baselines, Baseline},
    LatLngHeight, RADec, XyzGeocentric, UVW,
};

const REQUIRED_KEYS: [&str; 13] = [
    "antenna_names",
    "num_baselines",
    "instrument",
    "telescope_name",
    "telescope_location",
    "object_name",
    "channel_width",
    "first_channel_center_freq",
    "integration_time_seconds",
    "polarizations",
    "input_dir",
    "output_dir",
    "observation_base_name",
];

/// Which frame the rows of an antenna coordinate table are in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CoordinateFrame {
    /// Global earth-centred, earth-fixed positions.
    Ecef,
    /// East, north and up offsets from the telescope location.
    Enu,
}

/// Where antenna positions come from.
#[derive(Clone, Debug, PartialEq)]
pub enum AntennaCoordinates {
    /// A comma-separated table keyed by antenna name.
    Table { path: PathBuf, frame: CoordinateFrame },
    /// Earth-fixed offsets from the telescope, one per antenna in declaration
    /// order.
    RelativeItrf(Vec<XyzGeocentric>),
}

/// A parsed and validated observation descriptor. Nothing downstream mutates
/// it.
#[derive(Clone, Debug)]
pub struct ObservationDescriptor {
    /// The file this was read from.
    pub path: PathBuf,

    /// Antenna names in declaration order. This order defines the baselines.
    pub antenna_names: Vec<String>,
    pub num_baselines: usize,

    pub instrument: String,
    pub telescope_name: String,
    pub telescope_location: LatLngHeight,
    /// The earth-fixed position of `telescope_location`.
    pub telescope_xyz: XyzGeocentric,

    pub object_name: String,
    /// The `object_ra`/`object_dec` pair, if given.
    pub object_radec: Option<RADec>,

    /// \[Hz\]
    pub channel_width_hz: f64,
    /// \[Hz\]
    pub first_channel_center_freq_hz: f64,
    pub integration_time_seconds: f64,
    /// The number of feeds per antenna, `P`. Each baseline carries `P²`
    /// products.
    pub num_pols: usize,

    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub observation_base_name: String,

    pub observation_start: Option<Epoch>,
    /// Instrumental delays \[ns\], keyed by upper-case antenna name.
    pub antenna_delays_ns: Option<HashMap<String, f64>>,
    pub antenna_coordinates: AntennaCoordinates,
    pub baseline_uvw_vectors: Option<Vec<UVW>>,
    pub uvw_file: Option<PathBuf>,
    /// UT1 - UTC.
    pub dut1: Duration,
}

/// Why a JSON field couldn't be used.
#[derive(Debug)]
pub(crate) enum FieldError {
    Missing(&'static str),
    Invalid { key: &'static str, reason: String },
}

/// The top-level object of a JSON metadata file, with typed accessors whose
/// errors name the offending key.
pub(crate) struct JsonFields {
    map: Map<String, Value>,
}

impl JsonFields {
    pub(crate) fn parse(text: &str) -> Result<Self, serde_json::Error> {
        Ok(Self {
            map: serde_json::from_str(text)?,
        })
    }

    pub(crate) fn contains(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    /// The first of `keys` that isn't present.
    pub(crate) fn first_missing(&self, keys: &[&'static str]) -> Option<&'static str> {
        keys.iter().copied().find(|k| !self.contains(k))
    }

    pub(crate) fn required<T: DeserializeOwned>(&self, key: &'static str) -> Result<T, FieldError> {
        match self.optional(key)? {
            Some(v) => Ok(v),
            None => Err(FieldError::Missing(key)),
        }
    }

    /// A `null` value is the same as an absent one.
    pub(crate) fn optional<T: DeserializeOwned>(
        &self,
        key: &'static str,
    ) -> Result<Option<T>, FieldError> {
        match self.map.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(v) => T::deserialize(v)
                .map(Some)
                .map_err(|e| FieldError::Invalid {
                    key,
                    reason: e.to_string(),
                }),
        }
    }
}

impl ObservationDescriptor {
    /// Read and validate a descriptor.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<ObservationDescriptor, ConfigError> {
        let path = path.as_ref();
        debug!("Reading observation descriptor {}", path.display());
        let text = std::fs::read_to_string(path).map_err(|err| ConfigError::Read {
            file: path.to_path_buf(),
            err,
        })?;
        Self::from_json(&text, path)
    }

    /// Parse a descriptor from JSON text. `path` is used in error messages and
    /// to resolve a relative coordinate-table path.
    pub fn from_json(text: &str, path: &Path) -> Result<ObservationDescriptor, ConfigError> {
        let fields = JsonFields::parse(text).map_err(|err| ConfigError::Parse {
            file: path.to_path_buf(),
            err,
        })?;
        let file = path.to_path_buf();
        let e = |fe: FieldError| match fe {
            FieldError::Missing(key) => ConfigError::MissingKey {
                key,
                file: file.clone(),
            },
            FieldError::Invalid { key, reason } => ConfigError::InvalidValue {
                key,
                file: file.clone(),
                reason,
            },
        };
        let invalid = |key: &'static str, reason: String| ConfigError::InvalidValue {
            key,
            file: path.to_path_buf(),
            reason,
        };

        // "baselines" is accepted in place of "num_baselines".
        let baselines_key = if !fields.contains("num_baselines") && fields.contains("baselines") {
            "baselines"
        } else {
            "num_baselines"
        };
        for key in REQUIRED_KEYS {
            let key = if key == "num_baselines" { baselines_key } else { key };
            if !fields.contains(key) {
                return Err(ConfigError::MissingKey {
                    key: if key == "baselines" { "num_baselines" } else { key },
                    file: path.to_path_buf(),
                });
            }
        }

        let antenna_names: Vec<String> = fields.required("antenna_names").map_err(e)?;
        let num_baselines_given: usize = fields.required(baselines_key).map_err(e)?;
        let instrument: String = fields.required("instrument").map_err(e)?;
        let telescope_name: String = fields.required("telescope_name").map_err(e)?;
        let location: [f64; 3] = fields.required("telescope_location").map_err(e)?;
        let object_name: String = fields.required("object_name").map_err(e)?;
        let channel_width_hz: f64 = fields.required("channel_width").map_err(e)?;
        let first_channel_center_freq_hz: f64 =
            fields.required("first_channel_center_freq").map_err(e)?;
        let integration_time_seconds: f64 =
            fields.required("integration_time_seconds").map_err(e)?;
        let num_pols: usize = fields.required("polarizations").map_err(e)?;
        let input_dir: PathBuf = fields.required("input_dir").map_err(e)?;
        let output_dir: PathBuf = fields.required("output_dir").map_err(e)?;
        let observation_base_name: String = fields.required("observation_base_name").map_err(e)?;

        // Antennas.
        if antenna_names.is_empty() {
            return Err(invalid("antenna_names", "no antennas are listed".to_string()));
        }
        let mut seen = HashSet::new();
        for name in &antenna_names {
            if name.trim().is_empty() {
                return Err(invalid("antenna_names", "empty antenna name".to_string()));
            }
            if !seen.insert(name.to_uppercase()) {
                return Err(invalid(
                    "antenna_names",
                    format!("antenna '{name}' is listed more than once"),
                ));
            }
        }
        let num_ants = antenna_names.len();
        if num_baselines_given != num_baselines(num_ants) {
            return Err(ConfigError::BaselineMismatch {
                num_baselines: num_baselines_given,
                num_ants,
                expected: num_baselines(num_ants),
            });
        }

        let [lat, lon, alt] = location;
        if !(-90.0..=90.0).contains(&lat) || !lon.is_finite() || !alt.is_finite() {
            return Err(invalid(
                "telescope_location",
                format!("[{lat}, {lon}, {alt}] is not a valid [latitude, longitude, altitude]"),
            ));
        }
        let telescope_location = LatLngHeight::from_degrees(lat, lon, alt);
        let telescope_xyz = telescope_location
            .to_geocentric_wgs84()
            .map_err(|err| invalid("telescope_location", err.to_string()))?;
        if !(channel_width_hz.is_finite() && channel_width_hz > 0.0) {
            return Err(invalid("channel_width", "must be positive".to_string()));
        }
        if !first_channel_center_freq_hz.is_finite() {
            return Err(invalid(
                "first_channel_center_freq",
                "must be a finite frequency".to_string(),
            ));
        }
        if !(integration_time_seconds.is_finite() && integration_time_seconds > 0.0) {
            return Err(invalid("integration_time_seconds", "must be positive".to_string()));
        }
        if num_pols == 0 {
            return Err(invalid("polarizations", "must be at least 1".to_string()));
        }

        // Optional keys.
        let object_ra: Option<f64> = fields.optional("object_ra").map_err(e)?;
        let object_dec: Option<f64> = fields.optional("object_dec").map_err(e)?;
        let object_radec = match (object_ra, object_dec) {
            (Some(ra), Some(dec)) => {
                if !(-90.0..=90.0).contains(&dec) {
                    return Err(invalid("object_dec", format!("{dec} is outside ±90°")));
                }
                Some(RADec::from_degrees(ra.rem_euclid(360.0), dec))
            }
            (None, None) => None,
            (Some(_), None) => {
                return Err(invalid("object_dec", "object_ra was given without it".to_string()))
            }
            (None, Some(_)) => {
                return Err(invalid("object_ra", "object_dec was given without it".to_string()))
            }
        };

        let observation_start = match fields
            .optional::<String>("observation_start")
            .map_err(e)?
        {
            Some(s) => Some(parse_timestamp(&s)?),
            None => None,
        };

        let antenna_delays_ns = match fields
            .optional::<HashMap<String, f64>>("antenna_delays")
            .map_err(e)?
        {
            Some(delays) => {
                let delays: HashMap<String, f64> = delays
                    .into_iter()
                    .map(|(k, v)| (k.to_uppercase(), v))
                    .collect();
                if let Some(name) = antenna_names
                    .iter()
                    .find(|n| !delays.contains_key(&n.to_uppercase()))
                {
                    return Err(invalid(
                        "antenna_delays",
                        format!("no delay for antenna '{name}'"),
                    ));
                }
                Some(delays)
            }
            None => None,
        };

        let relative: Option<Vec<[f64; 3]>> = fields
            .optional("antenna_coord_relative_telescope_itrf_m")
            .map_err(e)?;
        let antenna_coordinates = match relative {
            Some(offsets) => {
                if offsets.len() != num_ants {
                    return Err(invalid(
                        "antenna_coord_relative_telescope_itrf_m",
                        format!("{} offsets for {num_ants} antennas", offsets.len()),
                    ));
                }
                AntennaCoordinates::RelativeItrf(
                    offsets
                        .into_iter()
                        .map(|[x, y, z]| XyzGeocentric { x, y, z })
                        .collect(),
                )
            }
            None => {
                let table: PathBuf = fields
                    .optional("antenna_coordinates_file")
                    .map_err(e)?
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_COORDINATE_TABLE));
                let table = if table.is_relative() {
                    path.parent().unwrap_or_else(|| Path::new(".")).join(table)
                } else {
                    table
                };
                let frame = match fields
                    .optional::<String>("antenna_coordinates_frame")
                    .map_err(e)?
                    .as_deref()
                {
                    None => CoordinateFrame::Ecef,
                    Some(f) if f.eq_ignore_ascii_case("ecef") => CoordinateFrame::Ecef,
                    Some(f) if f.eq_ignore_ascii_case("enu") => CoordinateFrame::Enu,
                    Some(f) => {
                        return Err(invalid(
                            "antenna_coordinates_frame",
                            format!("'{f}' is neither 'ecef' nor 'enu'"),
                        ))
                    }
                };
                AntennaCoordinates::Table { path: table, frame }
            }
        };

        let baseline_uvw_vectors = match fields
            .optional::<Vec<[f64; 3]>>("baseline_uvw_vectors")
            .map_err(e)?
        {
            Some(v) => {
                if v.len() != num_baselines_given {
                    return Err(invalid(
                        "baseline_uvw_vectors",
                        format!("{} vectors for {num_baselines_given} baselines", v.len()),
                    ));
                }
                Some(v.into_iter().map(|[u, v, w]| UVW { u, v, w }).collect())
            }
            None => None,
        };

        let uvw_file: Option<PathBuf> = fields.optional("uvw_file").map_err(e)?;
        let dut1: f64 = fields.optional("dut1_seconds").map_err(e)?.unwrap_or(0.0);

        Ok(ObservationDescriptor {
            path: path.to_path_buf(),
            antenna_names,
            num_baselines: num_baselines_given,
            instrument,
            telescope_name,
            telescope_location,
            telescope_xyz,
            object_name,
            object_radec,
            channel_width_hz,
            first_channel_center_freq_hz,
            integration_time_seconds,
            num_pols,
            input_dir,
            output_dir,
            observation_base_name,
            observation_start,
            antenna_delays_ns,
            antenna_coordinates,
            baseline_uvw_vectors,
            uvw_file,
            dut1: Duration::from_seconds(dut1),
        })
    }

    /// The baselines in correlator order.
    pub fn baselines(&self) -> Vec<Baseline> {
        triangular_baselines(self.antenna_names.len())
    }

    pub fn num_ants(&self) -> usize {
        self.antenna_names.len()
    }

    /// `P²`, the number of correlation products per baseline.
    pub fn num_pol_products(&self) -> usize {
        self.num_pols * self.num_pols
    }

    /// Centre frequencies of the first `num_chans` channels \[Hz\].
    pub fn channel_freqs_hz(&self, num_chans: usize) -> Vec<f64> {
        (0..num_chans)
            .map(|i| self.first_channel_center_freq_hz + i as f64 * self.channel_width_hz)
            .collect()
    }

    /// Where the dataset is written when no output path is given.
    pub fn default_output(&self) -> PathBuf {
        self.output_dir
            .join(format!("{}.uvfits", self.observation_base_name))
    }
}

/// Read a descriptor and derive its baseline ordering.
pub fn load_descriptor<P: AsRef<Path>>(
    path: P,
) -> Result<(ObservationDescriptor, Vec<Baseline>), ConfigError> {
    let desc = ObservationDescriptor::load(path)?;
    let baselines = desc.baselines();
    Ok((desc, baselines))
}

fn epoch_from_naive_utc(dt: NaiveDateTime) -> Epoch {
    Epoch::from_gregorian_utc(
        dt.year(),
        dt.month() as u8,
        dt.day() as u8,
        dt.hour() as u8,
        dt.minute() as u8,
        dt.second() as u8,
        // chrono represents a leap second as nanoseconds past 1e9.
        dt.nanosecond().min(999_999_999),
    )
}

/// Parse an RFC 3339 timestamp, or `YYYY-MM-DD HH:MM:SS[.f][Z]` taken as UTC.
pub fn parse_timestamp(s: &str) -> Result<Epoch, ConfigError> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(epoch_from_naive_utc(dt.with_timezone(&Utc).naive_utc()));
    }
    for fmt in [
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.fZ",
        "%Y-%m-%dT%H:%M:%S%.fZ",
    ] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(epoch_from_naive_utc(dt));
        }
    }
    Err(ConfigError::BadTimestamp(s.to_string()))
}

/// Convert a filesystem timestamp to an [`Epoch`].
pub fn epoch_from_system_time(t: SystemTime) -> Epoch {
    let dt: DateTime<Utc> = t.into();
    epoch_from_naive_utc(dt.naive_utc())
}
