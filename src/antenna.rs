// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Antenna positions and instrumental delays.

use std::{collections::BTreeMap, fs::File, path::Path};

use itertools::Itertools;
use log::{debug, warn};
use serde::Deserialize;

use crate::{
    descriptor::{AntennaCoordinates, CoordinateFrame, ObservationDescriptor},
    error::{ConsistencyError, ConvertError, FileIoError},
    LatLngHeight, XyzGeocentric, ENH,
};

/// An antenna's earth-fixed position and delay.
#[derive(Clone, Debug, PartialEq)]
pub struct AntennaPosition {
    pub name: String,
    pub position: XyzGeocentric,
    /// \[ns\]
    pub delay_ns: f64,
}

/// One row of an antenna coordinate table.
#[derive(Debug, Deserialize)]
struct CoordinateRow(String, f64, f64, f64);

/// Read a comma-separated antenna coordinate table. The first line is a
/// header; each following row is `name, c1, c2, c3`. ENU rows are offsets in
/// metres from `telescope` (whose earth-fixed position is `centre`) and are
/// converted to earth-fixed positions.
///
/// Names are upper-cased. Rows that can't be parsed are logged and skipped.
pub fn read_coordinate_table(
    path: &Path,
    frame: CoordinateFrame,
    telescope: LatLngHeight,
    centre: XyzGeocentric,
) -> Result<BTreeMap<String, XyzGeocentric>, FileIoError> {
    let file = File::open(path).map_err(|err| FileIoError::CoordinateTable {
        file: path.to_path_buf(),
        err,
    })?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(file);

    let (sin_lat, cos_lat) = telescope.latitude_rad.sin_cos();
    let (sin_lon, cos_lon) = telescope.longitude_rad.sin_cos();
    let mut table = BTreeMap::new();
    for row in reader.deserialize::<CoordinateRow>() {
        let CoordinateRow(name, c1, c2, c3) = match row {
            Ok(row) if !row.0.is_empty() => row,
            Ok(_) => {
                warn!("Skipping a row of {} with no antenna name", path.display());
                continue;
            }
            Err(e) => {
                warn!(
                    "Skipping a row of {}: expected 'name, c1, c2, c3' ({e})",
                    path.display()
                );
                continue;
            }
        };
        let name = name.to_uppercase();

        let position = match frame {
            CoordinateFrame::Ecef => XyzGeocentric {
                x: c1,
                y: c2,
                z: c3,
            },
            CoordinateFrame::Enu => ENH {
                e: c1,
                n: c2,
                h: c3,
            }
            .to_xyz_inner(sin_lat, cos_lat)
            .to_geocentric_inner(centre, sin_lon, cos_lon),
        };
        if table.insert(name.clone(), position).is_some() {
            warn!("Antenna {name} appears more than once in {}; using the last row", path.display());
        }
    }

    if table.is_empty() {
        return Err(FileIoError::EmptyCoordinateTable(path.to_path_buf()));
    }
    debug!("Read {} antenna positions from {}", table.len(), path.display());
    Ok(table)
}

/// Earth-fixed positions and delays for every descriptor antenna, in
/// declaration order.
pub fn resolve_antennas(desc: &ObservationDescriptor) -> Result<Vec<AntennaPosition>, ConvertError> {
    let positions: Vec<XyzGeocentric> = match &desc.antenna_coordinates {
        AntennaCoordinates::RelativeItrf(offsets) => {
            offsets.iter().map(|&o| desc.telescope_xyz + o).collect()
        }
        AntennaCoordinates::Table { path, frame } => {
            let table =
                read_coordinate_table(path, *frame, desc.telescope_location, desc.telescope_xyz)?;
            desc.antenna_names
                .iter()
                .map(|name| {
                    table.get(&name.to_uppercase()).copied().ok_or_else(|| {
                        ConsistencyError::UnknownAntenna {
                            name: name.clone(),
                            valid: table.keys().join(", "),
                        }
                    })
                })
                .collect::<Result<_, _>>()?
        }
    };

    Ok(desc
        .antenna_names
        .iter()
        .zip(positions)
        .map(|(name, position)| AntennaPosition {
            name: name.clone(),
            position,
            delay_ns: desc
                .antenna_delays_ns
                .as_ref()
                .and_then(|d| d.get(&name.to_uppercase()).copied())
                .unwrap_or(0.0),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use indoc::indoc;

    use super::*;
    use crate::test_utils::write_file;

    fn site() -> LatLngHeight {
        LatLngHeight::from_degrees(40.817431, -121.470736, 1019.222)
    }

    fn centre() -> XyzGeocentric {
        site().to_geocentric_wgs84().unwrap()
    }

    #[test]
    fn test_read_ecef_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            dir.path(),
            "coords.txt",
            indoc! {"
                name,x,y,z
                1a, -2524041.5, -4123587.9, 4147646.4

                1c,-2524036.0,-4123530.2,4147699.7
                broken line
                2h, -2524012.4, -4123645.1, nope
            "},
        );
        let table = read_coordinate_table(&path, CoordinateFrame::Ecef, site(), centre()).unwrap();
        assert_eq!(table.len(), 2);
        assert_abs_diff_eq!(table["1A"].x, -2524041.5);
        assert_abs_diff_eq!(table["1C"].z, 4147699.7);
        assert!(!table.contains_key("2H"));
    }

    #[test]
    fn test_quoted_and_short_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            dir.path(),
            "coords.txt",
            indoc! {r#"
                name,x,y,z
                "3c, east", 1.0, 2.0, 3.0
                4d, 1.0, 2.0
                , 7.0, 8.0, 9.0
            "#},
        );
        let table = read_coordinate_table(&path, CoordinateFrame::Ecef, site(), centre()).unwrap();
        assert_eq!(table.len(), 1);
        assert_abs_diff_eq!(table["3C, EAST"].y, 2.0);
    }

    #[test]
    fn test_read_enu_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "coords.txt", "name,e,n,u\nA0,0,0,0\nA1,0,0,10\n");
        let table = read_coordinate_table(&path, CoordinateFrame::Enu, site(), centre()).unwrap();
        assert_abs_diff_eq!(table["A0"], centre(), epsilon = 1e-6);

        // Ten metres up points along the local vertical.
        let up = table["A1"] - table["A0"];
        let (s_lat, c_lat) = site().latitude_rad.sin_cos();
        let (s_lon, c_lon) = site().longitude_rad.sin_cos();
        assert_abs_diff_eq!(up.x, 10.0 * c_lat * c_lon, epsilon = 1e-6);
        assert_abs_diff_eq!(up.y, 10.0 * c_lat * s_lon, epsilon = 1e-6);
        assert_abs_diff_eq!(up.z, 10.0 * s_lat, epsilon = 1e-6);
    }

    #[test]
    fn test_missing_and_empty_tables() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.txt");
        assert!(matches!(
            read_coordinate_table(&missing, CoordinateFrame::Ecef, site(), centre()),
            Err(FileIoError::CoordinateTable { .. })
        ));

        let empty = write_file(dir.path(), "empty.txt", "name,x,y,z\n");
        assert!(matches!(
            read_coordinate_table(&empty, CoordinateFrame::Ecef, site(), centre()),
            Err(FileIoError::EmptyCoordinateTable(_))
        ));
    }
}
