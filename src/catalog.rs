// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! A small catalogue of bright calibrators, used to resolve an observation's
//! `object_name` to a phase centre.

use std::collections::HashMap;

use lazy_static::lazy_static;
use log::{debug, info};

use crate::{descriptor::ObservationDescriptor, error::ConfigError, RADec};

/// (names, RA \[deg\], Dec \[deg\]), J2000.
const SOURCES: &[(&[&str], f64, f64)] = &[
    (&["3C286"], 202.784533, 30.509155),
    (&["3C48"], 24.422083, 33.159750),
    (&["3C147"], 85.650575, 49.852008),
    (&["3C138"], 80.291192, 16.639458),
    (&["3C196"], 123.400138, 48.217378),
    (&["3C295"], 212.835500, 52.202500),
    (&["3C84", "PerA", "Perseus A"], 49.950667, 41.511695),
    (&["3C273"], 187.277916, 2.052388),
    (&["CasA", "Cassiopeia A", "3C461"], 350.850000, 58.815000),
    (&["CygA", "Cygnus A", "3C405"], 299.868153, 40.733916),
    (&["TauA", "Taurus A", "Crab", "M1", "3C144"], 83.633083, 22.014500),
    (&["VirA", "Virgo A", "M87", "3C274"], 187.705930, 12.391123),
    (&["HerA", "Hercules A", "3C348"], 252.783958, 4.992583),
    (&["SgrA*", "SgrA", "Sagittarius A*"], 266.416817, -29.007825),
    (&["HydraA", "Hydra A", "3C218"], 139.523625, -12.095528),
    (&["PictorA", "Pictor A"], 79.957083, -45.778889),
    (&["FornaxA", "Fornax A"], 50.673750, -37.208333),
];

lazy_static! {
    static ref CATALOGUE: HashMap<String, RADec> = {
        let mut m = HashMap::new();
        for (names, ra, dec) in SOURCES {
            for name in names.iter() {
                m.insert(normalise(name), RADec::from_degrees(*ra, *dec));
            }
        }
        m
    };
}

/// Upper-case and drop spaces and punctuation, so "Cyg A", "cyg-a" and
/// "CYGA" are the same key.
fn normalise(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, ' ' | '-' | '_' | '.'))
        .flat_map(char::to_uppercase)
        .collect()
}

/// Look up a source by name.
pub fn lookup(name: &str) -> Option<RADec> {
    CATALOGUE.get(&normalise(name)).copied()
}

/// The phase centre of an observation: the catalogue position of its object
/// if known, otherwise the descriptor's `object_ra`/`object_dec`.
pub fn resolve_phase_centre(desc: &ObservationDescriptor) -> Result<RADec, ConfigError> {
    if let Some(radec) = lookup(&desc.object_name) {
        info!("Phase centre {} from the catalogue: {radec}", desc.object_name);
        return Ok(radec);
    }
    debug!("{} isn't in the catalogue", desc.object_name);
    match desc.object_radec {
        Some(radec) => {
            info!("Phase centre {} from the descriptor: {radec}", desc.object_name);
            Ok(radec)
        }
        None => Err(ConfigError::UnresolvablePhaseCentre(
            desc.object_name.clone(),
        )),
    }
}
