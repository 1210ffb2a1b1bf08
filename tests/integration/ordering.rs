// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Dump files reach the assembler in time order, whatever they're called.

use xengine_vis::{
    convert::{convert, ConvertParams},
    dump::FileOrder,
    error::ConsistencyError,
    ConvertError,
};

use crate::{read_row_dates, seq, Obs};

fn params(obs: &Obs, order: FileOrder) -> ConvertParams {
    ConvertParams {
        descriptor: obs.descriptor.clone(),
        output: None,
        validate: true,
        fringe_stop: None,
        order,
    }
}

fn assert_non_decreasing(dates: &[f64]) {
    for pair in dates.windows(2) {
        assert!(pair[0] <= pair[1], "{} came after {}", pair[1], pair[0]);
    }
}

#[test]
fn test_mtime_order_beats_names() {
    let obs = Obs::new(3, 1);
    // Alphabetical order is the reverse of chronological order.
    obs.add_dump("obs_c", seq(0.0), 2, 2, 0, 0);
    obs.add_dump("obs_b", seq(4.0), 2, 2, 0, 60);
    obs.add_dump("obs_a", seq(8.0), 2, 2, 0, 120);

    let summary = convert(&params(&obs, FileOrder::ModificationTime)).unwrap();
    assert_eq!(summary.files_used, 3);
    assert_eq!(summary.num_timesteps, 6);

    let dates = read_row_dates(&summary.output);
    assert_eq!(dates.len(), 6 * 6);
    assert_non_decreasing(&dates);
    // 2 s between the first and last row of the first dump.
    approx::assert_abs_diff_eq!(dates[6] - dates[0], 2.0 / 86400.0, epsilon = 1e-7);
}

#[test]
fn test_sequence_order() {
    let obs = Obs::new(2, 1);
    // Modification times are scrambled; sequence numbers aren't.
    obs.add_dump("obs_0000", seq(0.0), 1, 1, 0, 500);
    obs.add_dump("obs_0001", seq(2.0), 1, 1, 0, 0);
    obs.add_dump("obs_0002", seq(4.0), 1, 1, 0, 250);

    let result = convert(&params(&obs, FileOrder::ModificationTime));
    assert!(matches!(
        result,
        Err(ConvertError::Consistency(ConsistencyError::TimeWentBackwards { .. }))
    ));

    let summary = convert(&params(&obs, FileOrder::SequenceNumber)).unwrap();
    let dates = read_row_dates(&summary.output);
    assert_eq!(dates.len(), 3 * 3);
    assert_non_decreasing(&dates);
}
