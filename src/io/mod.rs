// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Reading and writing files.

pub mod error;
pub mod glob;
pub mod uvfits;

pub use error::UvfitsWriteError;
pub use glob::{get_all_matches_from_glob, GlobError};
pub use uvfits::{export_uvfits, UvfitsWriter};
