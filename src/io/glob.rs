// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Find dump files on the filesystem.

use std::path::{Path, PathBuf};

use glob::{glob, Pattern};
use thiserror::Error;

/// Given a glob pattern, get all of the matches from the filesystem.
pub fn get_all_matches_from_glob(g: &str) -> Result<Vec<PathBuf>, GlobError> {
    let mut entries = vec![];
    for entry in glob(g)? {
        match entry {
            Ok(e) => entries.push(e),
            Err(e) => return Err(GlobError::GlobError(e)),
        }
    }
    Ok(entries)
}

/// The glob pattern matching every file in `dir` whose name starts with
/// `prefix` and ends with `suffix`. Metacharacters in the directory and the
/// prefix are escaped, so only the wildcard between them is active.
pub fn prefix_pattern(dir: &Path, prefix: &str, suffix: &str) -> String {
    format!(
        "{}/{}*{}",
        Pattern::escape(&dir.display().to_string()),
        Pattern::escape(prefix),
        suffix
    )
}

#[derive(Error, Debug)]
/// Error type associated with glob helper functions.
pub enum GlobError {
    #[error("{0}")]
    GlobError(#[from] glob::GlobError),

    #[error("{0}")]
    PatternError(#[from] glob::PatternError),
}
