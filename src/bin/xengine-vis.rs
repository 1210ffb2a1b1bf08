// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use clap::Parser;

use xengine_vis::{cli::XengineVis, ConvertError};

fn main() {
    // Run xengine-vis, only to report the error (if any) and exit with the
    // code of its class.
    if let Err(e) = try_main() {
        eprintln!("Error: {e}");
        std::process::exit(e.exit_code());
    }
}

fn try_main() -> Result<(), ConvertError> {
    XengineVis::parse().run()
}
