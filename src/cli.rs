// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Command-line interface code.

use std::path::PathBuf;

use clap::{AppSettings, ArgEnum, Args, Parser, Subcommand};
use log::info;

use crate::{
    convert::{convert, ConvertParams},
    dump::FileOrder,
    error::ConvertError,
};

#[allow(dead_code)]
mod built_info {
    // Add build-time information from the "built" crate.
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

#[derive(Debug, Parser)]
#[clap(
    version,
    author,
    about = "Convert X-engine correlator dumps into UVFITS visibilities"
)]
#[clap(global_setting(AppSettings::DeriveDisplayOrder))]
#[clap(disable_help_subcommand = true)]
#[clap(infer_subcommands = true)]
#[clap(propagate_version = true)]
pub struct XengineVis {
    #[clap(flatten)]
    global_opts: GlobalArgs,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct GlobalArgs {
    /// The verbosity of the program. Increase by specifying multiple times
    /// (e.g. -vv). The default is to print only high-level information.
    #[clap(short, long, parse(from_occurrences))]
    #[clap(global = true)]
    verbosity: u8,
}

#[derive(Debug, Subcommand)]
#[clap(arg_required_else_help = true)]
enum Command {
    #[clap(about = "Assemble an observation's dumps and write them out as UVFITS.")]
    Convert(ConvertArgs),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ArgEnum)]
enum OrderBy {
    Mtime,
    Seq,
}

#[derive(Debug, Args)]
pub struct ConvertArgs {
    /// Path to the observation descriptor (JSON).
    #[clap(short, long, parse(from_os_str))]
    input: PathBuf,

    /// The UVFITS file to write. Defaults to
    /// {output_dir}/{observation_base_name}.uvfits from the descriptor.
    #[clap(short, long, parse(from_os_str))]
    output: Option<PathBuf>,

    /// Check the assembled data for NaNs, non-zero auto-correlation UVWs and
    /// time ordering before writing anything.
    #[clap(short = 'c', long)]
    validate: bool,

    /// Fringe-stop even if the descriptor has no antenna delays.
    #[clap(long, conflicts_with("no-fringe-stop"))]
    fringe_stop: bool,

    /// Don't fringe-stop, even if the descriptor has antenna delays.
    #[clap(long)]
    no_fringe_stop: bool,

    /// How to put the dump files into chronological order.
    #[clap(long, arg_enum, default_value = "mtime")]
    order_by: OrderBy,
}

impl ConvertArgs {
    pub fn into_params(self) -> ConvertParams {
        let fringe_stop = match (self.fringe_stop, self.no_fringe_stop) {
            (true, _) => Some(true),
            (false, true) => Some(false),
            (false, false) => None,
        };
        ConvertParams {
            descriptor: self.input,
            output: self.output,
            validate: self.validate,
            fringe_stop,
            order: match self.order_by {
                OrderBy::Mtime => FileOrder::ModificationTime,
                OrderBy::Seq => FileOrder::SequenceNumber,
            },
        }
    }
}

impl XengineVis {
    pub fn run(self) -> Result<(), ConvertError> {
        if let Err(e) = setup_logging(self.global_opts.verbosity) {
            eprintln!("Couldn't initialise logging: {e}");
        }

        let sub_command = match &self.command {
            Command::Convert(_) => "convert",
        };
        info!(
            "xengine-vis {} {}",
            sub_command,
            env!("CARGO_PKG_VERSION")
        );
        display_build_info();

        match self.command {
            Command::Convert(args) => {
                convert(&args.into_params())?;
            }
        }

        info!("xengine-vis {} complete.", sub_command);
        Ok(())
    }
}

/// Activate a logger. All log messages are put onto `stdout`, leaving
/// `stderr` for the final error message. Source code lines are only shown at
/// the highest verbosity.
fn setup_logging(verbosity: u8) -> Result<(), log::SetLoggerError> {
    let mut builder = env_logger::Builder::from_default_env();
    builder.target(env_logger::Target::Stdout);
    builder.format_target(false);
    match verbosity {
        0 => builder.filter_level(log::LevelFilter::Info),
        1 => builder.filter_level(log::LevelFilter::Debug),
        2 => builder.filter_level(log::LevelFilter::Trace),
        _ => {
            builder.filter_level(log::LevelFilter::Trace);
            builder.format(|buf, record| {
                use std::io::Write;

                let timestamp = buf.timestamp();
                let level = record.level();
                let target = record.target();
                let line = record.line().unwrap_or(0);
                let message = record.args();

                writeln!(buf, "[{timestamp} {level} {target}:{line}] {message}")
            })
        }
    };
    builder.try_init()
}

/// Write info-level log lines of how this executable was compiled.
fn display_build_info() {
    use built_info::*;

    let dirty = match GIT_DIRTY {
        Some(true) => " (dirty)",
        _ => "",
    };
    match GIT_COMMIT_HASH_SHORT {
        Some(hash) => info!("Compiled on git commit hash: {hash}{dirty}"),
        None => info!("Compiled on git commit hash: <no git info>"),
    }
    if let Some(hr) = GIT_HEAD_REF {
        info!("            git head ref: {hr}");
    }
    info!("            {BUILT_TIME_UTC}");
    info!("         with compiler {RUSTC_VERSION}");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn convert_args(args: &[&str]) -> ConvertArgs {
        let mut argv = vec!["xengine-vis", "convert"];
        argv.extend_from_slice(args);
        let cli = XengineVis::try_parse_from(argv).unwrap();
        match cli.command {
            Command::Convert(a) => a,
        }
    }

    #[test]
    fn test_defaults() {
        let params = convert_args(&["-i", "obs.json"]).into_params();
        assert_eq!(params.descriptor, PathBuf::from("obs.json"));
        assert!(params.output.is_none());
        assert!(!params.validate);
        assert_eq!(params.fringe_stop, None);
        assert_eq!(params.order, FileOrder::ModificationTime);
    }

    #[test]
    fn test_all_flags() {
        let params = convert_args(&[
            "--input",
            "obs.json",
            "--output",
            "/tmp/out.uvfits",
            "--validate",
            "--no-fringe-stop",
            "--order-by",
            "seq",
        ])
        .into_params();
        assert_eq!(params.output, Some(PathBuf::from("/tmp/out.uvfits")));
        assert!(params.validate);
        assert_eq!(params.fringe_stop, Some(false));
        assert_eq!(params.order, FileOrder::SequenceNumber);
    }

    #[test]
    fn test_conflicting_fringe_flags() {
        let result = XengineVis::try_parse_from([
            "xengine-vis",
            "convert",
            "-i",
            "obs.json",
            "--fringe-stop",
            "--no-fringe-stop",
        ]);
        assert_eq!(
            result.unwrap_err().kind(),
            clap::ErrorKind::ArgumentConflict
        );

        let params = convert_args(&["-i", "obs.json", "--fringe-stop"]).into_params();
        assert_eq!(params.fringe_stop, Some(true));
    }

    #[test]
    fn test_input_is_required() {
        assert!(XengineVis::try_parse_from(["xengine-vis", "convert"]).is_err());
    }

    #[test]
    fn test_verbosity_is_global() {
        let cli = XengineVis::try_parse_from(["xengine-vis", "convert", "-i", "x", "-vv"]).unwrap();
        assert_eq!(cli.global_opts.verbosity, 2);
    }
}
