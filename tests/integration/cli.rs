// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Running the binary end to end.

use crate::{get_cmd_output, read_gcount, seq, xengine_vis, Obs};

#[test]
fn test_convert_writes_every_row() {
    let obs = Obs::new(3, 2);
    obs.add_dump("obs_0000", seq(0.0), 4, 2, 0, 0);
    obs.add_dump("obs_0001", seq(4.0), 4, 3, 0, 60);

    let cmd = obs.convert_cmd().arg("--validate").ok();
    assert!(cmd.is_ok(), "convert failed: {}", cmd.err().unwrap());
    let (stdout, stderr) = get_cmd_output(cmd);
    assert!(stderr.is_empty(), "stderr wasn't empty: {stderr}");
    assert!(stdout.contains("xengine-vis convert"));

    let output = obs.default_output();
    // 5 timesteps x 6 baselines.
    assert_eq!(read_gcount(&output), 30);
}

#[test]
fn test_explicit_output() {
    let obs = Obs::new(2, 1);
    obs.add_dump("obs_0000", 0, 2, 1, 0, 0);
    let output = obs.dir.path().join("mine.uvfits");

    let cmd = obs.convert_cmd().arg("-o").arg(&output).arg("--fringe-stop").ok();
    assert!(cmd.is_ok(), "convert failed: {}", cmd.err().unwrap());
    assert_eq!(read_gcount(&output), 3);
    assert!(!obs.default_output().exists());
}

#[test]
fn test_missing_channel_width() {
    let obs = Obs::with_descriptor(2, 1, |v| {
        v.as_object_mut().unwrap().remove("channel_width");
    });
    obs.add_dump("obs_0000", 0, 2, 1, 0, 0);

    let cmd = obs.convert_cmd().ok();
    assert!(cmd.is_err());
    let output = cmd.as_ref().err().unwrap().as_output().unwrap();
    assert_eq!(output.status.code(), Some(1));
    let (_, stderr) = get_cmd_output(cmd);
    assert!(stderr.contains("channel_width"), "{stderr}");
    assert!(!obs.default_output().exists());
}

#[test]
fn test_missing_data_file_is_skipped() {
    let obs = Obs::new(2, 1);
    obs.add_dump("obs_0000", seq(0.0), 2, 2, 0, 0);
    obs.add_dump("obs_0001", seq(4.0), 2, 2, 0, 60);
    std::fs::remove_file(obs.input_dir().join("obs_0001")).unwrap();

    let cmd = obs.convert_cmd().ok();
    assert!(cmd.is_ok(), "convert failed: {}", cmd.err().unwrap());
    let (stdout, _) = get_cmd_output(cmd);
    assert!(stdout.contains("obs_0001"), "{stdout}");
    assert_eq!(read_gcount(&obs.default_output()), 2 * 3);
}

#[test]
fn test_partial_block_is_ignored() {
    let obs = Obs::new(2, 2);
    // Two whole blocks and a bit of a third.
    obs.add_dump("obs_0000", 0, 3, 2, 20, 0);

    let cmd = obs.convert_cmd().ok();
    assert!(cmd.is_ok(), "convert failed: {}", cmd.err().unwrap());
    assert_eq!(read_gcount(&obs.default_output()), 2 * 3);
}

#[test]
fn test_channel_mismatch_is_fatal() {
    let obs = Obs::new(2, 1);
    obs.add_dump("obs_0000", seq(0.0), 4, 1, 0, 0);
    obs.add_dump("obs_0001", seq(2.0), 8, 1, 0, 60);

    let cmd = obs.convert_cmd().ok();
    let output = cmd.as_ref().err().unwrap().as_output().unwrap();
    assert_eq!(output.status.code(), Some(3));
    let (_, stderr) = get_cmd_output(cmd);
    assert!(stderr.contains("channels"), "{stderr}");
    assert!(!obs.default_output().exists());
}

#[test]
fn test_conflicting_fringe_flags() {
    let obs = Obs::new(2, 1);
    obs.add_dump("obs_0000", 0, 1, 1, 0, 0);

    let cmd = obs
        .convert_cmd()
        .args(["--fringe-stop", "--no-fringe-stop"])
        .ok();
    let output = cmd.as_ref().err().unwrap().as_output().unwrap();
    // Rejected by the argument parser before anything is read.
    assert_eq!(output.status.code(), Some(2));
    let (_, stderr) = get_cmd_output(cmd);
    assert!(stderr.contains("cannot be used with"), "{stderr}");
    assert!(!obs.default_output().exists());
}

#[test]
fn test_missing_output_directory() {
    let obs = Obs::new(2, 1);
    obs.add_dump("obs_0000", 0, 2, 1, 0, 0);
    let parent = obs.dir.path().join("nonexistent");

    let cmd = obs
        .convert_cmd()
        .arg("--output")
        .arg(parent.join("x.uvfits"))
        .ok();
    let output = cmd.as_ref().err().unwrap().as_output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    let (_, stderr) = get_cmd_output(cmd);
    assert!(stderr.contains("nonexistent"), "{stderr}");
    assert!(!parent.exists());
}

#[test]
fn test_no_subcommand_fails() {
    let cmd = xengine_vis().ok();
    assert!(cmd.is_err());
    let (stdout, stderr) = get_cmd_output(cmd);
    assert!(stdout.is_empty());
    assert!(!stderr.is_empty());
}
