// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Integration tests.
//!
//! Some help for laying out these tests was taken from:
//! https://matklad.github.io/2021/02/27/delete-cargo-integration-tests.html

mod cli_args;
#[cfg(unix)]
mod pipeline;

use std::{
    fs,
    path::{Path, PathBuf},
    process::Output,
    str::from_utf8,
};

use assert_cmd::{output::OutputError, Command};
use tempfile::TempDir;

fn caga() -> Command {
    Command::cargo_bin("caga").unwrap()
}

fn get_cmd_output(result: Result<Output, OutputError>) -> (String, String) {
    let output = match result {
        Ok(o) => o,
        Err(o) => o.as_output().unwrap().clone(),
    };
    (
        from_utf8(&output.stdout).unwrap().to_string(),
        from_utf8(&output.stderr).unwrap().to_string(),
    )
}

/// A scratch directory with an (empty) measurement set in it.
struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Workspace {
        let dir = TempDir::new().expect("couldn't make tmp dir");
        fs::create_dir(dir.path().join("obs.ms")).unwrap();
        Workspace { dir }
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn ms(&self) -> PathBuf {
        self.path().join("obs.ms")
    }

    fn outdir(&self) -> PathBuf {
        self.path().join("out")
    }

    /// Write an arguments file running `steps` with `engine`.
    fn args_file(&self, steps: &[&str], engine: &Path) -> PathBuf {
        let steps = steps
            .iter()
            .map(|s| format!("\"{s}\""))
            .collect::<Vec<_>>()
            .join(", ");
        let contents = format!(
            r#"[pipeline]
ms = "{}"
outdir = "{}"
steps = [{steps}]
ref_ant = "C00"
spw_gaincal = 0.1

[sources]
amp_calibrators = "3C286"
phase_calibrators = "1822-096"
targets = "TARGET"

[selfcal]
pcycles = 1
solints = ["60s", "30s"]

[flagging]
quack = true
tfcrop = true

[engine]
program = "{}"

[tasks.tclean]
niter = 1000
cell = "1arcsec"
"#,
            self.ms().display(),
            self.outdir().display(),
            engine.display()
        );
        let path = self.path().join("args.toml");
        fs::write(&path, contents).unwrap();
        path
    }
}
