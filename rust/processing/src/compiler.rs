// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! External model compiler

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::error::{Error, Result};

/// Turns a build descriptor into model artifacts.
///
/// Implementations only run the tool; callers decide success by checking
/// for the artifacts afterwards.
pub trait ModelCompiler {
    /// Whether the compiler can be run at all
    fn is_available(&self) -> bool {
        true
    }

    /// Compile `descriptor` against the content root `game_dir`. Blocks until
    /// the compiler exits.
    fn compile(&self, descriptor: &Path, game_dir: &Path) -> Result<()>;
}

/// Runs `studiomdl`
#[derive(Debug, Clone)]
pub struct StudioMdl {
    executable: PathBuf,
}

impl StudioMdl {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
        }
    }
}

impl ModelCompiler for StudioMdl {
    fn is_available(&self) -> bool {
        self.executable.is_file()
    }

    fn compile(&self, descriptor: &Path, game_dir: &Path) -> Result<()> {
        let status = Command::new(&self.executable)
            .arg("-nop4")
            .arg("-game")
            .arg(game_dir)
            .arg(descriptor)
            .stdout(Stdio::null())
            .status()
            .map_err(|e| Error::io(&self.executable, e))?;

        if !status.success() {
            tracing::warn!(
                descriptor = %descriptor.display(),
                %status,
                "Model compiler exited with failure"
            );
        }
        Ok(())
    }
}
