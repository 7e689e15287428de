//! Removal of the agent's own executable on the controller's order.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{error, info, warn};

use crate::exit_codes;

/// Reaction to the terminate signal.
///
/// The loop calls [`KillSwitch::trigger`] and then stops. The production
/// implementation never returns from it.
pub trait KillSwitch {
    fn trigger(&self);
}

/// Deletes the file backing the running executable, then exits with status 0.
#[derive(Debug, Clone)]
pub struct SelfDestruct {
    executable: PathBuf,
}

impl SelfDestruct {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
        }
    }

    /// Resolve the running executable, falling back to the invocation path.
    pub fn for_current_exe() -> Result<Self> {
        match std::env::current_exe() {
            Ok(path) => Ok(Self::new(path)),
            Err(err) => {
                warn!(err = %err, "current_exe unavailable, using argv[0]");
                let argv0 = std::env::args_os()
                    .next()
                    .context("no argv[0] to locate own executable")?;
                Ok(Self::new(argv0))
            }
        }
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    /// Remove the executable file. Returns whether it was deleted.
    pub fn erase(&self) -> bool {
        match fs::remove_file(&self.executable) {
            Ok(()) => {
                info!(path = %self.executable.display(), "successfully deleted self");
                true
            }
            Err(err) => {
                error!(path = %self.executable.display(), err = %err, "failed to delete self");
                false
            }
        }
    }
}

impl KillSwitch for SelfDestruct {
    fn trigger(&self) {
        warn!("received terminate signal, self-destructing");
        self.erase();
        let _ = std::io::stdout().flush();
        let _ = std::io::stderr().flush();
        std::process::exit(exit_codes::OK);
    }
}
