#[macro_use]
extern crate tracing;

use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use miette::{Context as _, IntoDiagnostic as _};

pub mod output;
pub mod utils;

pub use crate::output::{Output, OutputName, Outputs};
pub use crate::utils::FloatOrInt;

#[derive(knuffel::Decode, Debug, Default, Clone, PartialEq)]
pub struct Config {
    /// Integer scale applied to every monitor, overriding per-monitor derivation.
    #[knuffel(child, unwrap(argument))]
    pub scale_factor: Option<u32>,
    /// Allows non-integer scales, derived from the CRTC transform matrices.
    #[knuffel(child)]
    pub fractional_scaling: bool,
    #[knuffel(children(name = "output"))]
    pub outputs: Outputs,
}

#[derive(Debug, Clone)]
pub enum ConfigPath {
    /// Explicitly set config path.
    ///
    /// Load the config only from this path.
    Explicit(PathBuf),

    /// Default config path.
    ///
    /// Prioritize the user path, fallback to the system path, fallback to the built-in
    /// defaults when neither exists.
    Regular {
        /// User config path, usually `$XDG_CONFIG_HOME/madori/config.kdl`.
        user_path: PathBuf,
        /// System config path, usually `/etc/madori/config.kdl`.
        system_path: PathBuf,
    },
}

impl Config {
    pub fn load(path: &Path) -> miette::Result<Self> {
        let contents = fs::read_to_string(path)
            .into_diagnostic()
            .with_context(|| format!("error reading {path:?}"))?;

        let config = Self::parse(
            path.file_name()
                .and_then(OsStr::to_str)
                .unwrap_or("config.kdl"),
            &contents,
        )
        .context("error parsing")?;
        debug!("loaded config from {path:?}");
        Ok(config)
    }

    pub fn parse(filename: &str, text: &str) -> Result<Self, knuffel::Error> {
        knuffel::parse(filename, text)
    }
}

impl ConfigPath {
    /// Loads the config, returns an error if it doesn't exist.
    pub fn load(&self) -> miette::Result<Config> {
        self.load_inner(|user_path, system_path| {
            Err(miette::miette!(
                "no config file found; create one at {user_path:?} or {system_path:?}",
            ))
        })
        .context("error loading config")
    }

    /// Loads the config, falling back to the defaults if it doesn't exist.
    ///
    /// An explicitly set path must still exist.
    pub fn load_or_default(&self) -> miette::Result<Config> {
        self.load_inner(|user_path, _| {
            debug!("no config file found at {user_path:?}, using the defaults");
            Ok(None)
        })
        .context("error loading config")
    }

    fn load_inner<'a>(
        &'a self,
        missing: impl FnOnce(&'a Path, &'a Path) -> miette::Result<Option<&'a Path>>,
    ) -> miette::Result<Config> {
        let path = match self {
            ConfigPath::Explicit(path) => Some(path.as_path()),
            ConfigPath::Regular {
                user_path,
                system_path,
            } => {
                if user_path.exists() {
                    Some(user_path.as_path())
                } else if system_path.exists() {
                    Some(system_path.as_path())
                } else {
                    missing(user_path.as_path(), system_path.as_path())?
                }
            }
        };

        match path {
            Some(path) => Config::load(path),
            None => Ok(Config::default()),
        }
    }
}
