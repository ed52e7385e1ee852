//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use fibcheck_harness::Scenario;
use serde::Deserialize;

// Runner configuration. Every section is optional, so an empty file runs the
// built-in scenario against the built-in testbed.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub logging: Logging,
    pub testbed: fibcheck_testbed::Config,
    pub scenario: Scenario,
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Logging {
    // Filter directive used when RUST_LOG isn't set.
    pub filter: String,
    pub journald: bool,
    // File logging is enabled by the presence of this section.
    pub file: Option<LoggingFile>,
    // Stdout is reserved for run reports.
    pub stderr: LoggingStderr,
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingFile {
    pub dir: String,
    pub name: String,
    pub rotation: LoggingFileRotation,
    pub style: LoggingFmtStyle,
    pub show_source: bool,
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingStderr {
    pub enabled: bool,
    pub style: LoggingFmtStyle,
    pub colors: bool,
    pub show_source: bool,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LoggingFileRotation {
    #[default]
    Never,
    Hourly,
    Daily,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LoggingFmtStyle {
    #[default]
    Compact,
    Full,
    Json,
    Pretty,
}

// Configuration loading errors.
#[derive(Debug)]
pub enum Error {
    Read(String, std::io::Error),
    Parse(String, toml::de::Error),
}

// ===== impl Config =====

impl Config {
    const DFLT_FILEPATH: &'static str = "/etc/fibcheck.toml";

    // Loads the configuration file. Built-in defaults are used only when no
    // file was given and the default one doesn't exist.
    pub(crate) fn load(config_file: Option<&str>) -> Result<Config, Error> {
        let path = config_file.unwrap_or(Config::DFLT_FILEPATH);

        let config_str = match std::fs::read_to_string(path) {
            Ok(config_str) => config_str,
            Err(error)
                if config_file.is_none()
                    && error.kind() == std::io::ErrorKind::NotFound =>
            {
                return Ok(Config::default());
            }
            Err(error) => return Err(Error::Read(path.to_owned(), error)),
        };
        Config::parse(path, &config_str)
    }

    fn parse(path: &str, config_str: &str) -> Result<Config, Error> {
        toml::from_str(config_str)
            .map_err(|error| Error::Parse(path.to_owned(), error))
    }
}

// ===== impl Logging =====

impl Default for Logging {
    fn default() -> Logging {
        Logging {
            filter: "fibcheck=info".to_owned(),
            journald: false,
            file: None,
            stderr: Default::default(),
        }
    }
}

// ===== impl LoggingFile =====

impl Default for LoggingFile {
    fn default() -> LoggingFile {
        LoggingFile {
            dir: "/var/log/fibcheck".to_owned(),
            name: "runs.log".to_owned(),
            rotation: Default::default(),
            style: LoggingFmtStyle::Json,
            show_source: false,
        }
    }
}

// ===== impl LoggingStderr =====

impl Default for LoggingStderr {
    fn default() -> LoggingStderr {
        LoggingStderr {
            enabled: true,
            style: LoggingFmtStyle::Compact,
            colors: true,
            show_source: false,
        }
    }
}

// ===== impl Error =====

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Read(path, error) => {
                write!(f, "failed to read configuration file {path}: {error}")
            }
            Error::Parse(path, error) => {
                write!(f, "failed to parse configuration file {path}: {error}")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Read(_, error) => Some(error),
            Error::Parse(_, error) => Some(error),
        }
    }
}

// ===== unit tests =====
