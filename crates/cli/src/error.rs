//! Errors surfaced by `rtbx`.

use std::path::{Path, PathBuf};

use derive_more::Display;
use error_stack::Report;
use rtb_exchange_common::error::ExchangeError;

#[derive(Debug, Display)]
pub enum CliError {
    /// Settings file failed to parse or validate.
    #[display("Invalid settings in {}: {report:?}", path.display())]
    Settings {
        path: PathBuf,
        report: Report<ExchangeError>,
    },

    /// Loaded settings could not be written back as TOML.
    #[display("Failed to render settings: {_0:?}")]
    Render(Report<ExchangeError>),

    /// Auction fixture is not JSON or misses required fields.
    #[display("Invalid auction fixture {}: {source}", path.display())]
    Fixture {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[display("Failed to serialize processed auction: {_0}")]
    Output(serde_json::Error),

    #[display("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl core::error::Error for CliError {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            Self::Fixture { source, .. } => Some(source),
            Self::Output(source) => Some(source),
            Self::Io { source, .. } => Some(source),
            Self::Settings { .. } | Self::Render(_) => None,
        }
    }
}

impl CliError {
    /// Adapter for `map_err` that remembers which file failed.
    pub fn io(path: &Path) -> impl FnOnce(std::io::Error) -> Self + '_ {
        move |source| Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::error::Error;

    #[test]
    fn test_io_error_names_the_file() {
        let err = CliError::io(Path::new("/tmp/auction.json"))(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "file not found",
        ));

        assert_eq!(
            err.to_string(),
            "IO error on /tmp/auction.json: file not found"
        );
        assert!(err.source().is_some());
    }

    #[test]
    fn test_fixture_error_keeps_json_cause() {
        let source = serde_json::from_str::<serde_json::Value>("{").expect_err("invalid json");
        let err = CliError::Fixture {
            path: PathBuf::from("auction.json"),
            source,
        };

        assert!(err.to_string().starts_with("Invalid auction fixture auction.json: "));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_settings_error_has_no_source() {
        let err = CliError::Settings {
            path: PathBuf::from("settings.toml"),
            report: Report::new(ExchangeError::Configuration {
                message: "tracker.endpoint: url".to_string(),
            }),
        };

        assert!(err.to_string().starts_with("Invalid settings in settings.toml: "));
        assert!(err.to_string().contains("tracker.endpoint: url"));
        assert!(err.source().is_none());
    }
}
