use std::fs;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;

use crate::data::filter::NearestMatch;
use crate::data::loader::DataSource;

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "GROUNDWATER_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "groundwater.toml";

const DEFAULT_DATASET_URL: &str =
    "https://raw.githubusercontent.com/cgwatertech/PySimpleGUI/master/cgwt.csv";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

// ---------------------------------------------------------------------------
// [source]
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub url: String,
    /// Local file; takes precedence over `url`.
    pub path: Option<PathBuf>,
    pub time_column: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_DATASET_URL.to_string(),
            path: None,
            time_column: "Time".to_string(),
        }
    }
}

impl SourceConfig {
    pub fn data_source(&self) -> DataSource {
        match &self.path {
            Some(p) => DataSource::Path(p.clone()),
            None => DataSource::Url(self.url.clone()),
        }
    }
}

// ---------------------------------------------------------------------------
// [dashboard]
// ---------------------------------------------------------------------------

/// Initial widget values. Datetimes are quoted strings,
/// e.g. `start = "2023-09-26T08:45:00"`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub title: String,
    pub default_location: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    /// Target hour of the nearest-hour view.
    pub custom_hour: u8,
    pub nearest_match: NearestMatch,
    /// Initial manual y-axis range in metres.
    pub y_range: [f64; 2],
    /// Slider limits for the manual y-axis range.
    pub y_limits: [f64; 2],
    /// Initial multiplier for the automatic y-axis range.
    pub range_multiplier: f64,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        let at = |y, m, d, h, min| {
            NaiveDate::from_ymd_opt(y, m, d)
                .and_then(|date| date.and_hms_opt(h, min, 0))
                .unwrap_or_default()
        };
        Self {
            title: "Groundwater Monitoring".to_string(),
            default_location: "Test02".to_string(),
            start: at(2023, 9, 26, 8, 45),
            end: at(2023, 10, 10, 8, 46),
            custom_hour: 15,
            nearest_match: NearestMatch::PerDay,
            y_range: [-15.0, -9.0],
            y_limits: [-20.0, 0.0],
            range_multiplier: 2.0,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub source: SourceConfig,
    pub dashboard: DashboardConfig,
}

impl AppConfig {
    /// Load from the `GROUNDWATER_CONFIG` path, else `groundwater.toml`,
    /// falling back to defaults when the file does not exist.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(&config_path(std::env::var(CONFIG_ENV).ok()))
    }

    /// Load `path` if it exists, otherwise return the defaults.
    pub fn load_with(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            log::info!("Reading config from {}", path.display());
            Self::load_from(path)
        } else {
            log::debug!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let s = fs::read_to_string(path)?;
        Self::from_toml_str(&s)
    }

    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let cfg: AppConfig = toml::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let d = &self.dashboard;
        if d.custom_hour > 23 {
            return Err(ConfigError::Invalid {
                field: "dashboard.custom_hour",
                reason: format!("{} is not an hour in 0..=23", d.custom_hour),
            });
        }
        if !(d.y_limits[0] < d.y_limits[1]) {
            return Err(ConfigError::Invalid {
                field: "dashboard.y_limits",
                reason: format!("{:?} is not an increasing pair", d.y_limits),
            });
        }
        if !(d.y_range[0] < d.y_range[1]) {
            return Err(ConfigError::Invalid {
                field: "dashboard.y_range",
                reason: format!("{:?} is not an increasing pair", d.y_range),
            });
        }
        if d.y_range[0] < d.y_limits[0] || d.y_range[1] > d.y_limits[1] {
            return Err(ConfigError::Invalid {
                field: "dashboard.y_range",
                reason: format!("{:?} lies outside y_limits {:?}", d.y_range, d.y_limits),
            });
        }
        if !(d.range_multiplier.is_finite() && d.range_multiplier > 0.0) {
            return Err(ConfigError::Invalid {
                field: "dashboard.range_multiplier",
                reason: format!("{} must be a positive number", d.range_multiplier),
            });
        }
        if self.source.time_column.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "source.time_column",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

/// Config file location: the env override if set and non-empty, else
/// `groundwater.toml` in the working directory.
fn config_path(env: Option<String>) -> PathBuf {
    env.filter(|p| !p.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_point_at_hosted_dataset() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.source.data_source(), DataSource::Url(DEFAULT_DATASET_URL.into()));
        assert_eq!(cfg.dashboard.default_location, "Test02");
        assert_eq!(cfg.dashboard.custom_hour, 15);
        assert_eq!(cfg.dashboard.start.to_string(), "2023-09-26 08:45:00");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let cfg = AppConfig::from_toml_str(
            r#"
            [source]
            path = "data/levels.csv"

            [dashboard]
            custom_hour = 6
            nearest_match = "global"
            start = "2023-10-01T00:00:00"
            "#,
        )
        .unwrap();
        assert_eq!(
            cfg.source.data_source(),
            DataSource::Path(PathBuf::from("data/levels.csv"))
        );
        assert_eq!(cfg.source.time_column, "Time");
        assert_eq!(cfg.dashboard.custom_hour, 6);
        assert_eq!(cfg.dashboard.nearest_match, NearestMatch::Global);
        assert_eq!(cfg.dashboard.start.to_string(), "2023-10-01 00:00:00");
        assert_eq!(cfg.dashboard.range_multiplier, 2.0);
    }

    #[test]
    fn rejects_hour_24() {
        let err = AppConfig::from_toml_str("[dashboard]\ncustom_hour = 24\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "dashboard.custom_hour", .. }));
    }

    #[test]
    fn rejects_non_positive_multiplier() {
        let err = AppConfig::from_toml_str("[dashboard]\nrange_multiplier = 0.0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn rejects_malformed_toml() {
        assert!(matches!(
            AppConfig::from_toml_str("[dashboard"),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[dashboard]\ntitle = \"Yangpyeong wells\"").unwrap();
        let cfg = AppConfig::load_from(file.path()).unwrap();
        assert_eq!(cfg.dashboard.title, "Yangpyeong wells");
    }

    #[test]
    fn env_path_wins_over_default() {
        assert_eq!(
            config_path(Some("/etc/wells.toml".into())),
            PathBuf::from("/etc/wells.toml")
        );
        assert_eq!(config_path(None), PathBuf::from(DEFAULT_CONFIG_PATH));
        assert_eq!(config_path(Some(String::new())), PathBuf::from(DEFAULT_CONFIG_PATH));
    }

    #[test]
    fn missing_file_means_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = AppConfig::load_with(&dir.path().join("groundwater.toml")).unwrap();
        assert_eq!(cfg.dashboard.title, DashboardConfig::default().title);
        assert_eq!(cfg.source.data_source(), DataSource::Url(DEFAULT_DATASET_URL.into()));
    }

    #[test]
    fn invalid_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[dashboard]\ncustom_hour = 30").unwrap();
        assert!(matches!(
            AppConfig::load_with(file.path()),
            Err(ConfigError::Invalid { field: "dashboard.custom_hour", .. })
        ));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[dashboard").unwrap();
        assert!(matches!(AppConfig::load_with(file.path()), Err(ConfigError::Toml(_))));
    }

    #[test]
    fn rejects_y_range_outside_limits() {
        let err = AppConfig::from_toml_str("[dashboard]\ny_range = [-25.0, -9.0]\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "dashboard.y_range", .. }));

        let err = AppConfig::from_toml_str(
            "[dashboard]\ny_limits = [-20.0, -10.0]\ny_range = [-15.0, -9.0]\n",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "dashboard.y_range", .. }));

        assert!(AppConfig::from_toml_str("[dashboard]\ny_range = [-20.0, 0.0]\n").is_ok());
    }
}
