//! Scenario configuration loading and management.
//!
//! Every scenario variant (endpoint, domain, length range, think time,
//! response schema, log columns) is a configuration value, loaded from YAML
//! or taken from one of the built-in presets.

use anyhow::Context;
use geo_common::BoundingBox;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::record::Column;
use crate::response::ResponseFieldMap;

/// Names accepted by [`ScenarioConfig::preset`].
pub const PRESETS: &[&str] = &["featureserver", "query-api"];

/// Main scenario configuration loaded from YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioConfig {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub base_url: String,
    pub endpoint_path: String,
    /// Number of virtual users; reaching it flips the ramp to active.
    pub target_concurrency: u32,
    /// Users hatched per second. `None` hatches everyone at once.
    #[serde(default)]
    pub spawn_rate: Option<f64>,
    /// Stop after this many seconds (measured from the first hatch).
    #[serde(default)]
    pub duration_secs: Option<u64>,
    /// Stop each user after this many counted results.
    #[serde(default)]
    pub iterations_per_user: Option<u64>,
    /// Grace period for in-flight requests after stop before tasks are aborted.
    #[serde(default = "default_drain_timeout")]
    pub drain_timeout_secs: u64,
    /// Per-request timeout on the HTTP transport. Off unless set.
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
    #[serde(default)]
    pub seed: Option<u64>, // Optional RNG seed for reproducible tests
    pub coordinate_domain: CoordinateDomain,
    pub query_length_range: LengthRange,
    pub think_time_ms: ThinkTimeRange,
    #[serde(default)]
    pub query_selection: QuerySelection,
    #[serde(default)]
    pub response_fields: ResponseFieldMap,
    #[serde(default)]
    pub output: OutputConfig,
}

fn default_drain_timeout() -> u64 {
    5
}

/// Range the lower-left corner coordinates are drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoordinateDomain {
    pub min: f64,
    pub max: f64,
}

/// Inclusive range of square side lengths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LengthRange {
    pub min: u32,
    pub max: u32,
}

/// Inclusive range of pauses between iterations, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThinkTimeRange {
    pub min: u64,
    pub max: u64,
}

/// How query boxes are chosen.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QuerySelection {
    /// Random square boxes inside the coordinate domain.
    #[default]
    Random,
    /// The same box on every request.
    Fixed { bbox: BoundingBox },
}

/// Result log settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Log file path. Defaults to `results/<name>_<timestamp>.log`.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Columns written per counted request, in order.
    #[serde(default = "default_columns")]
    pub columns: Vec<Column>,
}

fn default_columns() -> Vec<Column> {
    vec![Column::NumFeatures, Column::ResponseTime]
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: None,
            columns: default_columns(),
        }
    }
}

impl ScenarioConfig {
    /// Load configuration from YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scenario {}", path.display()))?;
        Self::from_yaml(&content)
            .with_context(|| format!("Failed to parse scenario {}", path.display()))
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(content: &str) -> anyhow::Result<Self> {
        let config: ScenarioConfig = serde_yaml::from_str(content)?;
        Ok(config)
    }

    /// Built-in scenario by name, see [`PRESETS`].
    pub fn preset(name: &str, base_url: &str) -> Option<Self> {
        match name {
            "featureserver" => Some(Self {
                name: "featureserver".to_string(),
                description: "Feature server table query, logs feature counts".to_string(),
                base_url: base_url.to_string(),
                endpoint_path: "/featureserver/rest/tables/public.nstest.json".to_string(),
                target_concurrency: 10,
                spawn_rate: Some(1.0),
                duration_secs: Some(60),
                iterations_per_user: None,
                drain_timeout_secs: default_drain_timeout(),
                request_timeout_secs: None,
                seed: None,
                coordinate_domain: CoordinateDomain {
                    min: 0.0,
                    max: 200_000.0,
                },
                query_length_range: LengthRange {
                    min: 1_000,
                    max: 20_000,
                },
                think_time_ms: ThinkTimeRange {
                    min: 1_000,
                    max: 5_000,
                },
                query_selection: QuerySelection::Random,
                response_fields: ResponseFieldMap::default(),
                output: OutputConfig::default(),
            }),
            "query-api" => Some(Self {
                name: "query-api".to_string(),
                description: "Database query API with server-side timings".to_string(),
                base_url: base_url.to_string(),
                endpoint_path: "/api/databases/test/nstest/query".to_string(),
                target_concurrency: 10,
                spawn_rate: Some(1.0),
                duration_secs: Some(60),
                iterations_per_user: None,
                drain_timeout_secs: default_drain_timeout(),
                request_timeout_secs: None,
                seed: None,
                coordinate_domain: CoordinateDomain {
                    min: 0.0,
                    max: 200_000.0,
                },
                query_length_range: LengthRange {
                    min: 1_000,
                    max: 10_000,
                },
                think_time_ms: ThinkTimeRange {
                    min: 5_000,
                    max: 15_000,
                },
                query_selection: QuerySelection::Random,
                response_fields: ResponseFieldMap {
                    feature_count: "total".to_string(),
                    query_time: Some("query-time".to_string()),
                    server_time: Some("totalTime".to_string()),
                },
                output: OutputConfig {
                    path: None,
                    columns: vec![
                        Column::QueryTime,
                        Column::NumFeatures,
                        Column::TotalServerTime,
                        Column::ResponseTime,
                    ],
                },
            }),
            _ => None,
        }
    }

    /// Full request URL without the query string.
    pub fn endpoint_url(&self) -> String {
        format!(
            "{}{}",
            self.base_url.trim_end_matches('/'),
            self.endpoint_path
        )
    }

    /// Log file path, falling back to a timestamped file under `results/`.
    pub fn resolve_output_path(&self) -> PathBuf {
        if let Some(path) = &self.output.path {
            return path.clone();
        }
        // Include scenario name in filename for easier identification
        let scenario_name = self.name.replace(' ', "_").to_lowercase();
        PathBuf::from("results").join(format!(
            "{}_{}.log",
            scenario_name,
            chrono::Utc::now().format("%Y%m%d_%H%M%S")
        ))
    }

    /// Validate configuration.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.name.trim().is_empty() {
            anyhow::bail!("name must not be empty");
        }
        if self.base_url.trim().is_empty() {
            anyhow::bail!("base_url must not be empty");
        }
        if !self.endpoint_path.starts_with('/') {
            anyhow::bail!("endpoint_path must start with '/'");
        }
        if self.target_concurrency == 0 {
            anyhow::bail!("target_concurrency must be > 0");
        }
        if let Some(rate) = self.spawn_rate {
            if !(rate.is_finite() && rate > 0.0) {
                anyhow::bail!("spawn_rate must be a positive number");
            }
        }
        if self.duration_secs == Some(0) {
            anyhow::bail!("duration_secs must be > 0");
        }
        if self.iterations_per_user == Some(0) {
            anyhow::bail!("iterations_per_user must be > 0");
        }

        let domain = self.coordinate_domain;
        if !(domain.min.is_finite() && domain.max.is_finite() && domain.min < domain.max) {
            anyhow::bail!(
                "coordinate_domain must satisfy min < max (got {}..{})",
                domain.min,
                domain.max
            );
        }
        let lengths = self.query_length_range;
        if lengths.min == 0 || lengths.min > lengths.max {
            anyhow::bail!(
                "query_length_range must satisfy 0 < min <= max (got {}..{})",
                lengths.min,
                lengths.max
            );
        }
        if self.think_time_ms.min > self.think_time_ms.max {
            anyhow::bail!("think_time_ms.min must be <= think_time_ms.max");
        }
        if let QuerySelection::Fixed { bbox } = &self.query_selection {
            if !bbox.is_valid() {
                anyhow::bail!("fixed bbox must satisfy min < max on both axes");
            }
        }

        self.validate_columns()
    }

    fn validate_columns(&self) -> anyhow::Result<()> {
        let columns = &self.output.columns;
        if columns.is_empty() {
            anyhow::bail!("output.columns must list at least one column");
        }
        for (i, column) in columns.iter().enumerate() {
            if columns[..i].contains(column) {
                anyhow::bail!("output.columns lists '{}' twice", column.header_name());
            }
        }
        if self.response_fields.feature_count.is_empty() {
            anyhow::bail!("response_fields.feature_count must name a JSON field");
        }
        if columns.contains(&Column::QueryTime) && self.response_fields.query_time.is_none() {
            anyhow::bail!("column 'querytime' requires response_fields.query_time");
        }
        if columns.contains(&Column::TotalServerTime) && self.response_fields.server_time.is_none()
        {
            anyhow::bail!("column 'totalServerTime' requires response_fields.server_time");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
name: nstest
base_url: http://localhost:8080
endpoint_path: /featureserver/rest/tables/public.nstest.json
target_concurrency: 20
coordinate_domain: { min: 0.0, max: 200000.0 }
query_length_range: { min: 1000, max: 20000 }
think_time_ms: { min: 1000, max: 5000 }
"#;

    #[test]
    fn test_minimal_yaml_uses_defaults() {
        let config = ScenarioConfig::from_yaml(MINIMAL).unwrap();
        config.validate().unwrap();
        assert_eq!(config.target_concurrency, 20);
        assert_eq!(config.drain_timeout_secs, 5);
        assert!(config.spawn_rate.is_none());
        assert!(matches!(config.query_selection, QuerySelection::Random));
        assert_eq!(config.response_fields.feature_count, "total");
        assert_eq!(
            config.output.columns,
            vec![Column::NumFeatures, Column::ResponseTime]
        );
    }

    #[test]
    fn test_fixed_selection_and_columns_yaml() {
        let yaml = format!(
            "{}{}",
            MINIMAL,
            r#"
query_selection:
  type: fixed
  bbox: { min_x: 100.0, min_y: 100.0, max_x: 5000.0, max_y: 5000.0 }
response_fields:
  feature_count: total
  query_time: query-time
  server_time: totalTime
output:
  path: /tmp/nstest.log
  columns: [query_time, num_features, total_server_time, response_time]
"#
        );
        let config = ScenarioConfig::from_yaml(&yaml).unwrap();
        config.validate().unwrap();
        match config.query_selection {
            QuerySelection::Fixed { bbox } => assert_eq!(bbox.max_x, 5000.0),
            other => panic!("unexpected selection: {:?}", other),
        }
        assert_eq!(config.output.columns.len(), 4);
        assert_eq!(config.resolve_output_path(), PathBuf::from("/tmp/nstest.log"));
    }

    #[test]
    fn test_presets_validate() {
        for name in PRESETS {
            let config = ScenarioConfig::preset(name, "http://localhost:8080").unwrap();
            config.validate().unwrap();
        }
        assert!(ScenarioConfig::preset("nope", "http://localhost").is_none());
    }

    #[test]
    fn test_endpoint_url_joins_without_double_slash() {
        let config =
            ScenarioConfig::preset("query-api", "http://localhost:8080/").unwrap();
        assert_eq!(
            config.endpoint_url(),
            "http://localhost:8080/api/databases/test/nstest/query"
        );
    }

    #[test]
    fn test_default_output_path_uses_scenario_name() {
        let mut config = ScenarioConfig::from_yaml(MINIMAL).unwrap();
        config.name = "Feature Server".to_string();
        let path = config.resolve_output_path();
        assert!(path.starts_with("results"));
        let file = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(file.starts_with("feature_server_"));
        assert!(file.ends_with(".log"));
    }

    #[test]
    fn test_validate_rejects_bad_ranges() {
        let base = ScenarioConfig::from_yaml(MINIMAL).unwrap();

        let mut config = base.clone();
        config.coordinate_domain = CoordinateDomain { min: 10.0, max: 10.0 };
        assert!(config.validate().is_err());

        let mut config = base.clone();
        config.query_length_range = LengthRange { min: 500, max: 100 };
        assert!(config.validate().is_err());

        let mut config = base.clone();
        config.think_time_ms = ThinkTimeRange { min: 10, max: 1 };
        assert!(config.validate().is_err());

        let mut config = base.clone();
        config.target_concurrency = 0;
        assert!(config.validate().is_err());

        let mut config = base;
        config.spawn_rate = Some(0.0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_requires_field_for_timing_columns() {
        let mut config = ScenarioConfig::from_yaml(MINIMAL).unwrap();
        config.output.columns = vec![Column::QueryTime, Column::ResponseTime];
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("query_time"));
    }

    #[test]
    fn test_validate_rejects_duplicate_columns() {
        let mut config = ScenarioConfig::from_yaml(MINIMAL).unwrap();
        config.output.columns = vec![Column::NumFeatures, Column::NumFeatures];
        assert!(config.validate().is_err());
    }
}
