//! Pipeline configuration structures and loaders.
use std::env;

/// Thresholds and switches passed explicitly into the pipeline stages.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Cap on combinations when an action sets no `maxCombinations` of its own.
    pub max_combinations: usize,
    /// Resolve independent placeholders concurrently.
    pub concurrent_resolution: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_combinations: 50,
            concurrent_resolution: true,
        }
    }
}

impl PipelineConfig {
    #[must_use]
    pub fn with_max_combinations(mut self, max: usize) -> Self {
        self.max_combinations = max.max(1);
        self
    }

    #[must_use]
    pub fn with_concurrent_resolution(mut self, enable: bool) -> Self {
        self.concurrent_resolution = enable;
        self
    }

    /// Construct configuration from process environment variables.
    ///
    /// Environment variables:
    /// - `ACTION_MAX_COMBINATIONS` - Default combination cap (default: 50, minimum 1)
    /// - `ACTION_CONCURRENT_RESOLUTION` - Resolve independent targets concurrently (default: true)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(max) = parse::<usize>(&lookup, "ACTION_MAX_COMBINATIONS") {
            config.max_combinations = max.max(1);
        }

        if let Some(enable) = parse::<bool>(&lookup, "ACTION_CONCURRENT_RESOLUTION") {
            config.concurrent_resolution = enable;
        }

        config
    }
}

fn parse<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T>
where
    T: std::str::FromStr,
{
    lookup(key)?.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> PipelineConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        PipelineConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_without_variables() {
        assert_eq!(config_from(&[]), PipelineConfig::default());
    }

    #[test]
    fn reads_overrides() {
        let config = config_from(&[
            ("ACTION_MAX_COMBINATIONS", "12"),
            ("ACTION_CONCURRENT_RESOLUTION", "false"),
        ]);
        assert_eq!(config.max_combinations, 12);
        assert!(!config.concurrent_resolution);
    }

    #[test]
    fn ignores_garbage_and_clamps_zero() {
        let config = config_from(&[
            ("ACTION_MAX_COMBINATIONS", "lots"),
            ("ACTION_CONCURRENT_RESOLUTION", "maybe"),
        ]);
        assert_eq!(config, PipelineConfig::default());

        let config = config_from(&[("ACTION_MAX_COMBINATIONS", "0")]);
        assert_eq!(config.max_combinations, 1);
    }
}
