use std::fmt;
use std::str::FromStr;

use crate::error::{AppError, Result};

/// Which similarity model a search runs
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMethod {
    /// Joint color histogram compared with chi-squared distance
    Histogram,
    /// Deep feature embedding compared with cosine distance
    Embedding,
}

impl SearchMethod {
    /// Every recognized method name
    pub const NAMES: [&'static str; 2] = ["histogram", "embedding"];

    /// Lowercase name used on the command line and in the environment
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Histogram => "histogram",
            Self::Embedding => "embedding",
        }
    }
}

impl fmt::Display for SearchMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchMethod {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "histogram" => Ok(Self::Histogram),
            "embedding" => Ok(Self::Embedding),
            other => Err(AppError::InvalidConfiguration(format!(
                "unknown search method '{}', expected one of: {}",
                other,
                Self::NAMES.join(", ")
            ))),
        }
    }
}

/// Configuration for a similarity search
#[derive(Clone, Debug, PartialEq)]
pub struct SearchConfig {
    /// Similarity model to run
    pub method: SearchMethod,
    /// Histogram bins per channel
    pub bins: usize,
    /// Number of neighbours to return besides the query
    pub k: usize,
    /// Extract histograms on the rayon pool
    pub parallel: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            method: SearchMethod::Histogram,
            bins: 256,
            k: 5,
            parallel: true,
        }
    }
}

impl SearchConfig {
    /// Defaults overridden by `IMAGESEARCH_*` variables (a `.env` file is honoured)
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(method) = lookup("IMAGESEARCH_METHOD") {
            config.method = method.parse()?;
        }
        if let Some(bins) = lookup("IMAGESEARCH_BINS") {
            config.bins = parse_var("IMAGESEARCH_BINS", &bins)?;
        }
        if let Some(k) = lookup("IMAGESEARCH_K") {
            config.k = parse_var("IMAGESEARCH_K", &k)?;
        }
        if let Some(parallel) = lookup("IMAGESEARCH_PARALLEL") {
            config.parallel = parse_var("IMAGESEARCH_PARALLEL", &parallel)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the extractors cannot honour
    pub fn validate(&self) -> Result<()> {
        if !(1..=256).contains(&self.bins) {
            return Err(AppError::InvalidConfiguration(format!(
                "bins must be between 1 and 256, got {}",
                self.bins
            )));
        }
        Ok(())
    }
}

fn parse_var<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| {
        AppError::InvalidConfiguration(format!("{} has an invalid value '{}'", key, value))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_method_parsing() {
        assert_eq!("histogram".parse::<SearchMethod>().unwrap(), SearchMethod::Histogram);
        assert_eq!(" Embedding ".parse::<SearchMethod>().unwrap(), SearchMethod::Embedding);

        let err = "sift".parse::<SearchMethod>().unwrap_err();
        let message = err.to_string();
        assert!(matches!(err, AppError::InvalidConfiguration(_)));
        assert!(message.contains("histogram"));
        assert!(message.contains("embedding"));
    }

    #[test]
    fn test_env_overrides() {
        let config = SearchConfig::from_lookup(lookup(&[
            ("IMAGESEARCH_METHOD", "embedding"),
            ("IMAGESEARCH_BINS", "32"),
            ("IMAGESEARCH_K", "10"),
            ("IMAGESEARCH_PARALLEL", "false"),
        ]))
        .unwrap();

        assert_eq!(config.method, SearchMethod::Embedding);
        assert_eq!(config.bins, 32);
        assert_eq!(config.k, 10);
        assert!(!config.parallel);
    }

    #[test]
    fn test_env_defaults_when_unset() {
        let config = SearchConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, SearchConfig::default());
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(SearchConfig::from_lookup(lookup(&[("IMAGESEARCH_K", "many")])).is_err());
        assert!(SearchConfig::from_lookup(lookup(&[("IMAGESEARCH_BINS", "0")])).is_err());
        assert!(SearchConfig::from_lookup(lookup(&[("IMAGESEARCH_BINS", "512")])).is_err());
        assert!(SearchConfig::from_lookup(lookup(&[("IMAGESEARCH_METHOD", "orb")])).is_err());
    }
}
