use color_eyre::eyre::{self, WrapErr};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::path::Path;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("missing configuration key {key:?}")]
    MissingKey { key: &'static str },

    #[error("configuration key {key:?} has invalid value {value:?} (expected a positive integer)")]
    InvalidValue { key: &'static str, value: String },
}

/// Static machine parameters.
///
/// Every field is consulted by the timing model, so a missing or unusable key
/// aborts before the simulation starts.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Config {
    /// Parallel address-processing slots inside a vector-memory unit.
    pub num_lanes: usize,
    /// Pipeline depth of the vector add/subtract (and compare) unit.
    pub pipeline_depth_add: usize,
    /// Pipeline depth of the vector multiply unit.
    pub pipeline_depth_mul: usize,
    /// Pipeline depth of the vector divide unit.
    pub pipeline_depth_div: usize,
    /// Pipeline depth of the vector load/store unit.
    pub vls_pipeline_depth: usize,
    /// Capacity of the vector-compute issue queue.
    pub compute_queue_depth: usize,
    /// Capacity of the vector-data issue queue.
    pub data_queue_depth: usize,
    /// Number of independently-arbitrated vector data memory banks.
    pub vdm_num_banks: usize,
}

static PARAMETER_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*(\w+)\s*=\s*([^#\r\n]+)").unwrap());

/// Extract `key = value` pairs from a configuration listing.
///
/// `#` starts a comment, whole-line or trailing.
pub fn extract_parameters(text: &str) -> impl Iterator<Item = (&str, &str)> + '_ {
    PARAMETER_REGEX.captures_iter(text).filter_map(|cap| {
        let key = cap.get(1)?.as_str();
        let value = cap.get(2)?.as_str().trim();
        Some((key, value))
    })
}

impl Config {
    pub fn from_config_str(text: impl AsRef<str>) -> Result<Self, Error> {
        let parameters: HashMap<&str, &str> = extract_parameters(text.as_ref()).collect();
        let get = |key: &'static str| -> Result<usize, Error> {
            let value = parameters.get(key).ok_or(Error::MissingKey { key })?;
            match value.parse() {
                Ok(parsed) if parsed > 0 => Ok(parsed),
                _ => Err(Error::InvalidValue {
                    key,
                    value: (*value).to_string(),
                }),
            }
        };
        Ok(Self {
            num_lanes: get("numLanes")?,
            pipeline_depth_add: get("pipelineDepthAdd")?,
            pipeline_depth_mul: get("pipelineDepthMul")?,
            pipeline_depth_div: get("pipelineDepthDiv")?,
            vls_pipeline_depth: get("vlsPipelineDepth")?,
            compute_queue_depth: get("computeQueueDepth")?,
            data_queue_depth: get("dataQueueDepth")?,
            vdm_num_banks: get("vdmNumBanks")?,
        })
    }

    pub fn open(path: &Path) -> eyre::Result<Self> {
        let text = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read configuration from {}", path.display()))?;
        let config = Self::from_config_str(text)
            .wrap_err_with(|| format!("bad configuration in {}", path.display()))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::{Config, Error};
    use pretty_assertions_sorted::assert_eq;

    const SAMPLE: &str = r"
# machine description
numLanes = 4
pipelineDepthAdd = 5
pipelineDepthMul = 7
pipelineDepthDiv = 12
vlsPipelineDepth = 11 # load/store pipe
computeQueueDepth = 4
dataQueueDepth = 4
vdmNumBanks = 8
";

    #[test]
    fn parses_sample_listing() {
        assert_eq!(
            Config::from_config_str(SAMPLE).unwrap(),
            Config {
                num_lanes: 4,
                pipeline_depth_add: 5,
                pipeline_depth_mul: 7,
                pipeline_depth_div: 12,
                vls_pipeline_depth: 11,
                compute_queue_depth: 4,
                data_queue_depth: 4,
                vdm_num_banks: 8,
            }
        );
    }

    #[test]
    fn missing_key_is_fatal() {
        let listing = SAMPLE.replace("vdmNumBanks = 8", "");
        assert!(matches!(
            Config::from_config_str(listing),
            Err(Error::MissingKey { key: "vdmNumBanks" })
        ));
    }

    #[test]
    fn non_positive_value_is_fatal() {
        let listing = SAMPLE.replace("numLanes = 4", "numLanes = 0");
        assert!(matches!(
            Config::from_config_str(listing),
            Err(Error::InvalidValue { key: "numLanes", .. })
        ));
    }

    #[test]
    fn commented_out_key_is_ignored() {
        let listing = SAMPLE.replace("numLanes = 4", "# numLanes = 4");
        assert!(matches!(
            Config::from_config_str(listing),
            Err(Error::MissingKey { key: "numLanes" })
        ));
    }
}
