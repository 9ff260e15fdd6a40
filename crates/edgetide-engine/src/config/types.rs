//! Pipeline configuration document types.

use edgetide_types::Config;
use serde::{Deserialize, Serialize};

/// One stage entry in a pipeline configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageConfiguration {
    pub instance_name: String,
    pub library: String,
    pub stage_name: String,
    #[serde(default)]
    pub configuration: Vec<Config>,
    #[serde(default)]
    pub input_lanes: Vec<String>,
    #[serde(default)]
    pub output_lanes: Vec<String>,
}

impl StageConfiguration {
    /// Look up a configuration value by name (last occurrence wins).
    #[must_use]
    pub fn config(&self, name: &str) -> Option<&edgetide_types::ConfigValue> {
        self.configuration
            .iter()
            .rev()
            .find(|c| c.name == name)
            .map(|c| &c.value)
    }
}

/// A full pipeline configuration document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineConfiguration {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub pipeline_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub configuration: Vec<Config>,
    pub stages: Vec<StageConfiguration>,
    /// Error-handling destination; defaults to the basic trash stage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_stage: Option<StageConfiguration>,
}

fn default_schema_version() -> u32 {
    1
}

#[cfg(test)]
mod tests {
    use edgetide_types::ConfigValue;

    use super::*;

    #[test]
    fn deserializes_camel_case_document() {
        let json = r#"{
            "pipelineId": "edge-readings",
            "title": "Edge readings",
            "configuration": [{"name": "shouldRetry", "value": false}],
            "stages": [
                {
                    "instanceName": "origin-1",
                    "library": "edgetide-basic-lib",
                    "stageName": "dev-raw-data-origin",
                    "configuration": [{"name": "rawData", "value": "a\nb"}],
                    "outputLanes": ["lane1"]
                },
                {
                    "instanceName": "dest-1",
                    "library": "edgetide-basic-lib",
                    "stageName": "trash",
                    "inputLanes": ["lane1"]
                }
            ]
        }"#;
        let config: PipelineConfiguration = serde_json::from_str(json).unwrap();
        assert_eq!(config.schema_version, 1);
        assert_eq!(config.pipeline_id, "edge-readings");
        assert_eq!(config.stages.len(), 2);
        assert_eq!(config.stages[0].output_lanes, ["lane1"]);
        assert_eq!(config.stages[1].input_lanes, ["lane1"]);
        assert!(config.error_stage.is_none());
        assert_eq!(
            config.stages[0].config("rawData"),
            Some(&ConfigValue::String("a\nb".to_string()))
        );
    }

    #[test]
    fn stage_config_lookup_prefers_last_occurrence() {
        let stage = StageConfiguration {
            instance_name: "s".into(),
            library: "l".into(),
            stage_name: "n".into(),
            configuration: vec![
                Config::new("k", ConfigValue::Number(1.0)),
                Config::new("k", ConfigValue::Number(2.0)),
            ],
            input_lanes: vec![],
            output_lanes: vec![],
        };
        assert_eq!(stage.config("k"), Some(&ConfigValue::Number(2.0)));
        assert_eq!(stage.config("missing"), None);
    }
}
