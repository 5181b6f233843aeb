use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct Model {
    pub owner: String,
    pub name: String,
    #[serde(default)]
    pub latest_version: Option<ModelVersion>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct ModelVersion {
    pub id: String,
}

#[derive(Serialize, Debug)]
pub(super) struct CreatePrediction<'a> {
    pub version: &'a str,
    pub input: &'a Value,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PredictionStatus {
    Starting,
    Processing,
    Succeeded,
    Failed,
    Canceled,
}
impl PredictionStatus {
    /// Whether the prediction will no longer change.
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Starting | Self::Processing)
    }
}

/// Language models stream a list of fragments; some models return one string.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum Output {
    Text(String),
    Fragments(Vec<String>),
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Metrics {
    /// Seconds spent running the model.
    #[serde(default)]
    pub predict_time: Option<f64>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct Prediction {
    pub id: String,
    pub status: PredictionStatus,
    #[serde(default)]
    pub output: Option<Output>,
    #[serde(default)]
    pub error: Option<Value>,
    #[serde(default)]
    pub metrics: Option<Metrics>,
}
