use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString};

/// Severity classes in the order the classifier was trained on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(Display, EnumIter, EnumString)]
pub enum ClassLabel {
    #[serde(rename = "Mild Impairment")]
    #[strum(serialize = "Mild Impairment")]
    MildImpairment,
    #[serde(rename = "Moderate Impairment")]
    #[strum(serialize = "Moderate Impairment")]
    ModerateImpairment,
    #[serde(rename = "No Impairment")]
    #[strum(serialize = "No Impairment")]
    NoImpairment,
    #[serde(rename = "Very Mild Impairment")]
    #[strum(serialize = "Very Mild Impairment")]
    VeryMildImpairment,
}

impl ClassLabel {
    /// Default label order, used when no manifest ships with the model.
    pub fn ordered_names() -> Vec<String> {
        ClassLabel::iter().map(|label| label.to_string()).collect()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PredictionResponse {
    pub prediction: String,
    pub confidence: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ErrorDetail {
    pub detail: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct StatusResponse {
    pub status: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn label_order_matches_training_encoding() {
        assert_eq!(
            ClassLabel::ordered_names(),
            vec![
                "Mild Impairment",
                "Moderate Impairment",
                "No Impairment",
                "Very Mild Impairment",
            ]
        );
    }

    #[test]
    fn labels_parse_from_display_names() {
        assert_eq!(
            ClassLabel::from_str("Very Mild Impairment").unwrap(),
            ClassLabel::VeryMildImpairment
        );
        assert!(ClassLabel::from_str("Severe Impairment").is_err());
    }

    #[test]
    fn wire_types_serialize_with_expected_keys() {
        let body = serde_json::to_value(PredictionResponse {
            prediction: ClassLabel::NoImpairment.to_string(),
            confidence: 97.25,
        })
        .unwrap();
        assert_eq!(body["prediction"], "No Impairment");
        assert_eq!(body["confidence"], 97.25);

        let label = serde_json::to_value(ClassLabel::ModerateImpairment).unwrap();
        assert_eq!(label, "Moderate Impairment");
    }
}
