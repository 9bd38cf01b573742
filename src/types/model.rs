use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Represents a completion model identifier.
///
/// This can be one of the models offered in the model picker or a custom
/// string for anything the upstream accepts that is not listed here.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Model {
    /// Known model identifiers
    Known(KnownModel),

    /// Custom model identifier
    Custom(String),
}

/// Models offered by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KnownModel {
    /// GPT-4.1 Mini
    #[serde(rename = "gpt-4.1-mini")]
    Gpt41Mini,

    /// GPT-4
    #[serde(rename = "gpt-4")]
    Gpt4,

    /// GPT-3.5 Turbo
    #[serde(rename = "gpt-3.5-turbo")]
    Gpt35Turbo,
}

impl KnownModel {
    /// Every known model, in picker order.
    pub const ALL: [KnownModel; 3] = [
        KnownModel::Gpt41Mini,
        KnownModel::Gpt4,
        KnownModel::Gpt35Turbo,
    ];

    /// The identifier sent on the wire.
    pub fn id(&self) -> &'static str {
        match self {
            KnownModel::Gpt41Mini => "gpt-4.1-mini",
            KnownModel::Gpt4 => "gpt-4",
            KnownModel::Gpt35Turbo => "gpt-3.5-turbo",
        }
    }

    /// A human-readable name for the model.
    pub fn display_name(&self) -> &'static str {
        match self {
            KnownModel::Gpt41Mini => "GPT-4.1 Mini",
            KnownModel::Gpt4 => "GPT-4",
            KnownModel::Gpt35Turbo => "GPT-3.5 Turbo",
        }
    }
}

impl Default for Model {
    fn default() -> Self {
        Model::Known(KnownModel::Gpt41Mini)
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Model::Known(known_model) => write!(f, "{known_model}"),
            Model::Custom(custom) => write!(f, "{custom}"),
        }
    }
}

impl fmt::Display for KnownModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Model {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Ok(KnownModel::ALL
            .into_iter()
            .find(|known| known.id() == s)
            .map(Model::Known)
            .unwrap_or_else(|| Model::Custom(s.to_string())))
    }
}

impl From<KnownModel> for Model {
    fn from(model: KnownModel) -> Self {
        Model::Known(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_known_and_custom() {
        assert_eq!(
            "gpt-4.1-mini".parse::<Model>().unwrap(),
            Model::Known(KnownModel::Gpt41Mini)
        );
        assert_eq!(
            " gpt-4 ".parse::<Model>().unwrap(),
            Model::Known(KnownModel::Gpt4)
        );
        assert_eq!(
            "o3-preview".parse::<Model>().unwrap(),
            Model::Custom("o3-preview".to_string())
        );
    }

    #[test]
    fn display_uses_wire_id() {
        assert_eq!(Model::Known(KnownModel::Gpt35Turbo).to_string(), "gpt-3.5-turbo");
        assert_eq!(Model::Custom("local".to_string()).to_string(), "local");
        assert_eq!(KnownModel::Gpt41Mini.display_name(), "GPT-4.1 Mini");
    }

    #[test]
    fn serialization_is_a_plain_string() {
        let json = serde_json::to_value(Model::Known(KnownModel::Gpt4)).unwrap();
        assert_eq!(json, serde_json::json!("gpt-4"));
        let model: Model = serde_json::from_value(serde_json::json!("my-model")).unwrap();
        assert_eq!(model, Model::Custom("my-model".to_string()));
    }
}
