use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

const fn _default_true() -> bool {
    true
}
fn _default_quantities() -> Vec<String> {
    vec!["residual".to_string()]
}
fn _default_scalars() -> Vec<String> {
    vec!["e0".to_string()]
}

/// What to generate, and which passes to run on the way.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratorSettings {
    /// Quantity labels, generated in this order.
    #[serde(default = "_default_quantities")]
    pub quantities: Vec<String>,
    #[serde(default = "_default_true")]
    pub factorize: bool,
    #[serde(default = "_default_true")]
    pub elide_single_operands: bool,
    /// Check the dependencies of every task graph before returning it.
    #[serde(default = "_default_true")]
    pub validate: bool,
    /// Scalars tasks may be multiplied by.
    #[serde(default = "_default_scalars")]
    pub scalars: Vec<String>,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        GeneratorSettings {
            quantities: _default_quantities(),
            factorize: true,
            elide_single_operands: true,
            validate: true,
            scalars: _default_scalars(),
        }
    }
}

impl GeneratorSettings {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Could not parse generator settings")
    }

    pub fn with_quantities<S: Into<String>>(
        mut self,
        quantities: impl IntoIterator<Item = S>,
    ) -> Self {
        self.quantities = quantities.into_iter().map(Into::into).collect();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_fields() {
        let settings =
            GeneratorSettings::from_json(r#"{"quantities": ["residual", "deci"]}"#).unwrap();
        assert_eq!(settings.quantities, vec!["residual", "deci"]);
        assert!(settings.factorize);
        assert!(settings.elide_single_operands);
        assert!(settings.validate);
        assert_eq!(settings.scalars, vec!["e0"]);

        assert_eq!(
            GeneratorSettings::from_json("{}").unwrap(),
            GeneratorSettings::default()
        );
    }

    #[test]
    fn passes_can_be_switched_off() {
        let settings =
            GeneratorSettings::from_json(r#"{"factorize": false, "validate": false}"#).unwrap();
        assert!(!settings.factorize);
        assert!(!settings.validate);
        assert!(settings.elide_single_operands);

        let json = serde_json::to_string(&settings).unwrap();
        assert_eq!(GeneratorSettings::from_json(&json).unwrap(), settings);
    }

    #[test]
    fn malformed_json() {
        let err = GeneratorSettings::from_json(r#"{"factorize": "yes"}"#).unwrap_err();
        assert!(err.to_string().contains("generator settings"));
    }
}
