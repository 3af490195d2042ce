use crate::render::error::RenderError;
use serde::{Deserialize, Serialize};

/// Names the builder resolves after linking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BindingNames {
    pub position: String,
    pub color_attribute: String,
    pub color_uniform: String,
    pub mvp_matrix: String,
}

impl Default for BindingNames {
    fn default() -> Self {
        Self {
            position: "a_Position".to_string(),
            color_attribute: "a_Color".to_string(),
            color_uniform: "u_Color".to_string(),
            mvp_matrix: "u_MVPMatrix".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrimitiveConfig {
    /// Constant RGBA color uploaded on every draw.
    pub color: [f32; 4],
    /// Fail the build when the program has no MVP uniform.
    pub require_transform: bool,
    pub bindings: BindingNames,
}

impl Default for PrimitiveConfig {
    fn default() -> Self {
        Self {
            color: [0.2, 0.709803922, 0.898039216, 1.0],
            require_transform: true,
            bindings: BindingNames::default(),
        }
    }
}

impl PrimitiveConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, RenderError> {
        Ok(toml::from_str(content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_keys_use_defaults() {
        let config = PrimitiveConfig::from_toml_str("color = [1.0, 0.0, 0.0, 1.0]").unwrap();
        assert_eq!(config.color, [1.0, 0.0, 0.0, 1.0]);
        assert!(config.require_transform);
        assert_eq!(config.bindings, BindingNames::default());
    }

    #[test]
    fn test_binding_names_override() {
        let content = r#"
            require_transform = false

            [bindings]
            position = "aPos"
        "#;
        let config = PrimitiveConfig::from_toml_str(content).unwrap();
        assert!(!config.require_transform);
        assert_eq!(config.bindings.position, "aPos");
        assert_eq!(config.bindings.mvp_matrix, "u_MVPMatrix");
    }

    #[test]
    fn test_config_round_trips_through_toml() {
        let config = PrimitiveConfig {
            color: [0.5, 0.25, 1.0, 0.75],
            require_transform: false,
            bindings: BindingNames {
                mvp_matrix: "u_Transform".to_string(),
                ..BindingNames::default()
            },
        };

        let content = toml::to_string(&config).unwrap();
        assert_eq!(PrimitiveConfig::from_toml_str(&content).unwrap(), config);
    }

    #[test]
    fn test_malformed_color_is_rejected() {
        let err = PrimitiveConfig::from_toml_str("color = [1.0, 0.0]").unwrap_err();
        assert!(matches!(err, RenderError::Config(_)));
    }
}
