use crate::model::{Id, Revision};
use serde::{Deserialize, Serialize};

/// Marker shown instead of sensitive values in plans and output.
pub const REDACTED: &str = "********";

/// Lightweight pointer to a parameter context, as embedded in process
/// groups and in inheritance lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterContextRef {
    pub id: Id,
    pub name: Option<String>,
}

impl ParameterContextRef {
    pub fn new(id: impl Into<Id>, name: Option<String>) -> Self {
        Self {
            id: id.into(),
            name,
        }
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetReference {
    pub id: Id,
    pub name: Option<String>,
}

/// A single named value inside a parameter context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub sensitive: bool,
    /// Non-empty when the parameter points at uploaded assets instead of
    /// carrying a literal value
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub referenced_assets: Vec<AssetReference>,
}

impl Parameter {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: Some(value.into()),
            description: None,
            sensitive: false,
            referenced_assets: Vec::new(),
        }
    }

    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    pub fn with_asset(mut self, asset: AssetReference) -> Self {
        self.value = None;
        self.referenced_assets.push(asset);
        self
    }

    pub fn has_asset(&self) -> bool {
        !self.referenced_assets.is_empty()
    }

    /// Value safe to print.
    pub fn display_value(&self) -> &str {
        if self.sensitive {
            REDACTED
        } else {
            self.value.as_deref().unwrap_or("")
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterContext {
    pub id: Id,
    pub name: String,
    pub description: Option<String>,
    pub revision: Revision,
    pub parameters: Vec<Parameter>,

    /// Contexts this one inherits from, in declared (precedence) order
    #[serde(default)]
    pub inherited_parameter_contexts: Vec<ParameterContextRef>,

    /// Ids of the process groups bound to this context
    #[serde(default)]
    pub bound_process_groups: Vec<Id>,
}

impl ParameterContext {
    pub fn new(id: impl Into<Id>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            revision: Revision::default(),
            parameters: Vec::new(),
            inherited_parameter_contexts: Vec::new(),
            bound_process_groups: Vec::new(),
        }
    }

    pub fn get_parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    pub fn to_ref(&self) -> ParameterContextRef {
        ParameterContextRef::new(self.id.clone(), Some(self.name.clone()))
    }

    /// Apply a set of parameter writes the way NiFi does: listed parameters
    /// are replaced or added, everything else is left untouched.
    pub fn apply_updates(&mut self, updates: &[Parameter]) {
        for update in updates {
            match self.parameters.iter_mut().find(|p| p.name == update.name) {
                Some(existing) => {
                    existing.value = update.value.clone();
                    existing.referenced_assets = update.referenced_assets.clone();
                    if update.description.is_some() {
                        existing.description = update.description.clone();
                    }
                    existing.sensitive = existing.sensitive || update.sensitive;
                }
                None => self.parameters.push(update.clone()),
            }
        }
    }
}

/// An uploaded binary owned by a parameter context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub id: Id,
    pub name: String,
    /// Lowercase hex SHA-256 of the uploaded bytes
    pub digest: String,
    pub parameter_context_id: Id,
}

impl Asset {
    pub fn reference(&self) -> AssetReference {
        AssetReference {
            id: self.id.clone(),
            name: Some(self.name.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_updates_replaces_asset_binding_with_value() {
        let mut ctx = ParameterContext::new("ctx-1", "drivers");
        ctx.parameters.push(
            Parameter::new("jdbc.driver", "").with_asset(AssetReference {
                id: "asset-1".to_string(),
                name: Some("postgres.jar".to_string()),
            }),
        );

        ctx.apply_updates(&[Parameter::new("jdbc.driver", "/opt/drivers/pg.jar")]);

        let param = ctx.get_parameter("jdbc.driver").unwrap();
        assert_eq!(param.value.as_deref(), Some("/opt/drivers/pg.jar"));
        assert!(!param.has_asset());
    }

    #[test]
    fn apply_updates_keeps_untouched_parameters() {
        let mut ctx = ParameterContext::new("ctx-1", "base");
        ctx.parameters.push(Parameter::new("a", "1"));
        ctx.parameters.push(Parameter::new("b", "2").sensitive());

        ctx.apply_updates(&[Parameter::new("c", "3"), Parameter::new("b", "22")]);

        assert_eq!(ctx.parameters.len(), 3);
        assert_eq!(ctx.get_parameter("a").unwrap().value.as_deref(), Some("1"));
        let b = ctx.get_parameter("b").unwrap();
        assert_eq!(b.value.as_deref(), Some("22"));
        assert!(b.sensitive, "sensitivity must survive a plain write");
    }

    #[test]
    fn sensitive_values_are_redacted_for_display() {
        let param = Parameter::new("db.password", "hunter2").sensitive();
        assert_eq!(param.display_value(), REDACTED);
        assert_eq!(Parameter::new("db.user", "nifi").display_value(), "nifi");
    }
}
