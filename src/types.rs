//! Core data model for the expression-template compiler

use crate::error::{Result, TemplateError};
use regex::Regex;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

/// One Desmos-style expression record: a visual/logical element of a graph
/// state. Only the fields the compiler rewrites are modelled explicitly;
/// everything else (`type`, `color`, `hidden`, `slider`, ...) passes through
/// the flattened `extra` map untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpressionRecord {
    /// Unique key within a template. The compiler prefixes it with the
    /// namespace token rather than replacing it, so uniqueness is preserved.
    pub id: String,

    /// Parent grouping, if the record lives inside a folder.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub folder_id: Option<String>,

    /// The primary LaTeX formula field.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latex: Option<String>,

    /// Point label. Only `${letter}` interpolations inside it are rewritten.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    /// Table-column data lines, each a LaTeX string rewritten independently.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<String>>,

    /// Table records carry columns, which share this record shape
    /// (id, latex, values) and are rewritten recursively.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<ExpressionRecord>>,

    /// Regression parameter map: keys are LaTeX variable names and are
    /// rewritten like any other formula; values are opaque.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub regression_parameters: Option<Map<String, Value>>,

    /// All remaining record fields, passed through untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ExpressionRecord {
    /// Convenience constructor for a bare formula record.
    pub fn new(id: impl Into<String>, latex: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            folder_id: None,
            latex: Some(latex.into()),
            label: None,
            values: None,
            columns: None,
            regression_parameters: None,
            extra: Map::new(),
        }
    }
}

/// A caller-chosen scope identifier injected into every rewritten identifier
/// and variable subscript. Must itself be a valid subscript fragment, i.e.
/// letters and digits only, so it can be appended inside `_{...}` spans
/// without escaping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceToken(String);

impl NamespaceToken {
    pub fn new(token: impl Into<String>) -> Result<Self> {
        let token = token.into();
        let valid = Regex::new(r"^[A-Za-z0-9]+$").unwrap();
        if token.is_empty() {
            return Err(TemplateError::invalid_namespace(token, "token is empty"));
        }
        if !valid.is_match(&token) {
            return Err(TemplateError::invalid_namespace(
                token,
                "token must contain only letters and digits",
            ));
        }
        Ok(Self(token))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NamespaceToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Mapping from parameter name to a seed numeric value, kept in
/// first-occurrence order so compiled output is byte-identical across runs.
/// Serializes as a JSON object in insertion order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DefaultValueTable {
    entries: Vec<(String, f64)>,
}

impl DefaultValueTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a parameter unless it is already present. Returns whether the
    /// entry was added.
    pub fn insert_if_absent(&mut self, name: impl Into<String>, value: f64) -> bool {
        let name = name.into();
        if self.entries.iter().any(|(n, _)| *n == name) {
            return false;
        }
        self.entries.push((name, value));
        true
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parameter names and seed values in first-occurrence order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), *v))
    }
}

impl Serialize for DefaultValueTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// The compiled template: the namespaced record list and the companion
/// default-value table, emitted together.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledTemplate {
    pub expressions: Vec<ExpressionRecord>,
    #[serde(rename = "defaultValues")]
    pub default_values: DefaultValueTable,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespace_token_accepts_alphanumerics() {
        assert!(NamespaceToken::new("bar1").is_ok());
        assert!(NamespaceToken::new("A").is_ok());
    }

    #[test]
    fn namespace_token_rejects_subscript_breakers() {
        assert!(NamespaceToken::new("").is_err());
        assert!(NamespaceToken::new("a_b").is_err());
        assert!(NamespaceToken::new("a{b}").is_err());
        assert!(NamespaceToken::new("spa ce").is_err());
        assert!(NamespaceToken::new("\\alpha").is_err());
    }

    #[test]
    fn default_table_preserves_first_occurrence_order() {
        let mut table = DefaultValueTable::new();
        assert!(table.insert_if_absent("s_{1}", 1.0));
        assert!(table.insert_if_absent("a_{}", 1.0));
        assert!(!table.insert_if_absent("s_{1}", 2.0));
        assert_eq!(table.get("s_{1}"), Some(1.0));

        let json = serde_json::to_string(&table).unwrap();
        let s1 = json.find("s_{1}").unwrap();
        let a = json.find("a_{}").unwrap();
        assert!(s1 < a, "insertion order lost: {json}");
    }

    #[test]
    fn record_roundtrips_unknown_fields() {
        let json = r##"{
            "type": "expression",
            "id": "plot 1",
            "folderId": "data folder",
            "color": "#2d70b3",
            "latex": "a_{1}=2",
            "hidden": false
        }"##;
        let record: ExpressionRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.id, "plot 1");
        assert_eq!(record.folder_id.as_deref(), Some("data folder"));
        assert_eq!(record.extra.get("color").unwrap(), "#2d70b3");

        let back = serde_json::to_value(&record).unwrap();
        assert_eq!(back.get("type").unwrap(), "expression");
        assert_eq!(back.get("hidden").unwrap(), false);
    }
}
