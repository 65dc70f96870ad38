use std::path::Path;

use edupy_inspect::classify::visibility_from_name;
use edupy_inspect::Visibility;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::markup::Markup;
use crate::DiagramSettings;

/// Superclass that marks a class abstract instead of producing an inheritance edge.
pub const ABSTRACT_BASE_MARKER: &str = "ABC";

/// Rendered in place of a type the static analysis could not resolve.
const UNRESOLVED_TYPE: &str = "?";

/// Attribute types that never produce a dependency edge.
const BUILTIN_TYPES: [&str; 10] = [
    "int", "float", "str", "bool", "list", "dict", "tuple", "set", "None", UNRESOLVED_TYPE,
];

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClassSummary {
    pub name: String,
    #[serde(default)]
    pub attributes: Vec<ClassAttribute>,
    #[serde(default)]
    pub methods: Vec<MethodSignature>,
    #[serde(default)]
    pub superclasses: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClassAttribute {
    pub name: String,
    #[serde(default, rename = "type")]
    pub type_name: Option<String>,
    #[serde(default)]
    pub is_static: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MethodSignature {
    pub name: String,
    #[serde(default)]
    pub params: Vec<Param>,
    #[serde(default)]
    pub return_type: Option<String>,
    #[serde(default)]
    pub is_static: bool,
    #[serde(default)]
    pub is_abstract: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Param {
    pub name: String,
    #[serde(default, rename = "type")]
    pub type_name: Option<String>,
}

impl ClassSummary {
    /// Non-builtin attribute types, first occurrence order.
    pub fn references(&self) -> Vec<&str> {
        let mut references: Vec<&str> = Vec::new();
        for attribute in &self.attributes {
            let ty = resolved(attribute.type_name.as_deref()).unwrap_or(UNRESOLVED_TYPE);
            if !BUILTIN_TYPES.contains(&ty) && !references.contains(&ty) {
                references.push(ty);
            }
        }
        references
    }

    pub fn is_abstract(&self) -> bool {
        self.superclasses.iter().any(|s| s == ABSTRACT_BASE_MARKER)
    }
}

/// Seam to the static analysis that discovers classes in the debugged program.
pub trait ClassSummarizer: Send + Sync {
    fn summaries(&self) -> Vec<ClassSummary>;
}

#[derive(Debug, Error)]
pub enum SummaryError {
    #[error("failed to read class summaries {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid class summaries: {0}")]
    Json(#[from] serde_json::Error),
}

/// A fixed list of summaries, typically produced ahead of time and loaded from JSON.
#[derive(Clone, Debug, Default)]
pub struct StaticClassSummaries {
    classes: Vec<ClassSummary>,
}

impl StaticClassSummaries {
    pub fn new(classes: Vec<ClassSummary>) -> Self {
        Self { classes }
    }

    pub fn from_json_str(text: &str) -> Result<Self, SummaryError> {
        Ok(Self::new(serde_json::from_str(text)?))
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, SummaryError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| SummaryError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&text)
    }
}

impl ClassSummarizer for StaticClassSummaries {
    fn summaries(&self) -> Vec<ClassSummary> {
        self.classes.clone()
    }
}

pub fn class_diagram(classes: &[ClassSummary], settings: &DiagramSettings) -> String {
    let mut markup = Markup::start(settings);
    for class in classes {
        let prefix = if class.is_abstract() { "abstract " } else { "" };
        markup.line(format_args!("{prefix}class {} {{", class.name));
        for attribute in &class.attributes {
            markup.line(format_args!("  {}", attribute_line(attribute)));
        }
        for method in &class.methods {
            markup.line(format_args!("  {}", method_line(method)));
        }
        markup.line(format_args!("}}"));

        for reference in class.references() {
            markup.line(format_args!("{} ..> {reference}", class.name));
        }
        for superclass in &class.superclasses {
            if superclass != ABSTRACT_BASE_MARKER {
                markup.line(format_args!("{} --|> {superclass}", class.name));
            }
        }
    }
    markup.finish()
}

fn visibility_symbol(name: &str) -> char {
    match visibility_from_name(name) {
        Some(Visibility::Private) => '-',
        Some(Visibility::Protected) => '#',
        _ => '+',
    }
}

/// `None`, `"?"` and unresolved generic placeholders (`{...}`) all count as unknown.
fn resolved(type_name: Option<&str>) -> Option<&str> {
    type_name
        .map(str::trim)
        .filter(|ty| !ty.is_empty() && *ty != UNRESOLVED_TYPE && !ty.starts_with('{'))
}

fn attribute_line(attribute: &ClassAttribute) -> String {
    format!(
        "{}{}{} : {}",
        if attribute.is_static { "{static} " } else { "" },
        visibility_symbol(&attribute.name),
        attribute.name,
        resolved(attribute.type_name.as_deref()).unwrap_or(UNRESOLVED_TYPE)
    )
}

fn method_line(method: &MethodSignature) -> String {
    let params = method
        .params
        .iter()
        .map(|param| match resolved(param.type_name.as_deref()) {
            Some(ty) => format!("{} : {ty}", param.name),
            None => param.name.clone(),
        })
        .collect::<Vec<_>>()
        .join(", ");

    let mut line = String::new();
    if method.is_static {
        line.push_str("{static} ");
    }
    if method.is_abstract {
        line.push_str("{abstract} ");
    }
    line.push(visibility_symbol(&method.name));
    line.push_str(&method.name);
    line.push('(');
    line.push_str(&params);
    line.push(')');
    if let Some(ret) = resolved(method.return_type.as_deref()) {
        line.push_str(" : ");
        line.push_str(ret);
    }
    line
}
