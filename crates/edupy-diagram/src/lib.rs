//! PlantUML synthesis for object graphs and class summaries, plus the seam to
//! the external renderer that turns markup into an encoded image.
//!
//! Synthesis is pure: [`object_cards`], [`object_diagram`] and
//! [`class_diagram`] only build strings. Rendering goes through a
//! [`DiagramRenderer`].

mod class;
mod markup;
mod object;
mod render;

use edupy_config::DiagramConfig;

pub use class::{
    class_diagram, ClassAttribute, ClassSummarizer, ClassSummary, MethodSignature, Param,
    StaticClassSummaries, SummaryError, ABSTRACT_BASE_MARKER,
};
pub use object::{object_alias, object_cards, object_diagram};
pub use render::{DiagramRenderer, FailingRenderer, PlantUmlCommand, RenderError, StaticRenderer};

/// Markup options shared by every diagram kind.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiagramSettings {
    /// Host (and port) object-card links point at.
    pub locator_base: String,
    /// `!pragma layout` value; empty omits the pragma.
    pub layout_pragma: String,
}

impl Default for DiagramSettings {
    fn default() -> Self {
        Self::from(&DiagramConfig::default())
    }
}

impl From<&DiagramConfig> for DiagramSettings {
    fn from(config: &DiagramConfig) -> Self {
        Self {
            locator_base: config.locator_base.clone(),
            layout_pragma: config.layout_pragma.clone(),
        }
    }
}
