use std::fmt::Write;

use crate::DiagramSettings;

/// Accumulates one `@startuml ... @enduml` document.
pub(crate) struct Markup {
    out: String,
}

impl Markup {
    pub(crate) fn start(settings: &DiagramSettings) -> Self {
        let mut out = String::from("@startuml\n");
        let pragma = settings.layout_pragma.trim();
        if !pragma.is_empty() {
            let _ = writeln!(out, "!pragma layout {pragma}");
        }
        Self { out }
    }

    pub(crate) fn line(&mut self, args: std::fmt::Arguments<'_>) {
        let _ = self.out.write_fmt(args);
        self.out.push('\n');
    }

    pub(crate) fn finish(mut self) -> String {
        self.out.push_str("@enduml");
        self.out
    }
}

/// Double quotes would terminate a PlantUML display name.
pub(crate) fn quoted(text: &str) -> String {
    text.replace('"', "'")
}
