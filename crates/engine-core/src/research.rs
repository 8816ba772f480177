use serde::{Deserialize, Serialize};

/// Grounded context gathered for a single pipeline run. Treated as opaque
/// input by the Code Generator; an empty bundle is a valid value (the
/// Research Adapter degrades gracefully when the research tool is
/// unavailable — grounding is helpful, not required).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResearchBundle {
    pub context: String,
    pub highlights: Vec<String>,
    pub snippets: Vec<String>,
}

impl ResearchBundle {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.context.is_empty() && self.highlights.is_empty() && self.snippets.is_empty()
    }

    /// Flattened text used as the research-as-text artifact written to
    /// `research.txt` by the Result Assembler.
    pub fn to_text(&self) -> String {
        let mut out = self.context.clone();
        if !self.highlights.is_empty() {
            out.push_str("\n\nHighlights:\n");
            for h in &self.highlights {
                out.push_str("- ");
                out.push_str(h);
                out.push('\n');
            }
        }
        if !self.snippets.is_empty() {
            out.push_str("\nSnippets:\n");
            for s in &self.snippets {
                out.push_str("> ");
                out.push_str(s);
                out.push('\n');
            }
        }
        out
    }
}
