use crate::types::{AssembledContext, Prompt, Query};

/// Instruction that keeps the model on the retrieved documentation.
pub const GROUNDING_INSTRUCTION: &str = "Answer the user's question using only the documentation excerpts provided below. \
If the excerpts do not contain the answer, say that the documentation does not cover it instead of guessing. \
Do not invent product features, settings or procedures.";

const CONTEXT_HEADER: &str = "Documentation excerpts:";

/// Builds the two-message prompt sent to the generation backend.
#[derive(Debug, Clone, Default)]
pub struct PromptBuilder {
    persona: Option<String>,
}

impl PromptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Preamble placed before the grounding instruction, e.g.
    /// "You are an expert on the SafeMobile dispatch console."
    pub fn with_persona(mut self, persona: Option<String>) -> Self {
        self.persona = persona
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty());
        self
    }

    pub fn build(&self, context: &AssembledContext, query: &Query) -> Prompt {
        let mut system = String::new();
        if let Some(persona) = &self.persona {
            system.push_str(persona);
            system.push_str("\n\n");
        }
        system.push_str(GROUNDING_INSTRUCTION);
        system.push_str("\n\n");
        system.push_str(CONTEXT_HEADER);
        system.push('\n');
        system.push_str(context.text());

        Prompt::new(system, query.text.clone())
    }
}
