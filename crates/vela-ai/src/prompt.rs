//! Generation prompt composition.
//!
//! The prompt stacks context layers under the persona: memory guidance,
//! the recent conversation window, and tool results (including failure
//! notes, so the model can explain what went wrong).

use vela_common::Author;
use vela_memory::MemoryContext;
use vela_tools::ToolInvocation;

/// The payload handed to a backend.
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

/// Builds the layered system prompt for one turn.
pub struct PromptBuilder {
    persona: String,
    memory: Option<String>,
    conversation: Option<String>,
    tools: Option<String>,
}

impl PromptBuilder {
    pub fn new(persona: impl Into<String>) -> Self {
        Self {
            persona: persona.into(),
            memory: None,
            conversation: None,
            tools: None,
        }
    }

    pub fn with_memory(mut self, context: &MemoryContext) -> Self {
        if !context.is_empty() {
            let lines: Vec<String> = context
                .snippets
                .iter()
                .map(|s| format!("- {}", s.text))
                .collect();
            self.memory = Some(lines.join("\n"));
        }
        self
    }

    /// Recent conversation window, oldest first.
    pub fn with_conversation(mut self, recent: &[(Author, String)]) -> Self {
        if !recent.is_empty() {
            let lines: Vec<String> = recent
                .iter()
                .map(|(author, content)| {
                    let speaker = match author {
                        Author::Host => "Host",
                        Author::Agent => "You",
                        Author::System => "System",
                    };
                    format!("{speaker}: {content}")
                })
                .collect();
            self.conversation = Some(lines.join("\n"));
        }
        self
    }

    pub fn with_tool_results(mut self, invocations: &[ToolInvocation]) -> Self {
        if !invocations.is_empty() {
            let lines: Vec<String> = invocations
                .iter()
                .map(|inv| format!("- {}", inv.prompt_line()))
                .collect();
            self.tools = Some(lines.join("\n"));
        }
        self
    }

    pub fn build(self, user_message: &str) -> Prompt {
        let mut system = self.persona;

        system.push_str("\n\nMEMORY GUIDANCE:\n");
        system.push_str(
            self.memory
                .as_deref()
                .unwrap_or("No additional context available."),
        );

        if let Some(ref conversation) = self.conversation {
            system.push_str("\n\nRECENT CONVERSATION:\n");
            system.push_str(conversation);
        }

        system.push_str("\n\nTOOL RESULTS:\n");
        match self.tools {
            Some(ref tools) => {
                system.push_str(tools);
                system.push_str(
                    "\n\nIncorporate the tool results above naturally. If a tool \
                     failed or timed out, say so briefly instead of guessing.",
                );
            }
            None => system.push_str("No tool results available."),
        }

        Prompt {
            system,
            user: user_message.to_string(),
        }
    }
}
