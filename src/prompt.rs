use crate::chunking::TextChunk;

/// Question answering restricted to the retrieved context
pub const ANSWER_TEMPLATE: &str = "Answer the question using ONLY the following context and not your training data. If you don't know the answer just say you don't know. DON'T make anything up.

Context: {context}
Question: {question}
";

/// Quiz generation: 10 questions, 4 answers each, the correct one marked `(o)`
pub const QUIZ_TEMPLATE: &str = "You are a helpful assistant that is role playing as a teacher.

Based ONLY on the following context make 10 questions to test the user's knowledge about the text.

Each question should have 4 answers, three of them must be incorrect and one should be correct.

Use (o) to signal the correct answer.

Question examples:

Question: What is the color of the ocean?
Answers: Red|Yellow|Green|Blue(o)

Question: What is the capital or Georgia?
Answers: Baku|Tbilisi(o)|Manila|Beirut

Question: When was Avatar released?
Answers: 2007|2001|2009(o)|1998

Question: Who was Julius Caesar?
Answers: A Roman Emperor(o)|Painter|Actor|Model

Your turn!

Context: {context}
";

/// Marker the quiz prompt asks the model to put after the correct answer
pub const CORRECT_ANSWER_MARKER: &str = "(o)";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptRole {
    System,
    User,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PromptMessage {
    pub role: PromptRole,
    pub content: String,
}

/// A fully assembled prompt, ready for a chat model
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub messages: Vec<PromptMessage>,
}

impl Prompt {
    pub fn user(content: impl Into<String>) -> Self {
        Prompt {
            messages: vec![PromptMessage {
                role: PromptRole::User,
                content: content.into(),
            }],
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Prompt {
            messages: vec![PromptMessage {
                role: PromptRole::System,
                content: content.into(),
            }],
        }
    }

    /// All message contents joined, for display and tests
    pub fn text(&self) -> String {
        self.messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// Join chunk texts into one context block
pub fn format_docs(chunks: &[TextChunk]) -> String {
    chunks
        .iter()
        .map(|chunk| chunk.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn answer_prompt(context: &str, question: &str) -> Prompt {
    Prompt::user(fill(
        ANSWER_TEMPLATE,
        &[("context", context), ("question", question)],
    ))
}

pub fn quiz_prompt(context: &str) -> Prompt {
    Prompt::system(fill(QUIZ_TEMPLATE, &[("context", context)]))
}

/// Substitute `{name}` placeholders in a single pass, so substituted values
/// are never themselves expanded.
fn fill(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let replacement = after.find('}').and_then(|close| {
            let name = &after[..close];
            values
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (*value, close))
        });

        match replacement {
            Some((value, close)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}
