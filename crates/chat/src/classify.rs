use {
    relay_agents::{AgentEvent, Part},
    serde_json::Value,
};

/// Author whose events grade answers internally and are never shown.
pub const VALIDATOR_AUTHOR: &str = "answer_validator_agent";

/// What a single event part means for the reply.
#[derive(Debug, Clone, PartialEq)]
pub enum Classified {
    Skip,
    FinalTextAppend(String),
    ThoughtEmitted {
        author: String,
        text: String,
    },
    ToolCallEmitted {
        author: String,
        name: String,
        args: Value,
    },
    ToolResponseEmitted {
        author: String,
        name: String,
        response: Value,
    },
}

/// Interpret one streamed event, one outcome per part in part order.
///
/// Validator events collapse into a single [`Classified::Skip`].
pub fn classify(event: AgentEvent) -> Vec<Classified> {
    if event.author == VALIDATOR_AUTHOR {
        return vec![Classified::Skip];
    }
    let author = event.author;
    event
        .parts
        .into_iter()
        .map(|part| match part {
            Part::FinalText(text) => Classified::FinalTextAppend(text),
            Part::ThoughtText(text) => Classified::ThoughtEmitted {
                author: author.clone(),
                text,
            },
            Part::ToolCall { name, args } => Classified::ToolCallEmitted {
                author: author.clone(),
                name,
                args,
            },
            Part::ToolResponse { name, response } => Classified::ToolResponseEmitted {
                author: author.clone(),
                name,
                response,
            },
        })
        .collect()
}
