use {crate::classify::Classified, serde_json::Value};

pub fn thought_trace(author: &str, text: &str) -> String {
    format!("🧠 *Thought* ({author}): {text}")
}

pub fn tool_call_trace(author: &str, name: &str, args: &Value) -> String {
    format!("🔧 *Tool Call* ({author}): `{name}` with args: `{args}`")
}

pub fn tool_response_trace(name: &str, response: &Value) -> String {
    format!("📥 *Tool Response* for `{name}`: `{response}`")
}

pub fn decode_error_trace(detail: &str) -> String {
    format!("ERROR: Ran into JSON decoding issue: {detail}")
}

/// Reply being assembled during one streaming attempt.
///
/// A retry starts from a fresh value; nothing carries over between attempts.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ReplyState {
    final_answer: String,
    last_trace_text: Option<String>,
    trace_log: Vec<String>,
}

impl ReplyState {
    /// Fold one outcome in. Returns the trace to post live, if any.
    ///
    /// Thoughts are always forwarded; tool traces only with `show_tools`.
    pub fn apply(&mut self, outcome: Classified, show_tools: bool) -> Option<String> {
        match outcome {
            Classified::Skip => None,
            Classified::FinalTextAppend(text) => {
                self.final_answer.push_str(&text);
                None
            },
            Classified::ThoughtEmitted { author, text } => {
                Some(self.record_trace(thought_trace(&author, &text)))
            },
            Classified::ToolCallEmitted { author, name, args } => {
                let trace = self.record_trace(tool_call_trace(&author, &name, &args));
                show_tools.then_some(trace)
            },
            Classified::ToolResponseEmitted { name, response, .. } => {
                let trace = self.record_trace(tool_response_trace(&name, &response));
                show_tools.then_some(trace)
            },
        }
    }

    /// Note an undecodable event. The returned report is always posted.
    pub fn record_decode_error(&mut self, detail: &str) -> String {
        self.record_trace(decode_error_trace(detail))
    }

    fn record_trace(&mut self, trace: String) -> String {
        self.trace_log.push(trace.clone());
        self.last_trace_text = Some(trace.clone());
        trace
    }

    pub fn final_answer(&self) -> &str {
        &self.final_answer
    }

    pub fn last_trace_text(&self) -> Option<&str> {
        self.last_trace_text.as_deref()
    }

    pub fn trace_log(&self) -> &[String] {
        &self.trace_log
    }

    /// What the user should end up seeing: the final answer, or the last
    /// trace when the agent produced no answer text.
    pub fn display_text(&self) -> Option<&str> {
        if !self.final_answer.is_empty() {
            return Some(&self.final_answer);
        }
        self.last_trace_text().filter(|t| !t.is_empty())
    }
}
