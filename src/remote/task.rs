use serde::Deserialize;
use serde_json::Value;

/// One content segment of a status message.
///
/// Only `text` segments are understood; everything else is kept verbatim so
/// it can still be shown for inspection.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "Value")]
pub enum Part {
    Text(String),
    Opaque(Value),
}

impl From<Value> for Part {
    fn from(value: Value) -> Self {
        let is_text = value.get("kind").and_then(Value::as_str) == Some("text");
        match value.get("text").and_then(Value::as_str) {
            Some(text) if is_text => Part::Text(text.to_string()),
            _ => Part::Opaque(value),
        }
    }
}

/// The slice of a remote task the poller cares about.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Task {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub status: Option<TaskStatus>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskStatus {
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub message: Option<StatusMessage>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatusMessage {
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Task {
    /// Decode a task from a response body. Anything that is not an object
    /// with the expected field types is rejected.
    pub fn from_value(value: &Value) -> Result<Self, serde_json::Error> {
        Task::deserialize(value)
    }

    /// The provider-reported state, if any.
    pub fn state(&self) -> Option<&str> {
        self.status.as_ref()?.state.as_deref()
    }

    /// Task id, ignoring blanks.
    pub fn task_id(&self) -> Option<&str> {
        self.id.as_deref().filter(|id| !id.is_empty())
    }

    pub fn parts(&self) -> &[Part] {
        self.status
            .as_ref()
            .and_then(|s| s.message.as_ref())
            .map(|m| m.parts.as_slice())
            .unwrap_or(&[])
    }

    /// Plain text of the status message: every text segment, in order,
    /// newline-joined.
    pub fn reply_text(&self) -> String {
        self.parts()
            .iter()
            .filter_map(|p| match p {
                Part::Text(text) => Some(text.as_str()),
                Part::Opaque(_) => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Every segment rendered for inspection. Text goes through verbatim,
    /// other segments are pretty-printed JSON tagged with their index.
    pub fn parts_text(&self) -> String {
        self.parts()
            .iter()
            .enumerate()
            .map(|(idx, part)| match part {
                Part::Text(text) => text.clone(),
                Part::Opaque(value) => {
                    let rendered =
                        serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
                    format!("(part {idx}) {rendered}")
                }
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}
