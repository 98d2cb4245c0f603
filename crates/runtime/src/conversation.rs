//! Ordered conversation history shared across turns.

use crate::model::{Message, Role};

/// Append-only message log for a session.
///
/// Truncation for the model request goes through [`Conversation::recent`],
/// which never separates a tool-result message from the assistant message
/// that requested it.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn extend(&mut self, messages: impl IntoIterator<Item = Message>) {
        self.messages.extend(messages);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }

    /// The last `max` messages, widened so the window never *starts* on a
    /// tool-result message. A tool result with its assistant request cut off
    /// is rejected by every provider, so the start advances past any leading
    /// `Role::Tool` messages instead.
    pub fn recent(&self, max: usize) -> &[Message] {
        if max == 0 || self.messages.is_empty() {
            return &[];
        }
        let mut start = self.messages.len().saturating_sub(max);
        while start < self.messages.len() && self.messages[start].role == Role::Tool {
            start += 1;
        }
        &self.messages[start..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Part, ToolArguments, ToolCall, ToolResult};
    use serde_json::json;

    fn assistant_call(id: &str) -> Message {
        Message::from_parts(
            Role::Assistant,
            vec![Part::ToolCall(ToolCall {
                id: id.into(),
                name: "lookup".into(),
                arguments: ToolArguments::empty(),
            })],
        )
    }

    #[test]
    fn recent_returns_tail() {
        let mut conversation = Conversation::new();
        for i in 0..5 {
            conversation.push(Message::user(format!("m{i}")));
        }
        let window = conversation.recent(2);
        assert_eq!(window.len(), 2);
        assert_eq!(window[0].text(), "m3");
    }

    #[test]
    fn recent_never_starts_on_a_tool_result() {
        let mut conversation = Conversation::new();
        conversation.push(Message::user("look up X"));
        conversation.push(assistant_call("c1"));
        conversation.push(Message::tool_result(ToolResult::success(
            "c1",
            json!({"v": 1}),
        )));
        conversation.push(Message::assistant("done"));

        // A window of 2 would start on the tool result; it is narrowed.
        let window = conversation.recent(2);
        assert_eq!(window.len(), 1);
        assert_eq!(window[0].role, Role::Assistant);

        // A window of 3 keeps the pair intact.
        let window = conversation.recent(3);
        assert_eq!(window[0].role, Role::Assistant);
        assert!(window[0].has_tool_calls());
    }

    #[test]
    fn recent_wider_than_history_returns_everything() {
        let mut conversation = Conversation::new();
        conversation.push(Message::user("hi"));
        assert_eq!(conversation.recent(100).len(), 1);
        assert!(conversation.recent(0).is_empty());
    }
}
