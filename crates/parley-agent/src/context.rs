use parley_core::Message;

/// Sliding message window handed to the LLM on every turn.
pub struct ContextWindow {
    messages: Vec<Message>,
    system_prompt: Option<String>,
    max_messages: usize,
}

impl ContextWindow {
    /// Window keeping at most `max_messages` messages (at least one).
    pub fn new(max_messages: usize) -> Self {
        Self {
            messages: Vec::new(),
            system_prompt: None,
            max_messages: max_messages.max(1),
        }
    }

    /// Set the prompt sent ahead of every window.
    pub fn set_system_prompt(&mut self, prompt: impl Into<String>) {
        self.system_prompt = Some(prompt.into());
    }

    /// The system prompt, if set.
    pub fn system_prompt(&self) -> Option<&str> {
        self.system_prompt.as_deref()
    }

    /// Append a message, dropping the oldest past the limit.
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
        self.truncate();
    }

    /// Messages currently in the window, oldest first.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// The window as it would look after `message` was pushed, without mutating it.
    pub fn with_pending(&self, message: Message) -> Vec<Message> {
        let skip = (self.messages.len() + 1).saturating_sub(self.max_messages);
        self.messages
            .iter()
            .skip(skip)
            .cloned()
            .chain(std::iter::once(message))
            .collect()
    }

    fn truncate(&mut self) {
        if self.messages.len() > self.max_messages {
            let excess = self.messages.len() - self.max_messages;
            self.messages.drain(..excess);
        }
    }

    /// Number of messages in the window.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the window holds no messages.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_window_drops_oldest() {
        let mut window = ContextWindow::new(3);
        for i in 0..5 {
            window.push(Message::user(format!("m{i}")));
        }
        let contents: Vec<_> = window.messages().iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["m2", "m3", "m4"]);
    }

    #[test]
    fn test_with_pending_respects_limit_without_mutating() {
        let mut window = ContextWindow::new(2);
        window.push(Message::user("a"));
        window.push(Message::assistant("b"));

        let pending = window.with_pending(Message::user("c"));
        let contents: Vec<_> = pending.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["b", "c"]);
        assert_eq!(window.len(), 2);
        assert_eq!(window.messages()[0].content, "a");
    }

    #[test]
    fn test_system_prompt_is_kept_outside_window() {
        let mut window = ContextWindow::new(1);
        window.set_system_prompt("be nice");
        window.push(Message::user("x"));
        window.push(Message::user("y"));
        assert_eq!(window.system_prompt(), Some("be nice"));
        assert_eq!(window.len(), 1);
    }
}
