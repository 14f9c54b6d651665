use crate::services::llm::{Message, TextRequest};

/// Transcript of one scriptwriting conversation.
///
/// Turns are appended only once the model's answer is complete. While a turn
/// is in flight its prompt is held aside, so a failed turn leaves the
/// transcript exactly as it was.
#[derive(Debug, Clone)]
pub struct Conversation {
    system_instruction: String,
    turns: Vec<(String, String)>,
    pending: Option<String>,
}

impl Conversation {
    pub fn new(system_instruction: impl Into<String>) -> Self {
        Self {
            system_instruction: system_instruction.into(),
            turns: Vec::new(),
            pending: None,
        }
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Starts a turn and returns the request carrying the full prior context.
    pub fn begin_turn(&mut self, prompt: String) -> TextRequest {
        let mut contents = Vec::with_capacity(self.turns.len() * 2 + 1);
        for (request, response) in &self.turns {
            contents.push(Message::user(request.clone()));
            contents.push(Message::model(response.clone()));
        }
        contents.push(Message::user(prompt.clone()));
        self.pending = Some(prompt);

        TextRequest {
            system_instruction: Some(self.system_instruction.clone()),
            contents,
            ..Default::default()
        }
    }

    pub fn commit_turn(&mut self, response: String) {
        if let Some(request) = self.pending.take() {
            self.turns.push((request, response));
        } else {
            log::warn!("commit_turn called without a turn in flight; ignoring");
        }
    }

    pub fn abandon_turn(&mut self) {
        self.pending = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::llm::Role;

    #[test]
    fn test_turns_carry_full_context() {
        let mut conv = Conversation::new("sys");
        let first = conv.begin_turn("draft".to_string());
        assert_eq!(first.contents.len(), 1);
        assert_eq!(first.system_instruction.as_deref(), Some("sys"));
        conv.commit_turn("table v1".to_string());

        let second = conv.begin_turn("revise".to_string());
        let roles: Vec<Role> = second.contents.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Model, Role::User]);
        assert_eq!(second.contents[1].text, "table v1");
        assert_eq!(conv.len(), 1);
    }

    #[test]
    fn test_abandoned_turn_leaves_transcript() {
        let mut conv = Conversation::new("sys");
        conv.begin_turn("draft".to_string());
        conv.abandon_turn();
        assert!(conv.is_empty());
        assert!(!conv.has_pending());

        conv.commit_turn("stray".to_string());
        assert!(conv.is_empty());
    }
}
