use std::fmt;

/// Who said a message in a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Human,
    Ai,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Human => write!(f, "human"),
            Role::Ai => write!(f, "ai"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub message: String,
    pub role: Role,
}

/// Append-only record of one session's conversation
#[derive(Debug, Clone, Default)]
pub struct ConversationHistory {
    entries: Vec<HistoryEntry>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, message: impl Into<String>, role: Role) {
        self.entries.push(HistoryEntry {
            message: message.into(),
            role,
        });
    }

    /// Entries in insertion order
    pub fn all(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_keeps_order() {
        let mut history = ConversationHistory::new();
        history.append("What is this file about?", Role::Human);
        history.append("Cats.", Role::Ai);

        let roles: Vec<Role> = history.all().iter().map(|e| e.role).collect();
        assert_eq!(roles, vec![Role::Human, Role::Ai]);
        assert_eq!(history.all()[1].message, "Cats.");
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn test_clear() {
        let mut history = ConversationHistory::new();
        history.append("hi", Role::Human);
        history.clear();
        assert!(history.is_empty());
    }

    #[test]
    fn test_role_display() {
        assert_eq!(Role::Human.to_string(), "human");
        assert_eq!(Role::Ai.to_string(), "ai");
    }
}
