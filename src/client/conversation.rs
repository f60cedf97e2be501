//! Per-instance multi-turn conversation tracking.

/// Default conversation identity for one client instance.
///
/// Mutated only by explicit calls; responses never update it implicitly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationState {
    default_conversation_id: Option<String>,
    multi_turn_enabled: bool,
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn default_conversation_id(&self) -> Option<&str> {
        self.default_conversation_id.as_deref()
    }

    pub fn multi_turn_enabled(&self) -> bool {
        self.multi_turn_enabled
    }

    /// Drop the default conversation so the next query starts fresh.
    pub fn start_new(&mut self) {
        self.default_conversation_id = None;
    }

    /// Set (or clear with `None`) the default conversation id.
    pub fn set_conversation_id(&mut self, id: Option<String>) {
        self.default_conversation_id = id
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
    }

    pub fn set_multi_turn(&mut self, enabled: bool) {
        self.multi_turn_enabled = enabled;
    }

    /// Conversation id to send: the explicit one, else the default when
    /// multi-turn is on.
    pub fn resolve(&self, explicit: Option<&str>) -> Option<String> {
        match explicit.map(str::trim).filter(|s| !s.is_empty()) {
            Some(id) => Some(id.to_string()),
            None if self.multi_turn_enabled => self.default_conversation_id.clone(),
            None => None,
        }
    }
}
