use serde::{Deserialize, Serialize};

/// Turns of earlier conversation kept in the model context.
pub const HISTORY_WINDOW: usize = 8;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub history: Vec<ChatTurn>,
}

impl ChatRequest {
    pub fn validate(&self) -> Result<(), String> {
        let n = self.message.trim().chars().count();
        if n == 0 || n > 2000 {
            return Err("message must be between 1 and 2000 characters".into());
        }
        Ok(())
    }

    pub fn recent_history(&self) -> &[ChatTurn] {
        let start = self.history.len().saturating_sub(HISTORY_WINDOW);
        &self.history[start..]
    }
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub reply: String,
}
