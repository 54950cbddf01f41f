//! Validation utilities.

use std::sync::OnceLock;

use regex::Regex;
use teamhub_database::MessageTarget;

use crate::types::{ChatError, ChatResult};

/// Validation utilities
pub struct Validator;

impl Validator {
    /// Validate that `value` is a UUID; `field` names it in the error.
    pub fn reference(field: &str, value: &str) -> ChatResult<()> {
        uuid::Uuid::parse_str(value.trim())
            .map(|_| ())
            .map_err(|_| ChatError::invalid_reference(field, value))
    }

    /// Build a message target from optional chat and group references.
    pub fn target(chat_id: Option<String>, group_id: Option<String>) -> ChatResult<MessageTarget> {
        let chat_id = chat_id.filter(|id| !id.trim().is_empty());
        let group_id = group_id.filter(|id| !id.trim().is_empty());

        let target = MessageTarget::from_parts(chat_id, group_id).ok_or(ChatError::InvalidTarget)?;
        match &target {
            MessageTarget::Chat(id) => Self::reference("chat", id)?,
            MessageTarget::Group(id) => Self::reference("group", id)?,
        }
        Ok(target)
    }

    /// Validate and normalise an email address.
    pub fn email(email: &str) -> ChatResult<String> {
        static EMAIL: OnceLock<Option<Regex>> = OnceLock::new();

        let email = email.trim().to_lowercase();
        if email.is_empty() {
            return Err(ChatError::validation("Email cannot be empty"));
        }

        if email.len() > 255 {
            return Err(ChatError::validation("Email too long (max 255 characters)"));
        }

        let pattern = EMAIL
            .get_or_init(|| Regex::new(r"^[a-z0-9._%+-]+@[a-z0-9.-]+\.[a-z]{2,}$").ok())
            .as_ref()
            .ok_or_else(|| ChatError::validation("Email pattern unavailable"))?;

        if !pattern.is_match(&email) {
            return Err(ChatError::validation(format!("Invalid email address: {email}")));
        }

        Ok(email)
    }

    /// Validate a reaction emoji.
    pub fn emoji(emoji: &str) -> ChatResult<()> {
        let emoji = emoji.trim();
        if emoji.is_empty() {
            return Err(ChatError::validation("Emoji cannot be empty"));
        }

        if emoji.chars().count() > 16 {
            return Err(ChatError::validation("Emoji too long"));
        }

        Ok(())
    }
}
