//! Document store configuration

use serde::Deserialize;

use super::error::ValidationError;

/// In-process document store settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoreConfig {
    /// Declared composite indexes, comma-separated, each written as
    /// `collection(field,field,...)`. When unset every query is served.
    pub indexes: Option<String>,
}

impl StoreConfig {
    /// Parsed index declarations, `None` when the store is permissive.
    ///
    /// Commas inside parentheses belong to the index, not the list.
    pub fn index_list(&self) -> Option<Vec<String>> {
        let raw = self.indexes.as_deref()?;
        let mut indexes = Vec::new();
        let mut depth = 0usize;
        let mut current = String::new();
        for ch in raw.chars() {
            match ch {
                '(' => depth += 1,
                ')' => depth = depth.saturating_sub(1),
                ',' if depth == 0 => {
                    push_trimmed(&mut indexes, &mut current);
                    continue;
                }
                _ => {}
            }
            if !ch.is_whitespace() {
                current.push(ch);
            }
        }
        push_trimmed(&mut indexes, &mut current);
        Some(indexes)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        for index in self.index_list().unwrap_or_default() {
            let well_formed = index
                .split_once('(')
                .is_some_and(|(collection, rest)| !collection.is_empty() && rest.ends_with(')'));
            if !well_formed {
                return Err(ValidationError::InvalidIndex(index));
            }
        }
        Ok(())
    }
}

fn push_trimmed(indexes: &mut Vec<String>, current: &mut String) {
    if !current.is_empty() {
        indexes.push(std::mem::take(current));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unset_is_permissive() {
        assert_eq!(StoreConfig::default().index_list(), None);
    }

    #[test]
    fn test_parses_nested_commas() {
        let config = StoreConfig {
            indexes: Some("bookings(consultant_id,status,scheduled_at), messages(conversation_id,created_at)".into()),
        };
        assert_eq!(
            config.index_list().unwrap(),
            vec![
                "bookings(consultant_id,status,scheduled_at)",
                "messages(conversation_id,created_at)",
            ]
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_malformed_index() {
        let config = StoreConfig {
            indexes: Some("bookings".into()),
        };
        assert!(config.validate().is_err());
    }
}
