use crate::errors::IntoClientError;
use crate::events::ConnectionId;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// A connection that has claimed a display name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    pub connection_id: ConnectionId,
    pub display_name: String,
    /// Dense 1..N position among connected players; informational only.
    pub sequence: usize,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("name `{0}` is already taken")]
    NameConflict(String),
    #[error("connection {0} already joined as a player")]
    AlreadyRegistered(ConnectionId),
}

impl IntoClientError for RegistryError {
    fn error_code(&self) -> &'static str {
        match self {
            RegistryError::NameConflict(_) => "name_conflict",
            RegistryError::AlreadyRegistered(_) => "already_registered",
        }
    }

    fn client_message(&self) -> String {
        match self {
            RegistryError::NameConflict(_) => "This name already exists".to_string(),
            RegistryError::AlreadyRegistered(_) => "You have already joined".to_string(),
        }
    }
}

/// Connected players keyed by connection, with unique display names.
#[derive(Debug, Default)]
pub struct PlayerRegistry {
    players: Vec<Player>,
}

impl PlayerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims `name` for `connection_id`.
    ///
    /// Names are compared exactly: case-sensitive, no trimming.
    pub fn register(
        &mut self,
        connection_id: impl Into<ConnectionId>,
        name: impl Into<String>,
    ) -> Result<&Player, RegistryError> {
        let connection_id = connection_id.into();
        let name = name.into();

        if self.find(&connection_id).is_some() {
            return Err(RegistryError::AlreadyRegistered(connection_id));
        }
        if self.find_by_name(&name).is_some() {
            return Err(RegistryError::NameConflict(name));
        }

        let player = Player {
            connection_id,
            display_name: name,
            sequence: self.players.len() + 1,
            joined_at: Utc::now(),
        };
        self.players.push(player);

        Ok(&self.players[self.players.len() - 1])
    }

    /// Removes the player and closes the gap in sequence numbers.
    pub fn unregister(&mut self, connection_id: &str) -> Option<Player> {
        let position = self
            .players
            .iter()
            .position(|p| p.connection_id == connection_id)?;
        let removed = self.players.remove(position);

        for player in self
            .players
            .iter_mut()
            .filter(|p| p.sequence > removed.sequence)
        {
            player.sequence -= 1;
        }

        Some(removed)
    }

    pub fn find(&self, connection_id: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.connection_id == connection_id)
    }

    pub fn find_by_name(&self, name: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.display_name == name)
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Player> {
        self.players.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sequences(registry: &PlayerRegistry) -> Vec<(String, usize)> {
        registry
            .iter()
            .map(|p| (p.display_name.clone(), p.sequence))
            .collect()
    }

    #[test]
    fn duplicate_name_conflicts_while_first_is_connected() {
        let mut registry = PlayerRegistry::new();
        registry.register("c1", "Alice").expect("first registration");

        let err = registry.register("c2", "Alice").unwrap_err();
        assert_eq!(err, RegistryError::NameConflict("Alice".into()));
        assert_eq!(err.client_message(), "This name already exists");

        registry.unregister("c1");
        registry.register("c2", "Alice").expect("name free again");
    }

    #[test]
    fn names_are_case_sensitive_and_untrimmed() {
        let mut registry = PlayerRegistry::new();
        registry.register("c1", "alice").expect("register");
        registry.register("c2", "Alice").expect("different case");
        registry.register("c3", "alice ").expect("trailing space");
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn second_registration_from_same_connection_fails() {
        let mut registry = PlayerRegistry::new();
        registry.register("c1", "Alice").expect("register");
        assert_eq!(
            registry.register("c1", "Bob").unwrap_err(),
            RegistryError::AlreadyRegistered("c1".into())
        );
    }

    #[test]
    fn unregister_compacts_sequence_numbers() {
        let mut registry = PlayerRegistry::new();
        for (id, name) in [("c1", "A"), ("c2", "B"), ("c3", "C"), ("c4", "D")] {
            registry.register(id, name).expect("register");
        }

        let removed = registry.unregister("c2").expect("present");
        assert_eq!(removed.sequence, 2);
        assert_eq!(
            sequences(&registry),
            vec![("A".into(), 1), ("C".into(), 2), ("D".into(), 3)]
        );

        registry.register("c5", "E").expect("register");
        assert_eq!(registry.find("c5").map(|p| p.sequence), Some(4));
    }

    #[test]
    fn unregister_unknown_connection_is_noop() {
        let mut registry = PlayerRegistry::new();
        registry.register("c1", "A").expect("register");
        assert!(registry.unregister("nope").is_none());
        assert_eq!(registry.len(), 1);
    }
}
