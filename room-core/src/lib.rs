use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

pub type PlayerName = String;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Player {
    pub name: PlayerName,
    pub is_owner: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RoomStatus {
    Lobby,
    InGame,
    GameOver,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Task {
    pub wishes: Vec<String>,
    pub completed: bool,
}

/// One game session: roster, lifecycle status, and the angel→owner pairing.
///
/// Status only ever moves forward: `Lobby` → `InGame` → `GameOver`.
/// `assignments` and `tasks` stay empty until the game starts, and the
/// roster is frozen from that point on.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Room {
    pub id: String,
    pub owner: PlayerName,
    pub players: Vec<Player>,
    pub status: RoomStatus,
    pub assignments: HashMap<PlayerName, PlayerName>,
    pub tasks: HashMap<PlayerName, Task>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RoomError {
    #[error("game has already started")]
    AlreadyStarted,
    #[error("player name is already taken in this room")]
    NameTaken,
    #[error("at least 2 players are required to start")]
    NotEnoughPlayers,
    #[error("game not found or not in progress")]
    NotRunning,
    #[error("player is not part of this game")]
    NotParticipant,
    #[error("game is not in progress")]
    NotInProgress,
    #[error("only the room owner can end the game")]
    NotOwner,
    #[error("game is not over yet")]
    NotOver,
}

/// Shuffle the names once, then chain neighbours: the player at shuffled
/// position i becomes the angel of the player at position `(i + 1) % n`.
/// The result is a single cycle, so no player is ever their own owner
/// for n >= 2.
pub fn cycle_assignments<R: Rng>(
    names: &[PlayerName],
    rng: &mut R,
) -> HashMap<PlayerName, PlayerName> {
    let mut order = names.to_vec();
    order.shuffle(rng);

    let mut assignments = HashMap::with_capacity(order.len());
    for (i, angel) in order.iter().enumerate() {
        let owner = order[(i + 1) % order.len()].clone();
        assignments.insert(angel.clone(), owner);
    }
    assignments
}

impl Room {
    pub fn new(id: impl Into<String>, owner_name: impl Into<String>) -> Self {
        let owner: String = owner_name.into();
        Self {
            id: id.into(),
            owner: owner.clone(),
            players: vec![Player {
                name: owner,
                is_owner: true,
            }],
            status: RoomStatus::Lobby,
            assignments: HashMap::new(),
            tasks: HashMap::new(),
        }
    }

    pub fn join(&mut self, name: &str) -> Result<(), RoomError> {
        if !matches!(self.status, RoomStatus::Lobby) {
            return Err(RoomError::AlreadyStarted);
        }
        if self.players.iter().any(|p| p.name == name) {
            return Err(RoomError::NameTaken);
        }

        self.players.push(Player {
            name: name.to_string(),
            is_owner: false,
        });
        Ok(())
    }

    pub fn start<R: Rng>(&mut self, rng: &mut R) -> Result<HashMap<PlayerName, PlayerName>, RoomError> {
        if !matches!(self.status, RoomStatus::Lobby) {
            return Err(RoomError::AlreadyStarted);
        }
        if self.players.len() < 2 {
            return Err(RoomError::NotEnoughPlayers);
        }

        let names: Vec<PlayerName> = self.players.iter().map(|p| p.name.clone()).collect();
        self.assignments = cycle_assignments(&names, rng);
        self.tasks = names.into_iter().map(|n| (n, Task::default())).collect();
        self.status = RoomStatus::InGame;

        Ok(self.assignments.clone())
    }

    /// Replaces any previously submitted list.
    pub fn submit_wishes(&mut self, player: &str, wishes: Vec<String>) -> Result<(), RoomError> {
        if !matches!(self.status, RoomStatus::InGame) {
            return Err(RoomError::NotRunning);
        }
        let task = self
            .tasks
            .get_mut(player)
            .ok_or(RoomError::NotParticipant)?;

        task.wishes = wishes;
        Ok(())
    }

    pub fn owner_of(&self, angel: &str) -> Result<(&str, &[String]), RoomError> {
        if !matches!(self.status, RoomStatus::InGame) {
            return Err(RoomError::NotRunning);
        }
        let owner = self
            .assignments
            .get(angel)
            .ok_or(RoomError::NotParticipant)?;

        Ok((owner.as_str(), self.wishes_of(owner)))
    }

    /// Count comparison over the tasks table: a player counts once their
    /// wish list is non-empty.
    pub fn all_wishes_submitted(&self) -> Result<bool, RoomError> {
        if !matches!(self.status, RoomStatus::InGame) {
            return Err(RoomError::NotRunning);
        }
        let submitted = self.tasks.values().filter(|t| !t.wishes.is_empty()).count();
        Ok(submitted == self.players.len())
    }

    // Wrong-status check runs before the caller check.
    pub fn end(&mut self, player: &str) -> Result<HashMap<PlayerName, PlayerName>, RoomError> {
        if !matches!(self.status, RoomStatus::InGame) {
            return Err(RoomError::NotInProgress);
        }
        if player != self.owner {
            return Err(RoomError::NotOwner);
        }

        self.status = RoomStatus::GameOver;
        Ok(self.assignments.clone())
    }

    pub fn final_assignments(&self) -> Result<&HashMap<PlayerName, PlayerName>, RoomError> {
        if !matches!(self.status, RoomStatus::GameOver) {
            return Err(RoomError::NotOver);
        }
        Ok(&self.assignments)
    }

    /// No status gate; players without a tasks entry read as empty.
    pub fn wishes_of(&self, player: &str) -> &[String] {
        self.tasks
            .get(player)
            .map(|t| t.wishes.as_slice())
            .unwrap_or(&[])
    }
}
