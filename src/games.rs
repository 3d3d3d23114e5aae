//! Games we know how to find, and how to ask them for their status.
use crate::query::Protocol;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Game {
    /// Short identifier used to pick a handler, e.g. `"mc"`.
    pub id: &'static str,
    pub full_name: &'static str,
    /// Default game port.
    pub port: u16,
    /// Default query port.
    pub query_port: u16,
    /// `None` if the server doesn't answer status queries.
    pub protocol: Option<Protocol>,
}

pub const GAMES: &[Game] = &[
    Game {
        id: "avorion",
        full_name: "Avorion Dedicated Server",
        port: 27000,
        query_port: 27001,
        protocol: None,
    },
    Game {
        id: "ce",
        full_name: "Conan Exiles Dedicated Server",
        port: 7777,
        query_port: 27015,
        protocol: Some(Protocol::A2s),
    },
    Game {
        id: "csgo",
        full_name: "Counter-Strike: Global Offensive Dedicated Server",
        port: 27015,
        query_port: 27015,
        protocol: Some(Protocol::A2s),
    },
    Game {
        id: "mc",
        full_name: "Minecraft: Java Edition Server",
        port: 25565,
        query_port: 25565,
        protocol: Some(Protocol::Ut3),
    },
];

/// Look up a game by identifier.
pub fn find(id: &str) -> Option<&'static Game> {
    GAMES.iter().find(|game| game.id == id)
}
