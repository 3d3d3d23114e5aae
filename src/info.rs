use std::collections::HashMap;
use std::fmt;

use log::warn;

use crate::error::QueryError;
use crate::query::FieldMap;

/// Field names a handler may use for the server name.
const NAME_KEYS: [&str; 2] = ["Name", "MOTD"];

/// Server status as returned by [crate::Registry::query_server],
/// whichever protocol produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerInfo {
    /// Server hostname / MOTD
    pub name: String,
    /// Current map
    pub map: String,
    /// Current players
    pub players: i32,
    /// Max players
    pub max_players: i32,
    /// Game port as reported by the server, or the queried port if it didn't say
    pub port: u16,
    /// Everything else the protocol reported, keyed by its raw field name.
    pub extra: HashMap<String, String>,
}

impl ServerInfo {
    /// Normalize a handler's [FieldMap].
    ///
    /// Player counts are required; a missing or non-numeric count fails the
    /// whole query. Name, map and port are best effort.
    pub fn from_fields(mut fields: FieldMap, queried_port: u16) -> Result<ServerInfo, QueryError> {
        let players = required_int(&mut fields, "Players")?;
        let max_players = required_int(&mut fields, "MaxPlayers")?;

        let name = NAME_KEYS
            .iter()
            .find_map(|key| fields.remove(*key))
            .unwrap_or_default();
        let map = fields.remove("Map").unwrap_or_default();

        let port = match fields.remove("Port") {
            Some(raw) => raw.trim().parse::<u16>().unwrap_or_else(|_| {
                warn!("ignoring unparseable port {raw:?}");
                queried_port
            }),
            None => queried_port,
        };

        Ok(ServerInfo {
            name,
            map,
            players,
            max_players,
            port,
            extra: fields,
        })
    }

    /// `players/max_players`, the way status displays show it.
    pub fn players_string(&self) -> String {
        format!("{}/{}", self.players, self.max_players)
    }
}

impl fmt::Display for ServerInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}] {}", self.name, self.map, self.players_string())
    }
}

fn required_int(fields: &mut FieldMap, key: &str) -> Result<i32, QueryError> {
    let raw = fields
        .remove(key)
        .ok_or_else(|| QueryError::Protocol(format!("missing {key} field")))?;
    raw.trim()
        .parse::<i32>()
        .map_err(|_| QueryError::Protocol(format!("{key} is not a number: {raw:?}")))
}
