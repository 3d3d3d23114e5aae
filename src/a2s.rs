//! Source A2S_INFO queries -- https://developer.valvesoftware.com/wiki/Server_queries#A2S_INFO
//!
//! One request, one response. Newer servers answer the first request with an
//! S2C_CHALLENGE; the request is then repeated once with the challenge appended.
use std::io::Cursor;

use log::debug;

use crate::error::QueryError;
use crate::packet::{PacketType, RequestPacket, ResponsePacket};
use crate::parse::{get_string, get_u16, get_u64, get_u8, remaining};
use crate::query::FieldMap;
use crate::transport::{QueryEndpoint, Transport};

/// The Ship (app id 2400) squeezes three extra bytes in before the version.
const THE_SHIP_APP_ID: u16 = 2400;

// Extra Data Flag bits
const EDF_PORT: u8 = 0x80;
const EDF_STEAM_ID: u8 = 0x10;
const EDF_SOURCE_TV: u8 = 0x40;
const EDF_KEYWORDS: u8 = 0x20;
const EDF_GAME_ID: u8 = 0x01;

/// Query `endpoint` with A2S_INFO and return the raw fields.
pub async fn query(endpoint: &QueryEndpoint) -> Result<FieldMap, QueryError> {
    let transport = Transport::connect(endpoint).await?;

    // sending initial packet
    let raw = transport.exchange(&RequestPacket::new(None).pack()).await?;
    let mut packet = ResponsePacket::unpack(&raw)?;

    // absolving challenge
    if let Some(challenge) = packet.challenge() {
        debug!("{}:{} sent a challenge, repeating request", endpoint.host, endpoint.port);
        let request = RequestPacket::new(Some(challenge)).pack();
        // skip duplicates of the challenge we just answered
        let raw = transport.exchange_filtered(&request, ResponsePacket::is_challenge).await?;
        packet = ResponsePacket::unpack(&raw)?;
    }

    match packet.packet_type() {
        PacketType::Response => parse_info(packet.body()),
        other => Err(QueryError::Protocol(format!("expected an info response, got {other:?}"))),
    }
}

/// Parse the body of an A2S_INFO response (everything after the 0x49 type byte).
pub fn parse_info(body: &[u8]) -> Result<FieldMap, QueryError> {
    let mut cursor = Cursor::new(body);
    let mut fields = FieldMap::new();

    fields.insert("Protocol".into(), get_u8(&mut cursor)?.to_string());
    fields.insert("Name".into(), get_string(&mut cursor)?);
    fields.insert("Map".into(), get_string(&mut cursor)?);
    fields.insert("Folder".into(), get_string(&mut cursor)?);
    fields.insert("Game".into(), get_string(&mut cursor)?);
    let app_id = get_u16(&mut cursor)?;
    fields.insert("AppId".into(), app_id.to_string());
    fields.insert("Players".into(), get_u8(&mut cursor)?.to_string());
    fields.insert("MaxPlayers".into(), get_u8(&mut cursor)?.to_string());
    fields.insert("Bots".into(), get_u8(&mut cursor)?.to_string());
    fields.insert("ServerType".into(), server_type(get_u8(&mut cursor)?).to_owned());
    fields.insert("Environment".into(), environment(get_u8(&mut cursor)?).to_owned());
    fields.insert("Visibility".into(), flag(get_u8(&mut cursor)?));
    fields.insert("VAC".into(), flag(get_u8(&mut cursor)?));

    if app_id == THE_SHIP_APP_ID {
        fields.insert("Mode".into(), get_u8(&mut cursor)?.to_string());
        fields.insert("Witnesses".into(), get_u8(&mut cursor)?.to_string());
        fields.insert("Duration".into(), get_u8(&mut cursor)?.to_string());
    }

    fields.insert("Version".into(), get_string(&mut cursor)?);

    // EDF is optional, old servers stop here
    if remaining(&cursor).is_empty() {
        return Ok(fields);
    }
    let edf = get_u8(&mut cursor)?;
    if edf & EDF_PORT != 0 {
        fields.insert("Port".into(), get_u16(&mut cursor)?.to_string());
    }
    if edf & EDF_STEAM_ID != 0 {
        fields.insert("SteamId".into(), get_u64(&mut cursor)?.to_string());
    }
    if edf & EDF_SOURCE_TV != 0 {
        fields.insert("SourceTvPort".into(), get_u16(&mut cursor)?.to_string());
        fields.insert("SourceTvName".into(), get_string(&mut cursor)?);
    }
    if edf & EDF_KEYWORDS != 0 {
        fields.insert("Keywords".into(), get_string(&mut cursor)?);
    }
    if edf & EDF_GAME_ID != 0 {
        fields.insert("GameId".into(), get_u64(&mut cursor)?.to_string());
    }

    Ok(fields)
}

fn server_type(c: u8) -> &'static str {
    match c {
        b'd' | b'D' => "dedicated",
        b'l' | b'L' => "listen",
        b'p' | b'P' => "proxy",
        _ => "unknown",
    }
}

fn environment(c: u8) -> &'static str {
    match c {
        b'l' | b'L' => "linux",
        b'w' | b'W' => "windows",
        b'm' | b'M' | b'o' | b'O' => "mac",
        _ => "unknown",
    }
}

fn flag(b: u8) -> String {
    (b == 1).to_string()
}
