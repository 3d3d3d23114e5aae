//! UT3 / GameSpy4 basic status queries.
//!
//! Two rounds over the same socket: a handshake that hands out a decimal
//! challenge, then an info request echoing the challenge back as 4 big-endian
//! bytes.
//!
//! Every packet starts with `magic(FE FD) type session(4)`, responses with
//! `type session(4)`.
use std::io::Cursor;

use log::debug;

use crate::error::QueryError;
use crate::parse::{decimal_to_i32, get_string, get_uint, Endian};
use crate::query::FieldMap;
use crate::transport::{QueryEndpoint, Transport};

const MAGIC: [u8; 2] = [0xFE, 0xFD];
const HANDSHAKE: u8 = 0x09;
const INFO: u8 = 0x00;
const SESSION_ID: [u8; 4] = [0x10, 0x20, 0x30, 0x40];

/// Response type byte plus the echoed session id.
const RESPONSE_HEADER_LEN: usize = 5;

/// The order fields appear in a basic status response, before the port.
const INFO_STRINGS: [&str; 5] = ["MOTD", "GameType", "Map", "Players", "MaxPlayers"];

/// Query `endpoint` and return its basic status fields.
pub async fn query(endpoint: &QueryEndpoint) -> Result<FieldMap, QueryError> {
    let transport = Transport::connect(endpoint).await?;

    let response = transport.exchange(&handshake_request()).await?;
    let token = challenge_token(&response)?;
    debug!(
        "{}:{} handshake ok, {:?} left for info",
        endpoint.host,
        endpoint.port,
        transport.remaining()
    );

    // a duplicated handshake reply may still be in flight
    let response = transport
        .exchange_filtered(&info_request(token), |r| r.first() == Some(&HANDSHAKE))
        .await?;
    parse_info(&response)
}

pub fn handshake_request() -> Vec<u8> {
    let mut request = Vec::with_capacity(7);
    request.extend_from_slice(&MAGIC);
    request.push(HANDSHAKE);
    request.extend_from_slice(&SESSION_ID);
    request
}

pub fn info_request(token: [u8; 4]) -> Vec<u8> {
    let mut request = Vec::with_capacity(11);
    request.extend_from_slice(&MAGIC);
    request.push(INFO);
    request.extend_from_slice(&SESSION_ID);
    request.extend_from_slice(&token);
    request
}

/// Turn a handshake response into the token the info request must carry.
pub fn challenge_token(response: &[u8]) -> Result<[u8; 4], QueryError> {
    let body = strip_header(response, HANDSHAKE)?;
    Ok(decimal_to_i32(body)?.to_be_bytes())
}

/// Parse a basic status response, header included.
pub fn parse_info(response: &[u8]) -> Result<FieldMap, QueryError> {
    let mut cursor = Cursor::new(strip_header(response, INFO)?);
    let mut fields = FieldMap::new();

    for key in INFO_STRINGS {
        fields.insert(key.to_owned(), get_string(&mut cursor)?);
    }
    fields.insert("Port".to_owned(), get_uint(&mut cursor, 2, Endian::Little)?.to_string());
    fields.insert("IP".to_owned(), get_string(&mut cursor)?);

    Ok(fields)
}

fn strip_header(response: &[u8], expected: u8) -> Result<&[u8], QueryError> {
    if response.len() < RESPONSE_HEADER_LEN {
        return Err(QueryError::Protocol(format!(
            "response of {} bytes is shorter than its header",
            response.len()
        )));
    }
    if response[0] != expected {
        return Err(QueryError::Protocol(format!(
            "expected packet type 0x{expected:02X}, got 0x{:02X}",
            response[0]
        )));
    }
    Ok(&response[RESPONSE_HEADER_LEN..])
}
