//! Source query (A2S) packet framing.
use std::io::Cursor;

use crate::error::QueryError;
use crate::parse::{get_u8, get_uint, remaining, Endian};

#[derive(Debug, PartialEq, Eq)]
pub enum PacketHeader {
    Single,
    Split,
}

/// Convert an i32 into a [PacketHeader].
impl TryFrom<i32> for PacketHeader {
    type Error = QueryError;

    fn try_from(value: i32) -> Result<PacketHeader, Self::Error> {
        match value {
            -1 => Ok(PacketHeader::Single),
            -2 => Ok(PacketHeader::Split),
            n => Err(QueryError::Protocol(format!("unknown packet header {n}"))),
        }
    }
}

/// For packing a [PacketHeader] into a packet in [RequestPacket::pack].
impl PacketHeader {
    pub fn to_le_bytes(&self) -> [u8; 4] {
        let type_value: i32 = match self {
            PacketHeader::Single => -1,
            PacketHeader::Split => -2,
        };
        type_value.to_le_bytes()
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum PacketType {
    /// A2S_INFO Request -- https://developer.valvesoftware.com/wiki/Server_queries#A2S_INFO
    ///
    /// Retrieves information about the server including, but not limited to:
    /// its name, the map currently being played, and the number of players.
    Request,
    /// S2C_CHALLENGE
    ///
    /// the server may reply with a challenge to the client using S2C_CHALLENGE
    /// ('A' or 0x41). In that case, the client should repeat the request by appending
    /// the challenge number.
    Challenge,
    /// A2S_INFO Response Packet.
    Response,
}

/// Convert a u8 into a [PacketType].
impl TryFrom<u8> for PacketType {
    type Error = QueryError;

    fn try_from(value: u8) -> Result<PacketType, Self::Error> {
        match value {
            0x54 => Ok(PacketType::Request),
            0x41 => Ok(PacketType::Challenge),
            0x49 => Ok(PacketType::Response),
            n => Err(QueryError::Protocol(format!("unknown packet type 0x{n:02X}"))),
        }
    }
}

impl PacketType {
    pub fn to_byte(&self) -> u8 {
        match self {
            PacketType::Request => 0x54,
            PacketType::Challenge => 0x41,
            PacketType::Response => 0x49,
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct RequestPacket {
    packet_header: PacketHeader,
    packet_type: PacketType,
    challenge: Option<[u8; 4]>,
}

impl RequestPacket {
    const BODY: &'static [u8] = b"Source Engine Query";

    pub fn new(challenge: Option<[u8; 4]>) -> Self {
        RequestPacket {
            packet_header: PacketHeader::Single,
            packet_type: PacketType::Request,
            challenge,
        }
    }

    /// Serializes a request packet into an array of bytes.
    pub fn pack(&self) -> Vec<u8> {
        // packet structure: header, type, body, terminator (and challenge)
        let mut payload: Vec<u8> = Vec::with_capacity(29);
        payload.extend_from_slice(&self.packet_header.to_le_bytes());
        payload.push(self.packet_type.to_byte());
        payload.extend_from_slice(Self::BODY);
        payload.push(0);
        if let Some(c) = &self.challenge {
            payload.extend_from_slice(c);
        }

        payload
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct ResponsePacket {
    packet_type: PacketType,
    body: Vec<u8>,
}

impl ResponsePacket {
    /// Deserializes an incoming packet, splitting it up into header and body.
    pub fn unpack(incoming: &[u8]) -> Result<Self, QueryError> {
        let mut cursor = Cursor::new(incoming);
        let raw_header = get_uint(&mut cursor, 4, Endian::Little)? as u32 as i32;

        match PacketHeader::try_from(raw_header)? {
            PacketHeader::Single => {
                let packet_type = PacketType::try_from(get_u8(&mut cursor)?)?;

                let body = if packet_type == PacketType::Challenge {
                    let challenge = remaining(&cursor);
                    if challenge.len() < 4 {
                        return Err(QueryError::Protocol(
                            "challenge shorter than 4 bytes".to_owned(),
                        ));
                    }
                    challenge[..4].to_vec()
                } else {
                    remaining(&cursor).to_vec()
                };

                Ok(ResponsePacket { packet_type, body })
            }
            PacketHeader::Split => {
                Err(QueryError::Protocol("split responses are not supported".to_owned()))
            }
        }
    }

    /// Whether `incoming` is a single-packet S2C_CHALLENGE, without unpacking it.
    pub fn is_challenge(incoming: &[u8]) -> bool {
        incoming.len() > 4
            && incoming[..4] == PacketHeader::Single.to_le_bytes()
            && incoming[4] == PacketType::Challenge.to_byte()
    }

    pub fn packet_type(&self) -> &PacketType {
        &self.packet_type
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// The challenge number to echo back, if this is an S2C_CHALLENGE.
    pub fn challenge(&self) -> Option<[u8; 4]> {
        match self.packet_type {
            PacketType::Challenge => self.body.as_slice().try_into().ok(),
            _ => None,
        }
    }
}
