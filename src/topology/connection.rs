//! Pairwise connection records
//!
//! The neighborhood endpoint delivers connections either as structured records
//! or in the legacy encoded form `source:::target:::link_name:::direction`.
//! Both decode to a [`Connection`].

use crate::error::{DashboardError, Result};
use crate::types::Direction;
use serde::{Deserialize, Serialize};

/// Separator of the legacy encoded form
pub const CONNECTION_SEPARATOR: &str = ":::";

/// A directed connection between two pieces of equipment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub link_name: String,
    /// Direction of `target` as seen from `source`
    #[serde(rename = "up_down", alias = "direction", default)]
    pub direction: Direction,
}

impl Connection {
    pub fn new(
        source: impl Into<String>,
        target: impl Into<String>,
        link_name: impl Into<String>,
        direction: Direction,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            link_name: link_name.into(),
            direction,
        }
    }

    /// Decode the legacy encoded form. Extra segments are ignored.
    pub fn decode(raw: &str) -> Result<Self> {
        let parts: Vec<&str> = raw.split(CONNECTION_SEPARATOR).collect();
        if parts.len() < 4 {
            return Err(DashboardError::Malformed(format!(
                "expected 4 fields, got {} in {:?}",
                parts.len(),
                raw
            )));
        }

        Self::new(parts[0].trim(), parts[1].trim(), parts[2].trim(), Direction::parse(parts[3]))
            .validated()
    }

    /// Encode into the legacy form
    pub fn encode(&self) -> String {
        [
            self.source.as_str(),
            self.target.as_str(),
            self.link_name.as_str(),
            self.direction.as_str(),
        ]
        .join(CONNECTION_SEPARATOR)
    }

    fn validated(self) -> Result<Self> {
        if self.source.is_empty() || self.target.is_empty() {
            return Err(DashboardError::Malformed(format!(
                "connection with empty endpoint: {:?}",
                self.encode()
            )));
        }
        Ok(self)
    }

    /// The neighbor of `equip_id` across this connection and its direction
    /// as seen from `equip_id`.
    pub fn neighbor_of(&self, equip_id: &str) -> Option<(&str, Direction)> {
        if self.source == equip_id {
            Some((&self.target, self.direction))
        } else if self.target == equip_id {
            Some((&self.source, self.direction.reversed()))
        } else {
            None
        }
    }
}

/// A connection as it appears on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WireConnection {
    Encoded(String),
    Structured(Connection),
}

impl WireConnection {
    pub fn into_connection(self) -> Result<Connection> {
        match self {
            WireConnection::Encoded(raw) => Connection::decode(&raw),
            WireConnection::Structured(conn) => conn.validated(),
        }
    }
}

impl From<Connection> for WireConnection {
    fn from(conn: Connection) -> Self {
        WireConnection::Structured(conn)
    }
}

impl From<&str> for WireConnection {
    fn from(raw: &str) -> Self {
        WireConnection::Encoded(raw.to_string())
    }
}
