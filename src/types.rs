//! Core data types for netfault-rs
//!
//! This module contains the records shared by the graph builder, the layout
//! engine and the correlation engine.
//!
//! # Main Types
//!
//! - [`Field`] - Network field tag of a piece of equipment (MW, line, IP, ...)
//! - [`Direction`] - Where a node sits relative to the target (`center`, `up`, `down`)
//! - [`Alarm`] - An immutable alarm record from the alarm feed
//! - [`EquipmentRecord`] - A directory entry as returned by the neighborhood fetch
//! - [`EquipmentNode`] / [`Link`] - Vertices and edges of a topology snapshot
//! - [`FailurePoint`] - One classified element produced by the correlation engine
//!
//! # Wire Names
//!
//! Serde names follow the alarm/equipment feed (`equip_id`, `occur_datetime`,
//! `valid_yn`, `equip_field`, ...). Field tags accept both the English names and
//! the localized names used by the feed.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum number of characters shown for an equipment label before truncation
pub const LABEL_MAX_LENGTH: usize = 35;

/// Timestamp format used by the alarm feed
pub const ALARM_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ==================== Field ====================

/// Network field (sector) an element belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Field {
    /// Microwave radio
    Mw,
    /// Physical cable line
    Line,
    /// Transmission (SDH/OTN) equipment
    Transmission,
    /// IP network equipment
    Ip,
    /// Wireless access equipment
    Wireless,
    /// Switching exchange
    Exchange,
    /// Unknown or missing tag
    #[default]
    Other,
}

impl Field {
    /// All known field tags, in display order
    pub const ALL: [Field; 7] = [
        Field::Mw,
        Field::Line,
        Field::Transmission,
        Field::Ip,
        Field::Wireless,
        Field::Exchange,
        Field::Other,
    ];

    /// Canonical wire name of this field
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Mw => "MW",
            Field::Line => "line",
            Field::Transmission => "transmission",
            Field::Ip => "IP",
            Field::Wireless => "wireless",
            Field::Exchange => "exchange",
            Field::Other => "other",
        }
    }

    /// Parse a field tag, accepting the localized feed names
    pub fn parse(value: &str) -> Self {
        match value.trim() {
            "MW" | "mw" => Field::Mw,
            "선로" | "line" | "LINE" => Field::Line,
            "전송" | "transmission" => Field::Transmission,
            "IP" | "ip" => Field::Ip,
            "무선" | "wireless" => Field::Wireless,
            "교환" | "exchange" => Field::Exchange,
            _ => Field::Other,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<String> for Field {
    fn from(value: String) -> Self {
        Field::parse(&value)
    }
}

impl From<&str> for Field {
    fn from(value: &str) -> Self {
        Field::parse(value)
    }
}

impl From<Field> for String {
    fn from(field: Field) -> Self {
        field.as_str().to_string()
    }
}

// ==================== Direction ====================

/// Position of a node relative to the target in the hierarchy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Direction {
    /// The target itself
    #[default]
    Center,
    /// Upstream of the target
    Up,
    /// Downstream of the target
    Down,
    /// Any other token carried by a connection record
    Other,
}

impl Direction {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "center" => Direction::Center,
            "up" => Direction::Up,
            "down" => Direction::Down,
            _ => Direction::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Center => "center",
            Direction::Up => "up",
            Direction::Down => "down",
            Direction::Other => "unknown",
        }
    }

    /// Direction as seen from the other end of a connection
    pub fn reversed(self) -> Self {
        match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
            other => other,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<String> for Direction {
    fn from(value: String) -> Self {
        Direction::parse(&value)
    }
}

impl From<Direction> for String {
    fn from(direction: Direction) -> Self {
        direction.as_str().to_string()
    }
}

// ==================== Alarm ====================

/// A single alarm record. Immutable input to every component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alarm {
    pub equip_id: String,

    #[serde(rename = "alarm_message", alias = "message", default)]
    pub message: String,

    #[serde(rename = "occur_datetime", default, with = "alarm_timestamp")]
    pub occurred_at: Option<NaiveDateTime>,

    #[serde(rename = "valid_yn", default = "default_valid", with = "yes_no")]
    pub valid: bool,

    #[serde(rename = "alarm_grade", default)]
    pub grade: Option<String>,

    /// Field of the reporting equipment, when the feed carries it
    #[serde(default)]
    pub sector: Option<Field>,

    #[serde(default)]
    pub equip_name: Option<String>,

    #[serde(default)]
    pub equip_type: Option<String>,

    #[serde(default)]
    pub guksa_name: Option<String>,
}

fn default_valid() -> bool {
    true
}

impl Alarm {
    /// Create a valid alarm with the given message
    pub fn new(equip_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            equip_id: equip_id.into(),
            message: message.into(),
            occurred_at: None,
            valid: true,
            grade: None,
            sector: None,
            equip_name: None,
            equip_type: None,
            guksa_name: None,
        }
    }

    pub fn with_sector(mut self, sector: Field) -> Self {
        self.sector = Some(sector);
        self
    }

    pub fn with_validity(mut self, valid: bool) -> Self {
        self.valid = valid;
        self
    }

    pub fn with_timestamp(mut self, occurred_at: NaiveDateTime) -> Self {
        self.occurred_at = Some(occurred_at);
        self
    }

    /// Whether the alarm message carries the given code (e.g. `A1930`, `LOS`)
    pub fn mentions(&self, code: &str) -> bool {
        self.message.contains(code)
    }
}

mod alarm_timestamp {
    use super::ALARM_TIMESTAMP_FORMAT;
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<NaiveDateTime>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(ts) => serializer.serialize_str(&ts.format(ALARM_TIMESTAMP_FORMAT).to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<NaiveDateTime>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        Ok(raw.and_then(|s| {
            let s = s.trim();
            NaiveDateTime::parse_from_str(s, ALARM_TIMESTAMP_FORMAT)
                .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S"))
                .ok()
        }))
    }
}

mod yes_no {
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Text(String),
    }

    pub fn serialize<S>(value: &bool, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(if *value { "Y" } else { "N" })
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<bool, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Flag::deserialize(deserializer)? {
            Flag::Bool(b) => b,
            Flag::Text(s) => s.trim().eq_ignore_ascii_case("y"),
        })
    }
}

// ==================== Equipment ====================

/// Equipment directory entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquipmentRecord {
    /// Filled from the directory key when the payload omits it
    #[serde(default)]
    pub equip_id: String,

    #[serde(default)]
    pub equip_name: String,

    #[serde(default)]
    pub equip_type: String,

    #[serde(rename = "equip_field", alias = "sector", default)]
    pub field: Field,

    #[serde(default)]
    pub guksa_name: String,
}

impl EquipmentRecord {
    pub fn new(equip_id: impl Into<String>, field: Field) -> Self {
        let equip_id = equip_id.into();
        Self {
            equip_name: equip_id.clone(),
            equip_id,
            equip_type: String::new(),
            field,
            guksa_name: String::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.equip_name = name.into();
        self
    }

    pub fn with_site(mut self, site: impl Into<String>) -> Self {
        self.guksa_name = site.into();
        self
    }

    pub fn with_type(mut self, equip_type: impl Into<String>) -> Self {
        self.equip_type = equip_type.into();
        self
    }
}

/// A 2-D canvas position
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A vertex in the topology snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquipmentNode {
    pub id: String,
    pub name: String,
    pub field: Field,
    pub equip_type: String,
    /// Site (guksa) the equipment is installed at
    pub site: String,
    /// BFS distance from the target
    pub level: u32,
    pub direction: Direction,
    pub alarms: Vec<Alarm>,
    pub alarm_count: usize,
    pub valid_alarm_count: usize,
    pub is_target: bool,
    pub position: Point,
    /// Fixed coordinates; a pinned node is never moved by the relaxation pass
    pub pinned: Option<Point>,
}

impl EquipmentNode {
    /// Create a node from a directory record
    pub fn from_record(record: &EquipmentRecord, level: u32, direction: Direction) -> Self {
        Self {
            id: record.equip_id.clone(),
            name: if record.equip_name.is_empty() {
                record.equip_id.clone()
            } else {
                record.equip_name.clone()
            },
            field: record.field,
            equip_type: record.equip_type.clone(),
            site: record.guksa_name.clone(),
            level,
            direction,
            alarms: Vec::new(),
            alarm_count: 0,
            valid_alarm_count: 0,
            is_target: false,
            position: Point::default(),
            pinned: None,
        }
    }

    /// Attach the alarms for this node and refresh the counters
    pub fn set_alarms(&mut self, alarms: Vec<Alarm>) {
        self.alarm_count = alarms.len();
        self.valid_alarm_count = alarms.iter().filter(|a| a.valid).count();
        self.alarms = alarms;
    }

    /// Whether the node carries at least one valid alarm
    pub fn has_alarm(&self) -> bool {
        self.valid_alarm_count > 0
    }

    /// Label shown next to the node, truncated to [`LABEL_MAX_LENGTH`] characters
    pub fn display_label(&self) -> String {
        truncate_label(&self.name, LABEL_MAX_LENGTH)
    }

    /// Pin the node at a position, moving it there
    pub fn pin_at(&mut self, point: Point) {
        self.position = point;
        self.pinned = Some(point);
    }

    pub fn is_pinned(&self) -> bool {
        self.pinned.is_some()
    }
}

/// Truncate a label on a character boundary, appending `...` when shortened
pub fn truncate_label(label: &str, max_len: usize) -> String {
    if label.chars().count() <= max_len {
        label.to_string()
    } else {
        let mut out: String = label.chars().take(max_len).collect();
        out.push_str("...");
        out
    }
}

// ==================== Link ====================

/// A/B cable route labels of a line link
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CableRoute {
    pub a_route: String,
    pub b_route: String,
}

impl CableRoute {
    pub fn between(source_site: &str, target_site: &str) -> Self {
        Self {
            a_route: format!("{} - {} A route", source_site, target_site),
            b_route: format!("{} - {} B route", source_site, target_site),
        }
    }
}

/// An edge in the topology snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub id: String,
    pub source: String,
    pub target: String,
    pub name: String,
    /// `Mw` when both endpoints are MW, `Line` otherwise
    pub field: Field,
    pub direction: Direction,
    pub source_index: usize,
    pub target_index: usize,
    pub cable_route: Option<CableRoute>,
    /// Union of the endpoints' alarms
    pub alarms: Vec<Alarm>,
}

impl Link {
    /// Whether the link touches the given equipment id
    pub fn touches(&self, equip_id: &str) -> bool {
        self.source == equip_id || self.target == equip_id
    }

    /// The endpoint opposite to `equip_id`, if the link touches it
    pub fn other_end(&self, equip_id: &str) -> Option<&str> {
        if self.source == equip_id {
            Some(&self.target)
        } else if self.target == equip_id {
            Some(&self.source)
        } else {
            None
        }
    }
}

/// Identifier of the unordered endpoint pair `{a, b}`
pub fn link_id(a: &str, b: &str) -> String {
    if a <= b {
        format!("{}-{}", a, b)
    } else {
        format!("{}-{}", b, a)
    }
}

// ==================== Failure Points ====================

/// Kind of element a failure point refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    Node,
    Link,
}

/// Correlation stage that classified an element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCategory {
    LineFailure,
    MwFailure,
    UpstreamNode,
    ExchangeFailure,
    TransmissionFailure,
}

impl FailureCategory {
    /// Pipeline stage number (1-based)
    pub fn stage(&self) -> u8 {
        match self {
            FailureCategory::LineFailure => 1,
            FailureCategory::MwFailure => 2,
            FailureCategory::UpstreamNode => 3,
            FailureCategory::ExchangeFailure => 4,
            FailureCategory::TransmissionFailure => 5,
        }
    }

    /// Recover the category from a failure label when the payload omits it
    ///
    /// Accepts the English labels produced here and the localized labels of
    /// the analysis service. Unrecognized labels fall back on the element kind.
    pub fn from_label(failure_type: &str, kind: ElementKind) -> Self {
        let label = failure_type.to_lowercase();
        let has = |needles: &[&str]| needles.iter().any(|n| label.contains(n));

        if has(&["upstream node", "상위 노드"]) {
            FailureCategory::UpstreamNode
        } else if has(&["exchange", "교환"]) {
            FailureCategory::ExchangeFailure
        } else if has(&["transmission", "전송"]) {
            FailureCategory::TransmissionFailure
        } else if has(&["mw"]) {
            FailureCategory::MwFailure
        } else if has(&["line", "링크", "선로"]) {
            FailureCategory::LineFailure
        } else {
            match kind {
                ElementKind::Link => FailureCategory::LineFailure,
                ElementKind::Node => FailureCategory::UpstreamNode,
            }
        }
    }
}

/// One classified element
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "FailurePointRecord")]
pub struct FailurePoint {
    pub target_id: String,
    pub kind: ElementKind,
    pub name: String,
    pub field: Field,
    pub category: FailureCategory,
    pub failure_type: String,
    pub inference_detail: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fading: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub low_voltage: Option<bool>,
    #[serde(default)]
    pub alarm_count: usize,
    #[serde(default)]
    pub confidence: f32,
}

/// Decoding form of [`FailurePoint`]
///
/// The analysis service names the id and kind `id`/`type`, carries the raw
/// alarm list instead of a count, and sends neither field nor category.
#[derive(Deserialize)]
struct FailurePointRecord {
    #[serde(alias = "id")]
    target_id: String,
    #[serde(alias = "type")]
    kind: ElementKind,
    #[serde(default)]
    name: String,
    #[serde(default)]
    field: Field,
    #[serde(default)]
    category: Option<FailureCategory>,
    #[serde(default)]
    failure_type: String,
    #[serde(default)]
    inference_detail: String,
    #[serde(default)]
    fading: Option<bool>,
    #[serde(default)]
    low_voltage: Option<bool>,
    #[serde(default)]
    alarm_count: usize,
    #[serde(default)]
    alarms: Vec<serde_json::Value>,
    #[serde(default)]
    confidence: f32,
}

impl From<FailurePointRecord> for FailurePoint {
    fn from(record: FailurePointRecord) -> Self {
        let category = record
            .category
            .unwrap_or_else(|| FailureCategory::from_label(&record.failure_type, record.kind));
        let name = if record.name.is_empty() {
            record.target_id.clone()
        } else {
            record.name
        };
        Self {
            target_id: record.target_id,
            kind: record.kind,
            name,
            field: record.field,
            category,
            failure_type: record.failure_type,
            inference_detail: record.inference_detail,
            fading: record.fading,
            low_voltage: record.low_voltage,
            alarm_count: record.alarm_count.max(record.alarms.len()),
            confidence: record.confidence,
        }
    }
}
