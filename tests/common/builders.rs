//! Test data builders for creating test objects

use netfault_rs::topology::{AlarmDirectory, Connection, NeighborhoodResponse};
use netfault_rs::types::{Alarm, Direction, EquipmentRecord, Field};

/// Builder for equipment directory records
pub struct EquipmentBuilder {
    record: EquipmentRecord,
}

impl EquipmentBuilder {
    pub fn new(id: &str) -> Self {
        Self {
            record: EquipmentRecord::new(id, Field::Other).with_site(format!("site-{}", id)),
        }
    }

    pub fn field(mut self, field: Field) -> Self {
        self.record.field = field;
        self
    }

    pub fn name(mut self, name: &str) -> Self {
        self.record = self.record.with_name(name);
        self
    }

    pub fn build(self) -> EquipmentRecord {
        self.record
    }
}

/// Builder for alarms
pub struct AlarmBuilder {
    alarm: Alarm,
}

impl AlarmBuilder {
    pub fn new(equip_id: &str) -> Self {
        Self {
            alarm: Alarm::new(equip_id, "LINK DOWN"),
        }
    }

    pub fn message(mut self, message: &str) -> Self {
        self.alarm.message = message.to_string();
        self
    }

    pub fn field(mut self, field: Field) -> Self {
        self.alarm = self.alarm.with_sector(field);
        self
    }

    pub fn invalid(mut self) -> Self {
        self.alarm = self.alarm.with_validity(false);
        self
    }

    pub fn build(self) -> Alarm {
        self.alarm
    }
}

/// Builder for a neighborhood response plus the matching directory
#[derive(Default)]
pub struct NeighborhoodBuilder {
    response: NeighborhoodResponse,
    equipment: Vec<EquipmentRecord>,
    alarms: Vec<Alarm>,
}

impl NeighborhoodBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add equipment to both the neighborhood and the directory
    pub fn equipment(mut self, id: &str, field: Field) -> Self {
        let record = EquipmentBuilder::new(id).field(field).build();
        self.response = self.response.with_equipment(record.clone());
        self.equipment.push(record);
        self
    }

    pub fn connect(mut self, source: &str, target: &str, name: &str, direction: Direction) -> Self {
        self.response = self
            .response
            .with_link(Connection::new(source, target, name, direction));
        self
    }

    /// Add a raw triple-colon connection string
    pub fn raw_link(mut self, encoded: &str) -> Self {
        self.response = self.response.with_link(encoded);
        self
    }

    pub fn alarm(mut self, alarm: Alarm) -> Self {
        self.alarms.push(alarm);
        self
    }

    pub fn build(self) -> (NeighborhoodResponse, AlarmDirectory) {
        (self.response, AlarmDirectory::new(self.alarms, self.equipment))
    }
}

/// The EQ-100 neighborhood: an MW hop up to EQ-200 and a line down to EQ-300,
/// both far ends alarmed
pub fn eq100_scenario() -> (NeighborhoodResponse, AlarmDirectory) {
    NeighborhoodBuilder::new()
        .equipment("EQ-100", Field::Mw)
        .equipment("EQ-200", Field::Mw)
        .equipment("EQ-300", Field::Line)
        .raw_link("EQ-100:::EQ-200:::L1:::up")
        .raw_link("EQ-100:::EQ-300:::L2:::down")
        .alarm(AlarmBuilder::new("EQ-200").message("RSL low").field(Field::Mw).build())
        .alarm(AlarmBuilder::new("EQ-300").message("cable alarm").field(Field::Line).build())
        .build()
}

/// A chain of `len` IP nodes below `N0`, every odd one alarmed
pub fn chain(len: usize) -> (NeighborhoodResponse, AlarmDirectory) {
    let mut builder = NeighborhoodBuilder::new().equipment("N0", Field::Ip);
    for i in 1..len {
        let id = format!("N{}", i);
        builder = builder
            .equipment(&id, Field::Ip)
            .connect(&format!("N{}", i - 1), &id, &format!("C{}", i), Direction::Down);
        if i % 2 == 1 {
            builder = builder.alarm(AlarmBuilder::new(&id).field(Field::Ip).build());
        }
    }
    builder.build()
}
