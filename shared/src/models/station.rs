//! Station Model

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a station sits in the venue (общий зал / кабина)
///
/// Display names are numbered independently inside each placement group, so
/// the placement is part of every join key the backend stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Placement {
    /// Console in the shared hall
    #[serde(rename = "COMMON_HALL")]
    SharedHall,
    /// Console in a private booth
    #[serde(rename = "CABIN")]
    Booth,
}

impl Placement {
    /// Wire value understood by the session backend
    pub fn as_str(&self) -> &'static str {
        match self {
            Placement::SharedHall => "COMMON_HALL",
            Placement::Booth => "CABIN",
        }
    }

    /// Prefix of the display names in this placement group
    pub fn name_prefix(&self) -> &'static str {
        match self {
            Placement::SharedHall => "Зал",
            Placement::Booth => "Кабина",
        }
    }

    /// Label shown on the session summary
    pub fn label(&self) -> &'static str {
        match self {
            Placement::SharedHall => "Общий зал",
            Placement::Booth => "Кабина",
        }
    }
}

impl fmt::Display for Placement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Console hardware generation (informational only)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HardwareGeneration {
    Ps3,
    Ps5,
}

impl fmt::Display for HardwareGeneration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HardwareGeneration::Ps3 => write!(f, "PS3"),
            HardwareGeneration::Ps5 => write!(f, "PS5"),
        }
    }
}

/// Physical game station, fixed for the life of the process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Station {
    /// Stable short code, e.g. `PS3`
    pub id: String,
    /// Locale-specific label, e.g. `Кабина 1`; also the backend join key
    pub display_name: String,
    pub placement: Placement,
    pub hardware: HardwareGeneration,
    /// 1-based console number the id is derived from
    pub console_number: u32,
}

impl Station {
    /// Title used on station cards, e.g. `Зал 2 - PS3`
    pub fn card_title(&self) -> String {
        format!("{} - {}", self.display_name, self.hardware)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placement_wire_values() {
        assert_eq!(
            serde_json::to_string(&Placement::SharedHall).unwrap(),
            "\"COMMON_HALL\""
        );
        assert_eq!(serde_json::to_string(&Placement::Booth).unwrap(), "\"CABIN\"");

        let parsed: Placement = serde_json::from_str("\"CABIN\"").unwrap();
        assert_eq!(parsed, Placement::Booth);
    }

    #[test]
    fn test_card_title() {
        let station = Station {
            id: "PS2".to_string(),
            display_name: "Зал 2".to_string(),
            placement: Placement::SharedHall,
            hardware: HardwareGeneration::Ps3,
            console_number: 2,
        };
        assert_eq!(station.card_title(), "Зал 2 - PS3");
    }
}
