//! Station topology registry
//!
//! Built once from static configuration. Hall and booth stations are numbered
//! independently (`Зал 1..H`, `Кабина 1..B`) because the backend stores those
//! display names and active sessions are joined on them. The join lives here
//! so that a change of key only touches this module.

use shared::{HardwareGeneration, Placement, Session, Station};
use std::collections::HashSet;
use thiserror::Error;

/// Topology error
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TopologyError {
    #[error("Station not found: {0}")]
    NotFound(String),
}

/// Static layout of the venue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopologyConfig {
    /// Total number of consoles, numbered from 1
    pub station_count: u32,
    /// Console numbers placed in private booths
    pub booth_consoles: Vec<u32>,
    /// Console numbers with legacy (PS3) hardware
    pub legacy_consoles: Vec<u32>,
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self {
            station_count: 8,
            booth_consoles: vec![3, 6, 8],
            legacy_consoles: vec![2],
        }
    }
}

/// Immutable list of stations in console order
#[derive(Debug, Clone)]
pub struct StationRegistry {
    stations: Vec<Station>,
}

impl StationRegistry {
    pub fn new(config: &TopologyConfig) -> Self {
        let booths: HashSet<u32> = config.booth_consoles.iter().copied().collect();
        let legacy: HashSet<u32> = config.legacy_consoles.iter().copied().collect();

        for number in booths.union(&legacy) {
            if *number == 0 || *number > config.station_count {
                tracing::warn!(
                    console = number,
                    count = config.station_count,
                    "Console number outside the configured range, ignoring"
                );
            }
        }

        let mut hall_index = 0;
        let mut booth_index = 0;
        let stations = (1..=config.station_count)
            .map(|number| {
                let placement = if booths.contains(&number) {
                    Placement::Booth
                } else {
                    Placement::SharedHall
                };
                let index = match placement {
                    Placement::SharedHall => {
                        hall_index += 1;
                        hall_index
                    }
                    Placement::Booth => {
                        booth_index += 1;
                        booth_index
                    }
                };
                let hardware = if legacy.contains(&number) {
                    HardwareGeneration::Ps3
                } else {
                    HardwareGeneration::Ps5
                };

                Station {
                    id: format!("PS{number}"),
                    display_name: format!("{} {}", placement.name_prefix(), index),
                    placement,
                    hardware,
                    console_number: number,
                }
            })
            .collect();

        Self { stations }
    }

    pub fn all_stations(&self) -> &[Station] {
        &self.stations
    }

    pub fn hall_stations(&self) -> impl Iterator<Item = &Station> {
        self.stations
            .iter()
            .filter(|s| s.placement == Placement::SharedHall)
    }

    pub fn booths(&self) -> impl Iterator<Item = &Station> {
        self.stations
            .iter()
            .filter(|s| s.placement == Placement::Booth)
    }

    /// Look up by stable id (`PS3`); case-insensitive
    pub fn by_id(&self, id: &str) -> Result<&Station, TopologyError> {
        self.stations
            .iter()
            .find(|s| s.id.eq_ignore_ascii_case(id.trim()))
            .ok_or_else(|| TopologyError::NotFound(id.to_string()))
    }

    pub fn by_display_name(&self, name: &str) -> Option<&Station> {
        self.stations.iter().find(|s| s.display_name == name)
    }

    /// Display name for an id, or the id itself when it is unknown
    pub fn display_name_of(&self, id: &str) -> String {
        self.by_id(id)
            .map(|s| s.display_name.clone())
            .unwrap_or_else(|_| id.to_string())
    }

    /// Value sent as `stationId` and compared against `Session::station_display_name`
    pub fn join_key<'a>(&self, station: &'a Station) -> &'a str {
        &station.display_name
    }

    /// First active session in snapshot order whose join key matches
    pub fn active_session_for<'s>(
        &self,
        station: &Station,
        sessions: &'s [Session],
    ) -> Option<&'s Session> {
        let key = self.join_key(station);
        sessions
            .iter()
            .find(|s| s.is_active && s.station_display_name == key)
    }

    /// Join keys that have more than one active session in `sessions`
    pub fn duplicate_join_keys(&self, sessions: &[Session]) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut duplicates = Vec::new();
        for session in sessions.iter().filter(|s| s.is_active) {
            let key = session.station_display_name.as_str();
            if !seen.insert(key) && !duplicates.iter().any(|d: &String| d == key) {
                duplicates.push(key.to_string());
            }
        }
        duplicates
    }
}

impl Default for StationRegistry {
    fn default() -> Self {
        Self::new(&TopologyConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn active(id: &str, station: &str) -> Session {
        Session {
            id: id.to_string(),
            placement: Placement::SharedHall,
            station_display_name: station.to_string(),
            start_time: Utc::now(),
            end_time: None,
            items: vec![],
            is_active: true,
            play_time_price: None,
            total_bill: None,
        }
    }

    #[test]
    fn test_default_layout() {
        let registry = StationRegistry::default();
        let names: Vec<_> = registry
            .all_stations()
            .iter()
            .map(|s| (s.id.as_str(), s.display_name.as_str()))
            .collect();
        assert_eq!(
            names,
            [
                ("PS1", "Зал 1"),
                ("PS2", "Зал 2"),
                ("PS3", "Кабина 1"),
                ("PS4", "Зал 3"),
                ("PS5", "Зал 4"),
                ("PS6", "Кабина 2"),
                ("PS7", "Зал 5"),
                ("PS8", "Кабина 3"),
            ]
        );

        assert_eq!(registry.hall_stations().count(), 5);
        assert_eq!(registry.booths().count(), 3);
        assert_eq!(
            registry.by_id("PS2").unwrap().hardware,
            HardwareGeneration::Ps3
        );
        assert_eq!(
            registry.by_id("ps8").unwrap().placement,
            Placement::Booth
        );
    }

    #[test]
    fn test_lookup_failures() {
        let registry = StationRegistry::default();
        assert_eq!(
            registry.by_id("PS9"),
            Err(TopologyError::NotFound("PS9".to_string()))
        );
        assert_eq!(registry.display_name_of("PS9"), "PS9");
        assert_eq!(registry.display_name_of("PS6"), "Кабина 2");
        assert_eq!(registry.by_display_name("Зал 3").unwrap().id, "PS4");
    }

    #[test]
    fn test_numbering_is_contiguous_per_placement_for_every_layout() {
        for count in 0..=8u32 {
            for mask in 0..(1u32 << count) {
                let booths: Vec<u32> = (1..=count).filter(|n| mask & (1 << (n - 1)) != 0).collect();
                let registry = StationRegistry::new(&TopologyConfig {
                    station_count: count,
                    booth_consoles: booths.clone(),
                    legacy_consoles: vec![],
                });

                let hall: Vec<_> = registry.hall_stations().map(|s| s.display_name.clone()).collect();
                let cabins: Vec<_> = registry.booths().map(|s| s.display_name.clone()).collect();

                let expected_hall: Vec<_> =
                    (1..=hall.len()).map(|i| format!("Зал {i}")).collect();
                let expected_cabins: Vec<_> =
                    (1..=cabins.len()).map(|i| format!("Кабина {i}")).collect();
                assert_eq!(hall, expected_hall);
                assert_eq!(cabins, expected_cabins);
                assert_eq!(cabins.len(), booths.len());

                let unique: HashSet<_> = registry
                    .all_stations()
                    .iter()
                    .map(|s| s.display_name.as_str())
                    .collect();
                assert_eq!(unique.len(), count as usize);
            }
        }
    }

    #[test]
    fn test_out_of_range_console_numbers_are_ignored() {
        let registry = StationRegistry::new(&TopologyConfig {
            station_count: 3,
            booth_consoles: vec![0, 2, 7],
            legacy_consoles: vec![9],
        });
        assert_eq!(registry.all_stations().len(), 3);
        assert_eq!(registry.booths().count(), 1);
        assert!(
            registry
                .all_stations()
                .iter()
                .all(|s| s.hardware == HardwareGeneration::Ps5)
        );
    }

    #[test]
    fn test_first_match_wins_on_duplicates() {
        let registry = StationRegistry::default();
        let station = registry.by_id("PS1").unwrap();
        let mut closed = active("old", "Зал 1");
        closed.is_active = false;
        let sessions = vec![
            closed,
            active("first", "Зал 1"),
            active("second", "Зал 1"),
            active("other", "Зал 2"),
        ];

        let found = registry.active_session_for(station, &sessions).unwrap();
        assert_eq!(found.id, "first");
        assert_eq!(registry.duplicate_join_keys(&sessions), ["Зал 1"]);
    }

    #[test]
    fn test_join_uses_display_name_not_id() {
        let registry = StationRegistry::default();
        let station = registry.by_id("PS3").unwrap();
        let sessions = vec![active("by-id", "PS3"), active("by-name", "Кабина 1")];
        assert_eq!(
            registry.active_session_for(station, &sessions).unwrap().id,
            "by-name"
        );
    }
}
