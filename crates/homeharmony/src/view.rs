//! Dashboard projection.
//!
//! Pure functions of (catalog, device states, room filter, voice status).
//! Nothing here holds state of its own.

use std::fmt;

use serde::Serialize;

use crate::catalog::Catalog;
use crate::catalog::Category;
use crate::catalog::Device;
use crate::catalog::RoomFilter;
use crate::engine::DeviceStates;
use crate::voice::VoiceStatus;

pub const HEADING: &str = "🏠 Home Harmony";

pub const COMMAND_HINT: &str = "Try saying: \"Light chalu karo\", \"Fan band karo\", \"AC chalu karo\", \"Refrigerator band karo\" etc.";

/// Visual hint for a device that is on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Affordance {
    Rotate,
    Glow,
    CoolGlow,
    WarmGlow,
}

pub fn affordance(category: Category, on: bool) -> Option<Affordance> {
    if !on {
        return None;
    }
    match category {
        Category::Fan => Some(Affordance::Rotate),
        Category::Light => Some(Affordance::Glow),
        Category::Fridge | Category::Ac => Some(Affordance::CoolGlow),
        Category::Thermostat => Some(Affordance::WarmGlow),
        Category::Tv | Category::Outlet | Category::WashingMachine => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceCard {
    pub id: String,
    pub name: String,
    pub category: Category,
    pub room: String,
    pub on: bool,
    pub status: &'static str,
    pub affordance: Option<Affordance>,
}

impl DeviceCard {
    pub fn new(device: &Device, on: bool) -> Self {
        Self {
            id: device.id.clone(),
            name: device.name.clone(),
            category: device.category,
            room: device.room.clone(),
            on,
            status: if on { "ON" } else { "OFF" },
            affordance: affordance(device.category, on),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoomTab {
    pub label: String,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dashboard {
    pub heading: &'static str,
    pub rooms: Vec<RoomTab>,
    pub devices: Vec<DeviceCard>,
    pub transcript: String,
    pub listening: bool,
    pub mic_label: &'static str,
    pub hint: &'static str,
}

/// Cards for the devices visible under `filter`, in catalog order.
pub fn cards(catalog: &Catalog, states: &DeviceStates, filter: &RoomFilter) -> Vec<DeviceCard> {
    catalog
        .filter(filter)
        .map(|d| DeviceCard::new(d, states.is_on(&d.id)))
        .collect()
}

pub fn dashboard(
    catalog: &Catalog,
    states: &DeviceStates,
    filter: &RoomFilter,
    voice: &VoiceStatus,
) -> Dashboard {
    let rooms = catalog
        .room_filters()
        .into_iter()
        .map(|room| RoomTab {
            active: room == *filter,
            label: room.to_string(),
        })
        .collect();

    Dashboard {
        heading: HEADING,
        rooms,
        devices: cards(catalog, states, filter),
        transcript: voice.transcript.clone(),
        listening: voice.listening,
        mic_label: if voice.listening {
            "Stop Listening"
        } else {
            "Start Listening"
        },
        hint: COMMAND_HINT,
    }
}

impl fmt::Display for Dashboard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.heading)?;

        let tabs: Vec<String> = self
            .rooms
            .iter()
            .map(|tab| {
                if tab.active {
                    format!("[{}]", tab.label)
                } else {
                    tab.label.clone()
                }
            })
            .collect();
        writeln!(f, "{}", tabs.join(" | "))?;
        writeln!(f)?;

        for card in &self.devices {
            write!(f, "- {} ({}): {}", card.name, card.category, card.status)?;
            if let Some(affordance) = card.affordance {
                write!(f, " [{}]", affordance)?;
            }
            writeln!(f)?;
        }
        writeln!(f)?;

        writeln!(f, "🎤 You said: {}", self.transcript)?;
        writeln!(f, "{}", self.mic_label)?;
        write!(f, "{}", self.hint)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::engine::ChangeSource;
    use crate::engine::DeviceStateStore;
    use crate::remote::MemoryStore;

    #[test]
    fn test_affordance_only_when_on() {
        assert_eq!(affordance(Category::Fan, true), Some(Affordance::Rotate));
        assert_eq!(affordance(Category::Light, true), Some(Affordance::Glow));
        assert_eq!(affordance(Category::Fridge, true), Some(Affordance::CoolGlow));
        assert_eq!(affordance(Category::Ac, true), Some(Affordance::CoolGlow));
        assert_eq!(
            affordance(Category::Thermostat, true),
            Some(Affordance::WarmGlow)
        );
        assert_eq!(affordance(Category::Tv, true), None);
        assert_eq!(affordance(Category::Fan, false), None);
        assert_eq!(affordance(Category::Thermostat, false), None);
    }

    #[tokio::test]
    async fn test_cards_follow_filter_and_state() {
        let catalog = Arc::new(Catalog::default());
        let store = DeviceStateStore::new(catalog.clone(), Arc::new(MemoryStore::new()));
        store
            .set_state("ac_bedroom", true, ChangeSource::Manual)
            .unwrap();

        let bedroom = RoomFilter::Room("Bedroom".to_string());
        let cards = cards(&catalog, &store.snapshot(), &bedroom);

        let ids: Vec<&str> = cards.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["light_bedroom", "fan_bedroom", "ac_bedroom"]);
        assert_eq!(cards[2].status, "ON");
        assert_eq!(cards[2].affordance, Some(Affordance::CoolGlow));
        assert_eq!(cards[0].status, "OFF");
    }

    #[tokio::test]
    async fn test_render_dashboard() {
        let catalog = Arc::new(Catalog::default());
        let store = DeviceStateStore::new(catalog.clone(), Arc::new(MemoryStore::new()));
        store
            .set_state("light_kitchen", true, ChangeSource::Manual)
            .unwrap();

        let kitchen = RoomFilter::Room("Kitchen".to_string());
        let view = dashboard(&catalog, &store.snapshot(), &kitchen, &VoiceStatus::default());

        insta::assert_snapshot!(view.to_string(), @r#"
        🏠 Home Harmony
        All | Living Room | [Kitchen] | Bedroom | Home | Laundry Room

        - kitchen light (light): ON [glow]
        - kitchen outlet (outlet): OFF
        - refrigerator (fridge): OFF

        🎤 You said: Say a command...
        Start Listening
        Try saying: "Light chalu karo", "Fan band karo", "AC chalu karo", "Refrigerator band karo" etc.
        "#);
    }

    #[test]
    fn test_dashboard_listening_label() {
        let catalog = Catalog::default();
        let states = DeviceStates::for_catalog(&catalog);
        let voice = VoiceStatus {
            listening: true,
            transcript: "turn on bedroom fan".to_string(),
        };

        let view = dashboard(&catalog, &states, &RoomFilter::All, &voice);
        assert_eq!(view.mic_label, "Stop Listening");
        assert_eq!(view.transcript, "turn on bedroom fan");
        assert_eq!(view.devices.len(), catalog.len());
        assert!(view.rooms[0].active);
        assert!(view.rooms[1..].iter().all(|t| !t.active));
    }
}
