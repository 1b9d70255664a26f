//! Device catalog.
//!
//! The catalog is fixed at startup. Its order is significant: it is the order
//! devices are shown in, and the order the command interpreter scans them in.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;

/// Kind of device. Only selects a visual affordance, never behaviour.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Category {
    Light,
    Tv,
    Outlet,
    Fan,
    Thermostat,
    Fridge,
    WashingMachine,
    Ac,
}

/// A controllable device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    /// Stable identity, also the remote path key.
    pub id: String,

    /// Display label. Matched literally (lowercased) inside voice commands.
    pub name: String,

    pub category: Category,

    pub room: String,
}

impl Device {
    pub fn new(id: &str, name: &str, category: Category, room: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            category,
            room: room.to_string(),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("duplicate device id '{0}'")]
    DuplicateId(String),

    #[error("device #{index} has an empty {field}")]
    EmptyField { index: usize, field: &'static str },
}

/// Room selection for the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RoomFilter {
    #[default]
    All,
    Room(String),
}

impl RoomFilter {
    pub const ALL_LABEL: &'static str = "All";

    pub fn label(&self) -> &str {
        match self {
            RoomFilter::All => Self::ALL_LABEL,
            RoomFilter::Room(room) => room,
        }
    }

    pub fn matches(&self, device: &Device) -> bool {
        match self {
            RoomFilter::All => true,
            RoomFilter::Room(room) => device.room == *room,
        }
    }
}

impl FromStr for RoomFilter {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s))
    }
}

impl From<&str> for RoomFilter {
    fn from(label: &str) -> Self {
        if label == Self::ALL_LABEL {
            RoomFilter::All
        } else {
            RoomFilter::Room(label.to_string())
        }
    }
}

impl fmt::Display for RoomFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Ordered, immutable set of devices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    devices: Vec<Device>,
}

impl Catalog {
    /// Build a catalog, rejecting duplicate ids and blank fields.
    pub fn new(devices: Vec<Device>) -> Result<Self, CatalogError> {
        let mut seen = HashSet::new();
        for (index, device) in devices.iter().enumerate() {
            if device.id.trim().is_empty() {
                return Err(CatalogError::EmptyField { index, field: "id" });
            }
            if device.name.trim().is_empty() {
                return Err(CatalogError::EmptyField {
                    index,
                    field: "name",
                });
            }
            if device.room.trim().is_empty() {
                return Err(CatalogError::EmptyField {
                    index,
                    field: "room",
                });
            }
            if !seen.insert(device.id.as_str()) {
                return Err(CatalogError::DuplicateId(device.id.clone()));
            }
        }
        Ok(Self { devices })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Device> {
        self.devices.iter()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Device> {
        self.devices.iter().find(|d| d.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Distinct rooms in first-appearance order.
    pub fn rooms(&self) -> Vec<&str> {
        let mut rooms: Vec<&str> = Vec::new();
        for device in &self.devices {
            if !rooms.contains(&device.room.as_str()) {
                rooms.push(&device.room);
            }
        }
        rooms
    }

    /// Room tabs as shown on the dashboard: "All" first, then every room.
    pub fn room_filters(&self) -> Vec<RoomFilter> {
        std::iter::once(RoomFilter::All)
            .chain(
                self.rooms()
                    .into_iter()
                    .map(|r| RoomFilter::Room(r.to_string())),
            )
            .collect()
    }

    /// Whether `filter` names "All" or a room that exists in the catalog.
    pub fn has_room(&self, filter: &RoomFilter) -> bool {
        match filter {
            RoomFilter::All => true,
            RoomFilter::Room(room) => self.devices.iter().any(|d| d.room == *room),
        }
    }

    /// Devices visible under `filter`, in catalog order.
    pub fn filter<'a>(&'a self, filter: &'a RoomFilter) -> impl Iterator<Item = &'a Device> + 'a {
        self.devices.iter().filter(move |d| filter.matches(d))
    }

    /// Pairs `(shorter, longer)` where one device name is contained in another.
    ///
    /// Such pairs make substring matching ambiguous: a command for the longer
    /// name also matches templates built from the shorter one. Devices sharing
    /// a name are reported once, in catalog order.
    pub fn ambiguous_names(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        for (i, a) in self.devices.iter().enumerate() {
            let a_name = a.name.to_lowercase();
            for (j, b) in self.devices.iter().enumerate() {
                let b_name = b.name.to_lowercase();
                let ambiguous = if a_name == b_name {
                    i < j
                } else {
                    b_name.contains(&a_name)
                };
                if ambiguous {
                    pairs.push((a.name.clone(), b.name.clone()));
                }
            }
        }
        pairs
    }
}

impl Default for Catalog {
    fn default() -> Self {
        use Category::*;

        Self {
            devices: vec![
                Device::new("light_living", "living room light", Light, "Living Room"),
                Device::new("tv_living", "living room tv", Tv, "Living Room"),
                Device::new("light_kitchen", "kitchen light", Light, "Kitchen"),
                Device::new("outlet_kitchen", "kitchen outlet", Outlet, "Kitchen"),
                Device::new("light_bedroom", "bedroom light", Light, "Bedroom"),
                Device::new("fan_bedroom", "bedroom fan", Fan, "Bedroom"),
                Device::new("thermostat_home", "home thermostat", Thermostat, "Home"),
                Device::new("fridge_kitchen", "refrigerator", Fridge, "Kitchen"),
                Device::new("washer_laundry", "washing machine", WashingMachine, "Laundry Room"),
                Device::new("ac_bedroom", "bedroom ac", Ac, "Bedroom"),
                Device::new("ac_living", "living room ac", Ac, "Living Room"),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_catalog_is_valid() {
        let catalog = Catalog::default();
        assert_eq!(catalog.len(), 11);
        assert!(Catalog::new(catalog.iter().cloned().collect()).is_ok());
        assert!(catalog.ambiguous_names().is_empty());
    }

    #[test]
    fn test_rooms_in_first_appearance_order() {
        let catalog = Catalog::default();
        assert_eq!(
            catalog.rooms(),
            vec!["Living Room", "Kitchen", "Bedroom", "Home", "Laundry Room"]
        );

        let tabs: Vec<String> = catalog
            .room_filters()
            .iter()
            .map(|f| f.to_string())
            .collect();
        assert_eq!(tabs[0], "All");
        assert_eq!(tabs.len(), 6);
    }

    #[test]
    fn test_filter_all_returns_full_catalog() {
        let catalog = Catalog::default();
        let all: Vec<&Device> = catalog.filter(&RoomFilter::All).collect();
        assert_eq!(all.len(), catalog.len());
        assert!(all.iter().zip(catalog.iter()).all(|(a, b)| a.id == b.id));
    }

    #[test]
    fn test_filter_room_preserves_order() {
        let catalog = Catalog::default();
        let kitchen = RoomFilter::Room("Kitchen".to_string());
        let ids: Vec<&str> = catalog.filter(&kitchen).map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["light_kitchen", "outlet_kitchen", "fridge_kitchen"]);
    }

    #[test]
    fn test_filter_unknown_room_is_empty() {
        let catalog = Catalog::default();
        let garage = RoomFilter::Room("Garage".to_string());
        assert_eq!(catalog.filter(&garage).count(), 0);
        assert!(!catalog.has_room(&garage));
        assert!(catalog.has_room(&RoomFilter::All));
    }

    #[test]
    fn test_room_filter_parse() {
        assert_eq!("All".parse::<RoomFilter>().unwrap(), RoomFilter::All);
        assert_eq!(
            "Bedroom".parse::<RoomFilter>().unwrap(),
            RoomFilter::Room("Bedroom".to_string())
        );
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let devices = vec![
            Device::new("fan", "fan one", Category::Fan, "Bedroom"),
            Device::new("fan", "fan two", Category::Fan, "Kitchen"),
        ];
        assert_eq!(
            Catalog::new(devices),
            Err(CatalogError::DuplicateId("fan".to_string()))
        );
    }

    #[test]
    fn test_empty_name_rejected() {
        let devices = vec![Device::new("fan", "  ", Category::Fan, "Bedroom")];
        assert_eq!(
            Catalog::new(devices),
            Err(CatalogError::EmptyField {
                index: 0,
                field: "name"
            })
        );
    }

    #[test]
    fn test_ambiguous_names_detected() {
        let devices = vec![
            Device::new("ac", "ac", Category::Ac, "Home"),
            Device::new("ac_bedroom", "bedroom ac", Category::Ac, "Bedroom"),
        ];
        let catalog = Catalog::new(devices).unwrap();
        assert_eq!(
            catalog.ambiguous_names(),
            vec![("ac".to_string(), "bedroom ac".to_string())]
        );
    }

    #[test]
    fn test_duplicate_names_detected() {
        let devices = vec![
            Device::new("fan_bedroom", "fan", Category::Fan, "Bedroom"),
            Device::new("fan_living", "Fan", Category::Fan, "Living Room"),
            Device::new("tv_living", "tv", Category::Tv, "Living Room"),
        ];
        let catalog = Catalog::new(devices).unwrap();
        assert_eq!(
            catalog.ambiguous_names(),
            vec![("fan".to_string(), "Fan".to_string())]
        );
    }

    #[test]
    fn test_category_names() {
        assert_eq!(Category::WashingMachine.to_string(), "washing_machine");
        assert_eq!("ac".parse::<Category>().unwrap(), Category::Ac);
    }
}
