use serde::{Deserialize, Serialize};

/// Every kind of managed asset the organization can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AssetCategory {
    Camera,
    AccessController,
    Sensor,
    Intercom,
    DeskStation,
    MailroomSite,
    GuestSite,
    AlarmSite,
    AlarmDevice,
    User,
    UnassignedDevice,
}

impl AssetCategory {
    pub const ALL: [AssetCategory; 11] = [
        AssetCategory::Camera,
        AssetCategory::AccessController,
        AssetCategory::Sensor,
        AssetCategory::Intercom,
        AssetCategory::DeskStation,
        AssetCategory::MailroomSite,
        AssetCategory::GuestSite,
        AssetCategory::AlarmSite,
        AssetCategory::AlarmDevice,
        AssetCategory::User,
        AssetCategory::UnassignedDevice,
    ];

    /// Human-readable plural label, as shown in reports.
    pub fn label(&self) -> &'static str {
        match self {
            AssetCategory::Camera => "Cameras",
            AssetCategory::AccessController => "Access Controllers",
            AssetCategory::Sensor => "Sensors",
            AssetCategory::Intercom => "Intercoms",
            AssetCategory::DeskStation => "Desk Stations",
            AssetCategory::MailroomSite => "Mailroom Sites",
            AssetCategory::GuestSite => "Guest Sites",
            AssetCategory::AlarmSite => "Alarm Sites",
            AssetCategory::AlarmDevice => "Alarm Devices",
            AssetCategory::User => "Users",
            AssetCategory::UnassignedDevice => "Unassigned Devices",
        }
    }
}

impl std::fmt::Display for AssetCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AssetCategory::Camera => "camera",
            AssetCategory::AccessController => "access-controller",
            AssetCategory::Sensor => "sensor",
            AssetCategory::Intercom => "intercom",
            AssetCategory::DeskStation => "desk-station",
            AssetCategory::MailroomSite => "mailroom-site",
            AssetCategory::GuestSite => "guest-site",
            AssetCategory::AlarmSite => "alarm-site",
            AssetCategory::AlarmDevice => "alarm-device",
            AssetCategory::User => "user",
            AssetCategory::UnassignedDevice => "unassigned-device",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for AssetCategory {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['_', ' '], "-");
        let trimmed = normalized.strip_suffix('s').unwrap_or(&normalized);
        AssetCategory::ALL
            .into_iter()
            .find(|c| c.to_string() == normalized || c.to_string() == trimmed)
            .ok_or_else(|| format!("unknown asset category: {s}"))
    }
}

/// A (category, id) pair identifying one asset across the whole organization.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AssetRef {
    pub category: AssetCategory,
    pub id: String,
}

impl AssetRef {
    pub fn new(category: AssetCategory, id: impl Into<String>) -> Self {
        Self {
            category,
            id: id.into(),
        }
    }
}

impl std::fmt::Display for AssetRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.category, self.id)
    }
}

/// A normalized asset record, independent of which surface listed it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    /// Remote-assigned identifier, unique within the category.
    pub id: String,

    pub category: AssetCategory,

    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial_number: Option<String>,

    /// Users only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Alarm sites only: the underlying site the response site belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site_id: Option<String>,

    /// Alarm sites only: the alarm system housed in the site.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alarm_system_id: Option<String>,

    /// The embedding asset, when this asset lives inside another device.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<AssetRef>,

    /// Assets physically contained in this one.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub embedded: Vec<AssetRef>,

    #[serde(default = "default_selected")]
    pub selected: bool,
}

fn default_selected() -> bool {
    true
}

impl Asset {
    pub fn new(category: AssetCategory, id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            category,
            name: name.into(),
            serial_number: None,
            email: None,
            site_id: None,
            alarm_system_id: None,
            parent: None,
            embedded: Vec::new(),
            selected: true,
        }
    }

    pub fn with_serial(mut self, serial: impl Into<String>) -> Self {
        self.serial_number = Some(serial.into());
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Declare that `child` is physically embedded in this asset.
    pub fn embeds(mut self, child: AssetRef) -> Self {
        self.add_embedded(child);
        self
    }

    pub fn asset_ref(&self) -> AssetRef {
        AssetRef::new(self.category, self.id.clone())
    }

    pub fn is_embedded(&self) -> bool {
        self.parent.is_some()
    }

    pub(crate) fn add_embedded(&mut self, child: AssetRef) {
        if !self.embedded.contains(&child) {
            self.embedded.push(child);
        }
    }

    /// Best display label: email for users, otherwise the name, falling back to serial.
    pub fn display_name(&self) -> &str {
        if let Some(email) = self.email.as_deref().filter(|e| !e.is_empty()) {
            return email;
        }
        if !self.name.is_empty() {
            return &self.name;
        }
        self.serial_number.as_deref().unwrap_or("Unknown")
    }
}

/// A guest-site visitor, as returned by the visit listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Visitor {
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
}

impl Visitor {
    /// Split a full name on its last space. Single-token names fill both fields.
    pub fn from_full_name(full_name: &str, email: Option<String>) -> Self {
        let full_name = full_name.trim();
        let (first, last) = match full_name.rsplit_once(' ') {
            Some((first, last)) => (first.trim_end(), last),
            None => (full_name, full_name),
        };
        Self {
            first_name: first.to_string(),
            last_name: last.to_string(),
            email,
        }
    }
}
