//! Normalisation of per-category listing payloads into [`Asset`] records.

use serde_json::Value;

use crate::asset::{Asset, AssetCategory, AssetRef};
use crate::error::{DecomError, Result};

/// Key of the array holding the records in each listing response.
pub fn collection_key(category: AssetCategory) -> &'static str {
    match category {
        AssetCategory::Intercom => "intercoms",
        AssetCategory::DeskStation => "deskApps",
        AssetCategory::AccessController => "accessControllers",
        AssetCategory::Sensor => "sensorDevice",
        AssetCategory::MailroomSite => "package_sites",
        AssetCategory::AlarmSite => "responseSites",
        AssetCategory::AlarmDevice | AssetCategory::UnassignedDevice => "devices",
        AssetCategory::Camera => "cameras",
        AssetCategory::GuestSite => "guest_sites",
        AssetCategory::User => "access_members",
    }
}

/// Normalise a whole listing response body.
pub fn normalize_collection(
    category: AssetCategory,
    body: &Value,
    endpoint: &str,
) -> Result<Vec<Asset>> {
    let key = collection_key(category);
    let records = body
        .get(key)
        .and_then(Value::as_array)
        .ok_or_else(|| DecomError::Decode {
            endpoint: endpoint.to_string(),
            reason: format!("missing `{key}` array"),
        })?;
    records
        .iter()
        .map(|record| normalize(category, record, endpoint))
        .collect()
}

/// Normalise one record of a category listing.
pub fn normalize(category: AssetCategory, record: &Value, endpoint: &str) -> Result<Asset> {
    let (id_field, name_field) = match category {
        AssetCategory::Intercom | AssetCategory::DeskStation | AssetCategory::Sensor => {
            ("deviceId", "name")
        }
        AssetCategory::UnassignedDevice => ("deviceId", "name"),
        AssetCategory::AccessController => ("accessControllerId", "name"),
        AssetCategory::MailroomSite => ("siteId", "siteName"),
        AssetCategory::AlarmSite => ("id", "businessName"),
        AssetCategory::AlarmDevice => ("id", "name"),
        AssetCategory::Camera => ("camera_id", "name"),
        AssetCategory::GuestSite => ("site_id", "site_name"),
        AssetCategory::User => ("user_id", "full_name"),
    };

    let id = text(record, &[id_field]).ok_or_else(|| DecomError::Decode {
        endpoint: endpoint.to_string(),
        reason: format!("{category} record without `{id_field}`"),
    })?;
    let name = text(record, &[name_field]).unwrap_or_default();
    let mut asset = Asset::new(category, id, name);

    asset.serial_number = match category {
        AssetCategory::Intercom
        | AssetCategory::DeskStation
        | AssetCategory::AccessController
        | AssetCategory::UnassignedDevice => text(record, &["serialNumber"]),
        AssetCategory::Sensor => text(record, &["claimedSerialNumber"]),
        AssetCategory::AlarmDevice => text(record, &["verkadaDeviceConfig", "serialNumber"]),
        AssetCategory::Camera => text(record, &["serial"]),
        _ => None,
    };

    match category {
        AssetCategory::User => {
            asset.email = text(record, &["email"]);
        }
        AssetCategory::AlarmSite => {
            asset.site_id = text(record, &["siteId"]);
            asset.alarm_system_id = text(record, &["alarmSystemId"]);
        }
        AssetCategory::Intercom => {
            if let Some(camera) = text(record, &["cameraId"]) {
                asset.add_embedded(AssetRef::new(AssetCategory::Camera, camera));
            }
            if let Some(controller) = text(record, &["accessControllerId"]) {
                asset.add_embedded(AssetRef::new(AssetCategory::AccessController, controller));
            }
        }
        _ => {}
    }

    Ok(asset)
}

/// A string (or number) at `path`, with empty strings treated as absent.
pub(crate) fn text(record: &Value, path: &[&str]) -> Option<String> {
    let mut value = record;
    for key in path {
        value = value.get(key)?;
    }
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sensor_uses_claimed_serial() {
        let asset = normalize(
            AssetCategory::Sensor,
            &json!({"deviceId": "s1", "name": "Air", "claimedSerialNumber": "SV-1"}),
            "test",
        )
        .unwrap();
        assert_eq!(asset.id, "s1");
        assert_eq!(asset.serial_number.as_deref(), Some("SV-1"));
    }

    #[test]
    fn alarm_site_keeps_site_and_system_ids() {
        let asset = normalize(
            AssetCategory::AlarmSite,
            &json!({"id": "rs1", "siteId": "site-9", "alarmSystemId": "sys-3", "businessName": "HQ"}),
            "test",
        )
        .unwrap();
        assert_eq!(asset.name, "HQ");
        assert_eq!(asset.site_id.as_deref(), Some("site-9"));
        assert_eq!(asset.alarm_system_id.as_deref(), Some("sys-3"));
    }

    #[test]
    fn alarm_device_serial_is_nested() {
        let asset = normalize(
            AssetCategory::AlarmDevice,
            &json!({"id": "d1", "name": "Door", "verkadaDeviceConfig": {"serialNumber": "BR-1"}}),
            "test",
        )
        .unwrap();
        assert_eq!(asset.serial_number.as_deref(), Some("BR-1"));
    }

    #[test]
    fn intercom_declares_embedded_devices() {
        let asset = normalize(
            AssetCategory::Intercom,
            &json!({"deviceId": "x", "name": "Lobby", "serialNumber": "TD-1", "cameraId": 5}),
            "test",
        )
        .unwrap();
        assert_eq!(asset.embedded, vec![AssetRef::new(AssetCategory::Camera, "5")]);
    }

    #[test]
    fn numeric_ids_are_stringified() {
        let asset = normalize(
            AssetCategory::Camera,
            &json!({"camera_id": 9, "name": "Dock", "serial": "CD-9"}),
            "test",
        )
        .unwrap();
        assert_eq!(asset.id, "9");
    }

    #[test]
    fn missing_id_is_a_decode_error() {
        let err = normalize(AssetCategory::User, &json!({"full_name": "Ada"}), "test").unwrap_err();
        assert!(matches!(err, DecomError::Decode { .. }));
    }

    #[test]
    fn collection_requires_the_category_key() {
        let body = json!({"guest_sites": [{"site_id": "g1", "site_name": "Front"}]});
        let sites = normalize_collection(AssetCategory::GuestSite, &body, "test").unwrap();
        assert_eq!(sites.len(), 1);
        assert_eq!(sites[0].name, "Front");

        assert!(normalize_collection(AssetCategory::Camera, &body, "test").is_err());
    }
}
