//! Entity identity construction.
//!
//! Entity ids are built from the device's display name. Two devices whose
//! names slug to the same text would produce the same entity id; that is
//! reported as [`Error::EntityIdCollision`] instead of being renamed.

use tracing::debug;

use crate::error::{Error, Result};
use crate::host::Host;
use crate::sensors::EntityDescription;

/// Identity of one derived entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityIdentity {
    pub entity_id: String,
    pub unique_id: String,
    pub name: String,
}

/// Lower-case `text` and collapse every run of other characters to `_`.
///
/// # Examples
///
/// ```
/// use battery_notes_core::naming::slugify;
///
/// assert_eq!(slugify("Kitchen Remote"), "kitchen_remote");
/// assert_eq!(slugify("  Hue: Dimmer #2 "), "hue_dimmer_2");
/// ```
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_separator = false;

    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_separator && !slug.is_empty() {
                slug.push('_');
            }
            pending_separator = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_separator = true;
        }
    }

    slug
}

/// Build and collision-check the identity of one entity of an entry.
///
/// The unique id is `{entry_id}{suffix}`. The entity id is
/// `{domain}.{slug(device name)}_{key}`, falling back to the entry id when
/// the device has no usable name.
pub fn resolve_identity(
    host: &dyn Host,
    entry_id: &str,
    device_name: Option<&str>,
    description: &EntityDescription,
) -> Result<EntityIdentity> {
    let unique_id = format!("{}{}", entry_id, description.unique_id_suffix);

    let mut object_id = device_name.map(slugify).unwrap_or_default();
    if object_id.is_empty() {
        object_id = slugify(entry_id);
    }
    let entity_id = format!("{}.{}_{}", description.domain, object_id, description.key);

    if let Some(existing) = host.get_entity(&entity_id)
        && existing.unique_id.as_deref() != Some(unique_id.as_str())
    {
        return Err(Error::EntityIdCollision {
            entity_id,
            unique_id,
            existing_unique_id: existing.unique_id.unwrap_or_default(),
        });
    }

    let name = match device_name.map(str::trim).filter(|name| !name.is_empty()) {
        Some(device_name) => format!("{} {}", device_name, description.name),
        None => description.name.to_string(),
    };

    debug!("Resolved {} -> {}", unique_id, entity_id);
    Ok(EntityIdentity {
        entity_id,
        unique_id,
        name,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::RegistryEntry;
    use crate::mock::MockHost;
    use crate::sensors::{BATTERY_PLUS, TYPE_SENSOR};

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Living Room"), "living_room");
        assert_eq!(slugify("__a--b__"), "a_b");
        assert_eq!(slugify("Ünïcode"), "n_code");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn test_identity_from_device_name() {
        let host = MockHost::new();
        let identity =
            resolve_identity(&host, "entry1", Some("Kitchen Remote"), &BATTERY_PLUS).unwrap();

        assert_eq!(identity.unique_id, "entry1_battery_plus");
        assert_eq!(identity.entity_id, "sensor.kitchen_remote_battery_plus");
        assert_eq!(identity.name, "Kitchen Remote Battery+");
    }

    #[test]
    fn test_type_sensor_keeps_bare_entry_id() {
        let host = MockHost::new();
        let identity = resolve_identity(&host, "entry1", None, &TYPE_SENSOR).unwrap();

        assert_eq!(identity.unique_id, "entry1");
        assert_eq!(identity.entity_id, "sensor.entry1_battery_type");
        assert_eq!(identity.name, "Battery type");
    }

    #[test]
    fn test_same_unique_id_is_not_a_collision() {
        let host = MockHost::new().with_entity(
            RegistryEntry::new("sensor.kitchen_remote_battery_plus")
                .with_unique_id("entry1_battery_plus"),
        );
        assert!(resolve_identity(&host, "entry1", Some("Kitchen Remote"), &BATTERY_PLUS).is_ok());
    }

    #[test]
    fn test_shared_lowercased_name_is_a_collision() {
        let host = MockHost::new().with_entity(
            RegistryEntry::new("sensor.kitchen_remote_battery_plus")
                .with_unique_id("entry1_battery_plus"),
        );

        let err =
            resolve_identity(&host, "entry2", Some("KITCHEN remote"), &BATTERY_PLUS).unwrap_err();
        match err {
            Error::EntityIdCollision {
                entity_id,
                existing_unique_id,
                ..
            } => {
                assert_eq!(entity_id, "sensor.kitchen_remote_battery_plus");
                assert_eq!(existing_unique_id, "entry1_battery_plus");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
