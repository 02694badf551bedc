//! Joins the flat light, zone and grouped light collections into the
//! zone → group → lights hierarchy shown by the home view.

use crate::resource::{GroupedLight, Light, Resource, Zone};

/// One zone with its resolved control group and member lights.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneView<'a> {
    pub zone: &'a Zone,
    /// `None` when the zone has no grouped light service, or when the
    /// referenced grouped light is not in the collection.
    pub group: Option<&'a GroupedLight>,
    /// Member lights, in the order of the lights collection.
    pub lights: Vec<&'a Light>,
}

impl<'a> ZoneView<'a> {
    pub fn id(&self) -> &'a str {
        &self.zone.id
    }

    pub fn name(&self) -> Option<&'a str> {
        self.zone.metadata.as_ref().and_then(|m| m.name.as_deref())
    }

    /// Whether the zone as a whole reads as on. Without a group, any member
    /// light being on counts.
    pub fn is_on(&self) -> bool {
        match self.group {
            Some(group) => group.on.on,
            None => self.lights.iter().any(|light| light.on.on),
        }
    }
}

/// Builds one [`ZoneView`] per zone, in zone order.
///
/// Membership is a linear scan of each zone's child references; a bridge
/// holds tens of resources, so no index is built.
pub fn build_zone_tree<'a>(
    zones: &'a [Zone],
    lights: &'a [Light],
    groups: &'a [GroupedLight],
) -> Vec<ZoneView<'a>> {
    zones
        .iter()
        .map(|zone| ZoneView {
            zone,
            group: zone
                .grouped_light_id()
                .and_then(|gid| groups.iter().find(|group| group.id() == gid)),
            lights: lights.iter().filter(|light| zone.contains(light.id())).collect(),
        })
        .collect()
}
