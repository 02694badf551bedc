use std::fmt;

use serde::{Deserialize, Serialize};

use crate::color::{Gamut, XY};

/// Type tag of a bridge resource, as found in `type` and `rtype` fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RType {
    Light,
    Zone,
    Room,
    GroupedLight,
    Device,
    BridgeHome,
    Scene,
    #[serde(other)]
    Other,
}

impl RType {
    /// Path segment under `/resource/`.
    pub fn as_str(self) -> &'static str {
        match self {
            RType::Light => "light",
            RType::Zone => "zone",
            RType::Room => "room",
            RType::GroupedLight => "grouped_light",
            RType::Device => "device",
            RType::BridgeHome => "bridge_home",
            RType::Scene => "scene",
            RType::Other => "other",
        }
    }
}

impl fmt::Display for RType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cross-reference to another resource. Never dereferenced directly, always
/// resolved against a sibling collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceIdentifier {
    pub rid: String,
    pub rtype: RType,
}

type Owner = ResourceIdentifier;

/// Common view over lights, grouped lights and zones.
pub trait Resource {
    fn id(&self) -> &str;
    fn rtype(&self) -> RType;
    fn metadata(&self) -> Option<&Metadata>;

    fn name(&self) -> Option<&str> {
        self.metadata().and_then(|m| m.name.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub name: Option<String>,
    pub archetype: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct On {
    pub on: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dimming {
    /// Percentage, 0–100.
    pub brightness: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_dim_level: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorTemperature {
    pub mirek: Option<u16>,
    pub mirek_valid: Option<bool>,
    pub mirek_schema: Option<MirekSchema>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MirekSchema {
    pub mirek_minimum: u16,
    pub mirek_maximum: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GamutType {
    A,
    B,
    C,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub xy: XY,
    pub gamut: Option<Gamut>,
    pub gamut_type: Option<GamutType>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dynamics {
    pub duration: Option<u32>,
    pub speed: Option<f32>,
    pub speed_valid: Option<bool>,
    pub status: Option<String>,
    #[serde(default)]
    pub status_values: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    #[serde(default)]
    pub action_values: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Effect {
    NoEffect,
    Fire,
    Candle,
    Sparkle,
    Prism,
    Glisten,
    Opal,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Effects {
    pub effect: Option<Effect>,
    pub status: Option<Effect>,
    #[serde(default)]
    pub effect_values: Vec<Effect>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimedEffect {
    NoEffect,
    Sunrise,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimedEffects {
    pub effect: Option<TimedEffect>,
    pub status: Option<TimedEffect>,
    pub duration: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GradientMode {
    InterpolatedPalette,
    InterpolatedPaletteMirrored,
    RandomPixelated,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientPoint {
    pub color: Option<Color>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gradient {
    #[serde(default)]
    pub points: Vec<GradientPoint>,
    pub mode: Option<GradientMode>,
    pub points_capable: Option<u32>,
    pub pixel_count: Option<u32>,
}

/// What a light does when mains power returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerUpPreset {
    Safety,
    Powerfail,
    LastOnState,
    Custom,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerUp {
    pub preset: PowerUpPreset,
    pub configured: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Light {
    pub id: String,
    pub id_v1: Option<String>,
    #[serde(rename = "type")]
    pub rtype: RType,
    pub owner: Option<Owner>,
    pub metadata: Option<Metadata>,
    pub services: Option<Vec<ResourceIdentifier>>,
    pub on: On,
    pub dimming: Option<Dimming>,
    pub color_temperature: Option<ColorTemperature>,
    pub color: Option<Color>,
    pub dynamics: Option<Dynamics>,
    pub alert: Option<Alert>,
    pub mode: Option<String>,
    pub gradient: Option<Gradient>,
    pub effects: Option<Effects>,
    pub timed_effects: Option<TimedEffects>,
    pub powerup: Option<PowerUp>,
}

impl Light {
    pub fn gamut(&self) -> Option<&Gamut> {
        self.color.as_ref().and_then(|c| c.gamut.as_ref())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupedLight {
    pub id: String,
    pub id_v1: Option<String>,
    #[serde(rename = "type")]
    pub rtype: RType,
    pub owner: Option<Owner>,
    pub metadata: Option<Metadata>,
    pub on: On,
    pub dimming: Option<Dimming>,
    pub color_temperature: Option<ColorTemperature>,
    pub color: Option<Color>,
    pub dynamics: Option<Dynamics>,
    pub alert: Option<Alert>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    pub id: String,
    pub id_v1: Option<String>,
    #[serde(rename = "type")]
    pub rtype: RType,
    pub metadata: Option<Metadata>,
    #[serde(default)]
    pub children: Vec<ResourceIdentifier>,
    pub services: Option<Vec<ResourceIdentifier>>,
    pub grouped_services: Option<Vec<ResourceIdentifier>>,
}

impl Zone {
    /// Id of the grouped light that controls this zone, if it has one.
    pub fn grouped_light_id(&self) -> Option<&str> {
        self.services
            .as_deref()?
            .iter()
            .find(|service| service.rtype == RType::GroupedLight)
            .map(|service| service.rid.as_str())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.children.iter().any(|child| child.rid == id)
    }
}

macro_rules! impl_resource {
    ($($ty:ty),*) => {$(
        impl Resource for $ty {
            fn id(&self) -> &str {
                &self.id
            }

            fn rtype(&self) -> RType {
                self.rtype
            }

            fn metadata(&self) -> Option<&Metadata> {
                self.metadata.as_ref()
            }
        }
    )*};
}

impl_resource!(Light, GroupedLight, Zone);

#[cfg(test)]
mod tests {
    use super::*;

    const LIGHT: &str = r#"{
        "id": "3f6d2c1e-0001",
        "id_v1": "/lights/4",
        "type": "light",
        "owner": { "rid": "dev-1", "rtype": "device" },
        "metadata": { "name": "Desk", "archetype": "sultan_bulb" },
        "on": { "on": true },
        "dimming": { "brightness": 62.5, "min_dim_level": 0.2 },
        "color_temperature": { "mirek": null, "mirek_valid": false,
            "mirek_schema": { "mirek_minimum": 153, "mirek_maximum": 500 } },
        "color": { "xy": { "x": 0.4573, "y": 0.41 }, "gamut_type": "C",
            "gamut": { "red": { "x": 0.6915, "y": 0.3083 },
                       "green": { "x": 0.17, "y": 0.7 },
                       "blue": { "x": 0.1532, "y": 0.0475 } } },
        "effects": { "effect": "no_effect", "status": "no_effect",
            "effect_values": ["no_effect", "candle", "fire", "aurora"] },
        "powerup": { "preset": "safety", "configured": true },
        "mode": "normal"
    }"#;

    #[test]
    fn light_deserializes_with_optional_blocks() {
        let light: Light = serde_json::from_str(LIGHT).unwrap();
        assert_eq!(light.name(), Some("Desk"));
        assert_eq!(light.rtype(), RType::Light);
        assert!(light.on.on);
        assert_eq!(light.dimming.as_ref().unwrap().brightness, 62.5);
        assert_eq!(light.color_temperature.as_ref().unwrap().mirek, None);
        assert_eq!(light.color.as_ref().unwrap().gamut_type, Some(GamutType::C));
        assert!(light.gamut().is_some());
        assert_eq!(light.powerup.as_ref().unwrap().preset, PowerUpPreset::Safety);
        assert!(light.gradient.is_none());
    }

    #[test]
    fn unknown_enum_values_do_not_fail_the_resource() {
        let light: Light = serde_json::from_str(LIGHT).unwrap();
        let effects = light.effects.unwrap();
        assert_eq!(effects.effect_values.last(), Some(&Effect::Unknown));
    }

    #[test]
    fn zone_finds_its_grouped_light() {
        let zone: Zone = serde_json::from_value(serde_json::json!({
            "id": "zone-1",
            "type": "zone",
            "children": [{ "rid": "light-1", "rtype": "light" }],
            "services": [
                { "rid": "motion", "rtype": "motion" },
                { "rid": "group-1", "rtype": "grouped_light" }
            ]
        }))
        .unwrap();
        assert_eq!(zone.grouped_light_id(), Some("group-1"));
        assert!(zone.contains("light-1"));
        assert!(!zone.contains("light-2"));
        assert_eq!(zone.services.unwrap()[0].rtype, RType::Other);
    }

    #[test]
    fn zone_without_services_has_no_group() {
        let zone: Zone =
            serde_json::from_str(r#"{ "id": "z", "type": "zone", "children": [] }"#).unwrap();
        assert_eq!(zone.grouped_light_id(), None);
        assert_eq!(zone.name(), None);
    }
}
