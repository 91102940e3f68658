//! Audio filter presets in the Lavalink filter shape.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EqualizerBand {
    pub band: u8,
    pub gain: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Karaoke {
    pub level: f64,
    pub mono_level: f64,
    pub filter_band: f64,
    pub filter_width: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Timescale {
    pub speed: f64,
    pub pitch: f64,
    pub rate: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rotation {
    pub rotation_hz: f64,
}

/// Filters sent to the audio node. Unset filters are omitted, so the default value
/// clears everything.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub equalizer: Option<Vec<EqualizerBand>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub karaoke: Option<Karaoke>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timescale: Option<Timescale>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rotation: Option<Rotation>,
}

impl FilterSettings {
    pub fn is_empty(&self) -> bool {
        *self == FilterSettings::default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, poise::ChoiceParameter)]
pub enum BassBoostLevel {
    #[name = "high"]
    High,
    #[name = "medium"]
    Medium,
    #[name = "low"]
    Low,
}

impl BassBoostLevel {
    pub fn gains(&self) -> [f64; 11] {
        match self {
            BassBoostLevel::High => [
                0.6, 0.67, 0.67, 0.4, -0.5, -0.5, -0.45, -0.5, -0.5, -0.5, -0.5,
            ],
            BassBoostLevel::Medium => [
                0.35, 0.23, 0.26, 0.25, -0.1, -0.15, -0.15, -0.15, -0.15, -0.15, -0.15,
            ],
            BassBoostLevel::Low => [
                0.2, 0.15, 0.15, 0.15, 0.1, 0.05, 0.0, 0.0, -0.15, -0.15, -0.15,
            ],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BassBoostLevel::High => "high",
            BassBoostLevel::Medium => "medium",
            BassBoostLevel::Low => "low",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterPreset {
    BassBoost(BassBoostLevel),
    Nightcore,
    Karaoke,
    Rotation,
}

impl FilterPreset {
    pub fn settings(&self) -> FilterSettings {
        match self {
            FilterPreset::BassBoost(level) => FilterSettings {
                equalizer: Some(
                    level
                        .gains()
                        .iter()
                        .enumerate()
                        .map(|(band, gain)| EqualizerBand {
                            band: band as u8,
                            gain: *gain,
                        })
                        .collect(),
                ),
                ..Default::default()
            },
            FilterPreset::Nightcore => FilterSettings {
                timescale: Some(Timescale {
                    speed: 1.25,
                    pitch: 1.3,
                    rate: 1.0,
                }),
                ..Default::default()
            },
            FilterPreset::Karaoke => FilterSettings {
                karaoke: Some(Karaoke {
                    level: 1.0,
                    mono_level: 1.0,
                    filter_band: 220.0,
                    filter_width: 100.0,
                }),
                ..Default::default()
            },
            FilterPreset::Rotation => FilterSettings {
                rotation: Some(Rotation { rotation_hz: 0.2 }),
                ..Default::default()
            },
        }
    }

    /// Locale key suffix, e.g. `filters.bass_boost`.
    pub fn key(&self) -> &'static str {
        match self {
            FilterPreset::BassBoost(_) => "bass_boost",
            FilterPreset::Nightcore => "nightcore",
            FilterPreset::Karaoke => "karaoke",
            FilterPreset::Rotation => "rotation",
        }
    }

    /// Maps a filter panel button id.
    pub fn from_custom_id(id: &str) -> Option<Self> {
        match id {
            "filter_bass_boost" => Some(FilterPreset::BassBoost(BassBoostLevel::Medium)),
            "filter_nightcore" => Some(FilterPreset::Nightcore),
            "filter_karaoke" => Some(FilterPreset::Karaoke),
            "filter_rotation" => Some(FilterPreset::Rotation),
            _ => None,
        }
    }
}

/// The preset that should be active after the user picked `requested`.
/// Picking the active preset again switches filters off.
pub fn toggle_preset(
    active: Option<FilterPreset>,
    requested: FilterPreset,
) -> Option<FilterPreset> {
    if active == Some(requested) {
        None
    } else {
        Some(requested)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn empty_settings_serialize_to_empty_object() {
        assert_eq!(
            serde_json::to_value(FilterSettings::default()).unwrap(),
            json!({})
        );
        assert!(FilterSettings::default().is_empty());
    }

    #[test]
    fn karaoke_uses_wire_names() {
        let value = serde_json::to_value(FilterPreset::Karaoke.settings()).unwrap();
        assert_eq!(
            value,
            json!({"karaoke": {"level": 1.0, "monoLevel": 1.0, "filterBand": 220.0, "filterWidth": 100.0}})
        );
    }

    #[test]
    fn rotation_and_nightcore() {
        let value = serde_json::to_value(FilterPreset::Rotation.settings()).unwrap();
        assert_eq!(value, json!({"rotation": {"rotationHz": 0.2}}));

        let nightcore = FilterPreset::Nightcore.settings();
        assert_eq!(nightcore.timescale.unwrap().pitch, 1.3);
    }

    #[test]
    fn bass_boost_has_eleven_bands() {
        let settings = FilterPreset::BassBoost(BassBoostLevel::High).settings();
        let bands = settings.equalizer.unwrap();
        assert_eq!(bands.len(), 11);
        assert_eq!(bands[1], EqualizerBand { band: 1, gain: 0.67 });
        assert_eq!(bands[10].band, 10);
    }

    #[test]
    fn toggling_active_preset_clears() {
        let active = toggle_preset(None, FilterPreset::Nightcore);
        assert_eq!(active, Some(FilterPreset::Nightcore));
        assert_eq!(toggle_preset(active, FilterPreset::Nightcore), None);
        assert_eq!(
            toggle_preset(active, FilterPreset::Karaoke),
            Some(FilterPreset::Karaoke)
        );
    }

    #[test]
    fn custom_ids_map_to_presets() {
        assert_eq!(
            FilterPreset::from_custom_id("filter_bass_boost"),
            Some(FilterPreset::BassBoost(BassBoostLevel::Medium))
        );
        assert_eq!(FilterPreset::from_custom_id("filter_reset"), None);
    }
}
