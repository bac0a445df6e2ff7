//! Prompt templates keyed by closed style/tone enums.
//!
//! Every lookup goes through `from_key`, which maps unknown keys to the
//! default variant instead of failing: a bad style never blocks a job.

use serde::{Deserialize, Serialize};
use serde_json::{Value as JsonValue, json};
use tracing::debug;

/// Furnishing style for virtual staging.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StagingStyle {
    #[default]
    Modern,
    Scandinavian,
    Luxury,
    Minimalist,
    Industrial,
}

impl StagingStyle {
    pub const ALL: [StagingStyle; 5] = [
        StagingStyle::Modern,
        StagingStyle::Scandinavian,
        StagingStyle::Luxury,
        StagingStyle::Minimalist,
        StagingStyle::Industrial,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StagingStyle::Modern => "modern",
            StagingStyle::Scandinavian => "scandinavian",
            StagingStyle::Luxury => "luxury",
            StagingStyle::Minimalist => "minimalist",
            StagingStyle::Industrial => "industrial",
        }
    }

    pub fn from_key(key: &str) -> Self {
        match key.trim().to_ascii_lowercase().as_str() {
            "modern" => StagingStyle::Modern,
            "scandinavian" => StagingStyle::Scandinavian,
            "luxury" => StagingStyle::Luxury,
            "minimalist" => StagingStyle::Minimalist,
            "industrial" => StagingStyle::Industrial,
            other => {
                debug!(style = other, "unknown staging style, using default");
                StagingStyle::default()
            }
        }
    }

    /// Style fragment of the staging prompt.
    pub fn template(&self) -> &'static str {
        match self {
            StagingStyle::Modern => {
                "modern interior design, clean lines, neutral palette with bold accents, contemporary furniture"
            }
            StagingStyle::Scandinavian => {
                "scandinavian interior design, light oak wood, white walls, cozy textiles, hygge atmosphere"
            }
            StagingStyle::Luxury => {
                "luxury interior design, marble surfaces, velvet upholstery, brass fixtures, designer furniture"
            }
            StagingStyle::Minimalist => {
                "minimalist interior design, sparse furniture, monochrome palette, uncluttered open space"
            }
            StagingStyle::Industrial => {
                "industrial interior design, exposed brick, metal accents, leather seating, edison bulbs"
            }
        }
    }

    /// Full staging prompt for a room.
    pub fn prompt(&self, room_type: Option<&str>) -> String {
        let room = room_type.map(str::trim).filter(|r| !r.is_empty()).unwrap_or("room");
        format!(
            "A professionally staged {room}, {}, photorealistic real estate photography, natural lighting",
            self.template()
        )
    }
}

/// Voice used for generated descriptions.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DescriptionTone {
    #[default]
    Professional,
    Warm,
    Luxury,
    Concise,
}

impl DescriptionTone {
    pub fn as_str(&self) -> &'static str {
        match self {
            DescriptionTone::Professional => "professional",
            DescriptionTone::Warm => "warm",
            DescriptionTone::Luxury => "luxury",
            DescriptionTone::Concise => "concise",
        }
    }

    pub fn from_key(key: &str) -> Self {
        match key.trim().to_ascii_lowercase().as_str() {
            "professional" => DescriptionTone::Professional,
            "warm" => DescriptionTone::Warm,
            "luxury" => DescriptionTone::Luxury,
            "concise" => DescriptionTone::Concise,
            other => {
                debug!(tone = other, "unknown description tone, using default");
                DescriptionTone::default()
            }
        }
    }

    /// System instruction for the text model.
    pub fn template(&self) -> &'static str {
        match self {
            DescriptionTone::Professional => {
                "You are a real estate copywriter. Write clear, factual, professional property descriptions."
            }
            DescriptionTone::Warm => {
                "You are a real estate copywriter. Write inviting, warm descriptions that help buyers picture living there."
            }
            DescriptionTone::Luxury => {
                "You are a copywriter for high-end properties. Write elegant, refined descriptions that highlight exclusivity."
            }
            DescriptionTone::Concise => {
                "You are a real estate copywriter. Write short, punchy descriptions with no filler."
            }
        }
    }
}

/// Enhancement parameter preset.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnhancementPreset {
    #[default]
    Balanced,
    Bright,
    Hdr,
}

impl EnhancementPreset {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnhancementPreset::Balanced => "balanced",
            EnhancementPreset::Bright => "bright",
            EnhancementPreset::Hdr => "hdr",
        }
    }

    pub fn from_key(key: &str) -> Self {
        match key.trim().to_ascii_lowercase().as_str() {
            "balanced" => EnhancementPreset::Balanced,
            "bright" => EnhancementPreset::Bright,
            "hdr" => EnhancementPreset::Hdr,
            other => {
                debug!(preset = other, "unknown enhancement preset, using default");
                EnhancementPreset::default()
            }
        }
    }

    /// Model parameters for the preset.
    pub fn parameters(&self) -> JsonValue {
        match self {
            EnhancementPreset::Balanced => json!({"exposure": 0.0, "denoise": 0.3, "hdr": false}),
            EnhancementPreset::Bright => json!({"exposure": 0.35, "denoise": 0.3, "hdr": false}),
            EnhancementPreset::Hdr => json!({"exposure": 0.1, "denoise": 0.2, "hdr": true}),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_style_falls_back_to_default_template() {
        let style = StagingStyle::from_key("rustic");
        assert_eq!(style, StagingStyle::Modern);
        assert_eq!(style.template(), StagingStyle::default().template());
    }

    #[test]
    fn style_keys_are_case_insensitive() {
        assert_eq!(StagingStyle::from_key(" Scandinavian "), StagingStyle::Scandinavian);
        for style in StagingStyle::ALL {
            assert_eq!(StagingStyle::from_key(style.as_str()), style);
        }
    }

    #[test]
    fn prompt_mentions_room_and_style() {
        let prompt = StagingStyle::Industrial.prompt(Some("loft bedroom"));
        assert!(prompt.contains("loft bedroom"));
        assert!(prompt.contains("exposed brick"));

        let generic = StagingStyle::Modern.prompt(Some("  "));
        assert!(generic.contains("staged room"));
    }

    #[test]
    fn unknown_tone_and_preset_fall_back() {
        assert_eq!(DescriptionTone::from_key("sarcastic"), DescriptionTone::Professional);
        assert_eq!(EnhancementPreset::from_key("vivid"), EnhancementPreset::Balanced);
        assert_eq!(EnhancementPreset::Hdr.parameters()["hdr"], json!(true));
    }
}
