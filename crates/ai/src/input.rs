//! Typed job inputs.
//!
//! Jobs store their input as opaque JSON; adapters work on these typed shapes.
//! Parsing is done at submission (so bad input never creates a job) and again
//! at execution time.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value as JsonValue};

use vista_core::{AssetId, DomainError, DomainResult, JobType};

use crate::templates::{DescriptionTone, EnhancementPreset, StagingStyle};

const DEFAULT_MAX_WORDS: u32 = 120;
const MAX_WORDS_RANGE: std::ops::RangeInclusive<u32> = 20..=1000;
const DEFAULT_SCALE: u8 = 2;
const SCALE_RANGE: std::ops::RangeInclusive<u64> = 1..=4;

/// Input for image-only jobs (analysis, floor plan, hotspots).
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ImageInput {
    pub image_asset_id: AssetId,
    /// Optional free-text hint forwarded to the model.
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StagingInput {
    pub image_asset_id: AssetId,
    pub style: StagingStyle,
    pub room_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnhancementInput {
    pub image_asset_id: AssetId,
    pub preset: EnhancementPreset,
    /// Upscale factor (1-4).
    pub scale: u8,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DescriptionInput {
    pub image_asset_id: Option<AssetId>,
    pub tone: DescriptionTone,
    /// Known facts about the property/scene (bedrooms, area, highlights...).
    pub facts: Map<String, JsonValue>,
    pub max_words: u32,
}

impl Default for DescriptionInput {
    fn default() -> Self {
        Self {
            image_asset_id: None,
            tone: DescriptionTone::default(),
            facts: Map::new(),
            max_words: DEFAULT_MAX_WORDS,
        }
    }
}

/// Validated input, one variant per job type.
#[derive(Debug, Clone, PartialEq)]
pub enum JobInput {
    SceneAnalysis(ImageInput),
    FloorPlan(ImageInput),
    AutoHotspots(ImageInput),
    Staging(StagingInput),
    Enhancement(EnhancementInput),
    Description(DescriptionInput),
}

#[derive(Deserialize)]
struct RawStaging {
    image_asset_id: AssetId,
    #[serde(default)]
    style: Option<String>,
    #[serde(default)]
    room_type: Option<String>,
}

#[derive(Deserialize)]
struct RawEnhancement {
    image_asset_id: AssetId,
    #[serde(default)]
    preset: Option<String>,
    #[serde(default)]
    scale: Option<u64>,
}

#[derive(Deserialize)]
struct RawDescription {
    #[serde(default)]
    image_asset_id: Option<AssetId>,
    #[serde(default)]
    tone: Option<String>,
    #[serde(default)]
    facts: Option<Map<String, JsonValue>>,
    #[serde(default)]
    max_words: Option<u32>,
}

impl JobInput {
    /// Validate raw JSON input for `job_type`.
    ///
    /// Unknown style/tone/preset keys fall back to defaults; structural problems
    /// (not an object, missing image, out-of-range numbers) are validation errors.
    pub fn parse(job_type: JobType, input: &JsonValue) -> DomainResult<Self> {
        if !input.is_object() {
            return Err(DomainError::validation(format!(
                "{job_type} input must be a JSON object"
            )));
        }

        match job_type {
            JobType::SceneAnalysis => decode(job_type, input).map(JobInput::SceneAnalysis),
            JobType::FloorPlan => decode(job_type, input).map(JobInput::FloorPlan),
            JobType::AutoHotspots => decode(job_type, input).map(JobInput::AutoHotspots),
            JobType::Staging => {
                let raw: RawStaging = decode(job_type, input)?;
                Ok(JobInput::Staging(StagingInput {
                    image_asset_id: raw.image_asset_id,
                    style: raw.style.as_deref().map(StagingStyle::from_key).unwrap_or_default(),
                    room_type: raw.room_type,
                }))
            }
            JobType::Enhancement => {
                let raw: RawEnhancement = decode(job_type, input)?;
                let scale = raw.scale.unwrap_or(DEFAULT_SCALE as u64);
                if !SCALE_RANGE.contains(&scale) {
                    return Err(DomainError::validation(format!(
                        "enhancement scale must be between 1 and 4, got {scale}"
                    )));
                }
                Ok(JobInput::Enhancement(EnhancementInput {
                    image_asset_id: raw.image_asset_id,
                    preset: raw
                        .preset
                        .as_deref()
                        .map(EnhancementPreset::from_key)
                        .unwrap_or_default(),
                    scale: scale as u8,
                }))
            }
            JobType::Description => {
                let raw: RawDescription = decode(job_type, input)?;
                let max_words = raw.max_words.unwrap_or(DEFAULT_MAX_WORDS);
                if !MAX_WORDS_RANGE.contains(&max_words) {
                    return Err(DomainError::validation(format!(
                        "max_words must be between {} and {}, got {max_words}",
                        MAX_WORDS_RANGE.start(),
                        MAX_WORDS_RANGE.end()
                    )));
                }
                Ok(JobInput::Description(DescriptionInput {
                    image_asset_id: raw.image_asset_id,
                    tone: raw.tone.as_deref().map(DescriptionTone::from_key).unwrap_or_default(),
                    facts: raw.facts.unwrap_or_default(),
                    max_words,
                }))
            }
        }
    }

    pub fn job_type(&self) -> JobType {
        match self {
            JobInput::SceneAnalysis(_) => JobType::SceneAnalysis,
            JobInput::FloorPlan(_) => JobType::FloorPlan,
            JobInput::AutoHotspots(_) => JobType::AutoHotspots,
            JobInput::Staging(_) => JobType::Staging,
            JobInput::Enhancement(_) => JobType::Enhancement,
            JobInput::Description(_) => JobType::Description,
        }
    }

    /// Source image to resolve into a URL before invoking the provider.
    pub fn image_asset_id(&self) -> Option<AssetId> {
        match self {
            JobInput::SceneAnalysis(i) | JobInput::FloorPlan(i) | JobInput::AutoHotspots(i) => {
                Some(i.image_asset_id)
            }
            JobInput::Staging(i) => Some(i.image_asset_id),
            JobInput::Enhancement(i) => Some(i.image_asset_id),
            JobInput::Description(i) => i.image_asset_id,
        }
    }
}

fn decode<T: DeserializeOwned>(job_type: JobType, input: &JsonValue) -> DomainResult<T> {
    serde_json::from_value(input.clone())
        .map_err(|e| DomainError::validation(format!("invalid {job_type} input: {e}")))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn staging_with_unknown_style_uses_default() {
        let asset = AssetId::new();
        let input = JobInput::parse(
            JobType::Staging,
            &json!({"image_asset_id": asset.to_string(), "style": "rustic", "room_type": "bedroom"}),
        )
        .unwrap();

        match input {
            JobInput::Staging(s) => {
                assert_eq!(s.style, StagingStyle::Modern);
                assert_eq!(s.room_type.as_deref(), Some("bedroom"));
                assert_eq!(s.image_asset_id, asset);
            }
            other => panic!("unexpected input: {other:?}"),
        }
    }

    #[test]
    fn image_jobs_require_asset_id() {
        let err = JobInput::parse(JobType::SceneAnalysis, &json!({"notes": "kitchen"})).unwrap_err();
        match err {
            DomainError::Validation(msg) => assert!(msg.contains("scene-analysis")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn non_object_input_is_rejected() {
        assert!(JobInput::parse(JobType::Description, &json!("write something")).is_err());
        assert!(JobInput::parse(JobType::Description, &json!(null)).is_err());
    }

    #[test]
    fn description_defaults_apply() {
        let input = JobInput::parse(JobType::Description, &json!({})).unwrap();
        assert_eq!(input, JobInput::Description(DescriptionInput::default()));
        assert_eq!(input.image_asset_id(), None);
    }

    #[test]
    fn enhancement_scale_out_of_range_is_rejected() {
        let asset = AssetId::new().to_string();
        assert!(
            JobInput::parse(JobType::Enhancement, &json!({"image_asset_id": asset, "scale": 8})).is_err()
        );

        let ok = JobInput::parse(JobType::Enhancement, &json!({"image_asset_id": asset})).unwrap();
        match ok {
            JobInput::Enhancement(e) => {
                assert_eq!(e.scale, 2);
                assert_eq!(e.preset, EnhancementPreset::Balanced);
            }
            other => panic!("unexpected input: {other:?}"),
        }
    }
}
