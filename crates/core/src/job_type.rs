//! The closed set of AI job types.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Kind of enrichment a job performs.
///
/// The set is closed: a job's type is fixed at creation and never changes.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobType {
    /// Vision analysis of a scene image (room type, features, summary).
    SceneAnalysis,
    /// Virtual staging of an empty room image.
    Staging,
    /// Listing/scene description text generation.
    Description,
    /// Floor-plan extraction from a plan image.
    FloorPlan,
    /// Image enhancement (exposure, upscale).
    Enhancement,
    /// Automatic hotspot placement on a panorama.
    AutoHotspots,
}

impl JobType {
    pub const ALL: [JobType; 6] = [
        JobType::SceneAnalysis,
        JobType::Staging,
        JobType::Description,
        JobType::FloorPlan,
        JobType::Enhancement,
        JobType::AutoHotspots,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::SceneAnalysis => "scene-analysis",
            JobType::Staging => "staging",
            JobType::Description => "description",
            JobType::FloorPlan => "floor-plan",
            JobType::Enhancement => "enhancement",
            JobType::AutoHotspots => "auto-hotspots",
        }
    }

    /// Whether the job needs a source image handed to the provider.
    pub fn requires_image(&self) -> bool {
        !matches!(self, JobType::Description)
    }
}

impl core::fmt::Display for JobType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| DomainError::validation(format!("unknown job type: {s}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_kebab_case_names() {
        assert_eq!("floor-plan".parse::<JobType>().unwrap(), JobType::FloorPlan);
        assert_eq!("auto-hotspots".parse::<JobType>().unwrap(), JobType::AutoHotspots);
    }

    #[test]
    fn unknown_type_is_validation_error() {
        assert!(matches!(
            "video-tour".parse::<JobType>(),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn serde_matches_as_str() {
        for t in JobType::ALL {
            let json = serde_json::to_value(t).unwrap();
            assert_eq!(json, serde_json::Value::String(t.as_str().to_string()));
        }
    }

    #[test]
    fn only_description_runs_without_image() {
        let imageless: Vec<_> = JobType::ALL.into_iter().filter(|t| !t.requires_image()).collect();
        assert_eq!(imageless, vec![JobType::Description]);
    }
}
