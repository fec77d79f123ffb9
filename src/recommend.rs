// src/recommend.rs
//! Level → resource bundle. Pure lookup, no I/O.

use serde::{Deserialize, Serialize};

use crate::assessment::CrisisLevel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceCategory {
    CrisisHotline,
    EmergencyServices,
    CrisisTextLine,
    TherapistReferral,
    PeerSupport,
    TrustedContact,
    GroundingExercise,
    BreathingExercise,
    Journaling,
    PhysicalActivity,
    GeneralWellbeing,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationBundle {
    pub primary_resource_category: ResourceCategory,
    pub secondary_resource_category: ResourceCategory,
    pub self_care_category: ResourceCategory,
    pub message: String,
}

impl RecommendationBundle {
    fn new(
        primary: ResourceCategory,
        secondary: ResourceCategory,
        self_care: ResourceCategory,
        message: &str,
    ) -> Self {
        Self {
            primary_resource_category: primary,
            secondary_resource_category: secondary,
            self_care_category: self_care,
            message: message.to_string(),
        }
    }
}

/// `None` level has no recommendation. `Error` gets a generic supportive bundle
/// so the user is never left without a pointer to help.
pub fn recommend(level: CrisisLevel) -> Option<RecommendationBundle> {
    use ResourceCategory::*;
    let bundle = match level {
        CrisisLevel::None => return None,
        CrisisLevel::Immediate => RecommendationBundle::new(
            CrisisHotline,
            EmergencyServices,
            GroundingExercise,
            "You don't have to go through this alone. Please reach out to a crisis line or \
             emergency services now. Someone is available to talk at any hour.",
        ),
        CrisisLevel::Escalating => RecommendationBundle::new(
            CrisisTextLine,
            TherapistReferral,
            BreathingExercise,
            "It sounds like things are really heavy right now. Talking to someone can help; \
             consider contacting a support line or a mental health professional.",
        ),
        CrisisLevel::Concerning => RecommendationBundle::new(
            PeerSupport,
            TrustedContact,
            Journaling,
            "Thank you for sharing how you feel. Reaching out to someone you trust or taking \
             a few minutes for yourself might help.",
        ),
        CrisisLevel::Error => RecommendationBundle::new(
            TrustedContact,
            CrisisHotline,
            GeneralWellbeing,
            "If you are struggling, support is available. Consider reaching out to someone \
             you trust or a support line.",
        ),
    };
    Some(bundle)
}
