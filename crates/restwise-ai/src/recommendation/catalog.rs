use restwise_storage::FatigueLevel;

use super::{Recommendation, RecommendationSource, UserProfile};

use FatigueLevel::{Critical, High, Low, Moderate};

struct Activity {
    name: &'static str,
    category: &'static str,
    reason: &'static str,
    duration_min: u32,
    duration_max: u32,
    benefits: &'static str,
    steps: &'static [&'static str],
    intensity: &'static str,
    effectiveness: u8,
    for_fatigue: &'static [FatigueLevel],
}

const CATALOG: [Activity; 10] = [
    Activity {
        name: "20-20-20 Eye Exercise",
        category: "eye_exercise",
        reason: "Reduces digital eye strain and refocuses vision",
        duration_min: 1,
        duration_max: 2,
        benefits: "Prevents eye fatigue and improves focus",
        steps: &[
            "Look away from the screen",
            "Find an object about 20 feet away",
            "Focus on it for 20 seconds",
            "Blink naturally",
        ],
        intensity: "Low",
        effectiveness: 85,
        for_fatigue: &[Low, Moderate],
    },
    Activity {
        name: "Neck and Shoulder Stretch",
        category: "stretching",
        reason: "Relieves tension from prolonged typing",
        duration_min: 2,
        duration_max: 3,
        benefits: "Improves flexibility and reduces muscle tension",
        steps: &[
            "Rotate your neck slowly 10 times in each direction",
            "Shrug your shoulders 10 times",
            "Stretch your neck gently to each side",
        ],
        intensity: "Low",
        effectiveness: 80,
        for_fatigue: &[Low, Moderate, High],
    },
    Activity {
        name: "4-7-8 Breathing Exercise",
        category: "breathing",
        reason: "Calms the mind and reduces stress",
        duration_min: 3,
        duration_max: 5,
        benefits: "Promotes relaxation and mental clarity",
        steps: &[
            "Sit comfortably",
            "Inhale for 4 counts",
            "Hold for 7 counts",
            "Exhale for 8 counts",
            "Repeat 4 times",
        ],
        intensity: "Low",
        effectiveness: 90,
        for_fatigue: &[High, Critical],
    },
    Activity {
        name: "Hydration Break",
        category: "hydration",
        reason: "Maintains hydration and encourages movement",
        duration_min: 2,
        duration_max: 3,
        benefits: "Improves focus and cognitive function",
        steps: &[
            "Stand up",
            "Walk to a water source",
            "Drink a glass of water slowly",
            "Return to your desk",
        ],
        intensity: "Low",
        effectiveness: 75,
        for_fatigue: &[Moderate, High],
    },
    Activity {
        name: "Posture Correction Stretch",
        category: "posture",
        reason: "Corrects slouching and improves alignment",
        duration_min: 2,
        duration_max: 4,
        benefits: "Reduces back pain and improves breathing",
        steps: &[
            "Stand up straight",
            "Stretch your arms above your head",
            "Bend backward gently for 10 seconds",
            "Roll your shoulders backward 5 times",
        ],
        intensity: "Low",
        effectiveness: 80,
        for_fatigue: &[Moderate, High],
    },
    Activity {
        name: "Mindfulness Meditation",
        category: "meditation",
        reason: "Resets mental focus and reduces stress",
        duration_min: 3,
        duration_max: 5,
        benefits: "Enhances mental clarity and emotional regulation",
        steps: &[
            "Close your eyes",
            "Focus on your breathing",
            "Notice sensations without judgment",
            "Gently bring attention back to the breath",
        ],
        intensity: "Low",
        effectiveness: 88,
        for_fatigue: &[High, Critical],
    },
    Activity {
        name: "Short Walk",
        category: "walking",
        reason: "Improves circulation and provides a mental break",
        duration_min: 5,
        duration_max: 10,
        benefits: "Increases energy and resets mental state",
        steps: &[
            "Stand up",
            "Walk around the office or home",
            "Change scenery if possible",
            "Return refreshed",
        ],
        intensity: "Moderate",
        effectiveness: 92,
        for_fatigue: &[High, Critical],
    },
    Activity {
        name: "Wrist and Hand Stretch",
        category: "stretching",
        reason: "Prevents carpal tunnel and hand strain",
        duration_min: 2,
        duration_max: 3,
        benefits: "Improves hand dexterity and reduces pain",
        steps: &[
            "Extend one arm",
            "Gently pull the fingers backward",
            "Hold for 15 seconds",
            "Repeat with the other hand",
        ],
        intensity: "Low",
        effectiveness: 78,
        for_fatigue: &[Low, Moderate],
    },
    Activity {
        name: "Face Massage",
        category: "relaxation",
        reason: "Improves facial blood flow and reduces tension",
        duration_min: 2,
        duration_max: 3,
        benefits: "Reduces facial tension and promotes relaxation",
        steps: &[
            "Gently massage your temples",
            "Massage along the jawline",
            "Massage your forehead",
            "Relax your face",
        ],
        intensity: "Low",
        effectiveness: 75,
        for_fatigue: &[Moderate, High],
    },
    Activity {
        name: "Desk Yoga",
        category: "yoga",
        reason: "Builds strength and flexibility at the desk",
        duration_min: 5,
        duration_max: 8,
        benefits: "Improves flexibility and reduces stress",
        steps: &[
            "Seated cat-cow stretch",
            "Spinal twist",
            "Shoulder roll",
            "Finish with slow breathing",
        ],
        intensity: "Moderate",
        effectiveness: 85,
        for_fatigue: &[Moderate, High],
    },
];

impl Activity {
    fn to_recommendation(&self) -> Recommendation {
        Recommendation {
            activity: self.name.to_string(),
            category: self.category.to_string(),
            reason: self.reason.to_string(),
            duration_min: self.duration_min,
            duration_max: self.duration_max,
            benefits: self.benefits.to_string(),
            steps: self.steps.iter().map(|s| (*s).to_string()).collect(),
            intensity: self.intensity.to_string(),
            effectiveness: self.effectiveness,
            source: RecommendationSource::Catalog,
        }
    }
}

/// Pick a catalog activity for `profile`.
///
/// Activities must fit the available time and suit the fatigue level; when
/// nothing qualifies the whole catalog is considered. Preferred categories
/// narrow the choice when they match anything. The first candidate not in
/// `recent` wins, otherwise the one suggested longest ago.
#[must_use]
pub fn fallback_recommendation(profile: &UserProfile, recent: &[String]) -> Recommendation {
    let mut candidates: Vec<&Activity> = CATALOG
        .iter()
        .filter(|a| a.duration_max <= profile.available_minutes)
        .filter(|a| a.for_fatigue.contains(&profile.fatigue_level))
        .collect();
    if candidates.is_empty() {
        candidates = CATALOG.iter().collect();
    }

    if !profile.preferred_categories.is_empty() {
        let preferred: Vec<&Activity> = candidates
            .iter()
            .copied()
            .filter(|a| {
                profile
                    .preferred_categories
                    .iter()
                    .any(|c| c.eq_ignore_ascii_case(a.category))
            })
            .collect();
        if !preferred.is_empty() {
            candidates = preferred;
        }
    }

    let fresh = candidates
        .iter()
        .find(|a| !recent.iter().any(|r| r == a.name));
    let chosen = fresh.or_else(|| {
        candidates
            .iter()
            .min_by_key(|a| recent.iter().rposition(|r| r == a.name).unwrap_or(0))
    });

    chosen.map_or_else(|| CATALOG[0].to_recommendation(), |a| a.to_recommendation())
}
