use super::*;
use crate::advisor::{BreakUrgency, Insight};
use crate::recommendation::RecommendationPayload;
use restwise_storage::{BreakType, FatigueLevel};

const INSIGHT_JSON: &str = r#"{
  "FATIGUE_LEVEL": "Moderate",
  "BREAK_URGENCY": "Optional",
  "BREAK_DURATION": 4,
  "BREAK_TYPE": "Micro",
  "PRIMARY_FACTORS": ["low blink rate", "long session"],
  "RECOMMENDATIONS": ["Look away from the screen"]
}"#;

// ============================================================================
// Well-formed replies
// ============================================================================

#[test]
fn test_plain_json_is_well_formed() {
    let parsed = parse_response::<Insight>(INSIGHT_JSON);
    let Parsed::WellFormed(insight) = parsed else {
        panic!("expected well-formed, got {parsed:?}");
    };
    assert_eq!(insight.fatigue_level, FatigueLevel::Moderate);
    assert_eq!(insight.break_urgency, BreakUrgency::Optional);
    assert_eq!(insight.break_type, BreakType::Micro);
    assert_eq!(insight.primary_factors.len(), 2);
}

#[test]
fn test_fenced_json_is_well_formed() {
    let reply = format!("```json\n{INSIGHT_JSON}\n```");
    assert!(parse_response::<Insight>(&reply).is_well_formed());
}

#[test]
fn test_json_after_prose_is_well_formed() {
    let reply = format!("Here is my analysis of the user:\n{INSIGHT_JSON}\nStay healthy!");
    assert!(parse_response::<Insight>(&reply).is_well_formed());
}

#[test]
fn test_missing_optional_lists_default() {
    let reply = r#"{"FATIGUE_LEVEL":"low","BREAK_URGENCY":"None","BREAK_DURATION":3,"BREAK_TYPE":"micro"}"#;
    let Parsed::WellFormed(insight) = parse_response::<Insight>(reply) else {
        panic!("expected well-formed");
    };
    assert!(insight.primary_factors.is_empty());
    assert!(insight.recommendations.is_empty());
}

// ============================================================================
// Partial replies
// ============================================================================

#[test]
fn test_failed_validation_is_partial() {
    let reply = r#"{"FATIGUE_LEVEL":"High","BREAK_URGENCY":"Soon","BREAK_DURATION":0,"BREAK_TYPE":"Long"}"#;
    let Parsed::PartiallyParsed(fields) = parse_response::<Insight>(reply) else {
        panic!("expected partial");
    };
    assert_eq!(fields.get("BREAK_DURATION").map(String::as_str), Some("0"));
    assert_eq!(fields.get("FATIGUE_LEVEL").map(String::as_str), Some("High"));
}

#[test]
fn test_unknown_enum_value_is_partial() {
    let reply = r#"{"FATIGUE_LEVEL":"Exhausted","BREAK_URGENCY":"Soon","BREAK_DURATION":5,"BREAK_TYPE":"Long","PRIMARY_FACTORS":["a","b"]}"#;
    let Parsed::PartiallyParsed(fields) = parse_response::<Insight>(reply) else {
        panic!("expected partial");
    };
    assert_eq!(fields.get("PRIMARY_FACTORS").map(String::as_str), Some("a; b"));
}

#[test]
fn test_truncated_json_falls_back_to_lines() {
    let reply = "{\n  \"FATIGUE_LEVEL\": \"High\",\n  \"BREAK_URGENCY\": \"Soon\",\n  \"BREAK_DURATION\": ";
    let Parsed::PartiallyParsed(fields) = parse_response::<Insight>(reply) else {
        panic!("expected partial");
    };
    assert_eq!(fields.get("FATIGUE_LEVEL").map(String::as_str), Some("High"));
    assert_eq!(fields.get("BREAK_URGENCY").map(String::as_str), Some("Soon"));
    assert!(!fields.contains_key("BREAK_DURATION"));
}

#[test]
fn test_numbered_key_value_lines_are_partial() {
    let reply = "1. FATIGUE_LEVEL: Critical\n2. Break urgency: Immediate\n- **Break type**: Long";
    let Parsed::PartiallyParsed(fields) = parse_response::<Insight>(reply) else {
        panic!("expected partial");
    };
    assert_eq!(fields.get("FATIGUE_LEVEL").map(String::as_str), Some("Critical"));
    assert_eq!(fields.get("BREAK_URGENCY").map(String::as_str), Some("Immediate"));
    assert_eq!(fields.get("BREAK_TYPE").map(String::as_str), Some("Long"));
}

// ============================================================================
// Unusable replies
// ============================================================================

#[test]
fn test_empty_reply_is_unusable() {
    assert_eq!(parse_response::<Insight>(""), Parsed::Unusable);
    assert_eq!(parse_response::<Insight>("   \n  "), Parsed::Unusable);
}

#[test]
fn test_prose_reply_is_unusable() {
    let parsed = parse_response::<Insight>("I'm sorry, I cannot analyse fatigue right now.");
    assert_eq!(parsed, Parsed::Unusable);
}

#[test]
fn test_empty_object_is_unusable() {
    assert_eq!(parse_response::<Insight>("{}"), Parsed::Unusable);
}

#[test]
fn test_into_result_rejects_degraded_outcomes() {
    let partial = parse_response::<Insight>("FATIGUE_LEVEL: High");
    assert!(matches!(partial.into_result(), Err(AdvisorError::Malformed(msg)) if msg.contains("FATIGUE_LEVEL")));
    assert!(matches!(
        Parsed::<Insight>::Unusable.into_result(),
        Err(AdvisorError::Malformed(_))
    ));
}

// ============================================================================
// Recommendation payloads
// ============================================================================

#[test]
fn test_recommendation_steps_as_text() {
    let reply = r#"{"ACTIVITY":"Shoulder Rolls","REASON":"tension","DURATION_MIN":2,"DURATION_MAX":3,"STEPS":"1. Sit tall\n2. Roll shoulders back\n3. Breathe"}"#;
    let parsed = parse_response::<RecommendationPayload>(reply)
        .map(RecommendationPayload::into_recommendation);
    let Parsed::WellFormed(rec) = parsed else {
        panic!("expected well-formed recommendation");
    };
    assert_eq!(rec.steps, vec!["Sit tall", "Roll shoulders back", "Breathe"]);
    assert_eq!(rec.intensity, "Low");
    assert_eq!(rec.effectiveness, 75);
}

#[test]
fn test_recommendation_inverted_range_is_partial() {
    let reply = r#"{"ACTIVITY":"Walk","DURATION_MIN":10,"DURATION_MAX":5}"#;
    assert!(matches!(
        parse_response::<RecommendationPayload>(reply),
        Parsed::PartiallyParsed(_)
    ));
}
