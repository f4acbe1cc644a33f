//! Typed clinical payloads, one variant per consultation type.
//!
//! Intake sections can be written by staff. The clinical judgement
//! (assessment and recommendations) belongs to the consultant and is
//! stripped from anything a staff member submits.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::ValidationError;

/// Free-form labelled observations, e.g. a lab panel.
pub type Observations = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteType {
    Pregnancy,
    Prenatal,
    Emergency,
}

impl NoteType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NoteType::Pregnancy => "pregnancy",
            NoteType::Prenatal => "prenatal",
            NoteType::Emergency => "emergency",
        }
    }
}

impl fmt::Display for NoteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NoteType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pregnancy" => Ok(NoteType::Pregnancy),
            "prenatal" => Ok(NoteType::Prenatal),
            "emergency" => Ok(NoteType::Emergency),
            other => Err(ValidationError::invalid_format(
                "type",
                format!("unknown consultation type '{}'", other),
            )),
        }
    }
}

/// Consultant-only conclusions of a consultation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClinicalJudgement {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assessment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommendations: Option<String>,
}

impl ClinicalJudgement {
    pub fn is_empty(&self) -> bool {
        self.assessment.is_none() && self.recommendations.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaternalHealth {
    pub blood_pressure: Option<String>,
    pub weight_gain: Option<String>,
    pub hemoglobin: Option<String>,
    pub uterine_height: Option<String>,
    pub symptoms: Option<String>,
    pub urine_analysis: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetalHealth {
    pub heart_rate: Option<String>,
    pub movement_frequency: Option<String>,
    pub presentation: Option<String>,
    pub gestational_age: Option<String>,
    pub amniotic_fluid: Option<String>,
    pub ultrasound_findings: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PregnancyNote {
    pub maternal_health: MaternalHealth,
    pub screening: Observations,
    pub judgement: ClinicalJudgement,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrenatalNote {
    pub maternal_health: MaternalHealth,
    pub fetal_health: FetalHealth,
    pub judgement: ClinicalJudgement,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmergencyNote {
    pub vital_signs: Observations,
    pub fetal_monitoring: Observations,
    pub labs: Observations,
    pub type_and_screen: Observations,
    pub blood_cultures_drawn: Option<bool>,
    pub ultrasound_findings: Option<String>,
    pub judgement: ClinicalJudgement,
}

/// Clinical content of a consultation note, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum NotePayload {
    Pregnancy(PregnancyNote),
    Prenatal(PrenatalNote),
    Emergency(EmergencyNote),
}

impl NotePayload {
    pub fn note_type(&self) -> NoteType {
        match self {
            NotePayload::Pregnancy(_) => NoteType::Pregnancy,
            NotePayload::Prenatal(_) => NoteType::Prenatal,
            NotePayload::Emergency(_) => NoteType::Emergency,
        }
    }

    pub fn judgement(&self) -> &ClinicalJudgement {
        match self {
            NotePayload::Pregnancy(note) => &note.judgement,
            NotePayload::Prenatal(note) => &note.judgement,
            NotePayload::Emergency(note) => &note.judgement,
        }
    }

    fn judgement_mut(&mut self) -> &mut ClinicalJudgement {
        match self {
            NotePayload::Pregnancy(note) => &mut note.judgement,
            NotePayload::Prenatal(note) => &mut note.judgement,
            NotePayload::Emergency(note) => &mut note.judgement,
        }
    }

    /// Removes assessment and recommendations. Returns true if anything
    /// was removed.
    pub fn strip_clinical_judgement(&mut self) -> bool {
        let judgement = self.judgement_mut();
        let had_any = !judgement.is_empty();
        *judgement = ClinicalJudgement::default();
        had_any
    }

    /// Sets the consultant's conclusions, keeping intake fields as written.
    pub fn complete_with(&mut self, judgement: ClinicalJudgement) {
        *self.judgement_mut() = judgement;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deserializes_tagged_prenatal_note() {
        let payload: NotePayload = serde_json::from_value(json!({
            "type": "prenatal",
            "maternal_health": { "blood_pressure": "120/80" },
            "fetal_health": { "heart_rate": "140" },
            "judgement": { "assessment": "Healthy progression" }
        }))
        .unwrap();

        assert_eq!(payload.note_type(), NoteType::Prenatal);
        assert_eq!(
            payload.judgement().assessment.as_deref(),
            Some("Healthy progression")
        );
    }

    #[test]
    fn unknown_type_is_rejected() {
        let result: Result<NotePayload, _> =
            serde_json::from_value(json!({ "type": "dental" }));
        assert!(result.is_err());
    }

    #[test]
    fn strip_removes_judgement_only() {
        let mut payload = NotePayload::Emergency(EmergencyNote {
            blood_cultures_drawn: Some(true),
            judgement: ClinicalJudgement {
                assessment: Some("Suspected preeclampsia".into()),
                recommendations: Some("Admit".into()),
            },
            ..Default::default()
        });

        assert!(payload.strip_clinical_judgement());
        assert!(payload.judgement().is_empty());
        match &payload {
            NotePayload::Emergency(note) => assert_eq!(note.blood_cultures_drawn, Some(true)),
            other => panic!("unexpected payload {:?}", other),
        }
        assert!(!payload.strip_clinical_judgement());
    }

    #[test]
    fn note_type_parses_case_insensitively() {
        assert_eq!("Prenatal".parse::<NoteType>().unwrap(), NoteType::Prenatal);
        assert!("other".parse::<NoteType>().is_err());
    }
}
