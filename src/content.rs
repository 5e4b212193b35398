//! Canonicalization of activity content payloads and learner answers.
//!
//! Multiple-choice ("QCM") content has historically been stored in several
//! ad-hoc shapes. Everything funnels through [`normalize_qcm_content`], which
//! maps any input to the single canonical form:
//!
//! `{ "type": "qcm", "questions": [ { "texte", "options", "reponse_correcte" } ] }`
//!
//! On the authoring path an unparsable payload is a hard validation error; in
//! repair mode the same input converges to a deterministic placeholder so a
//! batch pass over a whole table can never get stuck on one row.

use color_eyre::{eyre::eyre, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::db::Db;

/// Question text used when an entire payload is beyond recognition.
pub const TEXTE_INVALIDE: &str = "Contenu invalide";

/// Canonical activity payload, tagged by content type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContenuActivite {
    Qcm { questions: Vec<QcmQuestion> },
    Texte { corps: String },
    Media { url: String },
}

impl ContenuActivite {
    /// Value stored in the `type_activite` column.
    pub fn type_name(&self) -> &'static str {
        match self {
            ContenuActivite::Qcm { .. } => "qcm",
            ContenuActivite::Texte { .. } => "texte",
            ContenuActivite::Media { .. } => "media",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QcmQuestion {
    pub texte: String,
    pub options: Vec<String>,
    pub reponse_correcte: i64,
}

/// Canonical learner answer for a multiple-choice activity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReponseCanonique {
    #[serde(rename = "selectedOption")]
    pub selected_option: i64,
    #[serde(rename = "selectedOptionText")]
    pub selected_option_text: String,
}

/// Defect classes found while normalizing, one increment per affected
/// document or question.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Issue {
    InvalidJson,
    MissingTypeTag,
    MalformedStructure,
    MissingQuestionText,
    InsufficientOptions,
    InvalidCorrectIndex,
    DoubleEncoded,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct IssueCounts {
    pub invalid_json: u32,
    pub missing_type_tag: u32,
    pub malformed_structure: u32,
    pub missing_question_text: u32,
    pub insufficient_options: u32,
    pub invalid_correct_index: u32,
    pub double_encoded: u32,
}

impl IssueCounts {
    pub fn record(&mut self, issue: Issue) {
        match issue {
            Issue::InvalidJson => self.invalid_json += 1,
            Issue::MissingTypeTag => self.missing_type_tag += 1,
            Issue::MalformedStructure => self.malformed_structure += 1,
            Issue::MissingQuestionText => self.missing_question_text += 1,
            Issue::InsufficientOptions => self.insufficient_options += 1,
            Issue::InvalidCorrectIndex => self.invalid_correct_index += 1,
            Issue::DoubleEncoded => self.double_encoded += 1,
        }
    }

    pub fn merge(&mut self, other: &IssueCounts) {
        self.invalid_json += other.invalid_json;
        self.missing_type_tag += other.missing_type_tag;
        self.malformed_structure += other.malformed_structure;
        self.missing_question_text += other.missing_question_text;
        self.insufficient_options += other.insufficient_options;
        self.invalid_correct_index += other.invalid_correct_index;
        self.double_encoded += other.double_encoded;
    }

    pub fn total(&self) -> u32 {
        self.invalid_json
            + self.missing_type_tag
            + self.malformed_structure
            + self.missing_question_text
            + self.insufficient_options
            + self.invalid_correct_index
            + self.double_encoded
    }
}

/// Authoring writes reject unreadable payloads; repair always converges.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NormalizeMode {
    Ecriture,
    Reparation,
}

#[derive(Clone, Debug)]
pub struct NormalizedQcm {
    pub questions: Vec<QcmQuestion>,
    pub issues: IssueCounts,
}

impl NormalizedQcm {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&ContenuActivite::Qcm {
            questions: self.questions.clone(),
        })?)
    }
}

/// Map an arbitrary QCM payload to the canonical shape.
///
/// Only the initial parse can fail, and only in [`NormalizeMode::Ecriture`].
/// Every later defect is repaired in place and counted.
pub fn normalize_qcm_content(raw: &str, mode: NormalizeMode) -> Result<NormalizedQcm> {
    let mut issues = IssueCounts::default();

    let value = match serde_json::from_str::<Value>(raw) {
        Ok(value) => value,
        Err(e) => match mode {
            NormalizeMode::Ecriture => {
                return Err(eyre!("contenu QCM illisible: {e}"));
            }
            NormalizeMode::Reparation => {
                issues.record(Issue::InvalidJson);
                return Ok(NormalizedQcm {
                    questions: vec![placeholder_question()],
                    issues,
                });
            }
        },
    };

    let questions = normalize_qcm_value(&value, &mut issues);
    Ok(NormalizedQcm { questions, issues })
}

/// Shape recognition over already-parsed data. Three known shapes map to the
/// canonical form; anything else becomes the one-question placeholder.
pub fn normalize_qcm_value(value: &Value, issues: &mut IssueCounts) -> Vec<QcmQuestion> {
    match value {
        Value::Object(map) => {
            let tag = map.get("type").and_then(Value::as_str);
            if let Some(questions) = map.get("questions").and_then(Value::as_array) {
                if tag != Some("qcm") {
                    issues.record(Issue::MissingTypeTag);
                }
                questions
                    .iter()
                    .enumerate()
                    .map(|(i, q)| normalize_question(q, i, issues))
                    .collect()
            } else if map.get("options").is_some_and(Value::is_array) {
                // Single-question legacy shape: the object itself is the question
                if tag != Some("qcm") {
                    issues.record(Issue::MissingTypeTag);
                } else {
                    issues.record(Issue::MalformedStructure);
                }
                vec![normalize_question(value, 0, issues)]
            } else {
                issues.record(Issue::MalformedStructure);
                vec![placeholder_question()]
            }
        }
        // Bare questions array, the wrapper object and tag were never written
        Value::Array(items) => {
            issues.record(Issue::MissingTypeTag);
            items
                .iter()
                .enumerate()
                .map(|(i, q)| normalize_question(q, i, issues))
                .collect()
        }
        _ => {
            issues.record(Issue::MalformedStructure);
            vec![placeholder_question()]
        }
    }
}

/// Per-question validation and repair, identical for every source shape.
/// `index` is zero-based; placeholders are derived from the 1-based position.
fn normalize_question(question: &Value, index: usize, issues: &mut IssueCounts) -> QcmQuestion {
    let empty = serde_json::Map::new();
    let (map, malformed_item) = match question.as_object() {
        Some(map) => (map, false),
        None => (&empty, true),
    };

    // The earliest authoring tool wrote "question" instead of "texte"
    let texte_value = map.get("texte").or_else(|| map.get("question"));
    let texte = texte_value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .unwrap_or_else(|| {
            issues.record(Issue::MissingQuestionText);
            format!("Question {}", index + 1)
        });

    let mut structure_flag = malformed_item;
    let mut options: Vec<String> = Vec::new();
    match map.get("options") {
        Some(Value::Array(items)) => {
            for item in items {
                match item {
                    Value::String(s) => options.push(s.clone()),
                    // Scalar garbage keeps its text form rather than being dropped
                    Value::Number(n) => {
                        structure_flag = true;
                        options.push(n.to_string());
                    }
                    Value::Bool(b) => {
                        structure_flag = true;
                        options.push(b.to_string());
                    }
                    _ => structure_flag = true,
                }
            }
        }
        Some(_) => structure_flag = true,
        None => structure_flag = true,
    }
    if structure_flag {
        issues.record(Issue::MalformedStructure);
    }

    if options.len() < 2 {
        issues.record(Issue::InsufficientOptions);
        while options.len() < 2 {
            options.push(format!("Option {}", options.len() + 1));
        }
    }

    let len = options.len() as i64;
    let reponse_correcte = match map.get("reponse_correcte").and_then(Value::as_i64) {
        Some(i) if (0..len).contains(&i) => i,
        _ => {
            issues.record(Issue::InvalidCorrectIndex);
            0
        }
    };

    QcmQuestion {
        texte,
        options,
        reponse_correcte,
    }
}

fn placeholder_question() -> QcmQuestion {
    QcmQuestion {
        texte: TEXTE_INVALIDE.to_owned(),
        options: vec!["Option 1".to_owned(), "Option 2".to_owned()],
        reponse_correcte: 0,
    }
}

#[derive(Clone, Debug)]
pub struct NormalizedReponse {
    pub reponse: ReponseCanonique,
    pub issues: IssueCounts,
}

impl NormalizedReponse {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.reponse)?)
    }
}

/// Map an arbitrary answer payload to `{selectedOption, selectedOptionText}`.
///
/// Legacy rows are sometimes a JSON-encoded string that itself contains a JSON
/// document; one level of that double-encoding is unwrapped before the shape
/// check. This never fails: unreadable input is wrapped as free text.
pub fn normalize_answer_payload(raw: &str) -> NormalizedReponse {
    let mut issues = IssueCounts::default();

    let value = match serde_json::from_str::<Value>(raw) {
        Ok(value) => value,
        Err(_) => {
            issues.record(Issue::InvalidJson);
            return NormalizedReponse {
                reponse: wrap_text(raw),
                issues,
            };
        }
    };

    let value = match value {
        Value::String(inner) => match serde_json::from_str::<Value>(&inner) {
            Ok(nested) if nested.is_object() || nested.is_array() => {
                issues.record(Issue::DoubleEncoded);
                nested
            }
            // A quoted plain-text answer, not double-encoding
            _ => {
                issues.record(Issue::MalformedStructure);
                return NormalizedReponse {
                    reponse: wrap_text(&inner),
                    issues,
                };
            }
        },
        other => other,
    };

    let reponse = match value.as_object() {
        Some(map)
            if map.contains_key("selectedOption") || map.contains_key("selectedOptionText") =>
        {
            let selected_option = match map.get("selectedOption").and_then(Value::as_i64) {
                Some(i) if i >= 0 => i,
                _ => {
                    issues.record(Issue::MalformedStructure);
                    0
                }
            };
            let selected_option_text = match map.get("selectedOptionText") {
                Some(Value::String(s)) => s.clone(),
                Some(other) => {
                    issues.record(Issue::MalformedStructure);
                    other.to_string()
                }
                None => {
                    issues.record(Issue::MalformedStructure);
                    String::new()
                }
            };
            ReponseCanonique {
                selected_option,
                selected_option_text,
            }
        }
        _ => {
            issues.record(Issue::MalformedStructure);
            wrap_text(&value.to_string())
        }
    };

    NormalizedReponse { reponse, issues }
}

fn wrap_text(text: &str) -> ReponseCanonique {
    ReponseCanonique {
        selected_option: 0,
        selected_option_text: text.to_owned(),
    }
}

/// Authoring-path write: normalize strictly, then persist the canonical form.
pub async fn save_qcm_activite(
    db: &Db,
    seance_id: i32,
    titre: &str,
    raw: &str,
) -> Result<i32> {
    let normalized = normalize_qcm_content(raw, NormalizeMode::Ecriture)?;
    if normalized.issues.total() > 0 {
        tracing::warn!(
            "QCM content for seance={seance_id} repaired at write time ({} issue(s))",
            normalized.issues.total()
        );
    }
    db.create_activite(seance_id, titre, "qcm", &normalized.to_json()?)
        .await
}

/// Persist a non-QCM payload with its type column derived from the variant.
pub async fn save_activite(
    db: &Db,
    seance_id: i32,
    titre: &str,
    contenu: &ContenuActivite,
) -> Result<i32> {
    db.create_activite(
        seance_id,
        titre,
        contenu.type_name(),
        &serde_json::to_string(contenu)?,
    )
    .await
}

/// Record a learner's answer in canonical form.
pub async fn save_reponse(db: &Db, user_id: i32, activite_id: i32, raw: &str) -> Result<()> {
    let normalized = normalize_answer_payload(raw);
    db.upsert_reponse(user_id, activite_id, &normalized.to_json()?)
        .await
}
