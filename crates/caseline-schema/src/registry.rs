// SPDX-FileCopyrightText: 2026 Caseline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Practice-area schema registry.
//!
//! Loads a per-category description of the ordered required fields, their
//! type tags, the question templates to ask for each, and the keyword rules
//! used for category detection. The registry is immutable after load.

use std::collections::BTreeMap;

use caseline_core::{AnswerMap, CaselineError};
use serde::Deserialize;
use strum::{Display, EnumString};

/// Type tag driving extraction and validation for a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    FirstName,
    LastName,
    Phone,
    Email,
    Zip,
    Date,
    YesNo,
    Text,
}

/// One field in a practice area's required list.
#[derive(Debug, Clone, Deserialize)]
pub struct FieldDef {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// Server-populated fields (city/state enrichment, compliance tokens)
    /// appear in the lead but must never be asked as questions.
    #[serde(default)]
    pub server_populated: bool,
    /// Default question template. Supports `{first_name}` and
    /// `{name_prefix}` placeholders.
    pub question: String,
    /// Contextual question variants keyed by a keyword matched against the
    /// session's sub-category (e.g. "accident" vs "injury" phrasing).
    #[serde(default)]
    pub variants: BTreeMap<String, String>,
}

/// One legal practice area.
#[derive(Debug, Clone, Deserialize)]
pub struct PracticeArea {
    pub label: String,
    /// Compassionate intro prefixed to the first question after
    /// categorization.
    #[serde(default)]
    pub intro: Option<String>,
    pub fields: Vec<FieldDef>,
}

/// Keyword rule mapping inbound text to a category pair.
#[derive(Debug, Clone, Deserialize)]
pub struct DetectionRule {
    pub keywords: Vec<String>,
    pub main_category: String,
    #[serde(default)]
    pub sub_category: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SchemaFile {
    #[serde(default)]
    detection: Vec<DetectionRule>,
    categories: BTreeMap<String, PracticeArea>,
}

/// Immutable registry of practice areas and detection rules.
///
/// Built once at process start from the embedded schema (or an operator
/// override file) and shared by `Arc`; no per-call file I/O.
#[derive(Debug)]
pub struct SchemaRegistry {
    detection: Vec<DetectionRule>,
    categories: BTreeMap<String, PracticeArea>,
}

const EMBEDDED_SCHEMA: &str = include_str!("../practice_areas.toml");

impl SchemaRegistry {
    /// Load the schema compiled into the binary.
    pub fn embedded() -> Result<Self, CaselineError> {
        Self::from_toml_str(EMBEDDED_SCHEMA)
    }

    /// Load and validate a schema from TOML text.
    pub fn from_toml_str(toml_content: &str) -> Result<Self, CaselineError> {
        let file: SchemaFile = toml::from_str(toml_content)
            .map_err(|e| CaselineError::Schema(format!("invalid practice-area schema: {e}")))?;
        let registry = Self {
            detection: file.detection,
            categories: file.categories,
        };
        registry.validate()?;
        Ok(registry)
    }

    /// Load a schema from an operator-supplied file path.
    pub fn from_path(path: &str) -> Result<Self, CaselineError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            CaselineError::Schema(format!("cannot read schema file {path}: {e}"))
        })?;
        Self::from_toml_str(&content)
    }

    fn validate(&self) -> Result<(), CaselineError> {
        if self.categories.is_empty() {
            return Err(CaselineError::Schema("no practice areas defined".into()));
        }
        for (name, area) in &self.categories {
            if area.fields.is_empty() {
                return Err(CaselineError::Schema(format!(
                    "practice area `{name}` has no fields"
                )));
            }
            let mut seen = std::collections::HashSet::new();
            for field in &area.fields {
                if !seen.insert(field.name.as_str()) {
                    return Err(CaselineError::Schema(format!(
                        "practice area `{name}` has duplicate field `{}`",
                        field.name
                    )));
                }
                if !field.server_populated && field.question.trim().is_empty() {
                    return Err(CaselineError::Schema(format!(
                        "askable field `{}` in `{name}` has no question template",
                        field.name
                    )));
                }
            }
        }
        for rule in &self.detection {
            if !self.categories.contains_key(&rule.main_category) {
                return Err(CaselineError::Schema(format!(
                    "detection rule references unknown category `{}`",
                    rule.main_category
                )));
            }
        }
        Ok(())
    }

    /// Known category names.
    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.categories.keys().map(String::as_str)
    }

    /// Human-readable label for a category.
    pub fn label(&self, category: &str) -> Option<&str> {
        self.categories.get(category).map(|a| a.label.as_str())
    }

    /// Compassionate intro for a category, if configured.
    pub fn intro(&self, category: &str) -> Option<&str> {
        self.categories.get(category).and_then(|a| a.intro.as_deref())
    }

    /// Full ordered field list for a category, server-populated included.
    pub fn required_fields(&self, category: &str) -> Result<&[FieldDef], CaselineError> {
        self.categories
            .get(category)
            .map(|a| a.fields.as_slice())
            .ok_or_else(|| CaselineError::Schema(format!("unknown practice area `{category}`")))
    }

    /// Ordered fields that may be asked as questions.
    pub fn askable_fields(&self, category: &str) -> Result<Vec<&FieldDef>, CaselineError> {
        Ok(self
            .required_fields(category)?
            .iter()
            .filter(|f| !f.server_populated)
            .collect())
    }

    /// Look up one field definition.
    pub fn field(&self, category: &str, name: &str) -> Option<&FieldDef> {
        self.categories
            .get(category)?
            .fields
            .iter()
            .find(|f| f.name == name)
    }

    /// Render the question for a field: selects a contextual variant by
    /// sub-category keyword, then substitutes placeholders from known
    /// answers.
    pub fn question(
        &self,
        category: &str,
        field_name: &str,
        sub_category: Option<&str>,
        answers: &AnswerMap,
    ) -> Result<String, CaselineError> {
        let field = self.field(category, field_name).ok_or_else(|| {
            CaselineError::Schema(format!("unknown field `{field_name}` in `{category}`"))
        })?;
        if field.server_populated {
            return Err(CaselineError::Schema(format!(
                "field `{field_name}` is server-populated and must not be asked"
            )));
        }

        let template = sub_category
            .map(str::to_lowercase)
            .and_then(|sub| {
                field
                    .variants
                    .iter()
                    .find(|(keyword, _)| sub.contains(keyword.as_str()))
                    .map(|(_, variant)| variant.clone())
            })
            .unwrap_or_else(|| field.question.clone());

        Ok(render_template(&template, answers))
    }

    /// Scan a message against the detection rules, first hit wins.
    pub fn detect_category(&self, message: &str) -> Option<(String, Option<String>)> {
        let lowered = message.to_lowercase();
        for rule in &self.detection {
            for keyword in &rule.keywords {
                if lowered.contains(keyword.as_str()) {
                    return Some((rule.main_category.clone(), rule.sub_category.clone()));
                }
            }
        }
        None
    }
}

/// Substitute `{first_name}` and `{name_prefix}` from known answers.
///
/// `{name_prefix}` expands to ", First" when the first name is known and to
/// nothing otherwise, so templates read naturally either way.
fn render_template(template: &str, answers: &AnswerMap) -> String {
    let first_name = answers
        .get("first_name")
        .map(String::as_str)
        .unwrap_or_default();
    let name_prefix = if first_name.is_empty() {
        String::new()
    } else {
        format!(", {first_name}")
    };
    template
        .replace("{name_prefix}", &name_prefix)
        .replace("{first_name}", first_name)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> SchemaRegistry {
        SchemaRegistry::embedded().unwrap()
    }

    #[test]
    fn embedded_schema_loads_and_validates() {
        let reg = registry();
        let cats: Vec<&str> = reg.categories().collect();
        assert!(cats.contains(&"personal_injury"));
        assert!(cats.contains(&"family_law"));
        assert!(cats.contains(&"bankruptcy"));
    }

    #[test]
    fn required_fields_are_ordered() {
        let reg = registry();
        let fields = reg.required_fields("personal_injury").unwrap();
        assert_eq!(fields[0].name, "first_name");
        assert_eq!(fields[1].name, "last_name");
        assert_eq!(fields[2].name, "phone");
    }

    #[test]
    fn askable_fields_exclude_server_populated() {
        let reg = registry();
        let askable = reg.askable_fields("personal_injury").unwrap();
        assert!(askable.iter().all(|f| !f.server_populated));
        assert!(!askable.iter().any(|f| f.name == "city"));
        assert!(!askable.iter().any(|f| f.name == "state"));
    }

    #[test]
    fn detect_category_prefers_specific_rules() {
        let reg = registry();
        let (main, sub) = reg
            .detect_category("I was in a car accident yesterday")
            .unwrap();
        assert_eq!(main, "personal_injury");
        assert_eq!(sub.as_deref(), Some("car accident"));
    }

    #[test]
    fn detect_category_generic_injury_fallback() {
        let reg = registry();
        let (main, sub) = reg.detect_category("I got hurt last month").unwrap();
        assert_eq!(main, "personal_injury");
        assert_eq!(sub.as_deref(), Some("injury"));
    }

    #[test]
    fn detect_category_family_law() {
        let reg = registry();
        let (main, sub) = reg
            .detect_category("I need help filing for divorce")
            .unwrap();
        assert_eq!(main, "family_law");
        assert_eq!(sub.as_deref(), Some("divorce"));
    }

    #[test]
    fn detect_category_none_for_unrelated_text() {
        let reg = registry();
        assert!(reg.detect_category("hello there").is_none());
    }

    #[test]
    fn question_selects_variant_by_sub_category() {
        let reg = registry();
        let answers = AnswerMap::new();

        let q = reg
            .question(
                "personal_injury",
                "date_of_incident",
                Some("car accident"),
                &answers,
            )
            .unwrap();
        assert!(q.contains("accident"), "got: {q}");

        let q = reg
            .question("personal_injury", "date_of_incident", Some("injury"), &answers)
            .unwrap();
        assert!(q.contains("injured"), "got: {q}");

        // No sub-category falls back to the default template.
        let q = reg
            .question("personal_injury", "date_of_incident", None, &answers)
            .unwrap();
        assert!(q.contains("When did this happen"), "got: {q}");
    }

    #[test]
    fn question_substitutes_name_prefix() {
        let reg = registry();
        let mut answers = AnswerMap::new();

        let q = reg
            .question("personal_injury", "last_name", None, &answers)
            .unwrap();
        assert_eq!(q, "Thanks! And your last name?");

        answers.insert("first_name".into(), "Maria".into());
        let q = reg
            .question("personal_injury", "last_name", None, &answers)
            .unwrap();
        assert_eq!(q, "Thanks, Maria! And your last name?");
    }

    #[test]
    fn question_for_server_populated_field_is_rejected() {
        let reg = registry();
        let answers = AnswerMap::new();
        assert!(reg
            .question("personal_injury", "city", None, &answers)
            .is_err());
    }

    #[test]
    fn unknown_category_errors() {
        let reg = registry();
        assert!(reg.required_fields("maritime_law").is_err());
    }

    #[test]
    fn schema_with_duplicate_field_fails_validation() {
        let bad = r#"
            [categories.test]
            label = "Test"
            [[categories.test.fields]]
            name = "phone"
            type = "phone"
            question = "Phone?"
            [[categories.test.fields]]
            name = "phone"
            type = "phone"
            question = "Phone again?"
        "#;
        assert!(SchemaRegistry::from_toml_str(bad).is_err());
    }

    #[test]
    fn detection_rule_against_unknown_category_fails() {
        let bad = r#"
            [[detection]]
            keywords = ["boat"]
            main_category = "maritime_law"

            [categories.test]
            label = "Test"
            [[categories.test.fields]]
            name = "phone"
            type = "phone"
            question = "Phone?"
        "#;
        assert!(SchemaRegistry::from_toml_str(bad).is_err());
    }
}
