use serde_json::{Map, Value};

use super::types::{ClinicalContext, ContextInput};

impl ContextInput {
    /// Decode context as sent by the intake form. Total: never fails.
    ///
    /// `None` or blank → `Absent`; a JSON object → `Provided`; anything else
    /// (bad JSON, arrays, scalars) → `Unreadable`.
    pub fn from_json(raw: Option<&str>) -> Self {
        let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
            return Self::Absent;
        };
        match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(map)) => Self::Provided(ClinicalContext::from_map(&map)),
            Ok(Value::Null) => Self::Absent,
            Ok(_) => Self::Unreadable,
            Err(e) => {
                tracing::debug!(error = %e, "Clinical context is not valid JSON");
                Self::Unreadable
            }
        }
    }
}

impl ClinicalContext {
    /// Lenient field extraction. Accepts snake_case or camelCase keys, numbers
    /// for scalar fields, and a single string for list fields.
    pub fn from_map(map: &Map<String, Value>) -> Self {
        Self {
            name: scalar(map, &["name", "patient_name", "patientName"]),
            age: scalar(map, &["age"]),
            sex: scalar(map, &["sex", "gender"]),
            location: scalar(map, &["location", "lesion_location", "lesionLocation"]),
            chief_complaint: list(map, &["chief_complaint", "chiefComplaint", "complaints"]),
            history: list(map, &["history", "medical_history", "medicalHistory"]),
            physical_exam: list(map, &["physical_exam", "physicalExam"]),
            blood_pressure: scalar(map, &["blood_pressure", "bloodPressure"]),
            pulse_assessment: scalar(map, &["pulse_assessment", "pulseAssessment", "pulses"]),
            current_management: list(
                map,
                &["current_management", "currentManagement", "management"],
            ),
        }
    }

    /// True when no field carries a value worth rendering.
    pub fn is_empty(&self) -> bool {
        let blank = |v: &Option<String>| v.as_deref().map_or(true, |s| s.trim().is_empty());
        let blank_list = |v: &[String]| v.iter().all(|s| s.trim().is_empty());
        blank(&self.name)
            && blank(&self.age)
            && blank(&self.sex)
            && blank(&self.location)
            && blank_list(&self.chief_complaint)
            && blank_list(&self.history)
            && blank_list(&self.physical_exam)
            && blank(&self.blood_pressure)
            && blank(&self.pulse_assessment)
            && blank_list(&self.current_management)
    }
}

fn lookup<'a>(map: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|k| map.get(*k)).filter(|v| !v.is_null())
}

fn scalar(map: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    lookup(map, keys).and_then(value_to_string)
}

fn list(map: &Map<String, Value>, keys: &[&str]) -> Vec<String> {
    match lookup(map, keys) {
        Some(Value::Array(items)) => items.iter().filter_map(value_to_string).collect(),
        Some(other) => value_to_string(other).into_iter().collect(),
        None => Vec::new(),
    }
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_and_blank_are_absent() {
        assert_eq!(ContextInput::from_json(None), ContextInput::Absent);
        assert_eq!(ContextInput::from_json(Some("   ")), ContextInput::Absent);
        assert_eq!(ContextInput::from_json(Some("null")), ContextInput::Absent);
    }

    #[test]
    fn bad_json_is_unreadable() {
        assert_eq!(ContextInput::from_json(Some("{name: ")), ContextInput::Unreadable);
        assert_eq!(ContextInput::from_json(Some("[1,2]")), ContextInput::Unreadable);
        assert_eq!(ContextInput::from_json(Some("\"text\"")), ContextInput::Unreadable);
    }

    #[test]
    fn empty_object_is_provided_but_empty() {
        let ContextInput::Provided(ctx) = ContextInput::from_json(Some("{}")) else {
            panic!("expected Provided");
        };
        assert!(ctx.is_empty());
    }

    #[test]
    fn camel_and_snake_keys_accepted() {
        let json = r#"{
            "name": "Maria",
            "age": 67,
            "chiefComplaint": ["dor", "edema"],
            "physical_exam": "pulsos pediosos ausentes",
            "bloodPressure": "140/90"
        }"#;
        let ContextInput::Provided(ctx) = ContextInput::from_json(Some(json)) else {
            panic!("expected Provided");
        };
        assert_eq!(ctx.name.as_deref(), Some("Maria"));
        assert_eq!(ctx.age.as_deref(), Some("67"));
        assert_eq!(ctx.chief_complaint, vec!["dor", "edema"]);
        assert_eq!(ctx.physical_exam, vec!["pulsos pediosos ausentes"]);
        assert_eq!(ctx.blood_pressure.as_deref(), Some("140/90"));
        assert!(!ctx.is_empty());
    }

    #[test]
    fn null_and_nested_values_ignored() {
        let json = r#"{"name": null, "history": [null, {"x": 1}, "DM2"], "sex": {"a": 1}}"#;
        let ContextInput::Provided(ctx) = ContextInput::from_json(Some(json)) else {
            panic!("expected Provided");
        };
        assert_eq!(ctx.name, None);
        assert_eq!(ctx.sex, None);
        assert_eq!(ctx.history, vec!["DM2"]);
    }

    #[test]
    fn whitespace_only_fields_count_as_empty() {
        let ctx = ClinicalContext {
            name: Some("  ".into()),
            history: vec!["".into(), " ".into()],
            ..Default::default()
        };
        assert!(ctx.is_empty());
    }
}
