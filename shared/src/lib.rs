use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Sex of the child, encoded on the wire with the labels the record store uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sex {
    #[serde(rename = "Laki-laki")]
    Male,
    #[serde(rename = "Perempuan")]
    Female,
}

impl Sex {
    /// Label stored in the `jk` field of a record
    pub fn label(&self) -> &'static str {
        match self {
            Sex::Male => "Laki-laki",
            Sex::Female => "Perempuan",
        }
    }

    /// Parse either the stored label or an English name, ignoring case
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "laki-laki" | "male" => Some(Sex::Male),
            "perempuan" | "female" => Some(Sex::Female),
            _ => None,
        }
    }
}

impl fmt::Display for Sex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Validated identity of the child being measured.
///
/// Field names on the wire follow the record store (`nama`, `umur`, `jk`, `ibu`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildIdentity {
    #[serde(rename = "nama")]
    pub name: String,
    /// Age in months, kept as the text the caregiver typed
    #[serde(rename = "umur")]
    pub age_months: String,
    #[serde(rename = "jk")]
    pub sex: Sex,
    #[serde(rename = "ibu")]
    pub mother_name: String,
}

/// Contents of the identity form before validation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub age_months: String,
    #[serde(default)]
    pub sex: Option<Sex>,
    #[serde(default)]
    pub mother_name: String,
}

/// One of the four anthropometric measurements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeasurementField {
    Height,
    WeightKg,
    HeadCircumference,
    BodyTemperature,
}

impl MeasurementField {
    pub const ALL: [MeasurementField; 4] = [
        MeasurementField::Height,
        MeasurementField::WeightKg,
        MeasurementField::HeadCircumference,
        MeasurementField::BodyTemperature,
    ];

    /// Key of this measurement in a stored record
    pub fn wire_name(&self) -> &'static str {
        match self {
            MeasurementField::Height => "height",
            MeasurementField::WeightKg => "weight_kg",
            MeasurementField::HeadCircumference => "head_circumference",
            MeasurementField::BodyTemperature => "body_temperature",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            MeasurementField::Height => "Height (cm)",
            MeasurementField::WeightKg => "Weight (kg)",
            MeasurementField::HeadCircumference => "Head circumference (cm)",
            MeasurementField::BodyTemperature => "Body temperature (°C)",
        }
    }
}

impl fmt::Display for MeasurementField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// Measurement text being assembled on the measurement screen
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeasurementDraft {
    #[serde(default)]
    pub height: String,
    #[serde(default)]
    pub weight_kg: String,
    #[serde(default)]
    pub head_circumference: String,
    #[serde(default)]
    pub body_temperature: String,
}

impl MeasurementDraft {
    pub fn get(&self, field: MeasurementField) -> &str {
        match field {
            MeasurementField::Height => &self.height,
            MeasurementField::WeightKg => &self.weight_kg,
            MeasurementField::HeadCircumference => &self.head_circumference,
            MeasurementField::BodyTemperature => &self.body_temperature,
        }
    }

    pub fn set(&mut self, field: MeasurementField, value: String) {
        match field {
            MeasurementField::Height => self.height = value,
            MeasurementField::WeightKg => self.weight_kg = value,
            MeasurementField::HeadCircumference => self.head_circumference = value,
            MeasurementField::BodyTemperature => self.body_temperature = value,
        }
    }

    /// True when every field holds some non-whitespace text
    pub fn is_filled(&self) -> bool {
        MeasurementField::ALL
            .iter()
            .all(|field| !self.get(*field).trim().is_empty())
    }
}

/// Pre-populated measurement stored under `measurements/<key>`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeasurementTemplate {
    #[serde(default, deserialize_with = "optional_number_or_string")]
    pub height: Option<f64>,
    #[serde(default, deserialize_with = "optional_number_or_string")]
    pub weight_kg: Option<f64>,
    #[serde(default, deserialize_with = "optional_number_or_string")]
    pub head_circumference: Option<f64>,
    #[serde(default, deserialize_with = "optional_number_or_string")]
    pub body_temperature: Option<f64>,
}

impl MeasurementTemplate {
    /// Render every field as draft text; missing values become empty text
    pub fn to_draft(&self) -> MeasurementDraft {
        let render = |value: Option<f64>| value.map(|v| v.to_string()).unwrap_or_default();
        MeasurementDraft {
            height: render(self.height),
            weight_kg: render(self.weight_kg),
            head_circumference: render(self.head_circumference),
            body_temperature: render(self.body_temperature),
        }
    }
}

/// A completed session as stored under `Riwayat/<id>`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementRecord {
    #[serde(flatten)]
    pub identity: ChildIdentity,
    #[serde(deserialize_with = "number_or_string")]
    pub height: f64,
    #[serde(deserialize_with = "number_or_string")]
    pub weight_kg: f64,
    #[serde(deserialize_with = "number_or_string")]
    pub head_circumference: f64,
    #[serde(deserialize_with = "number_or_string")]
    pub body_temperature: f64,
    /// RFC 3339 timestamp of the save or the last edit
    pub timestamp: String,
}

impl MeasurementRecord {
    pub fn measurement(&self, field: MeasurementField) -> f64 {
        match field {
            MeasurementField::Height => self.height,
            MeasurementField::WeightKg => self.weight_kg,
            MeasurementField::HeadCircumference => self.head_circumference,
            MeasurementField::BodyTemperature => self.body_temperature,
        }
    }
}

/// A persisted record together with its store key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: String,
    #[serde(flatten)]
    pub record: MeasurementRecord,
}

impl HistoryEntry {
    /// Record keys are the epoch milliseconds at creation time
    pub fn generate_id(epoch_millis: i64) -> String {
        epoch_millis.to_string()
    }

    /// Creation time encoded in the key, if the key was generated by [`HistoryEntry::generate_id`]
    pub fn created_millis(&self) -> Result<i64, RecordIdError> {
        self.id
            .parse::<i64>()
            .map_err(|_| RecordIdError::NotEpochMillis(self.id.clone()))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RecordIdError {
    NotEpochMillis(String),
}

impl fmt::Display for RecordIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordIdError::NotEpochMillis(id) => write!(f, "Record id is not epoch milliseconds: {}", id),
        }
    }
}

impl std::error::Error for RecordIdError {}

/// Lifecycle of the anonymous identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthStatus {
    Pending,
    Authenticated,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthStateResponse {
    pub status: AuthStatus,
    pub user_id: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Info,
    Error,
}

/// Message the UI shows to the caregiver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserNotice {
    pub level: NoticeLevel,
    pub title: String,
    pub message: String,
}

impl UserNotice {
    pub fn info(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            title: title.into(),
            message: message.into(),
        }
    }

    pub fn error(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            title: title.into(),
            message: message.into(),
        }
    }
}

/// A single field-level validation problem
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityValidationResponse {
    pub can_advance: bool,
    pub errors: Vec<FieldError>,
    /// Serialized identity to pass to the measurement screen
    pub handoff: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartSessionRequest {
    pub handoff: String,
}

/// How the measurement screen is currently being filled in
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryMode {
    #[default]
    Retrieval,
    Manual,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetModeRequest {
    pub mode: EntryMode,
}

/// Operation the measurement screen is waiting on
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BusyState {
    #[default]
    Idle,
    LoadingTemplates,
    LoadingTemplate,
    Saving,
}

/// Partial manual edit of the draft; absent fields are left untouched
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateDraftRequest {
    pub height: Option<String>,
    pub weight_kg: Option<String>,
    pub head_circumference: Option<String>,
    pub body_temperature: Option<String>,
}

impl UpdateDraftRequest {
    pub fn edits(self) -> Vec<(MeasurementField, String)> {
        [
            (MeasurementField::Height, self.height),
            (MeasurementField::WeightKg, self.weight_kg),
            (MeasurementField::HeadCircumference, self.head_circumference),
            (MeasurementField::BodyTemperature, self.body_temperature),
        ]
        .into_iter()
        .filter_map(|(field, value)| value.map(|v| (field, v)))
        .collect()
    }
}

/// Screens the UI can be told to navigate to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Screen {
    Identity,
    Measurement,
    History,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionView {
    pub session_id: String,
    pub identity: ChildIdentity,
    pub draft: MeasurementDraft,
    pub mode: EntryMode,
    pub available_templates: Vec<String>,
    pub selected_template: Option<String>,
    pub field_errors: Vec<FieldError>,
    pub can_save: bool,
    pub busy: BusyState,
    pub auth: AuthStatus,
    pub notice: Option<UserNotice>,
    pub persisted_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveSessionResponse {
    pub entry: HistoryEntry,
    pub navigate_to: Screen,
    pub notice: UserNotice,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryListResponse {
    pub entries: Vec<HistoryEntry>,
    pub total: usize,
    pub query: Option<String>,
}

/// Full replacement of a history record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditHistoryRequest {
    pub identity: IdentityForm,
    pub measurements: MeasurementDraft,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteRequestResponse {
    pub id: String,
    pub confirmation_token: String,
    pub prompt: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmDeleteRequest {
    pub confirmation_token: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NutritionInfo {
    pub id: u32,
    pub name: String,
    /// Grams per serving
    pub protein: f64,
    pub carbohydrate: f64,
    pub fat: f64,
    pub fiber: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NutritionListResponse {
    pub items: Vec<NutritionInfo>,
}

/// Body of every error response from the REST layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub kind: String,
    pub message: String,
    pub notice: Option<UserNotice>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub field_errors: Vec<FieldError>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LenientNumber {
    Number(f64),
    Text(String),
}

impl LenientNumber {
    fn into_f64<E: serde::de::Error>(self) -> Result<f64, E> {
        let value = match self {
            LenientNumber::Number(value) => value,
            LenientNumber::Text(text) => text
                .trim()
                .replace(',', ".")
                .parse::<f64>()
                .map_err(|e| E::custom(format!("invalid numeric text {:?}: {}", text, e)))?,
        };
        if !value.is_finite() {
            return Err(E::custom(format!("measurement is not a finite number: {}", value)));
        }
        Ok(value)
    }
}

// Older clients stored edited measurements as strings, so both encodings are read.
fn number_or_string<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    LenientNumber::deserialize(deserializer)?.into_f64()
}

fn optional_number_or_string<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<LenientNumber>::deserialize(deserializer)? {
        Some(LenientNumber::Text(text)) if text.trim().is_empty() => Ok(None),
        Some(value) => value.into_f64().map(Some),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_record_json() -> serde_json::Value {
        json!({
            "nama": "Budi",
            "umur": "6",
            "jk": "Laki-laki",
            "ibu": "Sari",
            "height": 65.2,
            "weight_kg": 7.1,
            "head_circumference": 42.0,
            "body_temperature": 36.6,
            "timestamp": "2024-07-01T08:30:00.000Z"
        })
    }

    #[test]
    fn test_record_uses_store_field_names() {
        let record: MeasurementRecord = serde_json::from_value(sample_record_json()).unwrap();
        assert_eq!(record.identity.name, "Budi");
        assert_eq!(record.identity.sex, Sex::Male);
        assert_eq!(record.identity.mother_name, "Sari");
        assert_eq!(record.height, 65.2);

        let encoded = serde_json::to_value(&record).unwrap();
        assert_eq!(encoded, sample_record_json());
    }

    #[test]
    fn test_record_accepts_legacy_string_measurements() {
        let mut value = sample_record_json();
        value["weight_kg"] = json!("7.3");
        value["height"] = json!("66,1");

        let record: MeasurementRecord = serde_json::from_value(value).unwrap();
        assert_eq!(record.weight_kg, 7.3);
        assert_eq!(record.height, 66.1);
    }

    #[test]
    fn test_record_rejects_non_numeric_measurement() {
        let mut value = sample_record_json();
        value["body_temperature"] = json!("warm");

        assert!(serde_json::from_value::<MeasurementRecord>(value).is_err());
    }

    #[test]
    fn test_record_rejects_non_finite_text() {
        for text in ["NaN", "inf", "-infinity"] {
            let mut value = sample_record_json();
            value["height"] = json!(text);
            assert!(serde_json::from_value::<MeasurementRecord>(value).is_err(), "{}", text);
        }

        let template = serde_json::from_value::<MeasurementTemplate>(json!({ "weight_kg": "inf" }));
        assert!(template.is_err());
    }

    #[test]
    fn test_history_entry_flattens_record() {
        let record: MeasurementRecord = serde_json::from_value(sample_record_json()).unwrap();
        let entry = HistoryEntry {
            id: HistoryEntry::generate_id(1_719_822_600_000),
            record,
        };

        let encoded = serde_json::to_value(&entry).unwrap();
        assert_eq!(encoded["id"], "1719822600000");
        assert_eq!(encoded["nama"], "Budi");
        assert_eq!(entry.created_millis().unwrap(), 1_719_822_600_000);
    }

    #[test]
    fn test_created_millis_rejects_foreign_ids() {
        let record: MeasurementRecord = serde_json::from_value(sample_record_json()).unwrap();
        let entry = HistoryEntry {
            id: "-Nx3abc".to_string(),
            record,
        };
        assert!(matches!(entry.created_millis(), Err(RecordIdError::NotEpochMillis(_))));
    }

    #[test]
    fn test_template_to_draft() {
        let template: MeasurementTemplate = serde_json::from_value(json!({
            "height": 65.2,
            "weight_kg": 7.1,
            "head_circumference": 42.0
        }))
        .unwrap();

        let draft = template.to_draft();
        assert_eq!(draft.height, "65.2");
        assert_eq!(draft.weight_kg, "7.1");
        assert_eq!(draft.head_circumference, "42");
        assert_eq!(draft.body_temperature, "");
        assert!(!draft.is_filled());
    }

    #[test]
    fn test_sex_labels() {
        assert_eq!(Sex::from_label("laki-laki"), Some(Sex::Male));
        assert_eq!(Sex::from_label(" Perempuan "), Some(Sex::Female));
        assert_eq!(Sex::from_label("female"), Some(Sex::Female));
        assert_eq!(Sex::from_label("x"), None);
        assert_eq!(serde_json::to_value(Sex::Female).unwrap(), json!("Perempuan"));
    }

    #[test]
    fn test_update_draft_request_edits() {
        let request = UpdateDraftRequest {
            height: Some("70".to_string()),
            body_temperature: Some("36.5".to_string()),
            ..Default::default()
        };
        assert_eq!(
            request.edits(),
            vec![
                (MeasurementField::Height, "70".to_string()),
                (MeasurementField::BodyTemperature, "36.5".to_string()),
            ]
        );
    }
}
