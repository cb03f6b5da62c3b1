//! Field validation shared by the session builder and history edits.

use crate::error::{IdentityField, ValidationError};
use shared::{ChildIdentity, IdentityForm, MeasurementDraft, MeasurementField, MeasurementRecord};

/// The four measurements after parsing
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurements {
    pub height: f64,
    pub weight_kg: f64,
    pub head_circumference: f64,
    pub body_temperature: f64,
}

impl Measurements {
    pub fn into_record(self, identity: ChildIdentity, timestamp: String) -> MeasurementRecord {
        MeasurementRecord {
            identity,
            height: self.height,
            weight_kg: self.weight_kg,
            head_circumference: self.head_circumference,
            body_temperature: self.body_temperature,
            timestamp,
        }
    }
}

/// Check the identity form and return the trimmed identity.
///
/// Every missing field is reported, not only the first.
pub fn validate_identity(form: &IdentityForm) -> Result<ChildIdentity, Vec<ValidationError>> {
    let mut errors = Vec::new();

    let name = required(&form.name, IdentityField::Name, &mut errors);
    let age_months = required(&form.age_months, IdentityField::AgeMonths, &mut errors);
    if !age_months.is_empty() && !age_months.chars().all(|c| c.is_ascii_digit()) {
        errors.push(ValidationError::InvalidAge(age_months.clone()));
    }
    if form.sex.is_none() {
        errors.push(ValidationError::MissingIdentityField(IdentityField::Sex));
    }
    let mother_name = required(&form.mother_name, IdentityField::MotherName, &mut errors);

    match form.sex {
        Some(sex) if errors.is_empty() => Ok(ChildIdentity {
            name,
            age_months,
            sex,
            mother_name,
        }),
        _ => Err(errors),
    }
}

fn required(value: &str, field: IdentityField, errors: &mut Vec<ValidationError>) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        errors.push(ValidationError::MissingIdentityField(field));
    }
    trimmed.to_string()
}

/// Parse one measurement as typed by the caregiver.
///
/// Accepts surrounding whitespace and a single decimal comma (`"65,2"`).
/// Rejects empty text, anything that is not a finite number, and values
/// that are zero or negative.
pub fn parse_measurement(field: MeasurementField, input: &str) -> Result<f64, ValidationError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::MissingMeasurement(field));
    }

    let not_a_number = || ValidationError::NotANumber {
        field,
        input: input.to_string(),
    };

    let normalized = match trimmed.matches(',').count() {
        0 => trimmed.to_string(),
        1 if !trimmed.contains('.') => trimmed.replace(',', "."),
        _ => return Err(not_a_number()),
    };

    let value: f64 = normalized.parse().map_err(|_| not_a_number())?;
    if !value.is_finite() {
        return Err(not_a_number());
    }
    if value <= 0.0 {
        return Err(ValidationError::NotPositive { field, value });
    }
    Ok(value)
}

/// Parse all four measurements, collecting every problem
pub fn validate_measurements(draft: &MeasurementDraft) -> Result<Measurements, Vec<ValidationError>> {
    let mut errors = Vec::new();
    let mut parse = |field: MeasurementField| match parse_measurement(field, draft.get(field)) {
        Ok(value) => value,
        Err(e) => {
            errors.push(e);
            0.0
        }
    };

    let measurements = Measurements {
        height: parse(MeasurementField::Height),
        weight_kg: parse(MeasurementField::WeightKg),
        head_circumference: parse(MeasurementField::HeadCircumference),
        body_temperature: parse(MeasurementField::BodyTemperature),
    };

    if errors.is_empty() {
        Ok(measurements)
    } else {
        Err(errors)
    }
}
