//! # Measurement Session Builder
//!
//! A session moves through three states:
//!
//! ```text
//! IdentityStep --advance()--> MeasurementStep --complete_save(Ok)--> persisted
//! ```
//!
//! [`IdentityStep`] gates the identity form. [`MeasurementStep`] is mounted from
//! the [`IdentityHandoff`] and assembles the four measurements, either from a
//! stored template (retrieval mode) or by hand (manual mode).
//!
//! The step itself never awaits. Every async operation is split into a
//! `begin_*` call that records what is outstanding and a `complete_*` call that
//! applies the result. Template fetches carry a [`FetchTicket`]; a result whose
//! ticket is no longer current (newer selection, or the step was unmounted) is
//! discarded instead of applied.

use tracing::{debug, info};

use super::validation::{parse_measurement, validate_identity, validate_measurements, Measurements};
use crate::error::{SessionError, ValidationError};
use shared::{
    AuthStatus, BusyState, ChildIdentity, EntryMode, HistoryEntry, IdentityForm, MeasurementDraft,
    MeasurementField, MeasurementTemplate, Sex, SessionView, UserNotice,
};

/// First screen: collects the child's identity
#[derive(Debug, Clone, Default)]
pub struct IdentityStep {
    form: IdentityForm,
}

impl IdentityStep {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_form(form: IdentityForm) -> Self {
        Self { form }
    }

    pub fn form(&self) -> &IdentityForm {
        &self.form
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.form.name = name.into();
    }

    pub fn set_age_months(&mut self, age_months: impl Into<String>) {
        self.form.age_months = age_months.into();
    }

    pub fn set_sex(&mut self, sex: Option<Sex>) {
        self.form.sex = sex;
    }

    pub fn set_mother_name(&mut self, mother_name: impl Into<String>) {
        self.form.mother_name = mother_name.into();
    }

    pub fn errors(&self) -> Vec<ValidationError> {
        validate_identity(&self.form).err().unwrap_or_default()
    }

    pub fn can_advance(&self) -> bool {
        validate_identity(&self.form).is_ok()
    }

    pub fn advance(&self) -> Result<IdentityHandoff, SessionError> {
        let identity = validate_identity(&self.form).map_err(SessionError::Validation)?;
        IdentityHandoff::encode(&identity)
    }
}

/// Validated identity serialized for the measurement screen
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityHandoff(String);

impl IdentityHandoff {
    pub fn encode(identity: &ChildIdentity) -> Result<Self, SessionError> {
        serde_json::to_string(identity)
            .map(Self)
            .map_err(|e| SessionError::InvalidHandoff(e.to_string()))
    }

    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parse the handoff and check it still satisfies the identity rules
    pub fn decode(&self) -> Result<ChildIdentity, SessionError> {
        let identity: ChildIdentity =
            serde_json::from_str(&self.0).map_err(|e| SessionError::InvalidHandoff(e.to_string()))?;

        let form = IdentityForm {
            name: identity.name,
            age_months: identity.age_months,
            sex: Some(identity.sex),
            mother_name: identity.mother_name,
        };
        validate_identity(&form).map_err(|errors| {
            SessionError::InvalidHandoff(
                errors
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("; "),
            )
        })
    }
}

/// Identifies one outstanding fetch on a [`MeasurementStep`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket {
    sequence: u64,
}

/// What happened to a completed fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    Applied,
    /// The store had nothing at the requested path
    NotFound,
    /// The result arrived after it stopped being relevant
    Discarded,
}

/// Second screen: assembles the measurements for a validated identity
#[derive(Debug, Clone)]
pub struct MeasurementStep {
    identity: ChildIdentity,
    draft: MeasurementDraft,
    mode: EntryMode,
    available_templates: Vec<String>,
    selected_template: Option<String>,
    template_list: Option<u64>,
    template_fetch: Option<u64>,
    fetch_sequence: u64,
    saving: bool,
    notice: Option<UserNotice>,
    persisted: Option<HistoryEntry>,
    mounted: bool,
}

impl MeasurementStep {
    pub fn new(identity: ChildIdentity) -> Self {
        Self {
            identity,
            draft: MeasurementDraft::default(),
            mode: EntryMode::default(),
            available_templates: Vec::new(),
            selected_template: None,
            template_list: None,
            template_fetch: None,
            fetch_sequence: 0,
            saving: false,
            notice: None,
            persisted: None,
            mounted: true,
        }
    }

    pub fn from_handoff(handoff: &IdentityHandoff) -> Result<Self, SessionError> {
        Ok(Self::new(handoff.decode()?))
    }

    pub fn identity(&self) -> &ChildIdentity {
        &self.identity
    }

    pub fn draft(&self) -> &MeasurementDraft {
        &self.draft
    }

    pub fn mode(&self) -> EntryMode {
        self.mode
    }

    pub fn available_templates(&self) -> &[String] {
        &self.available_templates
    }

    pub fn selected_template(&self) -> Option<&str> {
        self.selected_template.as_deref()
    }

    pub fn notice(&self) -> Option<&UserNotice> {
        self.notice.as_ref()
    }

    pub fn persisted(&self) -> Option<&HistoryEntry> {
        self.persisted.as_ref()
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    pub fn busy(&self) -> BusyState {
        if self.saving {
            BusyState::Saving
        } else if self.template_fetch.is_some() {
            BusyState::LoadingTemplate
        } else if self.template_list.is_some() {
            BusyState::LoadingTemplates
        } else {
            BusyState::Idle
        }
    }

    /// Manual edit of one field; rejected once the session is persisted
    pub fn set_field(&mut self, field: MeasurementField, value: impl Into<String>) -> Result<(), SessionError> {
        self.ensure_not_persisted()?;
        self.draft.set(field, value.into());
        Ok(())
    }

    /// Switching modes keeps every entered value
    pub fn set_mode(&mut self, mode: EntryMode) {
        if self.mode != mode {
            debug!("Measurement entry mode {:?} -> {:?}", self.mode, mode);
            self.mode = mode;
        }
    }

    /// Problems with fields that hold text; empty fields are not reported yet
    pub fn field_errors(&self) -> Vec<ValidationError> {
        MeasurementField::ALL
            .iter()
            .filter(|field| !self.draft.get(**field).trim().is_empty())
            .filter_map(|field| parse_measurement(*field, self.draft.get(*field)).err())
            .collect()
    }

    pub fn can_save(&self) -> bool {
        self.persisted.is_none() && self.busy() == BusyState::Idle && validate_measurements(&self.draft).is_ok()
    }

    pub fn begin_template_list(&mut self) -> Result<FetchTicket, SessionError> {
        self.ensure_not_saving()?;
        let ticket = self.next_ticket();
        self.template_list = Some(ticket.sequence);
        Ok(ticket)
    }

    /// Apply the list of template keys and auto-select the first one.
    ///
    /// Returns `Applied` when a template is selected and should be fetched.
    pub fn complete_template_list(
        &mut self,
        ticket: FetchTicket,
        result: Result<Vec<String>, SessionError>,
    ) -> Result<FetchOutcome, SessionError> {
        if !self.mounted || self.persisted.is_some() || self.template_list != Some(ticket.sequence) {
            debug!("Discarding stale template list");
            return Ok(FetchOutcome::Discarded);
        }
        self.template_list = None;

        let keys = match result {
            Ok(keys) => keys,
            Err(e) => {
                self.notice = Some(e.notice());
                return Err(e);
            }
        };

        self.available_templates = keys;
        match self.available_templates.first() {
            None => {
                self.selected_template = None;
                self.notice = Some(UserNotice::info("No data", "No measurement data is available."));
                Ok(FetchOutcome::NotFound)
            }
            Some(first) => {
                let still_listed = self
                    .selected_template
                    .as_ref()
                    .is_some_and(|selected| self.available_templates.contains(selected));
                if !still_listed {
                    self.selected_template = Some(first.clone());
                }
                Ok(FetchOutcome::Applied)
            }
        }
    }

    /// Select a template and mark its fetch as outstanding.
    ///
    /// Any earlier fetch that has not completed yet becomes stale.
    pub fn begin_template_fetch(&mut self, key: &str) -> Result<FetchTicket, SessionError> {
        self.ensure_not_persisted()?;
        self.ensure_not_saving()?;
        let ticket = self.next_ticket();
        self.template_fetch = Some(ticket.sequence);
        self.selected_template = Some(key.to_string());
        self.set_mode(EntryMode::Retrieval);
        Ok(ticket)
    }

    /// Replace all four draft fields with the fetched template
    pub fn complete_template_fetch(
        &mut self,
        ticket: FetchTicket,
        result: Result<Option<MeasurementTemplate>, SessionError>,
    ) -> Result<FetchOutcome, SessionError> {
        if !self.mounted || self.persisted.is_some() || self.template_fetch != Some(ticket.sequence) {
            debug!("Discarding stale template fetch #{}", ticket.sequence);
            return Ok(FetchOutcome::Discarded);
        }
        self.template_fetch = None;

        match result {
            Ok(Some(template)) => {
                self.draft = template.to_draft();
                self.notice = None;
                Ok(FetchOutcome::Applied)
            }
            Ok(None) => {
                self.notice = Some(UserNotice::info("No data", "The selected measurement has no data."));
                Ok(FetchOutcome::NotFound)
            }
            Err(e) => {
                self.notice = Some(e.notice());
                Err(e)
            }
        }
    }

    /// Validate the draft and mark a save as outstanding
    pub fn begin_save(&mut self) -> Result<(ChildIdentity, Measurements), SessionError> {
        self.ensure_not_persisted()?;

        let busy = self.busy();
        if busy != BusyState::Idle {
            return Err(SessionError::Busy(busy));
        }

        let measurements = match validate_measurements(&self.draft) {
            Ok(measurements) => measurements,
            Err(errors) => {
                let error = SessionError::Validation(errors);
                self.notice = Some(error.notice());
                return Err(error);
            }
        };

        self.saving = true;
        self.notice = None;
        Ok((self.identity.clone(), measurements))
    }

    pub fn complete_save(&mut self, result: Result<HistoryEntry, SessionError>) -> Result<HistoryEntry, SessionError> {
        self.saving = false;
        match result {
            Ok(entry) => {
                info!("Measurement session for {} persisted as {}", self.identity.name, entry.id);
                self.persisted = Some(entry.clone());
                self.notice = Some(UserNotice::info("Data saved", "Data was saved to the history."));
                Ok(entry)
            }
            Err(e) => {
                self.notice = Some(e.notice());
                Err(e)
            }
        }
    }

    /// Stop accepting fetch results
    pub fn unmount(&mut self) {
        self.mounted = false;
        self.template_list = None;
        self.template_fetch = None;
    }

    pub fn view(&self, session_id: &str, auth: AuthStatus) -> SessionView {
        SessionView {
            session_id: session_id.to_string(),
            identity: self.identity.clone(),
            draft: self.draft.clone(),
            mode: self.mode,
            available_templates: self.available_templates.clone(),
            selected_template: self.selected_template.clone(),
            field_errors: self.field_errors().iter().map(ValidationError::to_field_error).collect(),
            can_save: self.can_save(),
            busy: self.busy(),
            auth,
            notice: self.notice.clone(),
            persisted_id: self.persisted.as_ref().map(|entry| entry.id.clone()),
        }
    }

    fn next_ticket(&mut self) -> FetchTicket {
        self.fetch_sequence += 1;
        FetchTicket {
            sequence: self.fetch_sequence,
        }
    }

    /// A save in flight fixes the draft that is being written
    fn ensure_not_saving(&self) -> Result<(), SessionError> {
        if self.saving {
            return Err(SessionError::Busy(BusyState::Saving));
        }
        Ok(())
    }

    fn ensure_not_persisted(&self) -> Result<(), SessionError> {
        match &self.persisted {
            Some(entry) => Err(SessionError::AlreadyPersisted(entry.id.clone())),
            None => Ok(()),
        }
    }
}
