//! Form lifecycle against the external services: creation from the master
//! template, notes upload, linked-sheet lookup, metadata edits and deletion.

use chrono::NaiveDateTime;
use std::collections::HashMap;
use std::time::Duration;

use super::{Engine, EngineError, PassReport, rules};
use crate::google::{ServiceError, download_url};
use crate::models::form::{FormRecord, Slot, open_slots, sheet_url_for};

/// A PDF posted by the administrator.
#[derive(Debug, Clone)]
pub struct NotesUpload {
    pub filename: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct NewForm {
    pub title: String,
    pub slots: Vec<Slot>,
    pub meet_link: String,
    pub notes: Option<NotesUpload>,
}

#[derive(Debug, Clone)]
pub enum NotesChange {
    Keep,
    Replace(NotesUpload),
    Remove,
}

/// Outcome of one step of a multi-step operation, reported to the administrator as-is.
#[derive(Debug, Clone, PartialEq)]
pub struct StepReport {
    pub ok: bool,
    pub message: String,
}

impl StepReport {
    fn ok(message: impl Into<String>) -> Self {
        Self { ok: true, message: message.into() }
    }

    fn failed(message: impl Into<String>) -> Self {
        Self { ok: false, message: message.into() }
    }
}

impl Engine {
    /// Upload notes, make them link-readable and return the download URL.
    pub async fn upload_notes(&self, notes: NotesUpload) -> Result<String, ServiceError> {
        let file_id = self.workspace.upload_pdf(&notes.filename, notes.bytes).await?;
        self.workspace.share_public(&file_id).await?;
        log::info!("Uploaded notes {} as {file_id}", notes.filename);
        Ok(download_url(&file_id))
    }

    /// Copy the master form, add the slot question and record the new form.
    ///
    /// Fails before touching any service when no slot is open. After creation
    /// waits `settle` for the response sheet link to appear, then records it
    /// if present.
    pub async fn create_form(
        &self,
        master_form_id: &str,
        new: NewForm,
        settle: Duration,
        now: NaiveDateTime,
    ) -> Result<FormRecord, EngineError> {
        if open_slots(&new.slots, now).is_empty() {
            return Err(EngineError::NoOpenSlots);
        }

        let notes_url = match new.notes {
            Some(notes) => self.upload_notes(notes).await?,
            None => String::new(),
        };

        let form_id = self
            .workspace
            .copy_form(master_form_id, &format!("{} Booking Form", new.title))
            .await?;
        let initial = rules::regenerate(&new.slots, &HashMap::new(), now);
        self.workspace
            .create_slot_question(&form_id, &new.title, &initial.choices)
            .await?;

        let mut record = FormRecord::new(&new.title, &form_id, new.slots);
        record.meet_link = new.meet_link.trim().to_string();
        record.notes_url = notes_url;
        record.last_choices = initial.choices;
        self.store.append(record.clone())?;
        log::info!("Created form {form_id} for '{}'", record.title);

        if !settle.is_zero() {
            tokio::time::sleep(settle).await;
        }
        match self.workspace.get_form(&form_id).await {
            Ok(info) => {
                if let Some(sheet_id) = info.linked_sheet_id {
                    let url = sheet_url_for(&sheet_id);
                    record = self.store.update(&form_id, |f| f.sheet_url = url)?;
                }
            }
            Err(e) => log::warn!("Could not look up linked sheet of new form {form_id}: {e}"),
        }
        Ok(record)
    }

    /// Look up the linked response sheet and store its URL.
    pub async fn update_sheet_url(&self, form_id: &str) -> Result<String, EngineError> {
        if self.store.find(form_id)?.is_none() {
            return Err(EngineError::FormNotFound(form_id.to_string()));
        }
        let sheet_id = self.workspace.linked_sheet_id(form_id).await?;
        let url = sheet_url_for(&sheet_id);
        let stored = url.clone();
        self.store.update(form_id, |f| f.sheet_url = stored)?;
        Ok(url)
    }

    /// Change the meeting link and notes. A deployed engine is re-armed so the
    /// new values are in force immediately.
    pub async fn edit_metadata(
        &self,
        form_id: &str,
        meet_link: &str,
        notes: NotesChange,
        now: NaiveDateTime,
    ) -> Result<(FormRecord, Option<PassReport>), EngineError> {
        let current = self
            .store
            .find(form_id)?
            .ok_or_else(|| EngineError::FormNotFound(form_id.to_string()))?;

        let notes_url = match notes {
            NotesChange::Keep => current.notes_url.clone(),
            NotesChange::Remove => String::new(),
            NotesChange::Replace(upload) => self.upload_notes(upload).await?,
        };
        let meet_link = meet_link.trim().to_string();
        let record = self.store.update(form_id, |f| {
            f.meet_link = meet_link;
            f.notes_url = notes_url;
        })?;

        if record.is_deployed() {
            let report = self.deploy(form_id, now).await?;
            let record = self.store.find(form_id)?.unwrap_or(record);
            return Ok((record, Some(report)));
        }
        Ok((record, None))
    }

    /// Delete the form file, its response sheet and its metadata. Each step is
    /// attempted regardless of the others and reported on its own.
    pub async fn delete_form(&self, form_id: &str) -> Vec<StepReport> {
        let mut steps = Vec::new();
        let guard = self.locks.acquire(form_id).await;

        let record = self.store.find(form_id).ok().flatten();
        let sheet_id = match record.as_ref().and_then(|r| r.sheet_id()) {
            Some(id) => Ok(Some(id.to_string())),
            None => self.workspace.get_form(form_id).await.map(|info| info.linked_sheet_id),
        };

        match self.workspace.delete_file(form_id).await {
            Ok(()) => steps.push(StepReport::ok("Form file deleted from Drive.")),
            Err(e) => steps.push(StepReport::failed(format!("Error deleting Form file: {e}"))),
        }

        match sheet_id {
            Ok(Some(sheet_id)) => match self.workspace.delete_file(&sheet_id).await {
                Ok(()) => steps.push(StepReport::ok("Linked Sheet deleted from Drive.")),
                Err(e) => steps.push(StepReport::failed(format!("Error deleting linked Sheet: {e}"))),
            },
            Ok(None) => steps.push(StepReport::ok("No linked Sheet found.")),
            Err(e) => steps.push(StepReport::failed(format!("Error deleting linked Sheet: {e}"))),
        }

        match self.store.remove(form_id) {
            Ok(_) => steps.push(StepReport::ok("Metadata removed.")),
            Err(e) => steps.push(StepReport::failed(format!("Error removing metadata: {e}"))),
        }
        log::info!("Deleted form {form_id}");

        drop(guard);
        self.locks.forget(form_id);
        steps
    }
}
