pub mod locks;
pub mod notify;
pub mod provision;
pub mod rules;
pub mod scheduler;

use chrono::{Local, NaiveDateTime};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::GatewayConfig;
use crate::google::{ServiceError, Workspace};
use crate::models::form::{FormRecord, FormStore, StoreError, sheet_url_for};
use crate::models::submission::{
    COL_NOTIFIED, COL_STATUS, ContactKey, NOTIFIED_YES, RowStatus, STATUS_CANCELLED,
    STATUS_DUPLICATE, SheetTable, SubmissionRow,
};

use locks::FormLocks;
use notify::{GatewayRequest, Message, Notifier};
use rules::SlotTally;

#[derive(Debug)]
pub enum EngineError {
    Service(ServiceError),
    Store(StoreError),
    FormNotFound(String),
    NotDeployed(String),
    NoOpenSlots,
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::Service(e) => write!(f, "{e}"),
            EngineError::Store(e) => write!(f, "{e}"),
            EngineError::FormNotFound(_) => write!(f, "Form not found."),
            EngineError::NotDeployed(_) => write!(f, "The slot engine is not deployed for this form."),
            EngineError::NoOpenSlots => write!(f, "No valid slots available to display."),
        }
    }
}

impl From<ServiceError> for EngineError {
    fn from(e: ServiceError) -> Self {
        EngineError::Service(e)
    }
}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(id) => EngineError::FormNotFound(id),
            other => EngineError::Store(other),
        }
    }
}

/// Current wall-clock time, the clock slot expiries are written in.
pub fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}

/// What one engine pass did to a form.
#[derive(Debug, Default, PartialEq)]
pub struct PassReport {
    pub duplicates: usize,
    pub accepted: usize,
    pub reminders: usize,
    pub choices_pushed: bool,
}

#[derive(Debug, PartialEq)]
pub enum CancelOutcome {
    Cancelled { row_number: usize, slot: String },
    NotFound,
    NoData,
}

impl CancelOutcome {
    pub fn message(&self, lookup: &str) -> String {
        match self {
            CancelOutcome::Cancelled { .. } => format!("Booking for {lookup} marked as Cancelled."),
            CancelOutcome::NotFound => "Booking not found.".to_string(),
            CancelOutcome::NoData => "No data found.".to_string(),
        }
    }
}

/// Submissions and per-slot totals for the submissions page.
#[derive(Debug, Default)]
pub struct SubmissionsView {
    pub headers: Vec<String>,
    pub records: Vec<Vec<(String, String)>>,
    pub tallies: Vec<SlotTally>,
}

/// The slot rule engine applied to live response sheets.
pub struct Engine {
    store: Arc<FormStore>,
    workspace: Arc<dyn Workspace>,
    notifier: Arc<dyn Notifier>,
    gateway: GatewayConfig,
    locks: FormLocks,
}

impl Engine {
    pub fn new(
        store: Arc<FormStore>,
        workspace: Arc<dyn Workspace>,
        notifier: Arc<dyn Notifier>,
        gateway: GatewayConfig,
    ) -> Self {
        Self { store, workspace, notifier, gateway, locks: FormLocks::new() }
    }

    pub fn store(&self) -> &FormStore {
        &self.store
    }

    pub fn workspace(&self) -> &dyn Workspace {
        self.workspace.as_ref()
    }

    fn load(&self, form_id: &str) -> Result<FormRecord, EngineError> {
        self.store
            .find(form_id)?
            .ok_or_else(|| EngineError::FormNotFound(form_id.to_string()))
    }

    /// Spreadsheet id for the form, looked up from the form service and
    /// remembered in the record when not known yet.
    async fn sheet_id(&self, form: &FormRecord) -> Result<String, EngineError> {
        if let Some(id) = form.sheet_id() {
            return Ok(id.to_string());
        }
        let id = self.workspace.linked_sheet_id(&form.form_id).await?;
        let url = sheet_url_for(&id);
        self.store.update(&form.form_id, |f| f.sheet_url = url)?;
        Ok(id)
    }

    /// Column index of `name`, adding the header cell when the sheet lacks it.
    async fn ensure_column(&self, sheet_id: &str, table: &mut SheetTable, name: &str) -> Result<usize, EngineError> {
        if let Some(col) = table.column(name) {
            return Ok(col);
        }
        let col = table.headers.len();
        self.workspace.write_cell(sheet_id, 1, col, name).await?;
        table.headers.push(name.to_string());
        Ok(col)
    }

    /// Arm the engine for a form: give it a fresh deployment id, rescan the
    /// whole sheet and push the choice list unconditionally.
    pub async fn deploy(&self, form_id: &str, now: NaiveDateTime) -> Result<PassReport, EngineError> {
        let form = self.load(form_id)?;
        self.sheet_id(&form).await?;
        let engine_id = Uuid::new_v4().to_string();
        self.store.update(form_id, |f| {
            f.engine_id = engine_id.clone();
            f.rows_seen = 0;
        })?;
        log::info!("Deployed slot engine {engine_id} for form {form_id}");
        self.refresh(form_id, now).await
    }

    /// Recount and push the choice list now.
    pub async fn refresh(&self, form_id: &str, now: NaiveDateTime) -> Result<PassReport, EngineError> {
        let _guard = self.locks.acquire(form_id).await;
        let form = self.load(form_id)?;
        if !form.is_deployed() {
            return Err(EngineError::NotDeployed(form_id.to_string()));
        }
        self.pass_locked(form, now, true).await
    }

    /// Scheduled pass over one form: intake, regeneration when needed, reminders.
    pub async fn run_pass(&self, form_id: &str, now: NaiveDateTime) -> Result<PassReport, EngineError> {
        let _guard = self.locks.acquire(form_id).await;
        let form = self.load(form_id)?;
        if !form.is_deployed() {
            return Ok(PassReport::default());
        }
        self.pass_locked(form, now, false).await
    }

    /// Run a pass over every deployed form. Failures are logged per form.
    pub async fn run_all(&self, now: NaiveDateTime) {
        let forms = match self.store.load_all() {
            Ok(forms) => forms,
            Err(e) => {
                log::error!("Slot engine: cannot load form metadata: {e}");
                return;
            }
        };
        for form in forms.iter().filter(|f| f.is_deployed()) {
            match self.run_pass(&form.form_id, now).await {
                Ok(report) if report != PassReport::default() => {
                    log::info!("Slot engine pass for {}: {:?}", form.form_id, report);
                }
                Ok(_) => {}
                Err(e) => log::error!("Slot engine pass for {} failed: {e}", form.form_id),
            }
        }
    }

    async fn pass_locked(&self, form: FormRecord, now: NaiveDateTime, force_push: bool) -> Result<PassReport, EngineError> {
        let sheet_id = self.sheet_id(&form).await?;
        let mut table = self.workspace.read_sheet(&sheet_id).await?;
        let mut rows = table.rows();
        let mut report = PassReport::default();

        let intake = rules::intake(&rows, form.rows_seen);
        if !intake.duplicates.is_empty() {
            let col = self.ensure_column(&sheet_id, &mut table, COL_STATUS).await?;
            for &row_number in &intake.duplicates {
                self.workspace.write_cell(&sheet_id, row_number, col, STATUS_DUPLICATE).await?;
                mark(&mut rows, row_number, RowStatus::Duplicate);
            }
        }
        report.duplicates = intake.duplicates.len();
        report.accepted = intake.accepted;

        // Reminders and the watermark do not depend on the choice push.
        let (choices, push_error) = match self.push_choices(&form, &rows, now, force_push).await {
            Ok(choices) => (choices, None),
            Err(e) => (None, Some(e)),
        };
        report.choices_pushed = choices.is_some();

        report.reminders = self.send_reminders(&form, &sheet_id, &mut table, &rows, now).await?;

        let seen = rows.len();
        self.store.update(&form.form_id, |f| {
            f.rows_seen = seen;
            if let Some(choices) = choices {
                f.last_choices = choices;
            }
        })?;
        match push_error {
            Some(e) => Err(e),
            None => Ok(report),
        }
    }

    /// Regenerate the choice list; push it when it changed or when forced.
    /// Returns the pushed list.
    async fn push_choices(
        &self,
        form: &FormRecord,
        rows: &[SubmissionRow],
        now: NaiveDateTime,
        force: bool,
    ) -> Result<Option<Vec<String>>, EngineError> {
        let regen = rules::regenerate(&form.slots, &rules::live_counts(rows), now);
        if !force && regen.choices == form.last_choices {
            return Ok(None);
        }
        let info = self.workspace.get_form(&form.form_id).await?;
        let question = info
            .slot_question
            .ok_or_else(|| ServiceError::MissingSlotQuestion(form.form_id.clone()))?;
        self.workspace.set_choices(&form.form_id, &question, &regen.choices).await?;
        self.workspace.set_accepting_responses(&form.form_id, regen.accepting).await?;
        Ok(Some(regen.choices))
    }

    /// Notify registrants whose slot has expired. The row is marked before the
    /// gateway call; a row that cannot be marked is skipped until a later pass.
    /// A failed gateway call is only logged, so each row is reminded at most once.
    async fn send_reminders(
        &self,
        form: &FormRecord,
        sheet_id: &str,
        table: &mut SheetTable,
        rows: &[SubmissionRow],
        now: NaiveDateTime,
    ) -> Result<usize, EngineError> {
        let due = rules::due_reminders(rows, form, now);
        if due.is_empty() {
            return Ok(0);
        }
        let col = self.ensure_column(sheet_id, table, COL_NOTIFIED).await?;
        let message = Message::for_form(form, &self.gateway);
        let mut marked = 0;
        for row in &due {
            if let Err(e) = self.workspace.write_cell(sheet_id, row.row_number, col, NOTIFIED_YES).await {
                log::error!("Cannot mark row {} of form {} as reminded: {e}", row.row_number, form.form_id);
                continue;
            }
            marked += 1;
            let request = GatewayRequest { recipient: row.phone_raw.clone(), message: message.clone() };
            if let Err(e) = self.notifier.send(&request).await {
                log::warn!("Reminder for row {} of form {} failed: {e}", row.row_number, form.form_id);
            }
        }
        Ok(marked)
    }

    /// Cancel the first active booking held by `lookup` (phone or email), then
    /// recount so the freed place is offered again.
    pub async fn cancel_booking(&self, form_id: &str, lookup: &str, now: NaiveDateTime) -> Result<CancelOutcome, EngineError> {
        let _guard = self.locks.acquire(form_id).await;
        let form = self.load(form_id)?;
        let sheet_id = self.sheet_id(&form).await?;
        let mut table = self.workspace.read_sheet(&sheet_id).await?;
        if table.is_empty() {
            return Ok(CancelOutcome::NoData);
        }
        let mut rows = table.rows();
        let contact = ContactKey::from_lookup(lookup);
        let Some((row_number, slot)) = rules::find_cancellable(&rows, &contact)
            .map(|r| (r.row_number, r.slot()))
        else {
            return Ok(CancelOutcome::NotFound);
        };

        let col = self.ensure_column(&sheet_id, &mut table, COL_STATUS).await?;
        self.workspace.write_cell(&sheet_id, row_number, col, STATUS_CANCELLED).await?;
        log::info!("Cancelled booking in row {row_number} of form {form_id}");

        if form.is_deployed() {
            mark(&mut rows, row_number, RowStatus::Cancelled);
            if let Some(choices) = self.push_choices(&form, &rows, now, false).await? {
                self.store.update(form_id, |f| f.last_choices = choices)?;
            }
        }
        Ok(CancelOutcome::Cancelled { row_number, slot })
    }

    /// Rows and per-slot totals of a form's response sheet.
    pub async fn submissions(&self, form: &FormRecord) -> Result<SubmissionsView, EngineError> {
        let sheet_id = self.sheet_id(form).await?;
        let table = self.workspace.read_sheet(&sheet_id).await?;
        let counts = rules::live_counts(&table.rows());
        Ok(SubmissionsView {
            records: table.records(),
            tallies: rules::tally(&form.slots, &counts),
            headers: table.headers,
        })
    }
}

fn mark(rows: &mut [SubmissionRow], row_number: usize, status: RowStatus) {
    if let Some(row) = rows.iter_mut().find(|r| r.row_number == row_number) {
        row.status = status;
    }
}
