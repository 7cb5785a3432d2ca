//! Shared test infrastructure: a temp data directory, an in-memory workspace
//! standing in for the form/sheet/file services, and a recording notifier.
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::NaiveDateTime;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

use slotbook::config::{Config, GatewayConfig};
use slotbook::engine::Engine;
use slotbook::engine::notify::{GatewayRequest, Notifier};
use slotbook::google::{ChoiceQuestion, FormInfo, SLOT_QUESTION_TITLE, ServiceError, Workspace};
use slotbook::models::form::{FormRecord, FormStore, Slot, parse_expiry, sheet_url_for};
use slotbook::models::submission::SheetTable;

// ============================================================================
// TEST CONSTANTS
// ============================================================================

pub const MASTER_FORM_ID: &str = "master-form";
pub const RESPONSE_HEADERS: [&str; 5] = [
    "Timestamp",
    "Email Address",
    "Mobile Number",
    "Choose a Slot",
    "Name",
];

pub fn at(raw: &str) -> NaiveDateTime {
    parse_expiry(raw).expect("valid test timestamp")
}

pub fn slot(name: &str, capacity: u32, expiry: &str) -> Slot {
    Slot { name: name.to_string(), capacity, expiry: at(expiry) }
}

// ============================================================================
// FAKE WORKSPACE
// ============================================================================

#[derive(Debug, Clone)]
pub struct FakeForm {
    pub title: String,
    pub linked_sheet_id: Option<String>,
    pub question: Option<ChoiceQuestion>,
    pub accepting: bool,
}

#[derive(Default)]
pub struct FakeState {
    pub forms: HashMap<String, FakeForm>,
    pub sheets: HashMap<String, Vec<Vec<String>>>,
    pub uploads: HashMap<String, (String, usize)>,
    pub shared: Vec<String>,
    pub deleted: Vec<String>,
    /// File ids whose deletion fails.
    pub fail_delete: HashSet<String>,
    /// Sheet rows (1-based) whose cell writes fail.
    pub fail_write_rows: HashSet<usize>,
    /// When false, copied forms get no response sheet.
    pub link_new_forms: bool,
    pub choice_pushes: usize,
    next_id: usize,
}

impl FakeState {
    fn next(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{}", self.next_id)
    }
}

fn not_found(service: &'static str, id: &str) -> ServiceError {
    ServiceError::Status { service, status: 404, body: format!("{id} not found") }
}

#[derive(Default)]
pub struct FakeWorkspace {
    pub state: Mutex<FakeState>,
}

impl FakeWorkspace {
    pub fn new() -> Self {
        let ws = Self::default();
        ws.state.lock().unwrap().link_new_forms = true;
        ws
    }

    /// A form with a slot question and an empty linked response sheet.
    pub fn add_form(&self, form_id: &str, sheet_id: &str) {
        let mut state = self.state.lock().unwrap();
        state.forms.insert(
            form_id.to_string(),
            FakeForm {
                title: form_id.to_string(),
                linked_sheet_id: Some(sheet_id.to_string()),
                question: Some(ChoiceQuestion {
                    item_id: "item-slot".to_string(),
                    question_id: "q-slot".to_string(),
                    title: SLOT_QUESTION_TITLE.to_string(),
                    index: 0,
                    options: vec![],
                }),
                accepting: true,
            },
        );
        state.sheets.insert(
            sheet_id.to_string(),
            vec![RESPONSE_HEADERS.iter().map(|h| h.to_string()).collect()],
        );
    }

    pub fn add_response(&self, sheet_id: &str, email: &str, phone: &str, slot_label: &str) {
        let mut state = self.state.lock().unwrap();
        let sheet = state.sheets.get_mut(sheet_id).expect("sheet exists");
        sheet.push(vec![
            "2026-01-01 10:00:00".to_string(),
            email.to_string(),
            phone.to_string(),
            slot_label.to_string(),
            "Student".to_string(),
        ]);
    }

    /// Cell by 1-based row and header name; "" when missing.
    pub fn cell(&self, sheet_id: &str, row: usize, header: &str) -> String {
        let state = self.state.lock().unwrap();
        let sheet = &state.sheets[sheet_id];
        let Some(col) = sheet[0].iter().position(|h| h == header) else {
            return String::new();
        };
        sheet
            .get(row - 1)
            .and_then(|r| r.get(col))
            .cloned()
            .unwrap_or_default()
    }

    /// Pad the header row with filler columns up to `width`.
    pub fn widen_sheet(&self, sheet_id: &str, width: usize) {
        let mut state = self.state.lock().unwrap();
        let header = &mut state.sheets.get_mut(sheet_id).expect("sheet exists")[0];
        while header.len() < width {
            header.push(format!("Extra {}", header.len() + 1));
        }
    }

    /// Header name at a 0-based column.
    pub fn header(&self, sheet_id: &str, col: usize) -> Option<String> {
        self.state.lock().unwrap().sheets[sheet_id][0].get(col).cloned()
    }

    pub fn options(&self, form_id: &str) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state.forms[form_id]
            .question
            .as_ref()
            .map(|q| q.options.clone())
            .unwrap_or_default()
    }

    pub fn accepting(&self, form_id: &str) -> bool {
        self.state.lock().unwrap().forms[form_id].accepting
    }

    pub fn choice_pushes(&self) -> usize {
        self.state.lock().unwrap().choice_pushes
    }
}

#[async_trait]
impl Workspace for FakeWorkspace {
    async fn copy_form(&self, master_form_id: &str, name: &str) -> Result<String, ServiceError> {
        let mut state = self.state.lock().unwrap();
        if master_form_id != MASTER_FORM_ID {
            return Err(not_found("drive", master_form_id));
        }
        let form_id = state.next("form");
        let linked_sheet_id = if state.link_new_forms {
            let sheet_id = state.next("sheet");
            state.sheets.insert(
                sheet_id.clone(),
                vec![RESPONSE_HEADERS.iter().map(|h| h.to_string()).collect()],
            );
            Some(sheet_id)
        } else {
            None
        };
        state.forms.insert(
            form_id.clone(),
            FakeForm { title: name.to_string(), linked_sheet_id, question: None, accepting: true },
        );
        Ok(form_id)
    }

    async fn create_slot_question(&self, form_id: &str, title: &str, choices: &[String]) -> Result<(), ServiceError> {
        let mut state = self.state.lock().unwrap();
        let form = state.forms.get_mut(form_id).ok_or_else(|| not_found("forms", form_id))?;
        form.title = title.to_string();
        form.question = Some(ChoiceQuestion {
            item_id: "item-slot".to_string(),
            question_id: "q-slot".to_string(),
            title: SLOT_QUESTION_TITLE.to_string(),
            index: 0,
            options: choices.to_vec(),
        });
        Ok(())
    }

    async fn get_form(&self, form_id: &str) -> Result<FormInfo, ServiceError> {
        let state = self.state.lock().unwrap();
        let form = state.forms.get(form_id).ok_or_else(|| not_found("forms", form_id))?;
        Ok(FormInfo {
            form_id: form_id.to_string(),
            title: form.title.clone(),
            linked_sheet_id: form.linked_sheet_id.clone(),
            slot_question: form.question.clone(),
        })
    }

    async fn set_choices(&self, form_id: &str, _question: &ChoiceQuestion, choices: &[String]) -> Result<(), ServiceError> {
        let mut state = self.state.lock().unwrap();
        state.choice_pushes += 1;
        let form = state.forms.get_mut(form_id).ok_or_else(|| not_found("forms", form_id))?;
        let question = form
            .question
            .as_mut()
            .ok_or_else(|| ServiceError::MissingSlotQuestion(form_id.to_string()))?;
        question.options = choices.to_vec();
        Ok(())
    }

    async fn set_accepting_responses(&self, form_id: &str, accepting: bool) -> Result<(), ServiceError> {
        let mut state = self.state.lock().unwrap();
        let form = state.forms.get_mut(form_id).ok_or_else(|| not_found("forms", form_id))?;
        form.accepting = accepting;
        Ok(())
    }

    async fn read_sheet(&self, sheet_id: &str) -> Result<SheetTable, ServiceError> {
        let state = self.state.lock().unwrap();
        let values = state.sheets.get(sheet_id).ok_or_else(|| not_found("sheets", sheet_id))?;
        Ok(SheetTable::from_values(values.clone()))
    }

    async fn write_cell(&self, sheet_id: &str, row: usize, col: usize, value: &str) -> Result<(), ServiceError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_write_rows.contains(&row) {
            return Err(ServiceError::Status {
                service: "sheets",
                status: 503,
                body: "backend error".to_string(),
            });
        }
        let sheet = state.sheets.get_mut(sheet_id).ok_or_else(|| not_found("sheets", sheet_id))?;
        while sheet.len() < row {
            sheet.push(vec![]);
        }
        let cells = &mut sheet[row - 1];
        while cells.len() <= col {
            cells.push(String::new());
        }
        cells[col] = value.to_string();
        Ok(())
    }

    async fn upload_pdf(&self, filename: &str, bytes: Vec<u8>) -> Result<String, ServiceError> {
        let mut state = self.state.lock().unwrap();
        let file_id = state.next("file");
        state.uploads.insert(file_id.clone(), (filename.to_string(), bytes.len()));
        Ok(file_id)
    }

    async fn share_public(&self, file_id: &str) -> Result<(), ServiceError> {
        self.state.lock().unwrap().shared.push(file_id.to_string());
        Ok(())
    }

    async fn delete_file(&self, file_id: &str) -> Result<(), ServiceError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_delete.contains(file_id) {
            return Err(ServiceError::Status {
                service: "drive",
                status: 500,
                body: "backend error".to_string(),
            });
        }
        let existed = state.forms.remove(file_id).is_some() | state.sheets.remove(file_id).is_some();
        if !existed {
            return Err(not_found("drive", file_id));
        }
        state.deleted.push(file_id.to_string());
        Ok(())
    }
}

// ============================================================================
// FAKE NOTIFIER
// ============================================================================

#[derive(Default)]
pub struct FakeNotifier {
    pub sent: Mutex<Vec<GatewayRequest>>,
    pub fail: Mutex<bool>,
}

impl FakeNotifier {
    pub fn sent(&self) -> Vec<GatewayRequest> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for FakeNotifier {
    async fn send(&self, request: &GatewayRequest) -> Result<(), ServiceError> {
        self.sent.lock().unwrap().push(request.clone());
        if *self.fail.lock().unwrap() {
            return Err(ServiceError::Unexpected("gateway down".to_string()));
        }
        Ok(())
    }
}

// ============================================================================
// ENGINE SETUP
// ============================================================================

pub struct Harness {
    pub dir: TempDir,
    pub config: Config,
    pub store: Arc<FormStore>,
    pub workspace: Arc<FakeWorkspace>,
    pub notifier: Arc<FakeNotifier>,
    pub engine: Arc<Engine>,
}

/// Engine over a temp data directory and the in-memory fakes.
pub fn setup_engine() -> Harness {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let config = Config::for_data_dir(dir.path());
    let store = Arc::new(FormStore::new(config.forms_file()));
    let workspace = Arc::new(FakeWorkspace::new());
    let notifier = Arc::new(FakeNotifier::default());
    let gateway = GatewayConfig::default();
    let engine = Arc::new(Engine::new(
        store.clone(),
        workspace.clone(),
        notifier.clone(),
        gateway,
    ));
    Harness { dir, config, store, workspace, notifier, engine }
}

impl Harness {
    /// Record a form whose response sheet is already linked.
    pub fn seed_form(&self, form_id: &str, sheet_id: &str, slots: Vec<Slot>) -> FormRecord {
        self.workspace.add_form(form_id, sheet_id);
        let mut record = FormRecord::new("Physics", form_id, slots);
        record.sheet_url = sheet_url_for(sheet_id);
        self.store.append(record.clone()).expect("append form");
        record
    }
}
