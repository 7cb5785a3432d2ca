//! Outbound calls to the form, spreadsheet and file-storage services.
//!
//! Handlers and the rule engine only see the [`Workspace`] trait; the live
//! implementation is [`GoogleWorkspace`].

pub mod client;
pub mod token;

use async_trait::async_trait;
use std::fmt;

use crate::models::submission::SheetTable;

pub use client::GoogleWorkspace;
pub use token::TokenCache;

pub const SLOT_QUESTION_TITLE: &str = "Choose a Slot";

#[derive(Debug)]
pub enum ServiceError {
    Http(reqwest::Error),
    Status { service: &'static str, status: u16, body: String },
    NoIdentity,
    MissingLinkedSheet(String),
    MissingSlotQuestion(String),
    Unexpected(String),
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceError::Http(e) => write!(f, "request failed: {e}"),
            ServiceError::Status { service, status, body } => {
                write!(f, "{service} returned HTTP {status}: {body}")
            }
            ServiceError::NoIdentity => write!(f, "no cloud identity is connected"),
            ServiceError::MissingLinkedSheet(_) => write!(
                f,
                "Could not find linked Google Sheet. Link the form to a Sheet in Google Forms > Responses."
            ),
            ServiceError::MissingSlotQuestion(id) => {
                write!(f, "form {id} has no slot choice question")
            }
            ServiceError::Unexpected(msg) => write!(f, "unexpected response: {msg}"),
        }
    }
}

impl From<reqwest::Error> for ServiceError {
    fn from(e: reqwest::Error) -> Self {
        ServiceError::Http(e)
    }
}

/// The single-choice question that carries the slot options.
#[derive(Debug, Clone, PartialEq)]
pub struct ChoiceQuestion {
    pub item_id: String,
    pub question_id: String,
    pub title: String,
    pub index: usize,
    pub options: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FormInfo {
    pub form_id: String,
    pub title: String,
    pub linked_sheet_id: Option<String>,
    pub slot_question: Option<ChoiceQuestion>,
}

#[async_trait]
pub trait Workspace: Send + Sync {
    /// Copy the master form; returns the new form's id.
    async fn copy_form(&self, master_form_id: &str, name: &str) -> Result<String, ServiceError>;

    /// Set the form title and insert the required slot question at the top.
    async fn create_slot_question(&self, form_id: &str, title: &str, choices: &[String]) -> Result<(), ServiceError>;

    async fn get_form(&self, form_id: &str) -> Result<FormInfo, ServiceError>;

    /// Replace the whole option list of the slot question.
    async fn set_choices(&self, form_id: &str, question: &ChoiceQuestion, choices: &[String]) -> Result<(), ServiceError>;

    async fn set_accepting_responses(&self, form_id: &str, accepting: bool) -> Result<(), ServiceError>;

    /// Header row plus data rows of the first tab.
    async fn read_sheet(&self, sheet_id: &str) -> Result<SheetTable, ServiceError>;

    /// Write one cell; `row` is 1-based, `col` 0-based.
    async fn write_cell(&self, sheet_id: &str, row: usize, col: usize, value: &str) -> Result<(), ServiceError>;

    /// Upload a PDF and return its file id.
    async fn upload_pdf(&self, filename: &str, bytes: Vec<u8>) -> Result<String, ServiceError>;

    /// Anyone with the link may read.
    async fn share_public(&self, file_id: &str) -> Result<(), ServiceError>;

    async fn delete_file(&self, file_id: &str) -> Result<(), ServiceError>;

    /// Drop any cached credentials after the identity file was removed or replaced.
    async fn forget_identity(&self) {}

    async fn linked_sheet_id(&self, form_id: &str) -> Result<String, ServiceError> {
        self.get_form(form_id)
            .await?
            .linked_sheet_id
            .ok_or_else(|| ServiceError::MissingLinkedSheet(form_id.to_string()))
    }
}

/// Direct download link for a shared file.
pub fn download_url(file_id: &str) -> String {
    format!("https://drive.google.com/uc?id={file_id}&export=download")
}
