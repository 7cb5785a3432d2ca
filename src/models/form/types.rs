use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Wall-clock format of slot expiry, as produced by `<input type="datetime-local">`.
pub const EXPIRY_FORMAT: &str = "%Y-%m-%dT%H:%M";

/// One bookable slot of a form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slot {
    pub name: String,
    #[serde(rename = "limit")]
    pub capacity: u32,
    #[serde(rename = "date", with = "expiry_format")]
    pub expiry: NaiveDateTime,
}

impl Slot {
    pub fn is_expired(&self, now: NaiveDateTime) -> bool {
        now >= self.expiry
    }

    pub fn expiry_display(&self) -> String {
        self.expiry.format(EXPIRY_FORMAT).to_string()
    }
}

/// Metadata for one booking form, persisted in `forms.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormRecord {
    #[serde(rename = "class_name")]
    pub title: String,
    pub form_id: String,
    pub form_url: String,
    pub form_edit_url: String,
    pub slots: Vec<Slot>,
    #[serde(default)]
    pub meet_link: String,
    #[serde(rename = "notes", default)]
    pub notes_url: String,
    #[serde(default)]
    pub sheet_url: String,
    /// Deployment id of the rule engine; empty until deployed.
    #[serde(alias = "script_id", default)]
    pub engine_id: String,
    /// Number of response rows the engine has already taken in.
    #[serde(default)]
    pub rows_seen: usize,
    /// Choice labels last pushed to the form.
    #[serde(default)]
    pub last_choices: Vec<String>,
}

impl FormRecord {
    pub fn new(title: &str, form_id: &str, slots: Vec<Slot>) -> Self {
        Self {
            title: title.to_string(),
            form_id: form_id.to_string(),
            form_url: format!("https://docs.google.com/forms/d/{form_id}/viewform"),
            form_edit_url: format!("https://docs.google.com/forms/d/{form_id}/edit"),
            slots,
            meet_link: String::new(),
            notes_url: String::new(),
            sheet_url: String::new(),
            engine_id: String::new(),
            rows_seen: 0,
            last_choices: Vec::new(),
        }
    }

    pub fn slot(&self, name: &str) -> Option<&Slot> {
        self.slots.iter().find(|s| s.name == name)
    }

    pub fn is_deployed(&self) -> bool {
        !self.engine_id.is_empty()
    }

    /// Spreadsheet id parsed out of `sheet_url`, if one is recorded.
    pub fn sheet_id(&self) -> Option<&str> {
        let (_, rest) = self.sheet_url.split_once("/d/")?;
        let id = rest.split('/').next()?;
        if id.is_empty() { None } else { Some(id) }
    }
}

pub fn sheet_url_for(sheet_id: &str) -> String {
    format!("https://docs.google.com/spreadsheets/d/{sheet_id}/edit")
}

mod expiry_format {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::EXPIRY_FORMAT;

    pub fn serialize<S: Serializer>(value: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&value.format(EXPIRY_FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(d)?;
        super::super::parse_expiry(&raw).map_err(serde::de::Error::custom)
    }
}
