//! Response-sheet rows as the rule engine sees them.
//!
//! The sheet is owned by the form service; the engine only reads the contact and
//! slot columns and writes the `Status` and `ExpiryNotified` columns.

pub const COL_EMAIL: &str = "Email Address";
pub const COL_PHONE: &str = "Mobile Number";
pub const COL_SLOT: &str = "Choose a Slot";
pub const COL_STATUS: &str = "Status";
pub const COL_NOTIFIED: &str = "ExpiryNotified";

pub const STATUS_DUPLICATE: &str = "Duplicate";
pub const STATUS_CANCELLED: &str = "Cancelled";
pub const NOTIFIED_YES: &str = "YES";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowStatus {
    Active,
    Duplicate,
    Cancelled,
}

impl RowStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "duplicate" => RowStatus::Duplicate,
            "cancelled" => RowStatus::Cancelled,
            _ => RowStatus::Active,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RowStatus::Active => "",
            RowStatus::Duplicate => STATUS_DUPLICATE,
            RowStatus::Cancelled => STATUS_CANCELLED,
        }
    }

    /// Active rows are the only ones that hold a place in a slot.
    pub fn is_active(&self) -> bool {
        matches!(self, RowStatus::Active)
    }
}

/// Normalized contact identity of a registrant.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ContactKey {
    pub phone: String,
    pub email: String,
}

impl ContactKey {
    pub fn new(phone: &str, email: &str) -> Self {
        Self { phone: normalize_phone(phone), email: normalize_email(email) }
    }

    /// Parse a single lookup value typed by the administrator: an email if it
    /// contains '@', otherwise a phone number.
    pub fn from_lookup(value: &str) -> Self {
        if value.contains('@') {
            Self::new("", value)
        } else {
            Self::new(value, "")
        }
    }

    pub fn is_empty(&self) -> bool {
        self.phone.is_empty() && self.email.is_empty()
    }

    /// Same person when either the phone or the email matches. Empty values never match.
    pub fn matches(&self, other: &ContactKey) -> bool {
        (!self.phone.is_empty() && self.phone == other.phone)
            || (!self.email.is_empty() && self.email == other.email)
    }
}

pub fn normalize_phone(raw: &str) -> String {
    let trimmed = raw.trim();
    let mut out = String::with_capacity(trimmed.len());
    for (i, c) in trimmed.chars().enumerate() {
        if c.is_ascii_digit() || (i == 0 && c == '+') {
            out.push(c);
        }
    }
    out
}

pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Strip the trailing "(N left)" style annotation from a chosen slot label.
pub fn normalize_slot(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.ends_with(')') {
        if let Some(open) = trimmed.rfind('(') {
            return trimmed[..open].trim_end().to_string();
        }
    }
    trimmed.to_string()
}

/// One data row of the response sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionRow {
    /// 1-based sheet row number (the header is row 1).
    pub row_number: usize,
    pub contact: ContactKey,
    /// Phone exactly as typed, used as the gateway recipient.
    pub phone_raw: String,
    pub slot_raw: String,
    pub status: RowStatus,
    pub notified: bool,
}

impl SubmissionRow {
    pub fn slot(&self) -> String {
        normalize_slot(&self.slot_raw)
    }
}

/// Raw values of the first sheet tab: a header row followed by data rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SheetTable {
    pub headers: Vec<String>,
    pub values: Vec<Vec<String>>,
}

impl SheetTable {
    pub fn from_values(mut values: Vec<Vec<String>>) -> Self {
        if values.is_empty() {
            return Self::default();
        }
        let headers = values.remove(0).into_iter().map(|h| h.trim().to_string()).collect();
        Self { headers, values }
    }

    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn cell(&self, row: &[String], col: Option<usize>) -> String {
        col.and_then(|c| row.get(c)).map(|v| v.trim().to_string()).unwrap_or_default()
    }

    pub fn rows(&self) -> Vec<SubmissionRow> {
        let phone = self.column(COL_PHONE);
        let email = self.column(COL_EMAIL);
        let slot = self.column(COL_SLOT);
        let status = self.column(COL_STATUS);
        let notified = self.column(COL_NOTIFIED);

        self.values
            .iter()
            .enumerate()
            .map(|(i, row)| {
                let phone_raw = self.cell(row, phone);
                SubmissionRow {
                    row_number: i + 2,
                    contact: ContactKey::new(&phone_raw, &self.cell(row, email)),
                    phone_raw,
                    slot_raw: self.cell(row, slot),
                    status: RowStatus::parse(&self.cell(row, status)),
                    notified: self.cell(row, notified) == NOTIFIED_YES,
                }
            })
            .collect()
    }

    /// Rows as header/value pairs for display; short rows are padded with blanks.
    pub fn records(&self) -> Vec<Vec<(String, String)>> {
        self.values
            .iter()
            .map(|row| {
                self.headers
                    .iter()
                    .enumerate()
                    .map(|(i, h)| (h.clone(), row.get(i).cloned().unwrap_or_default()))
                    .collect()
            })
            .collect()
    }
}

/// A1-notation column letters for a 0-based column index (0 → A, 26 → AA).
pub fn column_letter(index: usize) -> String {
    let mut n = index + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push((b'A' + rem as u8) as char);
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> SheetTable {
        let raw = vec![
            vec!["Timestamp", "Email Address", "Mobile Number", "Choose a Slot", "Status"],
            vec!["t1", "A@Example.com ", "98765 43210", "Morning (2 left)", ""],
            vec!["t2", "b@example.com", "+91-11111", "Evening", "Cancelled"],
            vec!["t3", "c@example.com"],
        ];
        SheetTable::from_values(
            raw.into_iter()
                .map(|r| r.into_iter().map(String::from).collect())
                .collect(),
        )
    }

    #[test]
    fn rows_pick_columns_by_header() {
        let rows = table().rows();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].row_number, 2);
        assert_eq!(rows[0].contact.email, "a@example.com");
        assert_eq!(rows[0].contact.phone, "9876543210");
        assert_eq!(rows[0].slot(), "Morning");
        assert_eq!(rows[1].status, RowStatus::Cancelled);
        assert_eq!(rows[1].contact.phone, "+9111111");
        assert_eq!(rows[2].slot_raw, "");
        assert!(!rows[2].notified);
    }

    #[test]
    fn normalize_slot_strips_only_trailing_annotation() {
        assert_eq!(normalize_slot("Morning (3 left)"), "Morning");
        assert_eq!(normalize_slot("  Evening  "), "Evening");
        assert_eq!(normalize_slot("Lab (B) (1 left)"), "Lab (B)");
    }

    #[test]
    fn contact_matches_on_phone_or_email() {
        let a = ContactKey::new("123", "x@y.z");
        assert!(a.matches(&ContactKey::new("123", "other@y.z")));
        assert!(a.matches(&ContactKey::new("", "X@Y.Z")));
        assert!(!a.matches(&ContactKey::new("456", "")));
        assert!(!ContactKey::default().matches(&ContactKey::default()));
    }

    #[test]
    fn lookup_detects_email() {
        assert_eq!(ContactKey::from_lookup("a@b.c").email, "a@b.c");
        assert_eq!(ContactKey::from_lookup(" 555 1234 ").phone, "5551234");
    }

    #[test]
    fn column_letters() {
        assert_eq!(column_letter(0), "A");
        assert_eq!(column_letter(25), "Z");
        assert_eq!(column_letter(26), "AA");
        assert_eq!(column_letter(27), "AB");
    }

    #[test]
    fn records_pad_short_rows() {
        let records = table().records();
        assert_eq!(records[2].len(), 5);
        assert_eq!(records[2][3], ("Choose a Slot".to_string(), String::new()));
    }
}
