use chrono::NaiveDateTime;

use super::types::{EXPIRY_FORMAT, Slot};

/// Parse an expiry timestamp; seconds are optional.
pub fn parse_expiry(raw: &str) -> Result<NaiveDateTime, String> {
    let trimmed = raw.trim();
    NaiveDateTime::parse_from_str(trimmed, EXPIRY_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S"))
        .map_err(|_| format!("Invalid slot date '{trimmed}' (expected YYYY-MM-DDTHH:MM)"))
}

/// Build slot definitions from the parallel `slot_name[]`, `slot_limit[]` and
/// `slot_date[]` form columns. Rows with a blank name are skipped.
pub fn parse_slots(names: &[String], limits: &[String], dates: &[String]) -> Result<Vec<Slot>, Vec<String>> {
    let mut slots: Vec<Slot> = Vec::new();
    let mut errors = Vec::new();

    for (i, name) in names.iter().enumerate() {
        let name = name.trim();
        if name.is_empty() {
            continue;
        }
        let limit = limits.get(i).map(|s| s.trim()).unwrap_or("");
        let date = dates.get(i).map(|s| s.trim()).unwrap_or("");

        let capacity = match limit.parse::<u32>() {
            Ok(n) => Some(n),
            Err(_) => {
                errors.push(format!("Slot '{name}': capacity must be a whole number, got '{limit}'"));
                None
            }
        };
        let expiry = match parse_expiry(date) {
            Ok(d) => Some(d),
            Err(e) => {
                errors.push(format!("Slot '{name}': {e}"));
                None
            }
        };
        if slots.iter().any(|s| s.name == name) {
            errors.push(format!("Slot name '{name}' is used more than once"));
            continue;
        }
        if let (Some(capacity), Some(expiry)) = (capacity, expiry) {
            slots.push(Slot { name: name.to_string(), capacity, expiry });
        }
    }

    if errors.is_empty() { Ok(slots) } else { Err(errors) }
}

/// Slots that can still be offered: capacity above zero and not yet expired.
pub fn open_slots(slots: &[Slot], now: NaiveDateTime) -> Vec<&Slot> {
    slots
        .iter()
        .filter(|s| s.capacity > 0 && !s.is_expired(now))
        .collect()
}
