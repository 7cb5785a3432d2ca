//! Pure slot rules: intake deduplication, live counts, choice regeneration,
//! reminder selection and cancellation lookup. Nothing here touches I/O.

use chrono::NaiveDateTime;
use std::collections::HashMap;

use crate::models::form::{FormRecord, Slot};
use crate::models::submission::{ContactKey, RowStatus, SubmissionRow};

pub const NO_SLOTS_CHOICE: &str = "No slots available";

/// Result of taking in rows the engine has not seen yet.
#[derive(Debug, Default, PartialEq)]
pub struct Intake {
    /// Sheet row numbers to flag as duplicates.
    pub duplicates: Vec<usize>,
    /// New rows that keep their place.
    pub accepted: usize,
}

/// Check every row from index `rows_seen` onward against the rows before it.
///
/// A new row is a duplicate when an earlier active row shares its contact
/// identity. Rows flagged in this same batch are not matched against.
pub fn intake(rows: &[SubmissionRow], rows_seen: usize) -> Intake {
    let mut outcome = Intake::default();
    let mut active: Vec<bool> = rows.iter().map(|r| r.status.is_active()).collect();

    for i in rows_seen.min(rows.len())..rows.len() {
        let row = &rows[i];
        if !active[i] {
            continue;
        }
        let seen_before = rows[..i]
            .iter()
            .zip(&active)
            .any(|(prior, &is_active)| is_active && prior.contact.matches(&row.contact));
        if seen_before {
            active[i] = false;
            outcome.duplicates.push(row.row_number);
        } else {
            outcome.accepted += 1;
        }
    }
    outcome
}

/// Places taken per slot name. Cancelled and duplicate rows hold no place and
/// each contact identity is counted once.
pub fn live_counts(rows: &[SubmissionRow]) -> HashMap<String, u32> {
    let mut counts: HashMap<String, u32> = HashMap::new();
    let mut counted: Vec<&ContactKey> = Vec::new();

    for row in rows.iter().filter(|r| r.status.is_active()) {
        let slot = row.slot();
        if slot.is_empty() {
            continue;
        }
        if counted.iter().any(|c| c.matches(&row.contact)) {
            continue;
        }
        if !row.contact.is_empty() {
            counted.push(&row.contact);
        }
        *counts.entry(slot).or_insert(0) += 1;
    }
    counts
}

/// Choice list the form should show, and whether it should accept responses.
#[derive(Debug, Clone, PartialEq)]
pub struct Regeneration {
    pub choices: Vec<String>,
    pub accepting: bool,
}

pub fn choice_label(name: &str, left: u32) -> String {
    format!("{name} ({left} left)")
}

pub fn regenerate(slots: &[Slot], counts: &HashMap<String, u32>, now: NaiveDateTime) -> Regeneration {
    let choices: Vec<String> = slots
        .iter()
        .filter(|s| !s.is_expired(now))
        .filter_map(|s| {
            let taken = counts.get(&s.name).copied().unwrap_or(0);
            (taken < s.capacity).then(|| choice_label(&s.name, s.capacity - taken))
        })
        .collect();

    if choices.is_empty() {
        Regeneration { choices: vec![NO_SLOTS_CHOICE.to_string()], accepting: false }
    } else {
        Regeneration { choices, accepting: true }
    }
}

/// Active rows whose slot has expired and who have not been reminded yet.
pub fn due_reminders<'a>(rows: &'a [SubmissionRow], form: &FormRecord, now: NaiveDateTime) -> Vec<&'a SubmissionRow> {
    rows.iter()
        .filter(|r| r.status.is_active() && !r.notified && !r.phone_raw.is_empty())
        .filter(|r| {
            form.slot(&r.slot())
                .map(|slot| slot.is_expired(now))
                .unwrap_or(false)
        })
        .collect()
}

/// First active booking held by the given contact.
pub fn find_cancellable<'a>(rows: &'a [SubmissionRow], contact: &ContactKey) -> Option<&'a SubmissionRow> {
    rows.iter()
        .find(|r| r.status == RowStatus::Active && r.contact.matches(contact))
}

/// Booked count against capacity for one slot, for the submissions page.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotTally {
    pub name: String,
    pub booked: u32,
    pub capacity: u32,
}

pub fn tally(slots: &[Slot], counts: &HashMap<String, u32>) -> Vec<SlotTally> {
    slots
        .iter()
        .map(|s| SlotTally {
            name: s.name.clone(),
            booked: counts.get(&s.name).copied().unwrap_or(0),
            capacity: s.capacity,
        })
        .collect()
}
