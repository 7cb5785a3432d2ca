pub mod slots;
pub mod store;
pub mod types;

pub use slots::{open_slots, parse_expiry, parse_slots};
pub use store::{FormStore, StoreError};
pub use types::{EXPIRY_FORMAT, FormRecord, Slot, sheet_url_for};
