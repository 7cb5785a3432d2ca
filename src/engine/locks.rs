use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// One async lock per form so engine passes on the same sheet never interleave.
#[derive(Default)]
pub struct FormLocks {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl FormLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, form_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            map.entry(form_id.to_string()).or_default().clone()
        };
        lock.lock_owned().await
    }

    pub fn forget(&self, form_id: &str) {
        let mut map = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        map.remove(form_id);
    }
}
