//! Clipboard capability.
//!
//! The OS clipboard is process-wide and platform-dependent, so the engine
//! never touches it directly. The executor receives a [`Clipboard`] and only
//! talks to it when a copy, cut or paste chord is pressed.

use crate::result::ProbeResult;
use std::sync::{Mutex, PoisonError};

/// Narrow clipboard interface injected into the executor
pub trait Clipboard: Send + Sync + std::fmt::Debug {
    /// A copy or cut chord asked for `text` to be placed on the clipboard
    fn write_requested_via_key_chord(&self, text: &str) -> ProbeResult<()>;

    /// Current clipboard value
    fn read_current_value(&self) -> ProbeResult<String>;
}

/// In-memory clipboard, one per scenario
#[derive(Debug, Default)]
pub struct MemoryClipboard {
    value: Mutex<String>,
}

impl MemoryClipboard {
    /// Empty clipboard
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Clipboard pre-filled with `value`
    #[must_use]
    pub fn with_value(value: impl Into<String>) -> Self {
        Self {
            value: Mutex::new(value.into()),
        }
    }
}

impl Clipboard for MemoryClipboard {
    fn write_requested_via_key_chord(&self, text: &str) -> ProbeResult<()> {
        let mut value = self.value.lock().unwrap_or_else(PoisonError::into_inner);
        text.clone_into(&mut value);
        Ok(())
    }

    fn read_current_value(&self) -> ProbeResult<String> {
        Ok(self
            .value
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }
}
