//! State that survives light sleep and soft resets
//!
//! The counters live in a small slot of RTC memory. The slot is framed with a
//! magic word and a length byte so a cold boot (random RAM contents) is
//! recognised and yields fresh state.

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use thiserror_no_std::Error;

/// Size of the retained slot in bytes
pub const RETAINED_SLOT_LEN: usize = 32;

const MAGIC: [u8; 4] = *b"EPRB";
const HEADER_LEN: usize = MAGIC.len() + 1;

pub type SlotBytes = [u8; RETAINED_SLOT_LEN];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedState {
    pub boot_count: u32,
    pub cycle_count: u32,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetainedError {
    #[error("Slot holds no saved state")]
    Empty,
    #[error("Saved state is corrupt")]
    Corrupt,
    #[error("State does not fit the retained slot")]
    TooLarge,
}

/// Trait for the memory region that keeps its contents across sleep.
pub trait RetainedSlot {
    fn read(&self) -> SlotBytes;

    fn write(&mut self, bytes: &SlotBytes);
}

impl PersistedState {
    pub fn encode(&self) -> Result<SlotBytes, RetainedError> {
        let mut bytes = [0u8; RETAINED_SLOT_LEN];
        let len = postcard::to_slice(self, &mut bytes[HEADER_LEN..])
            .map_err(|_| RetainedError::TooLarge)?
            .len();
        bytes[..MAGIC.len()].copy_from_slice(&MAGIC);
        bytes[MAGIC.len()] = len as u8;
        Ok(bytes)
    }

    pub fn decode(bytes: &SlotBytes) -> Result<Self, RetainedError> {
        if bytes[..MAGIC.len()] != MAGIC {
            return Err(RetainedError::Empty);
        }
        let len = usize::from(bytes[MAGIC.len()]);
        let payload = bytes
            .get(HEADER_LEN..HEADER_LEN + len)
            .ok_or(RetainedError::Corrupt)?;
        postcard::from_bytes(payload).map_err(|_| RetainedError::Corrupt)
    }

    /// Read the slot, falling back to fresh state when it holds none.
    pub fn load<R: RetainedSlot>(slot: &R) -> Self {
        match Self::decode(&slot.read()) {
            Ok(state) => {
                debug!("Restored {:?}", state);
                state
            }
            Err(RetainedError::Empty) => Self::default(),
            Err(e) => {
                warn!("{}, starting fresh", e);
                Self::default()
            }
        }
    }

    pub fn store<R: RetainedSlot>(&self, slot: &mut R) {
        match self.encode() {
            Ok(bytes) => slot.write(&bytes),
            Err(e) => warn!("Failed to retain state: {}", e),
        }
    }
}
