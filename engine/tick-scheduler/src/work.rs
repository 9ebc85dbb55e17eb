//! The single outstanding wake-up owned by a scheduler

use tokio::task::AbortHandle;

/// Kind of wake-up currently armed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingWake {
    None,
    Delayed,
    Immediate,
}

/// At most one armed host callback
///
/// Every item carries the generation it was armed with. A wake-up that finds a different
/// generation here (or none) was canceled and must not tick.
#[derive(Debug, Default)]
pub(crate) enum ScheduledWork {
    #[default]
    None,
    Delayed { generation: u64, handle: AbortHandle },
    Immediate { generation: u64, handle: AbortHandle },
}

impl ScheduledWork {
    pub fn generation(&self) -> Option<u64> {
        match self {
            ScheduledWork::None => None,
            ScheduledWork::Delayed { generation, .. }
            | ScheduledWork::Immediate { generation, .. } => Some(*generation),
        }
    }

    pub fn kind(&self) -> PendingWake {
        match self {
            ScheduledWork::None => PendingWake::None,
            ScheduledWork::Delayed { .. } => PendingWake::Delayed,
            ScheduledWork::Immediate { .. } => PendingWake::Immediate,
        }
    }

    pub fn is_pending(&self) -> bool {
        !matches!(self, ScheduledWork::None)
    }

    /// Abort the armed task, if any, and forget it
    pub fn cancel(&mut self) {
        match std::mem::take(self) {
            ScheduledWork::None => {}
            ScheduledWork::Delayed { handle, .. } | ScheduledWork::Immediate { handle, .. } => {
                handle.abort();
            }
        }
    }

    /// Claim the work as fired by `generation`. Returns false if it was canceled or replaced.
    pub fn take_if(&mut self, generation: u64) -> bool {
        if self.generation() != Some(generation) {
            return false;
        }
        *self = ScheduledWork::None;
        true
    }
}
