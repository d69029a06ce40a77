//! In-flight request cancellation
//!
//! Holds at most one cancellation token per [`RequestKind`]. OS interrupts are
//! routed through [`CancellationCoordinator::interrupt`], which applies a fixed
//! priority: an active chat request is cancelled first, then an active
//! sub-process, and only when neither is active does the process exit.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestKind {
    ChatStream,
    SubProcess,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InterruptOutcome {
    CancelledChat,
    CancelledSubProcess,
    Exit,
}

struct Slot {
    id: u64,
    token: CancellationToken,
}

#[derive(Default)]
struct Slots {
    chat: Option<Slot>,
    subprocess: Option<Slot>,
}

impl Slots {
    fn get_mut(&mut self, kind: RequestKind) -> &mut Option<Slot> {
        match kind {
            RequestKind::ChatStream => &mut self.chat,
            RequestKind::SubProcess => &mut self.subprocess,
        }
    }
}

#[derive(Default)]
pub struct CancellationCoordinator {
    slots: Mutex<Slots>,
    next_id: AtomicU64,
}

impl CancellationCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Slots> {
        self.slots
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register `token` as the in-flight request of `kind`.
    ///
    /// A previous registration of the same kind is assumed finished and is
    /// replaced. The returned guard clears the slot when dropped, unless a
    /// newer registration has taken it over.
    pub fn register(&self, kind: RequestKind, token: CancellationToken) -> InFlightGuard<'_> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let previous = self.lock().get_mut(kind).replace(Slot { id, token });
        if previous.is_some() {
            debug!(?kind, "replaced an unfinished in-flight registration");
        }
        debug!(?kind, id, "registered in-flight request");
        InFlightGuard {
            coordinator: self,
            kind,
            id,
        }
    }

    pub fn clear(&self, kind: RequestKind) {
        if self.lock().get_mut(kind).take().is_some() {
            debug!(?kind, "cleared in-flight request");
        }
    }

    fn clear_registration(&self, kind: RequestKind, id: u64) {
        let mut slots = self.lock();
        let slot = slots.get_mut(kind);
        if slot.as_ref().is_some_and(|current| current.id == id) {
            *slot = None;
            debug!(?kind, id, "in-flight request finished");
        }
    }

    pub fn is_active(&self, kind: RequestKind) -> bool {
        self.lock().get_mut(kind).is_some()
    }

    /// Apply one interrupt to the current state. The check and the cancel
    /// happen under the same lock, so a registration cannot slip in between.
    pub fn interrupt(&self) -> InterruptOutcome {
        let slots = self.lock();
        let outcome = if let Some(slot) = &slots.chat {
            slot.token.cancel();
            InterruptOutcome::CancelledChat
        } else if let Some(slot) = &slots.subprocess {
            slot.token.cancel();
            InterruptOutcome::CancelledSubProcess
        } else {
            InterruptOutcome::Exit
        };
        debug!(?outcome, "interrupt dispatched");
        outcome
    }
}

/// Keeps a request registered for as long as it is alive.
pub struct InFlightGuard<'a> {
    coordinator: &'a CancellationCoordinator,
    kind: RequestKind,
    id: u64,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.coordinator.clear_registration(self.kind, self.id);
    }
}

/// Route SIGINT (and SIGTERM on unix) through the coordinator for the rest of
/// the process lifetime. Every signal is evaluated on its own against the
/// state at that moment.
pub fn install_signal_handler(coordinator: Arc<CancellationCoordinator>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            if wait_for_signal().await.is_err() {
                debug!("signal listener unavailable; interrupts use default handling");
                return;
            }
            if coordinator.interrupt() == InterruptOutcome::Exit {
                std::process::exit(0);
            }
        }
    })
}

#[cfg(unix)]
async fn wait_for_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result,
        _ = terminate.recv() => Ok(()),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_interrupt_exits() {
        let coordinator = CancellationCoordinator::new();
        assert_eq!(coordinator.interrupt(), InterruptOutcome::Exit);
    }

    #[test]
    fn chat_takes_precedence_over_subprocess() {
        let coordinator = CancellationCoordinator::new();
        let chat_token = CancellationToken::new();
        let shell_token = CancellationToken::new();

        let shell_guard = coordinator.register(RequestKind::SubProcess, shell_token.clone());
        let chat_guard = coordinator.register(RequestKind::ChatStream, chat_token.clone());

        assert_eq!(coordinator.interrupt(), InterruptOutcome::CancelledChat);
        assert!(chat_token.is_cancelled());
        assert!(!shell_token.is_cancelled());

        // the chat request terminates and clears its slot
        drop(chat_guard);

        assert_eq!(coordinator.interrupt(), InterruptOutcome::CancelledSubProcess);
        assert!(shell_token.is_cancelled());

        drop(shell_guard);
        assert_eq!(coordinator.interrupt(), InterruptOutcome::Exit);
    }

    #[test]
    fn repeated_interrupts_are_not_debounced() {
        let coordinator = CancellationCoordinator::new();
        let token = CancellationToken::new();
        let _guard = coordinator.register(RequestKind::ChatStream, token.clone());

        assert_eq!(coordinator.interrupt(), InterruptOutcome::CancelledChat);
        assert_eq!(coordinator.interrupt(), InterruptOutcome::CancelledChat);
        assert!(token.is_cancelled());
    }

    #[test]
    fn stale_guard_does_not_clear_newer_registration() {
        let coordinator = CancellationCoordinator::new();
        let first = coordinator.register(RequestKind::ChatStream, CancellationToken::new());
        let second_token = CancellationToken::new();
        let second = coordinator.register(RequestKind::ChatStream, second_token.clone());

        drop(first);
        assert!(coordinator.is_active(RequestKind::ChatStream));

        assert_eq!(coordinator.interrupt(), InterruptOutcome::CancelledChat);
        assert!(second_token.is_cancelled());

        drop(second);
        assert!(!coordinator.is_active(RequestKind::ChatStream));
    }

    #[test]
    fn explicit_clear_empties_slot() {
        let coordinator = CancellationCoordinator::new();
        let guard = coordinator.register(RequestKind::SubProcess, CancellationToken::new());
        coordinator.clear(RequestKind::SubProcess);
        assert!(!coordinator.is_active(RequestKind::SubProcess));
        drop(guard);
        assert_eq!(coordinator.interrupt(), InterruptOutcome::Exit);
    }

    #[test]
    fn kinds_are_tracked_independently() {
        let coordinator = CancellationCoordinator::new();
        let _shell = coordinator.register(RequestKind::SubProcess, CancellationToken::new());
        assert!(coordinator.is_active(RequestKind::SubProcess));
        assert!(!coordinator.is_active(RequestKind::ChatStream));
    }
}
