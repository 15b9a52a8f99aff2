use crate::state::LocalState;

/// Observes the `notes_updated` broadcast.
///
/// A change is only a hint that some other writer touched the mirror; it
/// carries no payload, so a watcher that fires must re-read what it shows.
#[derive(Debug, Clone)]
pub struct ChangeWatcher {
    state: LocalState,
    seen: Option<i64>,
}

impl ChangeWatcher {
    /// Starts watching from the currently published value.
    pub fn new(state: LocalState) -> Self {
        let seen = state.notes_updated();
        Self { state, seen }
    }

    pub fn last_seen(&self) -> Option<i64> {
        self.seen
    }

    /// True once per publish made since the previous call.
    pub fn poll(&mut self) -> bool {
        let current = self.state.notes_updated();
        if current == self.seen {
            return false;
        }
        self.seen = current;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn watcher_fires_once_per_publish() {
        let state = LocalState::in_memory();
        state.publish_notes_updated(10);

        let mut watcher = ChangeWatcher::new(state.clone());
        assert!(!watcher.poll());

        state.publish_notes_updated(20);
        assert!(watcher.poll());
        assert!(!watcher.poll());
        assert_eq!(watcher.last_seen(), Some(20));
    }
}
