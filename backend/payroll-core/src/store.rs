// src/store.rs

use std::sync::Arc;
use tokio::sync::watch;

use crate::reducer::{reduce, Action, PayrollState};

/// Holder of the read model. The reducer is its only writer; everything else
/// reads a snapshot or subscribes to changes.
#[derive(Clone)]
pub struct Store {
    sender: Arc<watch::Sender<PayrollState>>,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(PayrollState::default());
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn dispatch(&self, action: Action) {
        self.dispatch_all([action]);
    }

    /// Applies the actions in order as one observable change.
    pub fn dispatch_all(&self, actions: impl IntoIterator<Item = Action>) {
        self.sender.send_modify(|state| {
            let mut next = std::mem::take(state);
            for action in actions {
                next = reduce(next, action);
            }
            *state = next;
        });
    }

    pub fn snapshot(&self) -> PayrollState {
        self.sender.borrow().clone()
    }

    pub fn read<R>(&self, f: impl FnOnce(&PayrollState) -> R) -> R {
        f(&self.sender.borrow())
    }

    pub fn subscribe(&self) -> watch::Receiver<PayrollState> {
        self.sender.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reducer::{Family, LoadingSlot};

    #[tokio::test]
    async fn subscribers_see_each_dispatch() {
        let store = Store::new();
        let mut rx = store.subscribe();

        store.dispatch_all([
            Action::SetLoading {
                slot: LoadingSlot::Salaries,
                loading: true,
            },
            Action::SetError {
                family: Family::Salary,
                message: "boom".to_string(),
            },
        ]);

        rx.changed().await.unwrap();
        let state = rx.borrow_and_update().clone();
        assert_eq!(state.salary.error.as_deref(), Some("boom"));
        assert!(!state.salary.is_salaries_loading());
        assert_eq!(store.read(|s| s.error(Family::Salary).map(str::to_owned)), Some("boom".to_string()));
    }
}
