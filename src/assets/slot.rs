use std::sync::{Arc, Mutex};

type Waiter<T> = Box<dyn FnOnce(Arc<T>) + Send>;

struct SlotState<T> {
    value: Option<Arc<T>>,
    waiters: Vec<Waiter<T>>,
    /// Set while `resolve` replays waiters. Registrations made meanwhile queue up behind them.
    draining: bool,
}

/// A named asset that may not have arrived yet. It is fulfilled at most once, everyone interested
/// in it registers a callback which runs exactly once: on resolution if it is still pending,
/// immediately (before [`AssetSlot::on_ready`] returns) otherwise.
pub struct AssetSlot<T> {
    state: Mutex<SlotState<T>>,
}

impl<T> AssetSlot<T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SlotState {
                value: None,
                waiters: Vec::new(),
                draining: false,
            }),
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.state.lock().expect("Slot Lock").value.is_some()
    }

    pub fn value(&self) -> Option<Arc<T>> {
        self.state.lock().expect("Slot Lock").value.clone()
    }

    pub fn pending_waiters(&self) -> usize {
        self.state.lock().expect("Slot Lock").waiters.len()
    }

    /// Stores the value and replays all waiters in registration order. A second resolution is
    /// rejected and hands the rejected value back, the stored one stays untouched.
    pub fn resolve(&self, value: Arc<T>) -> Result<(), Arc<T>> {
        {
            let mut state = self.state.lock().expect("Slot Lock");
            if state.value.is_some() {
                return Err(value);
            }
            state.value = Some(value.clone());
            state.draining = true;
        }

        // Waiters run without the lock held, so they may register further callbacks (even on this
        // slot). Those land at the end of the queue and are picked up by the next batch.
        loop {
            let batch = {
                let mut state = self.state.lock().expect("Slot Lock");
                if state.waiters.is_empty() {
                    state.draining = false;
                    break;
                }
                std::mem::take(&mut state.waiters)
            };

            for waiter in batch {
                waiter(value.clone());
            }
        }
        Ok(())
    }

    pub fn on_ready<F>(&self, callback: F)
    where
        F: FnOnce(Arc<T>) + Send + 'static,
    {
        let ready = {
            let mut state = self.state.lock().expect("Slot Lock");
            let ready = state.value.clone();
            if ready.is_none() || state.draining {
                state.waiters.push(Box::new(callback));
                return;
            }
            ready
        };

        if let Some(value) = ready {
            callback(value);
        }
    }
}

impl<T> Default for AssetSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}
