use std::cell::{Cell, RefCell};
use std::rc::Rc;

use super::{isolate, Subscription};

#[derive(Default)]
struct Registry {
    entries: RefCell<Vec<Box<dyn FnOnce()>>>,
    drained: Cell<bool>,
}

/// Ordered list of teardown actions owned by one controller
///
/// `dispose_all` runs every registered action exactly once, in registration
/// order. Actions added after that run immediately.
#[derive(Clone, Default)]
pub struct Disposers {
    inner: Rc<Registry>,
}

impl Disposers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a teardown action, returning its position
    pub fn add(&self, action: impl FnOnce() + 'static) -> usize {
        if self.inner.drained.get() {
            isolate("late disposer", action);
            return 0;
        }
        let mut entries = self.inner.entries.borrow_mut();
        entries.push(Box::new(action));
        entries.len() - 1
    }

    pub fn add_subscription(&self, subscription: Subscription) -> usize {
        self.add(subscription.into_disposer())
    }

    pub fn len(&self) -> usize {
        self.inner.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_drained(&self) -> bool {
        self.inner.drained.get()
    }

    pub fn dispose_all(&self) {
        if self.inner.drained.replace(true) {
            return;
        }
        let entries = std::mem::take(&mut *self.inner.entries.borrow_mut());
        for action in entries {
            isolate("disposer", action);
        }
    }
}

impl std::fmt::Debug for Disposers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Disposers")
            .field("pending", &self.len())
            .field("drained", &self.is_drained())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::Stream;

    #[test]
    fn test_runs_in_order_once() {
        let disposers = Disposers::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        for i in 0..3 {
            let log = log.clone();
            disposers.add(move || log.borrow_mut().push(i));
        }
        assert_eq!(disposers.len(), 3);

        disposers.dispose_all();
        disposers.dispose_all();
        assert_eq!(*log.borrow(), vec![0, 1, 2]);
        assert!(disposers.is_empty());
    }

    #[test]
    fn test_failing_action_does_not_stop_the_rest() {
        let disposers = Disposers::new();
        let ran = Rc::new(Cell::new(false));
        disposers.add(|| panic!("teardown failure"));
        let flag = ran.clone();
        disposers.add(move || flag.set(true));

        disposers.dispose_all();
        assert!(ran.get());
    }

    #[test]
    fn test_late_registration_runs_immediately() {
        let disposers = Disposers::new();
        disposers.dispose_all();
        let ran = Rc::new(Cell::new(false));
        let flag = ran.clone();
        disposers.add(move || flag.set(true));
        assert!(ran.get());
    }

    #[test]
    fn test_subscription_released() {
        let stream: Stream<i32> = Stream::new();
        let disposers = Disposers::new();
        disposers.add_subscription(stream.subscribe(|_| {}));
        assert_eq!(stream.subscriber_count(), 1);
        disposers.dispose_all();
        assert_eq!(stream.subscriber_count(), 0);
    }
}
