//! Document-level click listeners
//!
//! Dropdown and input widgets collapse or blur when the user clicks anywhere
//! outside them. Each widget subscribes on connect and gets back a
//! [`ListenerHandle`]; dropping the handle unsubscribes, so repeated
//! mount/unmount cycles can never accumulate listeners.
//!
//! # Example
//!
//! ```
//! use std::cell::Cell;
//! use std::rc::Rc;
//! use tilecraft_core::listeners::OutsideClickRegistry;
//! use tilecraft_core::TileId;
//!
//! let registry = OutsideClickRegistry::new();
//! let me = TileId::next();
//! let open = Rc::new(Cell::new(true));
//!
//! let flag = open.clone();
//! let handle = registry.subscribe(me, move || flag.set(false));
//!
//! registry.dispatch_click(Some(me));
//! assert!(open.get()); // click landed inside
//!
//! registry.dispatch_click(None);
//! assert!(!open.get()); // click landed outside
//!
//! drop(handle);
//! assert_eq!(registry.len(), 0);
//! ```

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use slotmap::{new_key_type, SlotMap};

use crate::input::TileId;

new_key_type! {
    /// Handle key of one registered click listener
    pub struct ListenerId;
}

type OutsideCallback = Rc<dyn Fn()>;

struct Listener {
    owner: TileId,
    callback: OutsideCallback,
}

type Listeners = RefCell<SlotMap<ListenerId, Listener>>;

/// Registry standing in for the document's click listener list
///
/// Cloning shares the same registry. Single-threaded, like the event loop it
/// models.
#[derive(Clone, Default)]
pub struct OutsideClickRegistry {
    inner: Rc<Listeners>,
}

impl OutsideClickRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback fired for clicks that do not land on `owner`
    pub fn subscribe<F>(&self, owner: TileId, callback: F) -> ListenerHandle
    where
        F: Fn() + 'static,
    {
        let id = self.inner.borrow_mut().insert(Listener {
            owner,
            callback: Rc::new(callback),
        });
        tracing::trace!(?owner, "outside-click listener registered");
        ListenerHandle {
            id,
            registry: Rc::downgrade(&self.inner),
        }
    }

    /// Deliver a document click; `target` is the widget that was hit, if any
    pub fn dispatch_click(&self, target: Option<TileId>) {
        // Collect first: callbacks may drop their own handle
        let callbacks: Vec<OutsideCallback> = self
            .inner
            .borrow()
            .values()
            .filter(|l| Some(l.owner) != target)
            .map(|l| l.callback.clone())
            .collect();

        for callback in callbacks {
            callback();
        }
    }

    /// Number of live listeners
    pub fn len(&self) -> usize {
        self.inner.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.borrow().is_empty()
    }
}

/// Scoped subscription; unsubscribes when dropped
pub struct ListenerHandle {
    id: ListenerId,
    registry: Weak<Listeners>,
}

impl ListenerHandle {
    pub fn id(&self) -> ListenerId {
        self.id
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        if let Some(listeners) = self.registry.upgrade() {
            listeners.borrow_mut().remove(self.id);
        }
    }
}

impl std::fmt::Debug for ListenerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerHandle").field("id", &self.id).finish()
    }
}
