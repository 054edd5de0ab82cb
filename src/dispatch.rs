//! ## Event dispatch
//!
//! A [`Dispatcher`] holds the handlers registered on a session and calls
//! every one of them, in registration order, for each parsed [`ChatEvent`].
//!
//! Handlers are only ever appended. A failing handler does not stop the
//! others: returned errors and panics are logged and dispatch moves on.

use crate::msg::ChatEvent;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, PoisonError, RwLock};

/// Error returned from a [`Handler`].
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Receives every event published on a session.
///
/// Implemented for any `Fn(&ChatEvent) -> Result<(), HandlerError>`.
///
/// Handlers run on the read loop, so a slow handler delays every event after it.
/// Long-running work should be handed off to another task.
pub trait Handler: Send + Sync + 'static {
  fn handle(&self, event: &ChatEvent) -> Result<(), HandlerError>;
}

impl<F> Handler for F
where
  F: Fn(&ChatEvent) -> Result<(), HandlerError> + Send + Sync + 'static,
{
  fn handle(&self, event: &ChatEvent) -> Result<(), HandlerError> {
    self(event)
  }
}

/// Ordered, append-only list of handlers.
///
/// Cloning a dispatcher yields another handle to the same list.
#[derive(Clone, Default)]
pub struct Dispatcher {
  handlers: Arc<RwLock<Vec<Arc<dyn Handler>>>>,
}

impl Dispatcher {
  pub fn new() -> Self {
    Self::default()
  }

  /// Append `handler` to the list.
  ///
  /// Events published before this call are not replayed.
  pub fn register(&self, handler: impl Handler) {
    self
      .handlers
      .write()
      .unwrap_or_else(PoisonError::into_inner)
      .push(Arc::new(handler));
  }

  /// Append a closure to the list.
  ///
  /// Same as [`Dispatcher::register`], but lets the compiler infer the closure signature.
  pub fn register_fn<F>(&self, f: F)
  where
    F: Fn(&ChatEvent) -> Result<(), HandlerError> + Send + Sync + 'static,
  {
    self.register(f)
  }

  /// Number of registered handlers.
  pub fn len(&self) -> usize {
    self
      .handlers
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Call every registered handler with `event`, in registration order.
  ///
  /// Handlers may register more handlers while being called; those will
  /// only see subsequent events.
  pub fn publish(&self, event: &ChatEvent) {
    let handlers = self
      .handlers
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .clone();

    for (index, handler) in handlers.iter().enumerate() {
      match catch_unwind(AssertUnwindSafe(|| handler.handle(event))) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(handler = index, "handler failed: {e}"),
        Err(_) => error!(handler = index, "handler panicked"),
      }
    }
  }
}

impl std::fmt::Debug for Dispatcher {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Dispatcher")
      .field("handlers", &self.len())
      .finish()
  }
}

static_assert_send!(Dispatcher);
static_assert_sync!(Dispatcher);

#[cfg(test)]
mod tests {
  use super::*;
  use crate::msg::PrivateMessage;
  use std::sync::Mutex;

  fn event() -> ChatEvent {
    PrivateMessage::new("ronni", "dallas", "hi").into()
  }

  #[test]
  fn publish_in_registration_order() {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let dispatcher = Dispatcher::new();
    for id in 1..=3 {
      let calls = calls.clone();
      dispatcher.register_fn(move |_| {
        calls.lock().unwrap().push(id);
        Ok(())
      });
    }

    dispatcher.publish(&event());
    assert_eq!(*calls.lock().unwrap(), [1, 2, 3]);

    dispatcher.publish(&ChatEvent::PingRequest);
    assert_eq!(*calls.lock().unwrap(), [1, 2, 3, 1, 2, 3]);
  }

  #[test]
  fn failing_handler_does_not_stop_others() {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let dispatcher = Dispatcher::new();
    dispatcher.register_fn(|_| Err("nope".into()));
    dispatcher.register_fn(|_| panic!("handler bug"));
    dispatcher.register_fn({
      let calls = calls.clone();
      move |event| {
        calls.lock().unwrap().push(event.clone());
        Ok(())
      }
    });

    dispatcher.publish(&event());
    assert_eq!(*calls.lock().unwrap(), [event()]);
  }

  #[test]
  fn register_from_inside_a_handler() {
    let calls = Arc::new(Mutex::new(0));
    let dispatcher = Dispatcher::new();
    dispatcher.register_fn({
      let dispatcher = dispatcher.clone();
      let calls = calls.clone();
      move |event| {
        if event.is_ping() {
          let calls = calls.clone();
          dispatcher.register_fn(move |_| {
            *calls.lock().unwrap() += 1;
            Ok(())
          });
        }
        Ok(())
      }
    });

    dispatcher.publish(&ChatEvent::PingRequest);
    assert_eq!(dispatcher.len(), 2);
    assert_eq!(*calls.lock().unwrap(), 0);

    dispatcher.publish(&event());
    assert_eq!(*calls.lock().unwrap(), 1);
  }

  struct Count(Arc<Mutex<usize>>);

  impl Handler for Count {
    fn handle(&self, event: &ChatEvent) -> Result<(), HandlerError> {
      *self.0.lock().unwrap() += event.word_count()?;
      Ok(())
    }
  }

  #[test]
  fn struct_handler() {
    let total = Arc::new(Mutex::new(0));
    let dispatcher = Dispatcher::new();
    dispatcher.register(Count(total.clone()));

    dispatcher.publish(&PrivateMessage::new("a", "b", "one two three").into());
    dispatcher.publish(&ChatEvent::PingRequest);
    assert_eq!(*total.lock().unwrap(), 3);
  }
}
