//! Type aliases for commonly used shared-ownership types.
//!
//! The router and the code that configured a listener both keep a handle to
//! it. Dispatch runs on one thread, so the single-threaded `Rc<RefCell<T>>`
//! is the building block.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use gdoor_core::types::*;
//!
//! let sensor: Shared<BinarySensorListener> = shared(BinarySensorListener::new("bell"));
//! router.register_listener(sensor.clone())?;
//! assert!(!sensor.borrow().state());
//! ```

use std::cell::RefCell;
use std::rc::Rc;

/// A reference-counted, interior-mutable wrapper for single-threaded sharing.
pub type Shared<T> = Rc<RefCell<T>>;

/// Wrap a value in a [`Shared`] handle.
pub fn shared<T>(value: T) -> Shared<T> {
    Rc::new(RefCell::new(value))
}
