// src/future/mod.rs

//! One-shot result container with synchronous continuations.
//!
//! [`FutureValue`] deliberately does not depend on any executor: producing a
//! value runs the queued continuations right away, on the producer's stack,
//! in registration order. [`FutureValue::wait`] bridges into `async` code for
//! tests that prefer to `.await`.

mod value;

pub use value::{FutureState, FutureValue, Outcome};
