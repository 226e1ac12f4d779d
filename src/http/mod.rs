//! The HTTP layer: request shaping, response interpretation, wire output.
//!
//! - **`request`**: the raw engine-parsed message and the structured request
//!   event built from it (header merge rule lives here)
//! - **`response`**: validation of the loosely-typed value a handler finishes
//!   with into the closed [`response::Response`] variant
//! - **`writer`**: serialization of generic responses and the 500 fallbacks
//!
//! The split mirrors the dataflow: a request enters through `request`, the
//! handler's answer leaves through `response` and `writer`. Neither side ever
//! faults; malformed handler output degrades to a fixed 500 because response
//! generation happens after the handler has already run and a crash here would
//! propagate into the event loop.

pub mod request;
pub mod response;
pub mod writer;
