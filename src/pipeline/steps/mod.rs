//! Step algorithms, grouped by family.
//!
//! Every step works on the value in place and returns `Err(message)` on
//! failure. The executor turns the message into an error value; steps never
//! build error values themselves.

pub mod csv;
pub mod numeric;
pub mod script;
pub mod snmp;
pub mod structured;
pub mod text;
pub mod throttle;
pub mod validate;
