//! Small shared helpers.

pub mod clock;
pub mod xml;

pub use clock::{unix_nanos, unix_seconds};
pub use xml::cdata;
