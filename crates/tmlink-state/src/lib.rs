//! Robot state decoding.
//!
//! The controller streams its data table as a binary record of
//! length-prefixed `(name, value)` items. [`StateDeserializer`] learns the
//! item layout from the first record, replays it for every later record, and
//! publishes unit-converted values into a [`RobotState`] snapshot shared
//! through [`SharedState`].

pub mod binding;
pub mod deserializer;
pub mod error;
mod raw;
pub mod record;
pub mod state;

pub use binding::{lookup, Binding, Field};
pub use deserializer::{Action, DecodeReport, PlanStep, StateDeserializer, MAX_ITEMS};
pub use error::{Result, StateError};
pub use record::{encode_record, split_items, Item};
pub use state::{RobotState, SharedState, DOF};
