//! Session lifecycle policy
//!
//! Pure decisions in the Elm Architecture manner: the dispatcher asks for a
//! decision, then executes the returned effects.

mod decide;
mod effect;

#[cfg(test)]
mod proptests;

pub use decide::{decide, Action, Decision};
pub use effect::{Effect, Reply};
