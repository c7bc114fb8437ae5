//! Explicit state machine for the post review lifecycle.
//!
//! - **State**: where a post stands (`ModerationState`)
//! - **Events**: what a reviewer did (`ModerationEvent`)
//! - **Effects**: what the server must do next (`ModerationEffect`)
//! - **Transition**: pure function `(State, Event) -> (State, Vec<Effect>)`
//!
//! The server's interpreter executes the effects against storage.

pub mod effect;
pub mod event;
pub mod state;
pub mod transition;

pub use effect::*;
pub use event::*;
pub use state::*;
pub use transition::*;
