pub use self::{
    action::Action,
    state::{RoomView, ServerConnectionStatus, State},
    state_store::StateStore,
};

mod action;
mod state;
#[allow(clippy::module_inception)]
mod state_store;
