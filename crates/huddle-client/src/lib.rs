//! Client coordinator.
//!
//! Owns everything the browser client kept in module-level globals: the open
//! room and its timeline, the typing tracker, read receipts, the request
//! generation guard, and the notice queue a front-end drains. All state lives
//! in [`session::Session`] and is mutated only by its methods; the front-end
//! feeds it gateway notices and user input, and reads view-models back out.

pub mod api;
pub mod notify;
pub mod receipts;
pub mod session;
pub mod theme;
pub mod timeline;
pub mod typing;
pub mod view;

pub use api::{ApiClient, ApiError};
pub use notify::{Notice, ToastLevel};
pub use session::{SendError, Session};
