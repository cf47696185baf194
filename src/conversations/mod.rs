pub mod run_poller;
pub mod session;
pub mod single_conversation;

pub use run_poller::*;
pub use session::*;
pub use single_conversation::*;
