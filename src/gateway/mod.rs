pub mod agent_gateway_interface;
pub mod openai_assistants;
pub mod types;

#[cfg(test)]
pub mod scripted_gateway;

pub use agent_gateway_interface::*;
pub use openai_assistants::*;
pub use types::*;
