pub mod client;
pub mod request;
pub mod response;

pub use client::WorkflowClient;
pub use request::WorkflowRequest;
pub use response::{format_local, parse_response};
