//! fmr-rpc
//!
//! Remote object store boundary for the manager's JSON-RPC API.
//!
//! - `ObjectStore`: one method per remote call, status codes returned, never interpreted
//! - `JsonRpcClient`: blocking HTTP implementation
//! - task polling and package install on top of any `ObjectStore`

mod client;
mod endpoint;
mod store;
mod task;
pub mod wire;

pub use client::{ClientConfig, Credentials, JsonRpcClient};
pub use endpoint::{Endpoint, EndpointKind, WorkspaceAction};
pub use store::*;
pub use task::{install_and_wait, poll_task, PollPolicy};
pub use wire::Reply;
