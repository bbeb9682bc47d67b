pub mod gateway;
pub mod retry;

pub use gateway::GatewayHandler;
pub use retry::{DispatchReport, Dispatcher, RetryPolicy};
