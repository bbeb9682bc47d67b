pub mod headers;
pub mod proxy;
pub mod traits;
pub mod types;

#[cfg(test)]
mod tests;

pub use proxy::ProxyClient;
pub use traits::Upstream;
pub use types::{ProxyRequest, ProxyResponse, TransportFailure};
