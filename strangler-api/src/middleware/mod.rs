pub mod timing;

pub use timing::{response_time_middleware, X_RESPONSE_TIME};
