pub mod http;
pub mod signature;
pub mod slack;

pub use http::{AppState, Server};
