pub mod handler;

pub use handler::{PayloadError, RequestHandler};
