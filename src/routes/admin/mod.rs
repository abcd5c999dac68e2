mod handler;
mod model;

pub use handler::invalidate_cache;
pub use model::{InvalidateRequest, InvalidateResponse};
