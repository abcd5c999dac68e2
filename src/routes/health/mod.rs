mod handler;
mod model;

pub use handler::check;
pub use model::HealthStatus;
