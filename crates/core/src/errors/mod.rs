pub mod composition;
pub mod handler;

pub use composition::*;
pub use handler::*;
