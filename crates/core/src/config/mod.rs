pub mod composer_config;
pub mod sources;
pub mod validation;

pub use composer_config::*;
pub use sources::*;
pub use validation::*;
