pub mod assets;
pub mod env;
pub mod logging;
pub mod response;
