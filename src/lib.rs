pub mod driver;
pub mod errors;
pub mod extract;
pub mod host;
pub mod package;
pub mod pragma;
pub mod render;
pub mod scan;
pub mod source;
pub mod span;
pub mod specialize;
pub mod store;
