pub mod cookies;
pub mod parser;
pub mod session;

pub use session::OmakaseClient;
