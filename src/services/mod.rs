pub mod browser;
pub mod resolver;
pub mod session_broker;
pub mod stream_expansion;
pub mod token_extractor;
pub mod tunein;
