// Library interface for newsrelay modules
// This allows tests and the helper binaries to import modules

pub mod bot;
pub mod events;
pub mod parser;
pub mod relay;
pub mod server;
pub mod store;
pub mod telegram;
