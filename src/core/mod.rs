pub mod bot;
pub mod command;
pub mod session;
pub mod story;
