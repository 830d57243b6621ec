pub mod api;
pub mod commands;
pub mod config;
pub mod db;
pub mod gateway;
pub mod messages;
mod request_logging;
pub mod resolver;
#[cfg(test)]
mod test_support;
pub mod webhook;
