// Outer surfaces for render clients.

pub mod dto;
pub mod server;
