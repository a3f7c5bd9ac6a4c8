pub mod annotations;
pub mod backend;
pub mod client;
pub mod fs;
pub mod ids;
pub mod postgres;
mod record;
pub mod rest;
#[cfg(test)]
mod testing;
