#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(async_fn_in_trait)]

pub mod aggregate;
pub mod blocklist;
pub mod config;
pub mod domain;
pub mod engine;
mod error;
pub mod expand;
pub mod resolve;
pub mod util;

pub use error::Error;
