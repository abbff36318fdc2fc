pub mod capture;
pub mod dns;
pub mod fixed;
pub mod http;
pub mod system;
