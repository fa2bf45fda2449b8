pub mod auth;
pub mod cli;
pub mod endpoints;
pub mod files;
pub mod transport;

pub use files::Dropbox;
pub use transport::{HttpTransport, StatusPolicy, Transport};
