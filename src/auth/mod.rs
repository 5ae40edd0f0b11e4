pub mod dto;
pub mod handlers;
pub mod password;
pub mod principal;

pub use handlers::router;
