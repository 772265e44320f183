pub mod health;
pub mod info;
pub mod login;
pub mod proxy;

pub use self::proxy::Upstream;
