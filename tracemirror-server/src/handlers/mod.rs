pub mod health;
pub mod services;
pub mod sync;
