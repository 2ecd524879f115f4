pub mod auth;
pub mod cart;
pub mod orders;
pub mod payment;
pub mod products;
