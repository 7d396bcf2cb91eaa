//! Status HTTP surface

pub mod health;

pub use health::routes;
