pub mod user;
pub mod visit;
