pub mod ids;
pub mod types;
