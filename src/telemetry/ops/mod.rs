pub mod extract;
pub mod validate;
pub mod apply;
pub mod sample;
