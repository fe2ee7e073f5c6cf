pub mod model;
pub mod panel;
pub mod pull;
pub mod validate;
