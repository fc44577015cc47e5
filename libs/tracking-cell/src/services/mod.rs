pub mod geo;
pub mod location;
