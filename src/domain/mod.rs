// Domain layer: phone numbers, lookup models and ports (interfaces).

pub mod model;
pub mod phone;
pub mod ports;
