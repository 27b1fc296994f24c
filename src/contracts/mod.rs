// Contract bindings (read-only)

pub mod authorizer;

pub use authorizer::Authorizer;
