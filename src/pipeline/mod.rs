pub mod builder;
pub mod runtime;
