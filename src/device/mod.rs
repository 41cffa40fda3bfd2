pub mod btle;
pub mod constants;
pub mod machine;
pub mod negotiator;
pub mod platform;
pub mod subscription;
pub mod types;

#[cfg(test)]
pub(crate) mod mock;
