mod binary;

pub use binary::BinaryThreshold;

#[cfg(test)]
pub(crate) use binary::tests;
