pub mod convert;
pub mod resolve;
