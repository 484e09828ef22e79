pub mod converter;
pub mod error;
pub mod naming;

pub use converter::{CancelFlag, Converter, ConverterOptions};
pub use error::{ConvertError, Result};
