pub mod error;
pub mod source;

pub use error::{SpdError, SpdResult, Warning};
pub use source::ByteSource;
