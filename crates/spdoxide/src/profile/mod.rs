pub mod detector;

pub use detector::{detect, detect_with, Classification, Generation, SubType, MEMORY_TYPE_OFFSET};
