pub mod fs;
pub mod sync;
