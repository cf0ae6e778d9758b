pub mod fs;
pub mod task;
