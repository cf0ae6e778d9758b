mod fd_ops;
mod info;

pub use self::fd_ops::*;
pub use self::info::*;
