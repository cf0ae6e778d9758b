mod exec;
mod exit;
mod thread;
mod wait;

pub use self::exec::*;
pub use self::exit::*;
pub use self::thread::*;
pub use self::wait::*;
