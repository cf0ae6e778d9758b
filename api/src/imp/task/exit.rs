use tinyk_core::task::current_kernel;

/// Exit the calling process with `exit_code`.
///
/// The calling thread ends at once; the process becomes a zombie when its
/// last thread is gone, and `exit_code` is what its parent reaps.
pub fn sys_exit(exit_code: i32) -> ! {
    match current_kernel() {
        Ok(kernel) => kernel.exit(exit_code),
        Err(err) => panic!("[exit] sys_exit outside of any process: {:?}", err),
    }
}

/// Exit the calling thread with `exit_value`, handed to its joiner if any.
pub fn sys_thread_exit(exit_value: i32) -> ! {
    match current_kernel() {
        Ok(kernel) => kernel.thread_exit(exit_value),
        Err(err) => panic!("[exit] sys_thread_exit outside of any thread: {:?}", err),
    }
}
