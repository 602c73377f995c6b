mod host_runtime;
mod runner;
mod shutdown;

#[cfg(test)]
mod tests;

pub use host_runtime::HostRuntime;
pub use runner::{run, RunOptions, ShutdownOptions};
pub use shutdown::wait_for_shutdown;
