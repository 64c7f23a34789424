//! Argument parsing and entry points for the two binaries.

pub mod count;
pub mod start;

/// Prints the error chain and exits 1.
pub fn exit_on_error(result: anyhow::Result<()>) {
    if let Err(err) = result {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
