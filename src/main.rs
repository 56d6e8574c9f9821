//! itinera CLI binary
//!
//! All logic is in the library; main.rs only invokes `cli::run()`.

fn main() {
    // cli::run() prints its own errors; only the exit code is mapped here
    if let Err(code) = itinera::cli::run() {
        std::process::exit(code.as_i32());
    }
}
