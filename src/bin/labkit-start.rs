fn main() {
    // Exit status is decided inside: 0 on clean or interrupted shutdown, 1 on failure.
    let code = labkit::cli::start::run();
    std::process::exit(code);
}
