fn main() {
    labkit::cli::exit_on_error(labkit::cli::count::run());
}
