fn main() {
    if let Err(err) = gitsnap::run() {
        eprintln!("Error: {err:#}");
        std::process::exit(gitsnap::exit_code(&err));
    }
}
