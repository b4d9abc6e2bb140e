fn main() {
    if let Err(e) = certgate::cli::run() {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
