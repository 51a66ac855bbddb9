fn main() {
    if let Err(err) = typefully_cli::run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}
