fn main() {
    if let Err(err) = agri_normalize::run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
