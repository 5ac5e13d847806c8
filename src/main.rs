fn main() {
    if let Err(err) = badgesmith::run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
