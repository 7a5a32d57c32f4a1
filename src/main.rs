fn main() {
    if let Err(e) = fretsense_lib::run() {
        eprintln!("fretsense: {}", e);
        std::process::exit(1);
    }
}
