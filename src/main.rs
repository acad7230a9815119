fn main() {
    if let Err(err) = shiftwatch_lib::run() {
        eprintln!("shiftwatch: {err:#}");
        std::process::exit(1);
    }
}
