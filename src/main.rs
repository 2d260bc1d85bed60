fn main() {
    if let Err(err) = gazewatch_lib::run() {
        log::error!("Gazewatch failed: {err:#}");
        std::process::exit(1);
    }
}
