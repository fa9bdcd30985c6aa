fn main() {
    if let Err(err) = cloth_sim::start() {
        tracing::error!("{}", err);
        std::process::exit(1);
    }
}
