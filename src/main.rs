fn main() {
    if let Err(err) = marker_cluster::run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
