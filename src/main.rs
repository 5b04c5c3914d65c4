fn main() {
    if let Err(err) = cohort_metadata::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
