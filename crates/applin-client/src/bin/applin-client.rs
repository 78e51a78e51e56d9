fn main() {
    let code = applin_client::run_from_env();
    std::process::exit(code);
}
