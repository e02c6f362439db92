/// Intercept messages using the `log` crate and print them to STDOUT, with a default filter of
/// `info`. Override with the usual RUST_LOG syntax.
pub fn setup() {
    use env_logger::{Builder, Env};
    Builder::from_env(Env::default().default_filter_or("info")).init();
}
