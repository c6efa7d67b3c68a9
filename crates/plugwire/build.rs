// Build provenance for `plugwire version --extended`.
fn main() {
    for (from, to) in [
        ("TARGET", "PLUGWIRE_BUILD_TARGET"),
        ("PROFILE", "PLUGWIRE_BUILD_PROFILE"),
    ] {
        if let Ok(value) = std::env::var(from) {
            println!("cargo:rustc-env={to}={value}");
        }
        println!("cargo:rerun-if-env-changed={from}");
    }
}
