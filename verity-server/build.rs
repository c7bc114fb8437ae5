fn main() {
    built::write_built_file().expect("Failed to acquire build-time information");

    // Allow packagers to pin the reported version without a git checkout
    println!("cargo:rerun-if-env-changed=VERITY_GIT_HASH");
    if let Ok(hash) = std::env::var("VERITY_GIT_HASH") {
        println!("cargo:rustc-env=VERITY_GIT_HASH={}", hash);
    }
}
