use std::process::Command;

fn main() {
    // Short commit hash surfaced in the `/` stats route.
    let git_hash = git_short_hash().unwrap_or_else(|| "dev".to_string());
    println!("cargo:rustc-env=GIT_HASH={}", git_hash);

    // Re-run when HEAD moves, including after refs get packed
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs/heads/");
    println!("cargo:rerun-if-changed=.git/packed-refs");
}

fn git_short_hash() -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let hash = String::from_utf8(output.stdout).ok()?;
    Some(hash.trim().to_string())
}
