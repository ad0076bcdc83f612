//! Build script for synap-rs.
//!
//! Links the vendor `libsynap_device` library when the `native` feature is
//! enabled. Without the feature nothing is linked and only the simulated
//! driver is available.
//!
//! # Environment Variables
//!
//! - `SYNAP_LIB_DIR`: Directory containing `libsynap_device.so` (optional,
//!   auto-detected from `SYNAP_SYSROOT` and common install prefixes)
//! - `SYNAP_SYSROOT`: Target sysroot searched for the library when cross-compiling
//! - `SYNAP_STATIC`: Set to "1" to link `libsynap_device.a` statically
//! - `SYNAP_SKIP_LINK`: Set to "1" to skip linking (for development)

use std::env;
use std::path::PathBuf;

const LIB_NAME: &str = "synap_device";

/// Find the directory holding the driver library.
///
/// Checks, in order:
/// 1. `SYNAP_LIB_DIR`
/// 2. `$SYNAP_SYSROOT/usr/lib` and `$SYNAP_SYSROOT/vendor/lib`
/// 3. `/usr/lib`, `/usr/local/lib`, `/vendor/lib`
fn find_lib_dir(static_link: bool) -> Option<PathBuf> {
    if let Ok(dir) = env::var("SYNAP_LIB_DIR") {
        return Some(PathBuf::from(dir));
    }

    let file_name = if static_link {
        format!("lib{}.a", LIB_NAME)
    } else {
        format!("lib{}.so", LIB_NAME)
    };

    let mut candidates = Vec::new();
    if let Ok(sysroot) = env::var("SYNAP_SYSROOT") {
        let sysroot = PathBuf::from(sysroot);
        candidates.push(sysroot.join("usr/lib"));
        candidates.push(sysroot.join("vendor/lib"));
    }
    for dir in ["/usr/lib", "/usr/local/lib", "/vendor/lib"] {
        candidates.push(PathBuf::from(dir));
    }

    candidates
        .into_iter()
        .find(|dir| dir.join(&file_name).exists())
}

fn main() {
    println!("cargo:rerun-if-env-changed=SYNAP_LIB_DIR");
    println!("cargo:rerun-if-env-changed=SYNAP_SYSROOT");
    println!("cargo:rerun-if-env-changed=SYNAP_STATIC");
    println!("cargo:rerun-if-env-changed=SYNAP_SKIP_LINK");

    if env::var_os("CARGO_FEATURE_NATIVE").is_none() {
        return;
    }
    link_synap_device();
}

fn link_synap_device() {
    // Check if we should skip linking
    if env::var("SYNAP_SKIP_LINK")
        .map(|v| v == "1")
        .unwrap_or(false)
    {
        println!("cargo:warning=Skipping libsynap_device link (SYNAP_SKIP_LINK=1)");
        return;
    }

    let static_link = env::var("SYNAP_STATIC").map(|v| v == "1").unwrap_or(false);

    let lib_dir = find_lib_dir(static_link).unwrap_or_else(|| {
        panic!(
            "Could not find lib{name}.\n\
             Checked: SYNAP_LIB_DIR, SYNAP_SYSROOT, /usr/lib, /usr/local/lib, /vendor/lib\n\
             \n\
             To fix, either:\n\
             1. Set SYNAP_LIB_DIR to the directory containing lib{name}.so\n\
             2. Set SYNAP_SYSROOT to the target sysroot\n\
             3. Build without the `native` feature to use the simulated driver only",
            name = LIB_NAME
        )
    });

    if !lib_dir.exists() {
        panic!(
            "Library path does not exist: {}\n\
             The SYNAP_LIB_DIR environment variable points to a non-existent path.",
            lib_dir.display()
        );
    }

    println!("cargo:rustc-link-search=native={}", lib_dir.display());
    let kind = if static_link { "static" } else { "dylib" };
    println!("cargo:rustc-link-lib={}={}", kind, LIB_NAME);

    if !static_link {
        // Use RPATH (not RUNPATH) for reliable library discovery
        println!("cargo:rustc-link-arg=-Wl,--disable-new-dtags");
        println!("cargo:rustc-link-arg=-Wl,-rpath,{}", lib_dir.display());
    }
}
