use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;

const MIN_VERSION: &str = "2.12";

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // The copy engine calls the static inline helpers (get_sqe, prep_read,
    // peek_cqe, ...), which only liburing-ffi exports as real symbols.
    if let Some(include_dir) = probe_system() {
        generate_bindings(&include_dir.join("liburing.h"), &include_dir);
        return;
    }

    let include_dir = build_vendored();
    generate_bindings(&include_dir.join("liburing.h"), &include_dir);
}

/// Look for a system liburing-ffi through pkg-config and emit its link flags.
fn probe_system() -> Option<PathBuf> {
    let lib = match pkg_config::Config::new()
        .atleast_version(MIN_VERSION)
        .probe("liburing-ffi")
    {
        Ok(lib) => lib,
        Err(e) => {
            println!(
                "cargo:warning=liburing-ffi >= {} not found via pkg-config ({})",
                MIN_VERSION, e
            );
            return None;
        }
    };

    lib.include_paths
        .first()
        .cloned()
        .or_else(|| Some(PathBuf::from("/usr/include")))
}

fn generate_bindings(header: &Path, include_dir: &Path) {
    let out_path = PathBuf::from(env::var("OUT_DIR").unwrap());

    let bindings = bindgen::Builder::default()
        .header(header.to_str().unwrap())
        .clang_arg(format!("-I{}", include_dir.display()))
        // Only what the ring wrapper touches
        .allowlist_type("io_uring")
        .allowlist_type("io_uring_sqe")
        .allowlist_type("io_uring_cqe")
        .allowlist_type("io_uring_params")
        .allowlist_function("io_uring_queue_init")
        .allowlist_function("io_uring_queue_init_params")
        .allowlist_function("io_uring_queue_exit")
        .allowlist_function("io_uring_submit")
        .allowlist_var("IORING_SETUP_.*")
        .derive_debug(true)
        .derive_default(true)
        .layout_tests(false)
        .parse_callbacks(Box::new(bindgen::CargoCallbacks::new()))
        .generate()
        .expect("Unable to generate liburing bindings");

    bindings
        .write_to_file(out_path.join("bindings.rs"))
        .expect("Couldn't write bindings!");

    println!("cargo:rerun-if-changed={}", header.display());
}

/// Clone and build the pinned liburing release, returning its include directory.
fn build_vendored() -> PathBuf {
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());
    let src_dir = out_dir.join("liburing-src");

    if !src_dir.exists() {
        println!("cargo:warning=Cloning liburing {} from GitHub...", MIN_VERSION);
        run(Command::new("git").args([
            "clone",
            "--depth=1",
            "--branch",
            &format!("liburing-{}", MIN_VERSION),
            "https://github.com/axboe/liburing.git",
            src_dir.to_str().unwrap(),
        ]));
    }

    println!("cargo:warning=Building liburing from source...");
    run(Command::new("./configure").current_dir(&src_dir));
    run(Command::new("make")
        .current_dir(&src_dir)
        .args(["-j", "-C", "src"]));

    println!(
        "cargo:rustc-link-search=native={}",
        src_dir.join("src").display()
    );
    println!("cargo:rustc-link-lib=static=uring-ffi");

    src_dir.join("src/include")
}

fn run(cmd: &mut Command) {
    let status = cmd
        .status()
        .unwrap_or_else(|e| panic!("failed to spawn {:?}: {}", cmd, e));
    if !status.success() {
        panic!("{:?} exited with {}", cmd, status);
    }
}
