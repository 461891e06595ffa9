//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `reelmark_core` linkage.
//! - Print the derived sidecar path for each media path argument.

use reelmark_core::{sidecar_path_for, SidecarConfig};
use std::path::Path;
use std::process::ExitCode;

fn main() -> ExitCode {
    println!("reelmark_core ping={}", reelmark_core::ping());
    println!("reelmark_core version={}", reelmark_core::core_version());

    let config = match SidecarConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("config error: {err}");
            return ExitCode::FAILURE;
        }
    };

    let mut status = ExitCode::SUCCESS;
    for media in std::env::args().skip(1) {
        match sidecar_path_for(Path::new(&media), &config) {
            Ok(sidecar) => println!("{media} -> {}", sidecar.display()),
            Err(err) => {
                eprintln!("{media}: {err}");
                status = ExitCode::FAILURE;
            }
        }
    }
    status
}
