//! Check system capabilities.

use clipmerge_common::config::config_file_path;
use clipmerge_export::ffmpeg::command_exists;

pub fn run() -> anyhow::Result<()> {
    println!("ClipMerge System Check");
    println!("{}", "=".repeat(50));

    let tools = [
        ("ffmpeg", "encoding merged movies"),
        ("ffprobe", "reading clip metadata"),
    ];
    let mut all_ok = true;
    for (binary, purpose) in tools {
        if command_exists(binary) {
            println!("[OK] {binary} found ({purpose})");
        } else {
            println!("[MISSING] {binary} not found in PATH ({purpose})");
            all_ok = false;
        }
    }

    let config_path = config_file_path();
    if config_path.exists() {
        println!("[OK] Config: {}", config_path.display());
    } else {
        println!("[INFO] Config: defaults ({} not present)", config_path.display());
    }

    println!();
    if all_ok {
        println!("All required tools are available. ClipMerge is ready.");
    } else {
        println!("Some required tools are missing. Install ffmpeg to merge media files.");
    }

    Ok(())
}
