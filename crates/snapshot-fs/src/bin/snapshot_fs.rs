//! snapshot_fs: mount a ZIP or TAR archive as a read-only filesystem.
//!
//! # Usage
//!
//! ```bash
//! snapshot_fs data.zip /mnt/data
//! # browse /mnt/data, then Ctrl-C to unmount
//! ```

use clap::Parser;
use env_logger::Env;
use log::{error, info};
use snapshot_archive::load_archive;
use snapshot_fs::{fuse, TreeFs};
use std::fs::{self, File};
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Mount a ZIP or TAR archive as a read-only filesystem.
///
/// Per-file gzip/xz/bzip2 entries are decompressed transparently and nested
/// archives appear as subdirectories.
#[derive(Parser, Debug)]
#[command(name = "snapshot_fs")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the archive (.zip or .tar)
    #[arg(value_name = "ARCHIVE")]
    archive: PathBuf,

    /// Directory to mount the archive at; created mode 0777 (and removed on
    /// exit) when missing
    #[arg(value_name = "MOUNTPOINT")]
    mountpoint: PathBuf,

    /// Increase logging verbosity (-v debug, -vv trace including the FUSE
    /// session)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

extern "C" fn on_sigint(_signal: libc::c_int) {
    INTERRUPTED.store(true, Ordering::SeqCst);
}

fn main() {
    let args = Args::parse();

    let log_level = match args.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level))
        .format_timestamp_millis()
        .init();

    if !args.archive.is_file() {
        error!("Archive not found: {}", args.archive.display());
        process::exit(1);
    }

    info!("Opening archive: {}", args.archive.display());
    let file = match File::open(&args.archive) {
        Ok(f) => f,
        Err(e) => {
            error!("Failed to open archive: {}", e);
            process::exit(1);
        }
    };

    let archive_name = args.archive.to_string_lossy().into_owned();
    let root = match load_archive(file, &archive_name) {
        Ok(root) => root,
        Err(e) => {
            error!("Failed to load archive: {}", e);
            process::exit(1);
        }
    };

    let created_mountpoint = !args.mountpoint.exists();
    if created_mountpoint {
        if let Err(e) = fs::create_dir_all(&args.mountpoint) {
            error!(
                "Failed to create mount point {}: {}",
                args.mountpoint.display(),
                e
            );
            process::exit(1);
        }
        if let Err(e) =
            fs::set_permissions(&args.mountpoint, fs::Permissions::from_mode(0o777))
        {
            error!(
                "Failed to set permissions on {}: {}",
                args.mountpoint.display(),
                e
            );
            process::exit(1);
        }
    }

    unsafe {
        libc::signal(libc::SIGINT, on_sigint as libc::sighandler_t);
    }

    let session = match fuse::mount_background(TreeFs::new(root), &args.mountpoint) {
        Ok(session) => session,
        Err(e) => {
            error!("FUSE mount failed: {}", e);
            if created_mountpoint {
                let _ = fs::remove_dir(&args.mountpoint);
            }
            process::exit(1);
        }
    };
    info!(
        "Mounted {} at {}",
        args.archive.display(),
        args.mountpoint.display()
    );

    while !INTERRUPTED.load(Ordering::SeqCst) {
        std::thread::sleep(Duration::from_millis(100));
    }

    info!("Unmounting {}", args.mountpoint.display());
    session.join();

    if created_mountpoint {
        if let Err(e) = fs::remove_dir(&args.mountpoint) {
            error!(
                "Failed to remove mount point {}: {}",
                args.mountpoint.display(),
                e
            );
            process::exit(1);
        }
    }
}
