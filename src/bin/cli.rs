//
//! Operator CLI for the s3vfs storage engine.
//!
//! Examples:
//! ```bash
//! s3vfs --url s3://key:secret@minio.local:9000/media check
//! s3vfs --url ... caps
//! s3vfs --url ... ls /media/recordings/
//! s3vfs --url ... stat /media/recordings/clip.mkv
//! s3vfs --url ... put local.bin /media/dir/remote.bin
//! s3vfs --url ... get /media/dir/remote.bin local.bin
//! s3vfs --url ... mv /media/a.bin /media/b.bin
//! s3vfs --url ... df
//! ```

use std::io::Write;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, Subcommand};

use s3vfs::{OpenMode, StorageEngine};

#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// Connection URL: s3://key:secret@host/bucket[@quotaGiB].
    /// Falls back to the S3VFS_URL environment variable.
    #[arg(long, value_name = "URL")]
    url: Option<String>,

    #[arg(short = 'v',
        long,
        action = ArgAction::Count,
        help = "Increase log verbosity: -v = Info, -vv = Debug",
    )]
    verbose: u8,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Probe bucket availability (bounded retry on transient failures).
    Check,
    /// Report which operations the backing store supports.
    Caps,
    /// List the immediate children of a directory URL.
    Ls { dir_url: String },
    /// Print existence and size of one file URL.
    Stat { file_url: String },
    /// Report used / free / total space.
    Df,
    /// Upload a local file.
    Put { local: PathBuf, file_url: String },
    /// Download to a local file.
    Get { file_url: String, local: PathBuf },
    /// Remove a file.
    Rm { file_url: String },
    /// Rename a file (copy then delete; not atomic).
    Mv { old_url: String, new_url: String },
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let url = match cli.url.or_else(|| std::env::var("S3VFS_URL").ok()) {
        Some(url) => url,
        None => bail!("no connection URL: pass --url or set S3VFS_URL"),
    };

    let engine = StorageEngine::connect(&url)?;

    match cli.cmd {
        Command::Check => {
            if engine.is_available() {
                println!("available");
            } else {
                println!("unavailable");
                std::process::exit(1);
            }
        }
        Command::Caps => {
            let caps = engine.capabilities()?;
            println!("{caps} (0x{:x})", caps.bits());
        }
        Command::Ls { dir_url } => {
            for entry in engine.file_iterator(&dir_url)? {
                if entry.is_directory {
                    println!("{:>12}  {}/", "<dir>", entry.url.trim_end_matches('/'));
                } else {
                    println!("{:>12}  {}", entry.size, entry.url);
                }
            }
        }
        Command::Stat { file_url } => {
            if engine.file_exists(&file_url)? {
                println!("{}  {} bytes", file_url, engine.file_size(&file_url)?);
            } else {
                println!("{file_url}  not found");
                std::process::exit(1);
            }
        }
        Command::Df => {
            println!("used:  {}", engine.used_space());
            println!("free:  {}", engine.free_space()?);
            println!("total: {}", engine.total_space()?);
        }
        Command::Put { local, file_url } => {
            let data = std::fs::read(&local)
                .with_context(|| format!("reading {}", local.display()))?;
            let mut handle = engine.open(&file_url, OpenMode::WriteOnly)?;
            handle.write(&data)?;
            handle.flush()?;
            handle.close();
            println!("uploaded {} bytes to {file_url}", data.len());
        }
        Command::Get { file_url, local } => {
            let mut handle = engine.open(&file_url, OpenMode::ReadOnly)?;
            let mut out = std::fs::File::create(&local)
                .with_context(|| format!("creating {}", local.display()))?;
            let mut buf = vec![0u8; 1024 * 1024];
            let mut total = 0u64;
            loop {
                let n = handle.read(&mut buf)?;
                if n == 0 {
                    break;
                }
                out.write_all(&buf[..n])?;
                total += n as u64;
            }
            handle.close();
            println!("downloaded {total} bytes from {file_url}");
        }
        Command::Rm { file_url } => {
            engine.remove_file(&file_url)?;
            println!("removed {file_url}");
        }
        Command::Mv { old_url, new_url } => {
            engine.rename_file(&old_url, &new_url)?;
            println!("renamed {old_url} -> {new_url}");
        }
    }

    Ok(())
}
