//! kpxc: fetch logins and TOTP codes from a running KeePassXC.

#![forbid(unsafe_code)]

mod format;
mod paths;

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use kpxc_client::{
    FileIdentityStore, Handshake, HandshakeOptions, Identity, IdentityStore, Session,
};
use tokio::net::UnixStream;
use tracing::debug;

#[derive(Parser, Debug)]
#[command(name = "kpxc", version)]
#[command(about = "Fetch logins and TOTP codes from KeePassXC's browser integration")]
struct Args {
    /// Path to the KeePassXC browser proxy socket
    #[arg(long, env = "KPXC_SOCKET")]
    socket: Option<PathBuf>,

    /// Identity file; `-` reads it from stdin
    #[arg(long, env = "KPXC_IDENTITY")]
    identity: Option<PathBuf>,

    /// Print JSON instead of formatted text
    #[arg(long)]
    json: bool,

    /// Pair with KeePassXC and print the new identity to stdout
    #[arg(long)]
    associate: bool,

    /// Treat arguments as entry UUIDs and print their TOTP codes
    #[arg(long)]
    totp: bool,

    /// Entry format: name %n, login %l, password %p, uuid %u, custom field %F:name
    #[arg(long = "fmt", default_value = "%p")]
    format: String,

    /// Neither raise the unlock prompt nor wait for the database to unlock
    #[arg(long, alias = "nounlock")]
    no_unlock: bool,

    /// URLs to look up, or entry UUIDs with --totp
    args: Vec<String>,
}

fn main() -> Result<()> {
    kpxc_common::init_tracing_with_default("warn");

    let mut args = Args::parse();
    if !args.json {
        args.format = format::unescape(&args.format)?;
    }
    if !args.associate && args.args.is_empty() {
        if args.totp {
            bail!("entry UUID is required");
        }
        bail!("URL argument is required");
    }

    // Reading `--identity -` blocks on stdin, so it happens before the runtime starts.
    let (identity, store) = load_identity(&args)?;

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    rt.block_on(run(args, identity, store))
}

async fn run(args: Args, identity: Identity, mut store: FileIdentityStore) -> Result<()> {
    let stream = connect(&args).await?;
    let mut session = Session::new(stream, identity);

    let options = HandshakeOptions {
        trigger_unlock: !args.no_unlock,
        wait_for_unlock: !args.no_unlock,
        ..HandshakeOptions::default()
    };
    let report = Handshake::new(options)
        .on_unlock_wait(|attempt| {
            eprint!("waiting for the database to be unlocked... {}\r", attempt);
        })
        .run(&mut session, &mut store)
        .await
        .context("failed to connect to KeePassXC")?;
    debug!(?report, "connected");

    if args.associate {
        return Ok(());
    }

    let stdout = io::stdout();
    let mut out = stdout.lock();
    for arg in &args.args {
        if args.totp {
            let code = session.get_totp(arg).await?;
            if args.json {
                serde_json::to_writer(&mut out, &serde_json::json!({ "totp": code }))?;
                writeln!(out)?;
            } else {
                write!(out, "{}", format::format_totp(&code))?;
            }
        } else {
            let entries = session
                .get_logins(arg)
                .await
                .with_context(|| format!("can't print logins for {}", arg))?;
            if args.json {
                serde_json::to_writer(&mut out, &entries)?;
                writeln!(out)?;
            } else {
                write!(out, "{}", format::format_entries(&args.format, &entries))?;
            }
        }
    }
    out.flush()?;
    Ok(())
}

/// The identity to present and where a new pairing gets saved.
///
/// `--associate` always starts from a fresh identity and prints it. With
/// `--identity -` the identity is read from stdin and a new pairing is
/// printed to stdout.
fn load_identity(args: &Args) -> Result<(Identity, FileIdentityStore)> {
    if args.associate {
        return Ok((Identity::generate(), FileIdentityStore::stdio()));
    }

    let path = args.identity.clone().unwrap_or_else(|| {
        paths::default_identity_path(
            std::env::var_os("XDG_DATA_HOME").as_deref().map(Path::new),
            std::env::var_os("HOME").as_deref().map(Path::new),
        )
    });
    let mut store = FileIdentityStore::new(&path);
    let identity = store
        .load()
        .with_context(|| format!("failed to load identity from {}", path.display()))?
        .unwrap_or_else(Identity::generate);
    Ok((identity, store))
}

async fn connect(args: &Args) -> Result<UnixStream> {
    let runtime_dir = std::env::var_os("XDG_RUNTIME_DIR").map(PathBuf::from);
    let candidates = paths::socket_candidates(args.socket.as_deref(), runtime_dir.as_deref());

    let mut last_err = None;
    for path in &candidates {
        match UnixStream::connect(path).await {
            Ok(stream) => {
                debug!("connected to {}", path.display());
                return Ok(stream);
            }
            Err(e) => {
                debug!("failed to connect to {}: {}", path.display(), e);
                last_err = Some(e);
            }
        }
    }

    let tried = candidates
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ");
    match last_err {
        Some(e) => Err(e).context(format!("error connecting to KeePassXC (tried {})", tried)),
        None => bail!("no socket to connect to"),
    }
}
