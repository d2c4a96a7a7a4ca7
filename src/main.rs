use std::{
    fs,
    io::{Read, Write},
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use ed25519_dalek::SigningKey;
use fd_lock::RwLock;
use rand::rngs::OsRng;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use inssats::{
    config::VaultSettings,
    format::{format_sats, format_with_sign},
    ledger::{parse_amount, LedgerSnapshot, VaultLedger},
    projection::{shift_left_years, SeriesPoint},
    signature::{parse_signing_key, sign_withdrawal, AcceptAnySignature, Ed25519Verifier},
};

#[derive(Parser)]
#[command(
    author,
    version,
    about = "INSSats planned withdrawals: reserve vault funds, then settle them"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Ledger state file
    #[arg(short, long, default_value = "inssats_state.json")]
    state: PathBuf,
    /// Vault settings used by `init` (JSON: {"label": ..., "balance": ...})
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Log debug output (RUST_LOG takes precedence)
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a fresh vault state file
    Init {
        #[arg(long)]
        label: Option<String>,
        #[arg(long)]
        balance: Option<u64>,
        /// Overwrite an existing state file
        #[arg(long)]
        force: bool,
    },
    /// Print vault balance and the pending operation
    Show,
    /// Reserve funds for a planned withdrawal
    Initiate {
        #[arg(long, allow_hyphen_values = true)]
        amount: String,
        #[arg(long)]
        destination: String,
        #[arg(long)]
        signature: String,
        /// Check the signature as Ed25519 over the request digest
        #[arg(long)]
        verify: bool,
    },
    /// Settle the pending withdrawal
    Execute,
    /// Generate an Ed25519 keypair (sk.hex / pk.hex)
    Keygen {
        #[arg(long)]
        out_dir: PathBuf,
    },
    /// Sign a withdrawal request
    Sign {
        #[arg(long)]
        sk_hex: String,
        #[arg(long)]
        amount: u64,
        #[arg(long)]
        destination: String,
    },
    /// Format a sats amount with an explicit sign
    Format {
        #[arg(allow_hyphen_values = true)]
        value: i64,
    },
    /// Shift a retirement curve (JSON list of {age, btc}) earlier by N years
    Project {
        #[arg(long)]
        years: u32,
        /// Series file; read from stdin when omitted
        #[arg(long)]
        series: Option<PathBuf>,
    },
}

//==================== state file ====================//

fn load_state(path: &Path) -> Result<VaultLedger> {
    let bytes = fs::read(path).with_context(|| {
        format!(
            "cannot read state {} (run `inssats init` first)",
            path.display()
        )
    })?;
    let snapshot: LedgerSnapshot = serde_json::from_slice(&bytes)
        .with_context(|| format!("state parse {}", path.display()))?;
    Ok(VaultLedger::from_snapshot(snapshot))
}

fn save_state(path: &Path, ledger: &VaultLedger) -> Result<()> {
    let json = serde_json::to_vec_pretty(&ledger.snapshot())?;
    write_all(path, &json)?;
    debug!(path = %path.display(), "state written");
    Ok(())
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("mkdir {}", parent.display()))?;
        }
    }
    Ok(())
}

/// Run `f` while holding an exclusive lock on `<state>.lock`. The state file
/// itself is replaced by rename on every save, so the lock lives beside it.
fn with_state_lock<T>(state: &Path, f: impl FnOnce() -> Result<T>) -> Result<T> {
    ensure_parent(state)?;
    let path = sibling(state, ".lock");
    let file = fs::OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&path)
        .with_context(|| format!("open {}", path.display()))?;
    let mut lock = RwLock::new(file);
    let _guard = lock
        .write()
        .with_context(|| format!("lock {}", path.display()))?;
    f()
}

/// Write to `<path>.tmp`, sync, then rename over `path`; readers see either
/// the old contents or the new ones.
fn write_all(path: &Path, bytes: &[u8]) -> Result<()> {
    ensure_parent(path)?;
    let tmp = sibling(path, ".tmp");
    {
        let mut f =
            fs::File::create(&tmp).with_context(|| format!("create {}", tmp.display()))?;
        f.write_all(bytes)
            .with_context(|| format!("write {}", tmp.display()))?;
        f.sync_all()
            .with_context(|| format!("sync {}", tmp.display()))?;
    }
    fs::rename(&tmp, path)
        .with_context(|| format!("rename {} → {}", tmp.display(), path.display()))?;
    Ok(())
}

fn print_vault(ledger: &VaultLedger) {
    let vault = ledger.vault();
    println!("Vault:   {}", vault.label);
    println!("Balance: {}", format_sats(vault.balance));
    match ledger.pending() {
        Some(op) => {
            println!("Pending: {} ({} → {})", op.id, format_sats(op.amount), op.destination)
        }
        None => println!("Pending: none"),
    }
}

//==================== commands ====================//

fn init_cmd(
    cli: &Cli,
    label: Option<String>,
    balance: Option<u64>,
    force: bool,
) -> Result<()> {
    let mut settings = match &cli.config {
        Some(path) => VaultSettings::load(path)?,
        None => VaultSettings::default(),
    };
    if let Some(label) = label {
        settings.label = label;
    }
    if let Some(balance) = balance {
        settings.balance = balance;
    }
    let ledger = settings.into_ledger();
    with_state_lock(&cli.state, || {
        if cli.state.exists() && !force {
            bail!(
                "{} already exists (use --force to overwrite)",
                cli.state.display()
            );
        }
        save_state(&cli.state, &ledger)
    })?;
    info!(state = %cli.state.display(), "vault initialised");
    print_vault(&ledger);
    Ok(())
}

fn initiate_cmd(
    cli: &Cli,
    amount: &str,
    destination: &str,
    signature: &str,
    verify: bool,
) -> Result<()> {
    let amount = parse_amount(amount)?;
    let (ledger, op) = with_state_lock(&cli.state, || {
        let mut ledger = load_state(&cli.state)?;
        let op = if verify {
            ledger.initiate_verified(amount, destination, signature, &Ed25519Verifier)?
        } else {
            ledger.initiate_verified(amount, destination, signature, &AcceptAnySignature)?
        };
        save_state(&cli.state, &ledger)?;
        Ok((ledger, op))
    })?;
    println!("Pending operation created (id={}).", op.id);
    print_vault(&ledger);
    Ok(())
}

fn execute_cmd(cli: &Cli) -> Result<()> {
    let (ledger, op) = with_state_lock(&cli.state, || {
        let mut ledger = load_state(&cli.state)?;
        let (_, op) = ledger.settle()?;
        save_state(&cli.state, &ledger)?;
        Ok((ledger, op))
    })?;
    println!("Withdrawal executed for {} sats.", op.amount);
    print_vault(&ledger);
    Ok(())
}

fn keygen_cmd(out_dir: &Path) -> Result<()> {
    let sk = SigningKey::generate(&mut OsRng);
    let pk = sk.verifying_key();
    write_all(&out_dir.join("sk.hex"), hex::encode(sk.to_bytes()).as_bytes())?;
    write_all(&out_dir.join("pk.hex"), hex::encode(pk.as_bytes()).as_bytes())?;
    println!("keypair written → {}", out_dir.display());
    Ok(())
}

fn sign_cmd(sk_hex: &str, amount: u64, destination: &str) -> Result<()> {
    let sk = parse_signing_key(sk_hex)?;
    println!("{}", sign_withdrawal(&sk, amount, destination));
    Ok(())
}

fn shift_series_json(years: u32, bytes: &[u8]) -> Result<String> {
    let points: Vec<SeriesPoint> = serde_json::from_slice(bytes).context("series parse")?;
    let shifted = shift_left_years(&points, years);
    Ok(serde_json::to_string_pretty(&shifted)?)
}

fn project_cmd(years: u32, series: Option<&Path>) -> Result<()> {
    let bytes = match series {
        Some(path) => fs::read(path).with_context(|| format!("read {}", path.display()))?,
        None => {
            let mut buf = Vec::new();
            std::io::stdin()
                .read_to_end(&mut buf)
                .context("read series from stdin")?;
            buf
        }
    };
    println!("{}", shift_series_json(years, &bytes)?);
    Ok(())
}

fn run(cli: &Cli) -> Result<()> {
    match &cli.command {
        Commands::Init {
            label,
            balance,
            force,
        } => init_cmd(cli, label.clone(), *balance, *force),
        Commands::Show => {
            print_vault(&load_state(&cli.state)?);
            Ok(())
        }
        Commands::Initiate {
            amount,
            destination,
            signature,
            verify,
        } => initiate_cmd(cli, amount, destination, signature, *verify),
        Commands::Execute => execute_cmd(cli),
        Commands::Keygen { out_dir } => keygen_cmd(out_dir),
        Commands::Sign {
            sk_hex,
            amount,
            destination,
        } => sign_cmd(sk_hex, *amount, destination),
        Commands::Format { value } => {
            println!("{}", format_with_sign(*value));
            Ok(())
        }
        Commands::Project { years, series } => project_cmd(*years, series.as_deref()),
    }
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run(&cli) {
        error!("{err:#}");
        std::process::exit(2);
    }
}
