//! secure-files: password-based file encryption CLI
//!
//!   enc <file>...   - encrypt each file to `<file>.enc`
//!   dec <file>...   - decrypt each `<file>.enc` back to `<file>`
//!
//! Every file gets its own salt, keys and nonce sequence, so files are
//! processed in parallel on blocking worker threads.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use secrecy::SecretString;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use sf_core::config::{expand_tilde, SfConfig};
use sf_core::{derive_output_path, format_size, validate_input, Direction};
use sf_crypto::{CryptoError, FileCipher};

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "secure-files",
    version,
    about = "Encrypt and decrypt files with a password",
    long_about = "secure-files: Argon2id-derived keys, chunked ChaCha20-Poly1305 file encryption"
)]
struct Cli {
    /// Operation to perform
    mode: Mode,

    /// Files to process
    #[arg(required = true, value_name = "INPUT_FILE")]
    inputs: Vec<PathBuf>,

    /// Path to config.toml
    #[arg(
        long,
        short = 'c',
        env = "SECURE_FILES_CONFIG",
        default_value = "~/.config/secure-files/config.toml"
    )]
    config: PathBuf,

    /// Password (prompted for when not given)
    #[arg(long, env = "SECURE_FILES_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Log level or filter directive (overrides config)
    #[arg(long, env = "SECURE_FILES_LOG")]
    log: Option<String>,

    /// Log format (overrides config)
    #[arg(long, env = "SECURE_FILES_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    /// Files processed at once (0 = number of CPUs; overrides config)
    #[arg(long, short = 'j', env = "SECURE_FILES_JOBS")]
    jobs: Option<usize>,
}

#[derive(Clone, Copy, Debug, ValueEnum, PartialEq, Eq)]
enum Mode {
    /// Encrypt files
    #[value(name = "enc", alias = "encrypt")]
    Enc,
    /// Decrypt files
    #[value(name = "dec", alias = "decrypt")]
    Dec,
}

impl From<Mode> for Direction {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Enc => Direction::Encrypt,
            Mode::Dec => Direction::Decrypt,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum, PartialEq, Eq)]
enum LogFormat {
    Json,
    Text,
}

impl LogFormat {
    fn from_config(value: &str) -> Self {
        if value.eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Text
        }
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = expand_tilde(&cli.config);
    let config_found = config_path.exists();
    let config = SfConfig::load(&config_path)
        .with_context(|| format!("loading config: {}", config_path.display()))?;

    let settings = Settings::resolve(&cli, &config);
    init_logging(&settings.log_level, settings.log_format);

    if !config_found {
        warn!(
            "config file not found: {}  (using defaults)",
            config_path.display()
        );
    }

    let jobs = settings.jobs;

    let direction = Direction::from(cli.mode);
    let password = Arc::new(read_password(cli.password)?);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        direction = %direction,
        files = cli.inputs.len(),
        jobs,
        "secure-files starting"
    );

    let results = run_all(
        direction,
        cli.inputs,
        password,
        jobs,
        Arc::new(FileCipher::default()),
    )
    .await?;

    let failed = results.iter().filter(|r| r.is_err()).count();
    if failed > 0 {
        anyhow::bail!("{failed} of {} files failed", results.len());
    }
    Ok(())
}

/// Effective settings: command-line flags win over config values.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Settings {
    log_level: String,
    log_format: LogFormat,
    jobs: usize,
}

impl Settings {
    fn resolve(cli: &Cli, config: &SfConfig) -> Self {
        let log_level = cli.log.clone().unwrap_or_else(|| config.log.level.clone());
        let log_format = cli
            .log_format
            .unwrap_or_else(|| LogFormat::from_config(&config.log.format));

        let mut jobs = config.jobs.clone();
        if let Some(n) = cli.jobs {
            jobs.max_parallel = n;
        }

        Self {
            log_level,
            log_format,
            jobs: jobs.effective_parallelism(),
        }
    }
}

fn init_logging(level: &str, format: LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}

// ── Password ──────────────────────────────────────────────────────────────────

fn read_password(given: Option<String>) -> Result<SecretString> {
    let raw = match given {
        Some(p) => p,
        None => {
            let prompted =
                rpassword::prompt_password("Enter Password: ").context("reading password")?;
            trim_prompted(&prompted)
        }
    };
    check_password(raw)
}

/// Strip surrounding ASCII spaces (only spaces) from a typed password.
fn trim_prompted(raw: &str) -> String {
    raw.trim_matches(' ').to_string()
}

fn check_password(password: String) -> Result<SecretString> {
    if password.is_empty() {
        anyhow::bail!("password must not be empty");
    }
    Ok(SecretString::from(password))
}

// ── Fan-out ───────────────────────────────────────────────────────────────────

/// One successfully processed file.
#[derive(Debug)]
struct FileReport {
    direction: Direction,
    input: PathBuf,
    bytes: u64,
    elapsed: Duration,
}

impl std::fmt::Display for FileReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = self
            .input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.input.display().to_string());
        write!(
            f,
            "File {}: {name}. {} processed in {:.2?}.",
            self.direction.past_tense(),
            format_size(self.bytes),
            self.elapsed
        )
    }
}

/// Process every input, at most `jobs` at a time. Results come back in
/// input order; each is printed as soon as it is collected.
async fn run_all(
    direction: Direction,
    inputs: Vec<PathBuf>,
    password: Arc<SecretString>,
    jobs: usize,
    cipher: Arc<FileCipher>,
) -> Result<Vec<Result<FileReport>>> {
    let semaphore = Arc::new(Semaphore::new(jobs.max(1)));
    let pb = if inputs.len() > 1 && std::io::stderr().is_terminal() {
        make_progress_bar(inputs.len() as u64, &direction.to_string())
    } else {
        ProgressBar::hidden()
    };

    let mut handles = Vec::with_capacity(inputs.len());
    for input in inputs {
        let permit = semaphore
            .clone()
            .acquire_owned()
            .await
            .context("job semaphore closed")?;
        let password = Arc::clone(&password);
        let cipher = Arc::clone(&cipher);
        let handle = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            process_file(&cipher, direction, &input, &password)
        });
        handles.push(handle);
    }

    let mut results = Vec::with_capacity(handles.len());
    for handle in handles {
        let result = handle.await.context("file worker panicked")?;
        match &result {
            Ok(report) => pb.suspend(|| println!("{report}")),
            Err(e) => pb.suspend(|| eprintln!("error: {e:#}")),
        }
        pb.inc(1);
        results.push(result);
    }
    pb.finish_and_clear();

    Ok(results)
}

/// Validate `input`, derive its output path and run one encrypt or decrypt.
fn process_file(
    cipher: &FileCipher,
    direction: Direction,
    input: &Path,
    password: &SecretString,
) -> Result<FileReport> {
    let input = validate_input(input)?;
    let output = derive_output_path(direction, &input)?;
    debug!(input = %input.display(), output = %output.display(), "processing");

    let output_existed = output.exists();
    let result = match direction {
        Direction::Encrypt => cipher.encrypt_file(&input, &output, password),
        Direction::Decrypt => cipher.decrypt_file(&input, &output, password),
    };

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(e @ CryptoError::OutputExists(_)) => return Err(e.into()),
        Err(e) if !output_existed && output.exists() => {
            return Err(anyhow::Error::new(e).context(format!(
                "{} failed: {} is incomplete and must not be trusted",
                input.display(),
                output.display()
            )))
        }
        Err(e) => {
            return Err(anyhow::Error::new(e).context(format!("{} failed", input.display())))
        }
    };

    Ok(FileReport {
        direction,
        input,
        bytes: outcome.bytes,
        elapsed: outcome.elapsed,
    })
}

// ── Progress bar ──────────────────────────────────────────────────────────────

fn make_progress_bar(total: u64, prefix: &str) -> ProgressBar {
    let pb = ProgressBar::new(total);
    let style = ProgressStyle::with_template("{prefix:.bold} [{bar:40.cyan/blue}] {pos}/{len}")
        .map(|s| s.progress_chars("=>-"))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    pb.set_prefix(prefix.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}
