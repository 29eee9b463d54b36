use dotenvy::dotenv;
use node_gate_bot::bot::run_bot;
use node_gate_bot::config::Settings;
use regex::Regex;
use std::borrow::Cow;
use std::io::{self, Write};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{prelude::*, EnvFilter};

/// Secrets that must never reach the log output: the bot token (it is part
/// of every Bot API URL teloxide and reqwest may print) and the MinIO keys.
const REDACTION_RULES: &[(&str, &str)] = &[
    (r"(https?://[^/]+/bot)[0-9]+:[A-Za-z0-9_-]+", "${1}[TELEGRAM_TOKEN]"),
    (r"\b[0-9]{8,10}:[A-Za-z0-9_-]{35}\b", "[TELEGRAM_TOKEN]"),
    (r"(MINIO_(?:ACCESS|SECRET)_KEY)=[^\s&]+", "${1}=[MASKED]"),
];

/// Compiled redaction rules, applied in order
struct RedactionPatterns {
    rules: Vec<(Regex, &'static str)>,
}

impl RedactionPatterns {
    /// Compile the redaction rules
    ///
    /// # Errors
    ///
    /// Returns an error if any regex pattern is invalid
    fn new() -> Result<Self, regex::Error> {
        let rules = REDACTION_RULES
            .iter()
            .map(|&(pattern, replacement)| Regex::new(pattern).map(|regex| (regex, replacement)))
            .collect::<Result<_, regex::Error>>()?;
        Ok(Self { rules })
    }

    fn redact<'a>(&self, input: &'a str) -> Cow<'a, str> {
        self.rules
            .iter()
            .fold(Cow::Borrowed(input), |text, (regex, replacement)| {
                let changed = match regex.replace_all(&text, *replacement) {
                    Cow::Owned(changed) => Some(changed),
                    Cow::Borrowed(_) => None,
                };
                changed.map_or(text, Cow::Owned)
            })
    }
}

struct RedactingWriter<W: Write> {
    inner: W,
    patterns: Arc<RedactionPatterns>,
}

impl<W: Write> RedactingWriter<W> {
    const fn new(inner: W, patterns: Arc<RedactionPatterns>) -> Self {
        Self { inner, patterns }
    }
}

impl<W: Write> Write for RedactingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let s = String::from_utf8_lossy(buf);
        let redacted = self.patterns.redact(&s);
        self.inner.write_all(redacted.as_bytes())?;
        // Report the original length even though the redacted text may differ
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

struct RedactingMakeWriter<F> {
    make_inner: F,
    patterns: Arc<RedactionPatterns>,
}

impl<F> RedactingMakeWriter<F> {
    const fn new(make_inner: F, patterns: Arc<RedactionPatterns>) -> Self {
        Self {
            make_inner,
            patterns,
        }
    }
}

impl<'a, F, W> tracing_subscriber::fmt::MakeWriter<'a> for RedactingMakeWriter<F>
where
    F: Fn() -> W + 'static,
    W: Write,
{
    type Writer = RedactingWriter<W>;

    fn make_writer(&'a self) -> Self::Writer {
        RedactingWriter::new((self.make_inner)(), self.patterns.clone())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    let patterns = Arc::new(RedactionPatterns::new().map_err(|e| {
        eprintln!("Failed to compile regex patterns: {e}");
        e
    })?);

    init_logging(patterns);

    info!("Starting Node Gate Bot...");

    let settings = init_settings();

    if let Err(e) = run_bot(settings).await {
        error!("Bot stopped with error: {:#}", e);
        std::process::exit(1);
    }

    info!("Done! Have a great day!");
    Ok(())
}

fn init_logging(patterns: Arc<RedactionPatterns>) {
    let make_writer = RedactingMakeWriter::new(io::stderr, patterns);

    let debug_mode = std::env::var("DEBUG_MODE")
        .map(|v| v == "true" || v == "1")
        .unwrap_or(false);

    let filter = if debug_mode {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(
                "node_gate_bot=info,teloxide=info,aws_config=warn,aws_smithy_runtime=warn,hyper=warn,h2=error,reqwest=warn",
            )
        })
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(make_writer))
        .init();
}

fn init_settings() -> Arc<Settings> {
    match Settings::new() {
        Ok(s) => {
            info!("Configuration loaded successfully.");
            Arc::new(s)
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    }
}
