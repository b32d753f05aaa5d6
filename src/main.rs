//! CLI entry point for `tnefshell`.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{CommandFactory, Parser, Subcommand};
use humansize::{format_size, BINARY};
use indicatif::{ProgressBar, ProgressStyle};

use tnefshell::config::{Config, DecoderOptions};
use tnefshell::export::directory::{sanitize_filename_part, DirectorySink, WrittenArtifact};
use tnefshell::model::artifact::Artifact;
use tnefshell::parser::mime::find_tnef_parts;
use tnefshell::parser::{decode_all, decode_reader, ParseState};

#[derive(Parser)]
#[command(
    name = "tnefshell",
    version,
    about = "Decode TNEF (winmail.dat) attachments",
    long_about = "Decode TNEF (winmail.dat) attachments into their files, message bodies, \
                  iCalendar meetings and vCard contacts."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Also write a text dump of every MAPI property table
    #[arg(long, global = true)]
    raw_mapi: bool,

    /// Keep attachment file names as stored, without code page repair
    #[arg(long, global = true)]
    no_charset: bool,

    /// Do not synthesize iCalendar files from meeting requests
    #[arg(long, global = true)]
    no_calendar: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract every artifact of a winmail.dat file into a directory
    Extract {
        path: PathBuf,
        /// Output directory (defaults to `general.output_dir`, then `.`)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// List the artifacts of a winmail.dat file
    List {
        path: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Decode the TNEF attachments of an RFC 5322 message (.eml)
    Eml {
        path: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = tnefshell::config::load_config();

    let log_level = match cli.verbose {
        0 if config.decoder.debug_level >= 1 => "debug",
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    let options = decoder_options(&cli, &config);

    match cli.command {
        Commands::Extract { path, output } => {
            let output = output_dir(output, &config);
            cmd_extract(&path, &output, &options, &config)
        }
        Commands::List { path, json } => cmd_list(&path, json, &options),
        Commands::Eml { path, output } => {
            let output = output_dir(output, &config);
            cmd_eml(&path, &output, &options)
        }
        Commands::Completions { shell } => cmd_completions(shell),
        Commands::Manpage => cmd_manpage(),
    }
}

/// Config file options with command-line overrides applied.
fn decoder_options(cli: &Cli, config: &Config) -> DecoderOptions {
    let mut options = config.decoder.clone();
    if cli.raw_mapi {
        options.attach_raw_mapi = true;
    }
    if cli.no_charset {
        options.disable_filename_character_set = true;
    }
    if cli.no_calendar {
        options.direct_to_calendar = Some(false);
    }
    options
}

fn output_dir(flag: Option<PathBuf>, config: &Config) -> PathBuf {
    flag.or_else(|| config.general.output_dir.clone())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let log_dir = tnefshell::config::cache_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, "tnefshell.log");
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "tnefshell", &mut std::io::stdout());
    Ok(())
}

fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}

/// Stream-decode a winmail.dat file into `output`.
fn cmd_extract(
    path: &Path,
    output: &Path,
    options: &DecoderOptions,
    config: &Config,
) -> anyhow::Result<()> {
    if !path.exists() {
        anyhow::bail!("File not found: {}", path.display());
    }
    let file_size = std::fs::metadata(path)?.len();
    let reader = BufReader::new(File::open(path)?);

    let pb = ProgressBar::new(file_size);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} Decoding [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})",
            )
            .expect("valid template")
            .progress_chars("#>-"),
    );

    let start = Instant::now();
    let mut sink = DirectorySink::new(output)?;
    let mut state = ParseState::new();
    let result = decode_reader(
        reader,
        &mut state,
        config.performance.read_buffer_size,
        options,
        &mut sink,
        Some(&|n| pb.set_position(n)),
    );
    pb.finish_and_clear();
    result?;

    print_written_table(sink.written());
    println!(
        "  {} artifact(s) from {} attribute(s) in {:.2?}",
        sink.written().len(),
        state.attribute_count(),
        start.elapsed()
    );
    println!();
    Ok(())
}

/// Decode in memory and print what the stream contains.
fn cmd_list(path: &Path, json: bool, options: &DecoderOptions) -> anyhow::Result<()> {
    if !path.exists() {
        anyhow::bail!("File not found: {}", path.display());
    }
    let bytes = std::fs::read(path)?;
    let artifacts = decode_all(&bytes, options)?;

    if json {
        print_artifacts_json(&artifacts)
    } else {
        print_artifacts_table(&artifacts);
        Ok(())
    }
}

/// Decode every TNEF part of a mail message, one sub-directory per part.
fn cmd_eml(path: &Path, output: &Path, options: &DecoderOptions) -> anyhow::Result<()> {
    if !path.exists() {
        anyhow::bail!("File not found: {}", path.display());
    }
    let raw = std::fs::read(path)?;
    let (header, parts) = find_tnef_parts(&raw)?;
    if parts.is_empty() {
        anyhow::bail!("No TNEF attachment found in {}", path.display());
    }

    let mut written = Vec::new();
    for part in &parts {
        let dir = output.join(format!(
            "{:02}_{}",
            part.index,
            sanitize_filename_part(&part.name, 60)
        ));
        let mut sink = DirectorySink::new(&dir)?;
        let mut state = ParseState::with_header(header.clone());
        let decoded = state
            .feed(&part.bytes, options, &mut sink)
            .and_then(|()| state.finish(options, &mut sink));
        match decoded {
            Ok(()) => written.extend(sink.into_written()),
            Err(e) => {
                tracing::warn!(part = %part.name, error = %e, "Failed to decode TNEF part");
            }
        }
    }

    print_written_table(&written);
    Ok(())
}

fn print_artifacts_table(artifacts: &[Artifact]) {
    println!();
    println!("  {} artifact(s)", artifacts.len());
    println!();
    if artifacts.is_empty() {
        return;
    }

    println!(
        "  {:<4} {:<9} {:<40} {:<28} {:>10}",
        "#", "Kind", "Name", "Type", "Size"
    );
    println!("  {}", "-".repeat(95));
    for (i, a) in artifacts.iter().enumerate() {
        let name: String = a.name.chars().take(39).collect();
        let mime: String = a.mime_type.chars().take(27).collect();
        println!(
            "  {:<4} {:<9} {:<40} {:<28} {:>10}",
            i + 1,
            a.kind,
            name,
            mime,
            format_size(a.length as u64, BINARY)
        );
    }
    println!();
}

fn print_artifacts_json(artifacts: &[Artifact]) -> anyhow::Result<()> {
    let output = serde_json::json!({
        "artifact_count": artifacts.len(),
        "artifacts": artifacts,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn print_written_table(written: &[WrittenArtifact]) {
    println!();
    for w in written {
        println!(
            "  {:<9} {:>10}  {}",
            w.kind,
            format_size(w.length, BINARY),
            w.path.display()
        );
    }
    println!();
}
