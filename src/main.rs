/*
 * fat12ed Shell
 * =============
 *
 * A thin REPL front-end over the fat12ed engine: parses process args,
 * loads the image, dispatches typed commands to Path Ops, writes the
 * image back on clean exit. No filesystem semantics live here. Only
 * line parsing, prompting, and error-to-message rendering.
 */

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::LevelFilter;
use simplelog::{ColorChoice, Config as LogConfig, TermLogger, TerminalMode};

use fat12ed::config::Config;
use fat12ed::pathops;
use fat12ed::session::Session;

#[derive(Parser)]
#[command(name = "fat12ed")]
#[command(about = "Interactive in-memory editor for FAT12 floppy disk images", long_about = None)]
struct Cli {
    /// Path to the 1.44 MiB FAT12 image to edit
    image: PathBuf,

    /// Optional TOML configuration file (default: ./fat12ed.toml if present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Overrides the configured log level
    #[arg(long)]
    log_level: Option<String>,
}

fn level_filter(name: &str) -> LevelFilter {
    match name.to_ascii_lowercase().as_str() {
        "trace" => LevelFilter::Trace,
        "debug" => LevelFilter::Debug,
        "warn" => LevelFilter::Warn,
        "error" => LevelFilter::Error,
        "off" => LevelFilter::Off,
        _ => LevelFilter::Info,
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(|| PathBuf::from("fat12ed.toml"));
    let config = Config::load(&config_path).context("failed to load config file")?;
    let level_name = cli.log_level.as_deref().unwrap_or(&config.log_level);

    TermLogger::init(
        level_filter(level_name),
        LogConfig::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )
    .context("failed to initialize logger")?;

    let mut session = Session::load(&cli.image)
        .with_context(|| format!("failed to load image {}", cli.image.display()))?;

    run_repl(&mut session, &config);

    session
        .save(&cli.image)
        .with_context(|| format!("failed to save image {}", cli.image.display()))?;

    Ok(())
}

fn run_repl(session: &mut Session, config: &Config) {
    let stdin = io::stdin();
    loop {
        print!("[{}]$ ", session.cwd.abs_path);
        let _ = io::stdout().flush();

        let mut line = String::new();
        if stdin.read_line(&mut line).unwrap_or(0) == 0 {
            break;
        }
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let Some(&cmd) = tokens.first() else {
            continue;
        };

        match cmd {
            "quit" | "exit" => break,
            "help" => print_help(),
            "info" => print_info(session, config),
            "bootable" => println!("{}", session.bootable()),
            "ls" => report("ls", list_command(session, config)),
            "tree" => report("tree", tree_command(session)),
            "cd" => match tokens.get(1) {
                Some(path) => report("cd", pathops::cd(session, path)),
                None => println!("usage: cd <path>"),
            },
            "type" => match tokens.get(1) {
                Some(path) => report("type", type_command(session, path)),
                None => println!("usage: type <path>"),
            },
            "cp" => match (tokens.get(1), tokens.get(2)) {
                (Some(src), Some(des)) => report("cp", pathops::cp(session, src, des)),
                _ => println!("usage: cp <src> <des>"),
            },
            "mv" => match (tokens.get(1), tokens.get(2)) {
                (Some(src), Some(des)) => report("mv", pathops::mv(session, src, des)),
                _ => println!("usage: mv <src> <des>"),
            },
            "rm" => match tokens.get(1) {
                Some(path) => report("rm", pathops::rm(session, path)),
                None => println!("usage: rm <path>"),
            },
            "mkdir" => match tokens.get(1) {
                Some(path) => report("mkdir", pathops::mkdir(session, path).map(|_| ())),
                None => println!("usage: mkdir <path>"),
            },
            "rmdir" => match tokens.get(1) {
                Some(path) => report("rmdir", pathops::rmdir(session, path)),
                None => println!("usage: rmdir <path>"),
            },
            "cpdir" => match (tokens.get(1), tokens.get(2)) {
                (Some(src), Some(des)) => report("cpdir", pathops::cpdir(session, src, des)),
                _ => println!("usage: cpdir <src> <des>"),
            },
            "concat" => match (tokens.get(1), tokens.get(2), tokens.get(3)) {
                (Some(a), Some(b), Some(des)) => {
                    report("concat", pathops::concat(session, a, b, des))
                }
                _ => println!("usage: concat <a> <b> <des>"),
            },
            other => println!("Unkown command: {}", other),
        }
    }
}

fn report(verb: &str, result: fat12ed::Result<()>) {
    if let Err(e) = result {
        println!("Failed to {}: {}", verb, e);
    }
}

fn list_command(session: &Session, config: &Config) -> fat12ed::Result<()> {
    let entries = pathops::list(session, session.cwd.cluster, config.show_volume_label)?;
    for entry in entries {
        let marker = if entry.is_directory() { "/" } else { "" };
        println!("{}{}", entry.display_name(), marker);
    }
    Ok(())
}

fn tree_command(session: &Session) -> fat12ed::Result<()> {
    let nodes = pathops::build_tree(session, session.cwd.cluster)?;
    print!("{}", pathops::render_tree(&nodes));
    Ok(())
}

fn type_command(session: &Session, path: &str) -> fat12ed::Result<()> {
    let bytes = pathops::type_file(session, path)?;
    io::stdout().write_all(&bytes).ok();
    Ok(())
}

fn print_info(session: &Session, config: &Config) {
    let info = session.info();
    println!("bytes per sector:    {}", info.bytes_per_sector);
    println!("sectors per cluster: {}", info.sectors_per_cluster);
    println!("FAT copies:          {}", info.num_fats);
    println!("root entries:        {}", info.root_entry_count);
    println!("total clusters:      {}", info.total_clusters);
    println!("bootable:            {}", info.bootable);
    if config.show_volume_label {
        println!("(volume label display enabled)");
    }
}

fn print_help() {
    println!("commands: help info bootable ls cd cp mv rm mkdir rmdir cpdir concat tree type quit");
}
