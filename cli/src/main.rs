mod config;

use std::fs;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use codespan_reporting::files::SimpleFiles;
use codespan_reporting::term;
use codespan_reporting::term::termcolor::{ColorChoice, StandardStream};
use log::info;

use resolver::resolve::{DirLoader, ResolveOptions, Resolver};
use resolver::schema::SchemaRegistry;

const SUBCOMMANDS: &[&str] = &["flatten", "cleanup", "help"];

#[derive(Parser)]
#[command(
    name = "vmfinline",
    version,
    about = "Flattens instance references into their host map"
)]
struct Cli {
    /// Disable colored error output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve every instance reference in a map and write the flat result
    Flatten(FlattenArgs),

    /// Delete the temporary output and restore compiled artifact names
    Cleanup(CleanupArgs),
}

#[derive(clap::Args)]
struct FlattenArgs {
    /// Host map file
    file: String,

    /// Output path (defaults to `<map>.temp.vmf` next to the host)
    dest: Option<String>,

    /// FGD class-description files, comma-separated or repeated
    #[arg(short = 'd', long, value_delimiter = ',')]
    fgd: Vec<String>,

    /// Content root for locating instance files (defaults to the host's directory)
    #[arg(short, long)]
    instancedir: Option<String>,

    /// TOML game config supplying fgd paths and the instance dir
    #[arg(short, long)]
    game: Option<String>,

    /// Keep io-proxy entities instead of deleting them
    #[arg(long)]
    keep_proxies: bool,

    /// Parse only, don't resolve (exit 0 if valid)
    #[arg(long)]
    check: bool,
}

#[derive(clap::Args)]
struct CleanupArgs {
    /// Host map file the build was run for
    file: String,

    /// Output path that was passed to flatten, if any
    dest: Option<String>,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .init();

    // Backwards compatibility: if the first positional arg is not a known
    // subcommand, inject "flatten" so `vmfinline map.vmf` keeps working.
    let mut args: Vec<String> = std::env::args().collect();
    if let Some(first_pos) = args.iter().skip(1).find(|a| !a.starts_with('-')) {
        let first_pos = first_pos.clone();
        if !SUBCOMMANDS.contains(&first_pos.as_str()) {
            let pos = args.iter().position(|a| *a == first_pos).unwrap();
            args.insert(pos, "flatten".to_string());
        }
    }

    let cli = Cli::parse_from(&args);

    match cli.command {
        Command::Flatten(flatten_args) => do_flatten(flatten_args, cli.no_color),
        Command::Cleanup(cleanup_args) => {
            if let Err(err) = do_cleanup(cleanup_args) {
                eprintln!("error: {}", err);
                process::exit(1);
            }
        }
    }
}

fn do_flatten(args: FlattenArgs, no_color: bool) {
    let color_choice = if no_color {
        ColorChoice::Never
    } else {
        ColorChoice::Auto
    };

    // Merge the game config under the explicit flags.
    let game = match &args.game {
        Some(path) => match config::GameConfig::load(Path::new(path)) {
            Ok(game) => game,
            Err(err) => {
                eprintln!("error: {}", err);
                process::exit(1);
            }
        },
        None => config::GameConfig::default(),
    };
    let fgd_paths: Vec<PathBuf> = if args.fgd.is_empty() {
        game.fgd
    } else {
        args.fgd.iter().map(PathBuf::from).collect()
    };
    let instance_dir: Option<PathBuf> = args
        .instancedir
        .as_ref()
        .map(PathBuf::from)
        .or(game.instance_dir);

    // Read and parse the host map.
    let source = match fs::read_to_string(&args.file) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("error: cannot read '{}': {}", args.file, err);
            process::exit(1);
        }
    };

    let mut files = SimpleFiles::new();
    let file_id = files.add(args.file.clone(), source.clone());

    let parser = vmf::parser::Parser::new(source, file_id);
    let mut document = match parser.parse() {
        Ok(document) => document,
        Err(errors) => {
            let writer = StandardStream::stderr(color_choice);
            let term_config = term::Config::default();
            for error in &errors {
                let diagnostic = error.to_diagnostic();
                let _ = term::emit_to_write_style(
                    &mut writer.lock(),
                    &term_config,
                    &files,
                    &diagnostic,
                );
            }
            process::exit(1);
        }
    };

    if args.check {
        eprintln!("ok: {} parsed successfully", args.file);
        return;
    }

    let mut schema = SchemaRegistry::new();
    for path in &fgd_paths {
        resolver::fgd::load_fgd(path, &mut schema);
    }

    let host_dir = Path::new(&args.file)
        .parent()
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."));
    let mut loader = DirLoader::new(instance_dir.unwrap_or(host_dir));

    let options = ResolveOptions {
        remove_io_proxies: !args.keep_proxies,
    };
    let mut instance_resolver = Resolver::with_options(&schema, &mut loader, options);

    info!("resolving instances for {}...", args.file);
    instance_resolver.resolve(&mut document);

    let dest = args
        .dest
        .map(PathBuf::from)
        .unwrap_or_else(|| temp_output_path(&args.file));
    info!("saving to {}...", dest.display());

    if let Err(err) = save_document(&document, &dest) {
        eprintln!("error: cannot write '{}': {}", dest.display(), err);
        process::exit(1);
    }
}

fn save_document(document: &vmf::Document, dest: &Path) -> std::io::Result<()> {
    if let Some(parent) = dest.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let mut writer = BufWriter::new(fs::File::create(dest)?);
    vmf::writer::write_document(document, &mut writer)
}

/// `<dir>/<stem>.temp.vmf` for a host map path.
fn temp_output_path(file: &str) -> PathBuf {
    sibling_with_suffix(file, ".temp.vmf")
}

fn sibling_with_suffix(file: &str, suffix: &str) -> PathBuf {
    let path = Path::new(file);
    let stem = path.file_stem().unwrap_or(path.as_os_str());
    let mut name = stem.to_os_string();
    name.push(suffix);
    path.with_file_name(name)
}

/// Undo the temp naming after the map compile has run: drop the flattened
/// map and move the compiler's `.temp` artifacts back to the real map name.
fn do_cleanup(args: CleanupArgs) -> std::io::Result<()> {
    let dest = args
        .dest
        .map(PathBuf::from)
        .unwrap_or_else(|| temp_output_path(&args.file));

    if dest.is_file() {
        info!("deleting {}", dest.display());
        fs::remove_file(&dest)?;
    }

    let prt = sibling_with_suffix(&args.file, ".prt");
    let temp_prt = sibling_with_suffix(&args.file, ".temp.prt");
    if temp_prt.is_file() {
        if prt.is_file() {
            info!("deleting {}", prt.display());
            fs::remove_file(&prt)?;
        }
        info!("renaming {} to {}", temp_prt.display(), prt.display());
        fs::rename(&temp_prt, &prt)?;
    }

    let lin = sibling_with_suffix(&args.file, ".lin");
    let temp_lin = sibling_with_suffix(&args.file, ".temp.lin");
    if lin.is_file() {
        info!("deleting {}", lin.display());
        fs::remove_file(&lin)?;
    }
    if temp_lin.is_file() {
        info!("renaming {} to {}", temp_lin.display(), lin.display());
        fs::rename(&temp_lin, &lin)?;
    }

    Ok(())
}
