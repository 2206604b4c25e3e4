use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt};
use ts_json_schema_transform::{OsFs, Program, TransformConfig, Transformer};

#[derive(Parser)]
#[command(
    name = "ts-json-schema",
    about = "Replace fromType<T>() calls with literal JSON schemas"
)]
struct Cli {
    /// TypeScript files or directories to transform
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// tsconfig.json to read plugin options and strictNullChecks from
    #[arg(short, long)]
    project: Option<PathBuf>,

    /// Directory to write transformed files to (stdout when omitted)
    #[arg(short, long)]
    out_dir: Option<PathBuf>,

    /// Log every substitution
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = match &cli.project {
        Some(project) => TransformConfig::from_tsconfig(&OsFs, project)
            .with_context(|| format!("reading {}", project.display()))?
            .into_transform_config(),
        None => TransformConfig::default(),
    };

    let mut builder = Program::builder(OsFs);
    for input in &cli.inputs {
        let input = std::path::absolute(input)
            .with_context(|| format!("resolving {}", input.display()))?;
        if input.is_dir() {
            builder = builder.roots_from_dir(&input);
        } else if input.is_file() {
            builder = builder.root(&input);
        } else {
            bail!("{} does not exist", input.display());
        }
    }
    let program = builder.build().context("loading program")?;
    let roots = program.roots().to_vec();
    if roots.is_empty() {
        bail!("no TypeScript files found");
    }

    let transformer = Transformer::new(&program).with_config(config);
    let base = common_dir(&roots);
    let mut stdout = io::stdout().lock();
    for root in &roots {
        let output = transformer
            .transform_to_string(root)
            .with_context(|| format!("transforming {}", root.display()))?;

        match &cli.out_dir {
            Some(out_dir) => {
                let relative = root.strip_prefix(&base).unwrap_or(root);
                let target = out_dir.join(relative);
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent)
                        .with_context(|| format!("creating {}", parent.display()))?;
                }
                fs::write(&target, output)
                    .with_context(|| format!("writing {}", target.display()))?;
                tracing::info!(from = %root.display(), to = %target.display(), "written");
            }
            None => print_module(&mut stdout, root, &output, roots.len() > 1)
                .context("writing to stdout")?,
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Print one transformed file, headed by its path when several are printed.
fn print_module(out: &mut impl Write, path: &Path, output: &str, with_header: bool) -> io::Result<()> {
    if with_header {
        writeln!(out, "// {}", path.display())?;
    }
    out.write_all(output.as_bytes())?;
    if !output.ends_with('\n') {
        writeln!(out)?;
    }
    Ok(())
}

/// Deepest directory containing every path.
fn common_dir(paths: &[PathBuf]) -> PathBuf {
    let mut common = paths
        .first()
        .and_then(|p| p.parent())
        .map(Path::to_path_buf)
        .unwrap_or_default();
    for path in paths.iter().skip(1) {
        while !path.starts_with(&common) {
            if !common.pop() {
                break;
            }
        }
    }
    common
}
