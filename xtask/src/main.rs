//! Developer automation for the sqlbind workspace.
//!
//! Run with `cargo xtask <command>`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use xshell::{Shell, cmd};

#[derive(Parser)]
#[command(name = "xtask", about = "Developer automation for sqlbind")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Format check, clippy, tests and docs
    Ci,
    /// Check formatting
    Fmt,
    /// Lint every target with warnings denied
    Clippy,
    /// Run tests, optionally for one crate
    Test {
        /// Crate to test, e.g. `sqlbind-template`
        #[arg(short, long)]
        package: Option<String>,
    },
    /// Build documentation with warnings denied
    Doc,
    /// Run the rewriter benchmark
    Bench,
    /// Fuzz the template rewriter (requires cargo-fuzz and nightly)
    Fuzz {
        /// Seconds to run
        #[arg(long, default_value_t = 60)]
        seconds: u64,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let sh = Shell::new()?;
    sh.change_dir(workspace_root()?);

    match cli.command {
        Command::Ci => {
            println!("Running CI checks...");
            fmt(&sh)?;
            clippy(&sh)?;
            test(&sh, None)?;
            doc(&sh)?;
            println!("All CI checks passed!");
        }
        Command::Fmt => fmt(&sh)?,
        Command::Clippy => clippy(&sh)?,
        Command::Test { package } => test(&sh, package.as_deref())?,
        Command::Doc => doc(&sh)?,
        Command::Bench => bench(&sh)?,
        Command::Fuzz { seconds } => fuzz(&sh, seconds)?,
    }

    Ok(())
}

fn workspace_root() -> Result<PathBuf> {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .map(Path::to_path_buf)
        .context("xtask must live one level below the workspace root")
}

fn fmt(sh: &Shell) -> Result<()> {
    println!("Checking formatting...");
    cmd!(sh, "cargo fmt --all -- --check").run()?;
    Ok(())
}

fn clippy(sh: &Shell) -> Result<()> {
    println!("Running clippy...");
    cmd!(sh, "cargo clippy --workspace --all-targets -- -D warnings").run()?;
    Ok(())
}

fn test(sh: &Shell, package: Option<&str>) -> Result<()> {
    match package {
        Some(package) => {
            println!("Testing {package}...");
            cmd!(sh, "cargo test -p {package}").run()?;
        }
        None => {
            println!("Testing workspace...");
            cmd!(sh, "cargo test --workspace").run()?;
        }
    }
    Ok(())
}

fn doc(sh: &Shell) -> Result<()> {
    println!("Building documentation...");
    cmd!(sh, "cargo doc --workspace --no-deps")
        .env("RUSTDOCFLAGS", "-D warnings")
        .run()?;
    Ok(())
}

fn bench(sh: &Shell) -> Result<()> {
    println!("Benchmarking the rewriter...");
    cmd!(sh, "cargo bench -p sqlbind-template --bench rewrite").run()?;
    Ok(())
}

fn fuzz(sh: &Shell, seconds: u64) -> Result<()> {
    if cmd!(sh, "cargo fuzz --version").quiet().ignore_stdout().run().is_err() {
        bail!("cargo-fuzz is not installed (cargo install cargo-fuzz)");
    }
    let max_time = format!("-max_total_time={seconds}");
    let _dir = sh.push_dir("fuzz");
    cmd!(sh, "cargo +nightly fuzz run rewrite_template -- {max_time}").run()?;
    Ok(())
}
