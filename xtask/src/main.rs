use std::fs;
use std::io::{Seek, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitCode};

use clap::{Parser, Subcommand, ValueEnum};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

const LAMBDA_PACKAGE: &str = "stream_fanout_lambda";
const LAMBDA_BIN: &str = "stream_fanout";
/// Entry name the Lambda custom runtime executes.
const BOOTSTRAP_ENTRY: &str = "bootstrap";

#[derive(Parser)]
#[command(name = "xtask", about = "CI and packaging tasks for the stream fan-out Lambda")]
struct Cli {
    #[command(subcommand)]
    command: Task,
}

#[derive(Subcommand)]
enum Task {
    /// fmt --check, clippy -D warnings, workspace tests
    Ci {
        #[arg(value_enum, default_value_t = Stage::All)]
        stage: Stage,
    },
    /// Release-build the Lambda binary and zip it as `bootstrap`
    LambdaPackage {
        #[arg(long, env = "LAMBDA_TARGET", default_value = "x86_64-unknown-linux-gnu")]
        target: String,
        #[arg(long, default_value = "dist/stream_fanout/bootstrap.zip")]
        output: PathBuf,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Stage {
    Lint,
    Test,
    All,
}

fn cargo(args: &[&str]) -> Result<(), String> {
    eprintln!("+ cargo {}", args.join(" "));
    let status = Command::new("cargo")
        .args(args)
        .status()
        .map_err(|error| format!("could not run cargo: {error}"))?;
    if status.success() {
        Ok(())
    } else {
        Err(format!("`cargo {}` exited with {status}", args.join(" ")))
    }
}

fn ci(stage: Stage) -> Result<(), String> {
    if stage != Stage::Test {
        cargo(&["fmt", "--all", "--", "--check"])?;
        cargo(&["clippy", "--workspace", "--all-targets", "--", "-D", "warnings"])?;
    }
    if stage != Stage::Lint {
        cargo(&["test", "--workspace"])?;
    }
    Ok(())
}

fn lambda_package(target: &str, output: &Path) -> Result<(), String> {
    cargo(&[
        "build",
        "--release",
        "-p",
        LAMBDA_PACKAGE,
        "--bin",
        LAMBDA_BIN,
        "--target",
        target,
    ])?;

    let binary_path = Path::new("target")
        .join(target)
        .join("release")
        .join(LAMBDA_BIN);
    let binary = fs::read(&binary_path)
        .map_err(|error| format!("could not read {}: {error}", binary_path.display()))?;

    if let Some(dir) = output.parent() {
        fs::create_dir_all(dir)
            .map_err(|error| format!("could not create {}: {error}", dir.display()))?;
    }
    let file = fs::File::create(output)
        .map_err(|error| format!("could not create {}: {error}", output.display()))?;
    write_bootstrap_zip(file, &binary)?;

    eprintln!("packaged {}", output.display());
    Ok(())
}

fn write_bootstrap_zip<W: Write + Seek>(sink: W, binary: &[u8]) -> Result<W, String> {
    let options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(0o755);
    let mut zip = ZipWriter::new(sink);
    zip.start_file(BOOTSTRAP_ENTRY, options)
        .map_err(|error| format!("zip: {error}"))?;
    zip.write_all(binary)
        .map_err(|error| format!("zip: {error}"))?;
    zip.finish().map_err(|error| format!("zip: {error}"))
}

fn main() -> ExitCode {
    let result = match Cli::parse().command {
        Task::Ci { stage } => ci(stage),
        Task::LambdaPackage { target, output } => lambda_package(&target, &output),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("xtask: {message}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Read};

    use zip::ZipArchive;

    use super::*;

    #[test]
    fn bootstrap_zip_holds_single_executable_entry() {
        let binary = b"\x7fELF fake lambda binary";
        let cursor = write_bootstrap_zip(Cursor::new(Vec::new()), binary)
            .expect("zip should be written");

        let mut archive = ZipArchive::new(cursor).expect("zip should be readable");
        assert_eq!(archive.len(), 1);

        let mut entry = archive.by_index(0).expect("entry should exist");
        assert_eq!(entry.name(), BOOTSTRAP_ENTRY);
        assert_eq!(entry.unix_mode().map(|mode| mode & 0o777), Some(0o755));

        let mut contents = Vec::new();
        entry
            .read_to_end(&mut contents)
            .expect("entry should be readable");
        assert_eq!(contents, binary);
    }
}
