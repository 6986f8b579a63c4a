use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{exit, Command, ExitStatus};

use clap::{Parser, Subcommand, ValueEnum};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

const LAMBDA_PACKAGE: &str = "spa_edge_lambda";
const API_BINARY: &str = "api_lambda";
const DIST_DIR: &str = "dist";
const API_ZIP: &str = "api_lambda.zip";

// ── CLI definition ─────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "xtask",
    about = "Task runner for the SPA edge workspace",
    long_about = "Packages the compute bundle, publishes the static build tree\n\
                  and runs CI checks for the SPA edge workspace."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the API binary and zip it as `bootstrap`
    Package {
        /// Compilation target triple for the Lambda binary
        #[arg(long, default_value = "x86_64-unknown-linux-gnu")]
        target: String,
        /// Build profile used for the binary
        #[arg(value_enum, long, default_value_t = BuildProfile::Release)]
        profile: BuildProfile,
    },
    /// Upload the static build tree and invalidate the distribution
    DeploySync {
        #[arg(long, env = "BUILD_DIR")]
        build_dir: Option<PathBuf>,
        #[arg(long, env = "STATIC_BUCKET")]
        bucket: String,
        #[arg(long, env = "DISTRIBUTION_ID")]
        distribution_id: String,
        #[arg(long, env = "STACK_CONFIG")]
        config: Option<PathBuf>,
        #[arg(long)]
        no_prune: bool,
    },
    /// Run CI checks (fmt, clippy, tests, packaging)
    Ci {
        /// Job to run
        #[arg(value_enum, default_value_t = CiJob::Check)]
        job: CiJob,
    },
}

#[derive(Clone, ValueEnum)]
enum CiJob {
    /// Formatting, clippy, and tests
    Check,
    /// Debug build of the compute bundle for the host target
    Package,
    /// Run check + package
    All,
}

#[derive(Clone, Copy, ValueEnum)]
enum BuildProfile {
    Debug,
    Release,
}

impl BuildProfile {
    fn dir_name(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Release => "release",
        }
    }

    fn as_cargo_flag(self) -> Option<&'static str> {
        match self {
            Self::Debug => None,
            Self::Release => Some("--release"),
        }
    }
}

// ── helpers ────────────────────────────────────────────────────────

fn step(label: &str) {
    eprintln!("\n=== {label} ===");
}

fn cargo(args: &[&str]) -> ExitStatus {
    eprintln!("+ cargo {}", args.join(" "));
    Command::new("cargo")
        .args(args)
        .status()
        .expect("failed to execute cargo")
}

fn run_cargo(args: &[&str]) {
    let status = cargo(args);
    if !status.success() {
        exit(status.code().unwrap_or(1));
    }
}

fn package_api_bundle(target: &str, profile: BuildProfile) -> PathBuf {
    ensure_rust_target_installed(target);

    step("Build API lambda binary");
    let mut cargo_args = vec![
        "build",
        "-p",
        LAMBDA_PACKAGE,
        "--target",
        target,
        "--bin",
        API_BINARY,
    ];
    if let Some(flag) = profile.as_cargo_flag() {
        cargo_args.push(flag);
    }
    run_cargo(&cargo_args);

    step("Package compute bundle");
    let binary_dir = Path::new("target").join(target).join(profile.dir_name());
    let dist_dir = Path::new(DIST_DIR);
    fs::create_dir_all(dist_dir).expect("failed to create dist directory");

    let zip_path = dist_dir.join(API_ZIP);
    package_lambda_zip(&binary_dir.join(binary_name(API_BINARY, target)), &zip_path);
    eprintln!("\nPackaged artifact:\n- {}", zip_path.display());
    zip_path
}

fn ensure_rust_target_installed(target: &str) {
    let output = match Command::new("rustup")
        .args(["target", "list", "--installed"])
        .output()
    {
        Ok(value) => value,
        Err(error) => {
            eprintln!(
                "warning: failed to run `rustup target list --installed` ({error}); continuing without target preflight"
            );
            return;
        }
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        panic!("failed to list installed rust targets: {}", stderr.trim());
    }

    let installed = String::from_utf8_lossy(&output.stdout);
    if !installed.lines().any(|line| line.trim() == target) {
        panic!(
            "rust target `{target}` is not installed; run `rustup target add {target}` and re-run `cargo run -p xtask -- package`"
        );
    }
}

fn host_target() -> String {
    let output = Command::new("rustc")
        .arg("-vV")
        .output()
        .expect("failed to execute rustc");
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .find_map(|line| line.strip_prefix("host: "))
        .map(str::to_string)
        .expect("rustc -vV did not report a host triple")
}

fn binary_name(bin_name: &str, target: &str) -> String {
    if target.contains("windows") {
        format!("{bin_name}.exe")
    } else {
        bin_name.to_string()
    }
}

/// The Lambda custom runtime only starts an executable named `bootstrap`.
fn package_lambda_zip(binary_path: &Path, zip_path: &Path) {
    if !binary_path.exists() {
        panic!("expected lambda binary at '{}'", binary_path.display());
    }

    let binary = fs::read(binary_path).expect("failed to read lambda binary");
    let file = fs::File::create(zip_path).expect("failed to create lambda zip");
    let mut zip = ZipWriter::new(file);
    let options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(0o755);
    zip.start_file("bootstrap", options)
        .expect("failed to start bootstrap entry");
    zip.write_all(&binary)
        .expect("failed to write bootstrap entry");
    zip.finish().expect("failed to finish lambda zip");
}

fn deploy_sync(
    build_dir: Option<PathBuf>,
    bucket: &str,
    distribution_id: &str,
    config: Option<PathBuf>,
    no_prune: bool,
) {
    step("Sync static build tree");
    let mut args: Vec<String> = [
        "run",
        "-p",
        LAMBDA_PACKAGE,
        "--bin",
        "deploy_sync",
        "--",
        "--bucket",
        bucket,
        "--distribution-id",
        distribution_id,
    ]
    .iter()
    .map(|arg| arg.to_string())
    .collect();
    if let Some(build_dir) = build_dir {
        args.push("--build-dir".to_string());
        args.push(build_dir.display().to_string());
    }
    if let Some(config) = config {
        args.push("--config".to_string());
        args.push(config.display().to_string());
    }
    if no_prune {
        args.push("--no-prune".to_string());
    }

    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    run_cargo(&args);
}

// ── CI jobs ────────────────────────────────────────────────────────

fn ci_check() {
    step("Check formatting");
    run_cargo(&["fmt", "--all", "--", "--check"]);

    step("Clippy");
    run_cargo(&[
        "clippy",
        "--all-targets",
        "--all-features",
        "--",
        "-D",
        "warnings",
    ]);

    step("Test spa_edge_core");
    run_cargo(&["test", "-p", "spa_edge_core"]);

    step("Test spa_edge_lambda");
    run_cargo(&["test", "-p", LAMBDA_PACKAGE]);
}

fn ci_package() {
    package_api_bundle(&host_target(), BuildProfile::Debug);
}

// ── main ───────────────────────────────────────────────────────────

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Package { target, profile } => {
            package_api_bundle(&target, profile);
        }
        Commands::DeploySync {
            build_dir,
            bucket,
            distribution_id,
            config,
            no_prune,
        } => {
            deploy_sync(build_dir, &bucket, &distribution_id, config, no_prune);
        }
        Commands::Ci { job } => {
            match job {
                CiJob::Check => ci_check(),
                CiJob::Package => ci_package(),
                CiJob::All => {
                    ci_check();
                    ci_package();
                }
            }
            eprintln!("\nCI job passed.");
        }
    }
}
