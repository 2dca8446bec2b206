//! debkeeper CLI: keep a curated `.deb` mirror up to date.

mod commands;

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::process;

use anyhow::Context;
use clap::{ArgAction, Parser, Subcommand};

use debkeeper_core::MirrorConfig;

use commands::Mirror;

#[derive(Parser)]
#[command(name = "debkeeper", version, about = "Curate a mirror of third-party .deb packages")]
struct Cli {
    /// Configuration file (default: debkeeper.toml in this or a parent directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// More log output (-v info, -vv debug); RUST_LOG overrides
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Verify the artifact of one manifest
    Verify {
        /// Manifest file
        manifest: PathBuf,
        /// Report file (default: paths.verification)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Check, fetch, and verify new versions of every auto-updatable package
    Update {
        /// Manifests processed in parallel
        #[arg(long)]
        jobs: Option<NonZeroUsize>,
        /// Leave reports in place instead of archiving them
        #[arg(long)]
        no_archive: bool,
    },
    /// Download artifacts for packages that have none
    Fetch,
    /// Report available updates without changing anything
    Check,
    /// Bundle pending reports into a timestamped zip
    Archive,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = run(cli);
    if let Err(e) = result {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let cwd = std::env::current_dir()?;
    let mut config = load_config(cli.config.as_deref(), &cwd)?;
    log::debug!(
        "manifests: {}, artifacts: {}, reports: {}",
        config.paths.manifests.display(),
        config.paths.artifacts.display(),
        config.paths.reports.display()
    );

    match cli.command {
        Commands::Verify { manifest, output } => {
            let output = output.unwrap_or_else(|| config.paths.verification.clone());
            let mirror = Mirror::open(config)?;
            commands::verify::run(&mirror.orchestrator(), &manifest, &output)
        }

        Commands::Update { jobs, no_archive } => {
            if let Some(jobs) = jobs {
                config.update.jobs = jobs.get();
            }
            if no_archive {
                config.update.archive_reports = false;
            }
            let mirror = Mirror::open(config)?;
            commands::update::run(&mirror.orchestrator(), &mirror.config)
        }

        Commands::Fetch => {
            let mirror = Mirror::open(config)?;
            commands::fetch::run(&mirror.orchestrator())
        }

        Commands::Check => {
            let mirror = Mirror::open(config)?;
            commands::check::run(&mirror.orchestrator())
        }

        Commands::Archive => commands::archive::run(&config.paths.reports),
    }
}

/// Load `--config` if given, otherwise discover `debkeeper.toml` upward.
fn load_config(explicit: Option<&Path>, cwd: &Path) -> anyhow::Result<MirrorConfig> {
    match explicit {
        Some(path) => MirrorConfig::load(path)
            .with_context(|| format!("failed to load {}", path.display())),
        None => MirrorConfig::find_and_load(cwd).context("failed to load configuration"),
    }
}

#[cfg(test)]
mod integration_tests {
    use super::*;

    use std::io;

    use debkeeper_core::config::ToolCommand;
    use debkeeper_core::memory::{MemoryTransport, Method};
    use debkeeper_core::{
        ArtifactStore, ContentHash, FsArtifactStore, FsManifestStore, Manifest, ManifestStore,
        Orchestrator, ToolOutput, ToolRunner,
    };

    const MANIFEST: &str = r#"[submitter]
name = "Sam Packager"
email = "sam@example.org"
is_maintainer = true

[package]
name = "tool"
version = "1.0.0"
summary = "A tool"
type = "cli"
license = "MIT"
source = "https://dl.example.org/tool-$pversion.deb"
arch = "x86_64"
auto_update = true
"#;

    struct EchoTools;

    impl ToolRunner for EchoTools {
        fn run(&self, tool: &ToolCommand, artifact: &Path) -> io::Result<ToolOutput> {
            Ok(ToolOutput {
                code: Some(0),
                success: true,
                output: format!("{} {}\n", tool.program, artifact.display()),
            })
        }
    }

    fn setup() -> (tempfile::TempDir, MirrorConfig) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("debkeeper.toml"),
            "[paths]\nmanifests = \"apps\"\nartifacts = \"pool\"\n",
        )
        .unwrap();
        std::fs::create_dir(dir.path().join("apps")).unwrap();
        std::fs::write(dir.path().join("apps/tool.toml"), MANIFEST).unwrap();
        let config = load_config(None, &dir.path().join("apps")).unwrap();
        (dir, config)
    }

    /// Full workflow: fetch → update → archive.
    #[test]
    fn fetch_update_archive_workflow() {
        let (dir, config) = setup();
        assert_eq!(config.paths.artifacts, dir.path().join("pool"));

        let manifests = FsManifestStore::new(config.paths.manifests.clone());
        let artifacts = FsArtifactStore::new(config.paths.artifacts.clone());
        let transport = MemoryTransport::new();
        transport
            .respond("https://dl.example.org/tool-1.0.0.deb", 200, b"one")
            .respond("https://dl.example.org/tool-1.0.1.deb", 200, b"two");
        let orchestrator = Orchestrator::new(&config, &manifests, &artifacts, &transport, &EchoTools);

        // 1. Fetch fills in the missing artifact and signature.
        commands::fetch::run(&orchestrator).unwrap();
        assert_eq!(
            artifacts.list_artifacts().unwrap(),
            vec!["tool_1.0.0_amd64.deb"]
        );
        let manifest = manifests.load_manifest("tool.toml").unwrap();
        assert_eq!(
            manifest.package.signature.as_deref(),
            Some(ContentHash::compute(b"one").as_str())
        );

        // 2. Fetch again is a no-op.
        let gets = transport.count(Method::Get);
        commands::fetch::run(&orchestrator).unwrap();
        assert_eq!(transport.count(Method::Get), gets);

        // 3. Update moves to 1.0.1 and archives the reports.
        commands::update::run(&orchestrator, &config).unwrap();
        assert_eq!(
            artifacts.list_artifacts().unwrap(),
            vec!["tool_1.0.1_amd64.deb"]
        );
        assert_eq!(
            manifests.load_manifest("tool.toml").unwrap().package.version,
            "1.0.1"
        );
        let reports: Vec<_> = std::fs::read_dir(&config.paths.reports)
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(reports.len(), 1);
        assert!(reports[0].ends_with(".zip"));
    }

    #[test]
    fn update_without_archive_keeps_reports() {
        let (_dir, mut config) = setup();
        config.update.archive_reports = false;
        let manifests = FsManifestStore::new(config.paths.manifests.clone());
        let artifacts = FsArtifactStore::new(config.paths.artifacts.clone());
        let transport = MemoryTransport::new();
        let orchestrator = Orchestrator::new(&config, &manifests, &artifacts, &transport, &EchoTools);

        commands::update::run(&orchestrator, &config).unwrap();
        let log = std::fs::read_to_string(config.paths.reports.join("update_log.txt")).unwrap();
        assert!(log.contains("- tool_1.0.0_amd64.deb: no update available"));
    }

    #[test]
    fn verify_reports_mismatch_as_error() {
        let (dir, config) = setup();
        let manifests = FsManifestStore::new(config.paths.manifests.clone());
        let artifacts = FsArtifactStore::new(config.paths.artifacts.clone());
        let transport = MemoryTransport::new();
        artifacts
            .write_artifact("tool_1.0.0_amd64.deb", b"one")
            .unwrap();
        let orchestrator = Orchestrator::new(&config, &manifests, &artifacts, &transport, &EchoTools);

        let path = dir.path().join("apps/tool.toml");
        let mut manifest = Manifest::load(&path).unwrap();
        manifest.package.signature = Some(ContentHash::compute(b"one").0);
        manifest.save(&path).unwrap();

        let output = dir.path().join("verification.txt");
        commands::verify::run(&orchestrator, &path, &output).unwrap();
        let text = std::fs::read_to_string(&output).unwrap();
        assert!(text.contains("signature: match"));
        assert!(text.contains("=== DPKG-DEB OUTPUT ===\ndpkg-deb "));

        manifest.package.signature = Some("ff".repeat(32));
        manifest.save(&path).unwrap();
        let err = commands::verify::run(&orchestrator, &path, &output).unwrap_err();
        assert!(format!("{err:#}").contains("signature mismatch"));
        assert!(std::fs::read_to_string(&output)
            .unwrap()
            .contains("signature: MISMATCH"));
    }

    #[test]
    fn explicit_config_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(Some(&dir.path().join("missing.toml")), dir.path()).unwrap_err();
        assert!(format!("{err:#}").contains("failed to load"));
    }

    #[test]
    fn cli_parses_global_flags() {
        let cli = Cli::try_parse_from(["debkeeper", "update", "--jobs", "4", "-vv"]).unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Update { jobs, no_archive } => {
                assert_eq!(jobs.map(NonZeroUsize::get), Some(4));
                assert!(!no_archive);
            }
            _ => panic!("expected update"),
        }
        assert!(Cli::try_parse_from(["debkeeper", "update", "--jobs", "0"]).is_err());
    }
}
