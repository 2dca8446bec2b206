//! End-to-end scenarios over the in-memory seams.

use std::io;
use std::path::Path;

use debkeeper_core::config::ToolCommand;
use debkeeper_core::memory::{MemoryArtifactStore, MemoryManifestStore, MemoryTransport, Method};
use debkeeper_core::{
    artifact_file_name, normalize_arch, ArtifactStore, FetchMode, Fetcher, FsArtifactStore,
    Manifest, ManifestStore, MirrorConfig, Orchestrator, Package, Resolver, ToolOutput,
    ToolRunner, VersionCheckResult,
};

const API: &str = "https://api.github.com";

fn manifest(name: &str, version: &str, source: &str, arch: &str) -> String {
    format!(
        r#"[submitter]
name = "Sam Packager"
email = "sam@example.org"
is_maintainer = false

[package]
name = "{name}"
version = "{version}"
summary = "Test package"
type = "cli"
license = "Apache-2.0"
source = "{source}"
arch = "{arch}"
auto_update = true
"#
    )
}

fn package(name: &str, version: &str, source: &str) -> Package {
    Manifest::parse(&manifest(name, version, source, "x86_64"))
        .unwrap()
        .package
}

struct QuietTools;

impl ToolRunner for QuietTools {
    fn run(&self, tool: &ToolCommand, _artifact: &Path) -> io::Result<ToolOutput> {
        Ok(ToolOutput {
            code: Some(0),
            success: true,
            output: format!("{} ok\n", tool.program),
        })
    }
}

#[test]
fn arch_normalization_and_naming() {
    assert_eq!(normalize_arch("x86_64"), "amd64");
    for arch in ["i386", "arm64", "amd64", "riscv64", ""] {
        assert_eq!(normalize_arch(arch), arch);
    }
    assert_eq!(artifact_file_name("pkg", "1.0.0", "x86_64"), "pkg_1.0.0_amd64.deb");
    assert_eq!(artifact_file_name("pkg", "1.0.0", "i386"), "pkg_1.0.0_i386.deb");
}

#[test]
fn probe_finds_patch_release() {
    let transport = MemoryTransport::new();
    transport.respond("https://x/pkg-1.2.3.deb", 200, b"");
    let resolver = Resolver::new(&transport, API);

    let result = resolver.resolve(&package("pkg", "1.2.2", "https://x/pkg-$pversion.deb"));
    assert_eq!(result, VersionCheckResult::UpdateAvailable("1.2.3".to_string()));
    assert_eq!(transport.count(Method::Head), 1);
}

#[test]
fn probing_is_bounded_by_component_count() {
    let transport = MemoryTransport::new();
    let resolver = Resolver::new(&transport, API);

    for (version, k) in [("7", 1), ("1.2", 2), ("1.2.2", 3), ("1.0.0.4", 4)] {
        let before = transport.count(Method::Head);
        let result = resolver.resolve(&package("pkg", version, "https://x/pkg-$pversion.deb"));
        assert_eq!(result, VersionCheckResult::UpToDate);
        assert_eq!(transport.count(Method::Head) - before, k);
    }
    assert_eq!(transport.count(Method::Get), 0);
}

#[test]
fn release_lookup_up_to_date() {
    let transport = MemoryTransport::new();
    transport.respond(
        "https://api.github.com/repos/acme/pkg/releases/latest",
        200,
        br#"{"tag_name": "2.0.0", "name": "two"}"#,
    );
    let resolver = Resolver::new(&transport, API);
    let pkg = package(
        "pkg",
        "2.0.0",
        "https://github.com/acme/pkg/releases/download/$pversion/pkg-$pversion.deb",
    );
    assert_eq!(resolver.resolve(&pkg), VersionCheckResult::UpToDate);
    assert_eq!(transport.requests().len(), 1);
}

#[test]
fn release_tag_compared_exactly() {
    let transport = MemoryTransport::new();
    transport.respond(
        "https://api.github.com/repos/acme/pkg/releases/latest",
        200,
        br#"{"tag_name": "v1.2.3"}"#,
    );
    let resolver = Resolver::new(&transport, API);
    let pkg = package(
        "pkg",
        "1.2.3",
        "https://github.com/acme/pkg/releases/download/$pversion/pkg-$pversion.deb",
    );
    assert_eq!(
        resolver.resolve(&pkg),
        VersionCheckResult::UpdateAvailable("v1.2.3".to_string())
    );
}

#[test]
fn fetch_supersedes_only_same_arch() {
    let transport = MemoryTransport::new();
    transport.respond("https://x/pkg-1.0.0.deb", 200, b"1.0.0 amd64");
    let store = MemoryArtifactStore::new();
    store.insert("pkg_0.9.0_amd64.deb", b"0.9.0 amd64");
    store.insert("pkg_1.0.0_i386.deb", b"1.0.0 i386");

    let fetcher = Fetcher::new(&transport, &store);
    let artifact = fetcher
        .fetch(
            &package("pkg", "0.9.0", "https://x/pkg-$pversion.deb"),
            "1.0.0",
            FetchMode::Updating,
        )
        .unwrap();

    assert_eq!(artifact.file_name, "pkg_1.0.0_amd64.deb");
    assert_eq!(
        store.list_artifacts().unwrap(),
        vec!["pkg_1.0.0_amd64.deb", "pkg_1.0.0_i386.deb"]
    );
}

#[test]
fn manifest_round_trip_through_store() {
    let store = MemoryManifestStore::new();
    let text = manifest("pkg", "1.0.0", "https://x/pkg-$pversion.deb", "arm64");
    store.insert("pkg.toml", &text);

    let loaded = store.load_manifest("pkg.toml").unwrap();
    store.save_manifest("pkg.toml", &loaded).unwrap();
    let reloaded = store.load_manifest("pkg.toml").unwrap();

    assert_eq!(reloaded, loaded);
    assert_eq!(reloaded, Manifest::parse(&text).unwrap());
}

#[test]
fn lookup_failure_does_not_stop_batch() {
    let dir = tempfile::tempdir().unwrap();
    let config = MirrorConfig::default().rooted_at(dir.path());
    let manifests = MemoryManifestStore::new();
    let artifacts = FsArtifactStore::new(config.paths.artifacts.clone());
    let transport = MemoryTransport::new();

    manifests.insert(
        "a.toml",
        &manifest(
            "alpha",
            "1.0.0",
            "https://github.com/acme/alpha/releases/download/$pversion/alpha-$pversion.deb",
            "x86_64",
        ),
    );
    manifests.insert(
        "b.toml",
        &manifest("beta", "0.1", "https://x/beta-$pversion.deb", "x86_64"),
    );
    transport.fail(
        "https://api.github.com/repos/acme/alpha/releases/latest",
        "connection refused",
    );
    transport.respond("https://x/beta-0.2.deb", 200, b"beta deb");

    let orchestrator = Orchestrator::new(&config, &manifests, &artifacts, &transport, &QuietTools);
    let report = orchestrator.run_update().unwrap();

    assert_eq!(report.not_updated().len(), 1);
    assert_eq!(report.not_updated()[0].artifact, "alpha_1.0.0_amd64.deb");
    assert!(report.not_updated()[0].reason.contains("connection refused"));
    assert_eq!(report.updated(), ["beta_0.2_amd64.deb".to_string()]);

    let alpha = manifests.load_manifest("a.toml").unwrap();
    assert_eq!(alpha.package.version, "1.0.0");
    assert_eq!(
        artifacts.list_artifacts().unwrap(),
        vec!["beta_0.2_amd64.deb"]
    );

    let log = std::fs::read_to_string(config.paths.reports.join("update_log.txt")).unwrap();
    assert!(log.starts_with("=== NEED UPDATE ===\n- beta_0.1_amd64.deb: https://x/beta-$pversion.deb -> 0.2\n"));
    let verification = std::fs::read_to_string(config.paths.reports.join("b.txt")).unwrap();
    assert!(verification.starts_with("=== SIGNATURE VERIFICATION ==="));
    assert!(verification.contains("=== LINTIAN OUTPUT ===\nlintian ok\n"));
}
