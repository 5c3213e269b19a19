//! Build documents to disk, then resolve targets against them

use assert_matches::assert_matches;
use std::fs;
use std::path::Path;
use trustwalk_core::layout::{CLAIMED_ROLE, NEW_ROLE, PROJECTS_ROLE, RARELY_UPDATED_ROLE, UNCLAIMED_ROLE};
use trustwalk_core::{
    build_all, build_project_registry, BuildConfig, CachedStore, DocumentStore, FileStore,
    MetadataBuilder, ProjectPartition, PseudoSigner, Registry, Resolution, Resolver, TrustError,
};

fn config(root: &Path, version: u64) -> BuildConfig {
    BuildConfig {
        output_dir: root.join("metadata"),
        targets_dir: root.join("web"),
        reference_timestamp: 1_400_000_000,
        version,
    }
}

fn put(root: &Path, rel: &str, content: &[u8]) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

#[test]
fn non_backtracking_claim_hides_catch_all() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path(), 1);
    put(&cfg.targets_dir, "pkg/a/x.tar.gz", b"x");

    let mut registry = Registry::with_seed(11);
    registry.register_role("projects", [".*"], true).unwrap();
    registry.register_role("claimed", ["pkg/a/.*"], false).unwrap();
    registry.register_role("unclaimed", [".*"], true).unwrap();
    registry.assign_target_scope("unclaimed", ["pkg/*/*"]).unwrap();
    registry.delegate("projects", ["claimed", "unclaimed"]).unwrap();
    registry.freeze().unwrap();
    build_all(&registry, &cfg).unwrap();

    let resolver = Resolver::new(FileStore::new(&cfg.output_dir));
    let walk = resolver.walk("projects", "pkg/a/x.tar.gz").unwrap();
    assert_eq!(walk.resolution, Resolution::NotFound);
    assert_eq!(walk.visited, ["projects", "claimed"]);

    // The catch-all does hold the record; only the walk never reaches it
    let direct = resolver.resolve("unclaimed", "pkg/a/x.tar.gz").unwrap();
    assert_eq!(direct.role(), Some("unclaimed"));
}

#[test]
fn root_starting_elsewhere_sees_only_that_subtree() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path(), 1);
    put(&cfg.targets_dir, "packages/source/c/chem/chem-2.0.tar.gz", b"chem");

    let partition = ProjectPartition {
        claimed: vec!["chem".into()],
        unclaimed: vec!["zzz".into()],
        ..ProjectPartition::default()
    };
    let registry = build_project_registry(&partition, 2).unwrap();
    build_all(&registry, &cfg).unwrap();

    let resolver = Resolver::new(FileStore::new(&cfg.output_dir));
    let target = "packages/source/c/chem/chem-2.0.tar.gz";
    assert!(resolver.resolve(CLAIMED_ROLE, target).unwrap().is_found());
    assert!(!resolver.resolve(NEW_ROLE, target).unwrap().is_found());
}

#[test]
fn project_layout_resolves_every_group() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path(), 1);
    let web = &cfg.targets_dir;
    put(web, "packages/source/c/chem/chem-2.0.tar.gz", b"chem 2.0");
    put(web, "packages/source/z/zyzz/zyzz-1.0.1.tar.gz", b"zyzz 1.0.1");
    put(web, "packages/source/a/agree/agree.tar.gz", b"agree");
    put(web, "packages/source/z/zzz/zzz-0.0.2.tar.gz", b"zzz 0.0.2");

    let partition = ProjectPartition {
        claimed: vec!["chem".into()],
        rarely_updated: vec!["zyzz".into()],
        new: vec!["agree".into()],
        unclaimed: vec!["zzz".into()],
    };
    let registry = build_project_registry(&partition, 9).unwrap();
    let report = build_all(&registry, &cfg).unwrap();
    assert_eq!(report.documents.len(), registry.len());
    assert_eq!(report.targets, 4);

    let resolver = Resolver::new(FileStore::new(&cfg.output_dir));

    let claimed = resolver
        .walk(PROJECTS_ROLE, "packages/source/c/chem/chem-2.0.tar.gz")
        .unwrap();
    assert_matches!(&claimed.resolution, Resolution::Found(authority) => {
        assert_eq!(authority.role, "projects/claimed-projects/chem");
        assert_eq!(
            authority.delegation_path,
            [PROJECTS_ROLE, CLAIMED_ROLE, "projects/claimed-projects/chem"]
        );
        assert_eq!(authority.record.length, 8);
    });

    let rarely = resolver
        .walk(PROJECTS_ROLE, "packages/source/z/zyzz/zyzz-1.0.1.tar.gz")
        .unwrap();
    assert_eq!(rarely.resolution.role(), Some(RARELY_UPDATED_ROLE));
    assert_eq!(rarely.visited, [PROJECTS_ROLE, CLAIMED_ROLE, RARELY_UPDATED_ROLE]);

    let new = resolver
        .resolve(PROJECTS_ROLE, "packages/source/a/agree/agree.tar.gz")
        .unwrap();
    assert_eq!(new.role(), Some("projects/new-projects/agree"));

    let unclaimed = resolver
        .walk(PROJECTS_ROLE, "packages/source/z/zzz/zzz-0.0.2.tar.gz")
        .unwrap();
    assert_eq!(unclaimed.resolution.role(), Some(UNCLAIMED_ROLE));
    assert_eq!(
        unclaimed.visited,
        [PROJECTS_ROLE, CLAIMED_ROLE, NEW_ROLE, UNCLAIMED_ROLE]
    );
}

#[test]
fn unpublished_release_of_claimed_project_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path(), 1);
    put(&cfg.targets_dir, "packages/source/c/chem/chem-2.0.tar.gz", b"chem");

    let partition = ProjectPartition {
        claimed: vec!["chem".into()],
        ..ProjectPartition::default()
    };
    let registry = build_project_registry(&partition, 4).unwrap();
    build_all(&registry, &cfg).unwrap();

    let resolver = Resolver::new(FileStore::new(&cfg.output_dir));
    let walk = resolver
        .walk(PROJECTS_ROLE, "packages/source/c/chem/chem-3.0.tar.gz")
        .unwrap();
    assert_eq!(walk.resolution, Resolution::NotFound);
    assert_eq!(
        walk.visited,
        [
            PROJECTS_ROLE,
            CLAIMED_ROLE,
            "projects/claimed-projects/chem",
            NEW_ROLE,
            UNCLAIMED_ROLE
        ]
    );
}

#[test]
fn missing_delegated_document_surfaces_as_error() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path(), 1);
    let registry = build_project_registry(&ProjectPartition::split(["a", "b", "c", "d"], 0), 0).unwrap();
    build_all(&registry, &cfg).unwrap();
    fs::remove_file(cfg.output_dir.join("projects/claimed-projects.json")).unwrap();

    let resolver = Resolver::new(FileStore::new(&cfg.output_dir));
    assert_matches!(
        resolver.resolve(PROJECTS_ROLE, "packages/source/a/a/a-1.0.tar.gz"),
        Err(TrustError::MetadataUnavailable { role, .. }) if role == CLAIMED_ROLE
    );
}

#[test]
fn signature_checks_accept_built_and_reject_tampered_documents() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path(), 1);
    put(&cfg.targets_dir, "packages/source/z/zzz/zzz-0.0.2.tar.gz", b"zzz");

    let partition = ProjectPartition {
        unclaimed: vec!["zzz".into()],
        ..ProjectPartition::default()
    };
    let registry = build_project_registry(&partition, 6).unwrap();
    build_all(&registry, &cfg).unwrap();
    let root_keys = registry.lookup(PROJECTS_ROLE).unwrap().keyids().to_vec();

    let resolver = Resolver::new(FileStore::new(&cfg.output_dir))
        .with_signature_checks(PseudoSigner)
        .with_root_keys(root_keys);
    let target = "packages/source/z/zzz/zzz-0.0.2.tar.gz";
    assert!(resolver.resolve(PROJECTS_ROLE, target).unwrap().is_found());

    // Bump the version without re-signing
    let path = cfg.output_dir.join("projects/unclaimed-projects.json");
    let text = fs::read_to_string(&path).unwrap();
    fs::write(&path, text.replace("\"version\": 1", "\"version\": 2")).unwrap();
    assert_matches!(
        resolver.resolve(PROJECTS_ROLE, target),
        Err(TrustError::MetadataUnavailable { role, .. }) if role == UNCLAIMED_ROLE
    );
}

#[test]
fn cached_store_picks_up_rebuild_after_invalidation() {
    let dir = tempfile::tempdir().unwrap();
    put(&dir.path().join("web"), "packages/source/z/zzz/zzz-0.0.2.tar.gz", b"zzz");

    let partition = ProjectPartition {
        unclaimed: vec!["zzz".into()],
        ..ProjectPartition::default()
    };
    let registry = build_project_registry(&partition, 1).unwrap();
    let first = config(dir.path(), 1);
    build_all(&registry, &first).unwrap();

    let resolver = Resolver::new(CachedStore::new(FileStore::new(&first.output_dir)));
    let target = "packages/source/z/zzz/zzz-0.0.2.tar.gz";
    assert!(resolver.resolve(PROJECTS_ROLE, target).unwrap().is_found());

    // A new release lands and the repository is rebuilt
    put(&first.targets_dir, "packages/source/z/zzz/zzz-0.0.3.tar.gz", b"zzz 3");
    let second = config(dir.path(), 2);
    MetadataBuilder::new(&registry, &second).unwrap().build_all().unwrap();

    let newer = "packages/source/z/zzz/zzz-0.0.3.tar.gz";
    assert!(!resolver.resolve(PROJECTS_ROLE, newer).unwrap().is_found());

    resolver.store().invalidate(UNCLAIMED_ROLE);
    assert!(resolver.resolve(PROJECTS_ROLE, newer).unwrap().is_found());
    assert_eq!(
        resolver.store().load(UNCLAIMED_ROLE).unwrap().document().signed.version,
        2
    );
    assert_eq!(resolver.store().load(PROJECTS_ROLE).unwrap().document().signed.version, 1);
}

#[test]
fn published_documents_use_the_wire_format() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path(), 7);
    let partition = ProjectPartition {
        claimed: vec!["chem".into()],
        ..ProjectPartition::default()
    };
    let registry = build_project_registry(&partition, 3).unwrap();
    build_all(&registry, &cfg).unwrap();

    let text = fs::read_to_string(cfg.output_dir.join("projects/claimed-projects.json")).unwrap();
    let value: serde_json::Value = serde_json::from_str(&text).unwrap();

    let signed = &value["signed"];
    assert_eq!(signed["_type"], "Targets");
    assert_eq!(signed["version"], 7);
    assert_eq!(signed["expires"], "2015-05-13T16:53:20Z");
    let role = &signed["delegations"]["roles"][0];
    assert_eq!(role["name"], "projects/claimed-projects/chem");
    assert_eq!(role["backtrack"], false);
    assert_eq!(role["threshold"], 1);
    assert_eq!(role["paths"][0], "packages/.*/.*/chem/.*");

    let signature = &value["signatures"][0];
    assert_eq!(signature["method"], "ed25519");
    assert_eq!(signature["sig"].as_str().unwrap().len(), 128);

    assert!(text.starts_with("{\n \"signatures\""));
}

#[test]
fn separate_output_directories_keep_walks_on_one_build() {
    let dir = tempfile::tempdir().unwrap();
    put(&dir.path().join("web"), "packages/source/z/zzz/zzz-0.0.2.tar.gz", b"zzz");

    let partition = ProjectPartition {
        unclaimed: vec!["zzz".into()],
        ..ProjectPartition::default()
    };
    let registry = build_project_registry(&partition, 1).unwrap();
    let first = config(dir.path(), 1);
    build_all(&registry, &first).unwrap();

    let mut second = config(dir.path(), 2);
    second.output_dir = dir.path().join("metadata-2");
    build_all(&registry, &second).unwrap();

    let resolver = Resolver::new(FileStore::new(&first.output_dir));
    let walk = resolver
        .walk(PROJECTS_ROLE, "packages/source/z/zzz/zzz-0.0.2.tar.gz")
        .unwrap();
    assert!(walk.resolution.is_found());
    for role in &walk.visited {
        assert_eq!(resolver.store().load(role).unwrap().document().signed.version, 1);
    }
}
