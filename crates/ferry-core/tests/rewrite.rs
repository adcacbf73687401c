//! End-to-end rewrite tests against catalogs built from capture bundles on disk.

use ferry_catalog::{BundleLayout, Catalog, CatalogSource};
use ferry_core::{
    revert, rewrite, ChangeLog, ChangeOutcome, Field, RewriteOptions, VolumePolicy, VolumeRule,
};
use ferry_schema::{parse_manifest_file, parse_manifest_str, ImageField};
use std::fs;
use std::path::Path;

const DIFY_COMPOSE: &str = "\
version: '3'
x-shared-env: &shared
  LOG_LEVEL: INFO
services:
  api:
    image: langgenius/dify-api:1.4.0
    restart: always
    volumes:
      - ./volumes/app/storage:/app/api/storage
  web:
    image: langgenius/dify-web:1.4.0
  db:
    image: postgres:15-alpine
    volumes:
      - ./volumes/db/data:/var/lib/postgresql/data
  redis:
    image: redis:6-alpine
    volumes:
      - ./volumes/redis/data:/data
      - /tmp/cache
  worker:
    image: langgenius/dify-api:1.4.0
  custom:
    image: myregistry.local/foo-bar:2.0
networks:
  default:
    driver: bridge
";

fn write_bundle(root: &Path, images: &[&str], captures: &[&str]) -> BundleLayout {
    let layout = BundleLayout::new(root);
    fs::write(layout.images_list(), images.join("\n")).unwrap();
    fs::create_dir_all(layout.volumes_dir()).unwrap();
    for capture in captures {
        fs::create_dir_all(layout.volume_path(capture)).unwrap();
    }
    fs::write(layout.compose_file(), DIFY_COMPOSE).unwrap();
    layout
}

fn dify_bundle(root: &Path) -> BundleLayout {
    write_bundle(
        root,
        &[
            "dify_test_api-1:offline",
            "dify_test_web-1:offline",
            "dify_test_worker-1:offline",
            "postgres:offline",
            "redis:offline",
            "redis:6-alpine",
        ],
        &["db_var_lib_postgresql_data", "api_app_api_storage"],
    )
}

fn options() -> RewriteOptions {
    RewriteOptions::new("/offline_volumes").with_prefix(Some("dify_test".to_owned()))
}

fn image_of(manifest: &ferry_schema::Manifest, service: &str) -> String {
    match manifest.service(service).unwrap().image() {
        ImageField::Reference(r) => r.to_owned(),
        other => panic!("unexpected image field {other:?}"),
    }
}

#[test]
fn rewrite_bundle_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let layout = dify_bundle(dir.path());
    let catalog = Catalog::build(&CatalogSource::from_bundle(&layout)).unwrap();
    let manifest = parse_manifest_file(layout.compose_file()).unwrap();

    let (out, log) = rewrite(&manifest, &catalog, &options()).unwrap();

    assert_eq!(image_of(&out, "api"), "dify_test_api-1:offline");
    assert_eq!(image_of(&out, "web"), "dify_test_web-1:offline");
    assert_eq!(image_of(&out, "worker"), "dify_test_worker-1:offline");
    assert_eq!(image_of(&out, "db"), "postgres:offline");
    assert_eq!(image_of(&out, "redis"), "redis:offline");
    assert_eq!(image_of(&out, "custom"), "myregistry.local/foo-bar:2.0");

    assert_eq!(
        out.volume_at("api", 0),
        Some("/offline_volumes/api_app_api_storage:/app/api/storage")
    );
    assert_eq!(
        out.volume_at("db", 0),
        Some("/offline_volumes/db_var_lib_postgresql_data:/var/lib/postgresql/data")
    );
    assert_eq!(out.volume_at("redis", 0), Some("/offline_volumes/volumes:/data"));
    assert_eq!(out.volume_at("redis", 1), Some("/tmp/cache"));

    let summary = log.summary();
    assert_eq!(summary.unresolved_services, vec!["custom"]);
    assert_eq!(summary.not_found, 1);
    assert_ne!(log.source_digest, log.output_digest);
    assert_eq!(log.output_digest, out.digest().unwrap());
}

#[test]
fn document_level_nodes_pass_through_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let layout = dify_bundle(dir.path());
    let catalog = Catalog::build(&CatalogSource::from_bundle(&layout)).unwrap();
    let manifest = parse_manifest_str(DIFY_COMPOSE).unwrap();

    let (out, _) = rewrite(&manifest, &catalog, &options()).unwrap();
    let text = out.serialize().unwrap();

    let version = text.find("version:").unwrap();
    let shared = text.find("x-shared-env:").unwrap();
    let services = text.find("services:").unwrap();
    let networks = text.find("networks:").unwrap();
    assert!(version < shared && shared < services && services < networks);
    assert!(text.contains("LOG_LEVEL: INFO"));
    assert!(text.contains("restart: always"));
    assert!(text.contains("driver: bridge"));
}

#[test]
fn no_matches_and_no_remappable_mounts_is_pass_through() {
    let compose = "\
services:
  custom:
    image: myregistry.local/foo-bar:2.0
    volumes:
      - /offline_volumes/data:/data
      - /var/cache
";
    let manifest = parse_manifest_str(compose).unwrap();
    let (out, log) = rewrite(&manifest, &Catalog::empty("offline"), &options()).unwrap();

    assert_eq!(out.serialize().unwrap(), manifest.serialize().unwrap());
    assert!(log
        .records
        .iter()
        .all(|r| matches!(r.outcome, ChangeOutcome::NotFound | ChangeOutcome::Skipped)));
}

#[test]
fn policy_rules_redirect_matching_mounts() {
    let dir = tempfile::tempdir().unwrap();
    let layout = dify_bundle(dir.path());
    let catalog = Catalog::build(&CatalogSource::from_bundle(&layout)).unwrap();
    let manifest = parse_manifest_str(DIFY_COMPOSE).unwrap();
    let opts = options().with_policy(VolumePolicy::new(vec![VolumeRule {
        contains: "redis".to_owned(),
        target: "cache/redis".to_owned(),
    }]));

    let (out, log) = rewrite(&manifest, &catalog, &opts).unwrap();

    assert_eq!(
        out.volume_at("redis", 0),
        Some("/offline_volumes/cache/redis:/data")
    );
    let record = log
        .records
        .iter()
        .find(|r| r.service == "redis" && r.field == Field::Volume(0))
        .unwrap();
    assert_eq!(record.strategy.as_deref(), Some("policy(redis)"));
}

#[test]
fn invalid_policy_is_rejected_before_rewriting() {
    let manifest = parse_manifest_str(DIFY_COMPOSE).unwrap();
    let opts = options().with_policy(VolumePolicy::new(vec![VolumeRule {
        contains: "redis".to_owned(),
        target: "../escape".to_owned(),
    }]));
    assert!(rewrite(&manifest, &Catalog::empty("offline"), &opts).is_err());
}

#[test]
fn changelog_survives_disk_and_reverts_rewrite() {
    let dir = tempfile::tempdir().unwrap();
    let layout = dify_bundle(dir.path());
    let catalog = Catalog::build(&CatalogSource::from_bundle(&layout)).unwrap();
    let manifest = parse_manifest_str(DIFY_COMPOSE).unwrap();
    let (mut out, log) = rewrite(&manifest, &catalog, &options()).unwrap();

    let log_path = dir.path().join("changelog.json");
    fs::write(&log_path, log.to_json().unwrap()).unwrap();
    let loaded = ChangeLog::load(&log_path).unwrap();
    assert_eq!(loaded, log);

    let report = revert(&mut out, &loaded).unwrap();
    assert!(report.digest_matched);
    assert!(report.conflicts.is_empty());
    assert_eq!(report.reverted, log.summary().applied);
    assert_eq!(out.serialize().unwrap(), manifest.serialize().unwrap());
}

#[test]
fn revert_keeps_hand_edits() {
    let dir = tempfile::tempdir().unwrap();
    let layout = dify_bundle(dir.path());
    let catalog = Catalog::build(&CatalogSource::from_bundle(&layout)).unwrap();
    let manifest = parse_manifest_str(DIFY_COMPOSE).unwrap();
    let (mut out, log) = rewrite(&manifest, &catalog, &options()).unwrap();

    out.set_image("web", "nginx:hand-edited").unwrap();
    let report = revert(&mut out, &log).unwrap();

    assert!(!report.digest_matched);
    assert_eq!(report.conflicts.len(), 1);
    assert_eq!(report.conflicts[0].service, "web");
    assert_eq!(image_of(&out, "web"), "nginx:hand-edited");
    assert_eq!(image_of(&out, "api"), "langgenius/dify-api:1.4.0");
}
