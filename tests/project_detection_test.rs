//! Project detection and dependency graph construction over on-disk fixtures

mod support;

use cds_extractor::project::{CompilationPlan, DependencyGraphBuilder, ExtractionPhase, ProjectDetector};
use support::fixture_path;
use yare::parameterized;

#[parameterized(
    bookshop = { "bookshop", &["."] },
    monorepo = { "monorepo", &["packages/common", "packages/orders"] },
    standalone = { "standalone", &["models"] },
    no_cds = { "no-cds", &[] },
)]
fn test_detected_projects(fixture_name: &str, expected: &[&str]) {
    let detector = ProjectDetector::new(&fixture_path(fixture_name)).unwrap();
    assert_eq!(detector.detect(), expected);
}

#[parameterized(
    bookshop = { "bookshop", ".", true },
    monorepo_common = { "monorepo", "packages/common", false },
    monorepo_orders = { "monorepo", "packages/orders", true },
    standalone = { "standalone", "models", false },
)]
fn test_compilation_plan(fixture_name: &str, project_dir: &str, project_level: bool) {
    let graph = DependencyGraphBuilder::new(&fixture_path(fixture_name))
        .unwrap()
        .build();
    let project = &graph.projects[project_dir];
    assert_eq!(project.plan.is_project_level(), project_level);
}

#[test]
fn test_bookshop_graph() {
    let graph = DependencyGraphBuilder::new(&fixture_path("bookshop"))
        .unwrap()
        .build();

    assert_eq!(graph.status_summary.total_projects, 1);
    assert_eq!(graph.status_summary.total_cds_files, 4);
    assert_eq!(graph.current_phase, ExtractionPhase::DependencyResolution);

    let project = &graph.projects["."];
    assert_eq!(
        project.cds_files,
        vec![
            "app/fiori.cds",
            "db/schema.cds",
            "srv/admin-service.cds",
            "srv/cat-service.cds",
        ]
    );
    assert_eq!(project.plan, CompilationPlan::ProjectLevel);
    assert_eq!(project.expected_output_files, vec!["model.cds.json"]);
    assert!(project.dependencies.is_empty());

    let manifest = project.package_json.as_ref().unwrap();
    assert_eq!(manifest.requested_cds_version(), "^8.0.0");
    assert_eq!(manifest.requested_cds_dk_version(), "^8.0.0");

    let imports = &project.imports["srv/cat-service.cds"];
    assert_eq!(imports.len(), 1);
    assert_eq!(imports[0].resolved_path.as_deref(), Some("db/schema.cds"));
}

#[test]
fn test_monorepo_cross_project_dependency() {
    let graph = DependencyGraphBuilder::new(&fixture_path("monorepo"))
        .unwrap()
        .build();

    assert_eq!(graph.projects["packages/orders"].dependencies, vec!["packages/common"]);
    assert!(graph.projects["packages/common"].dependencies.is_empty());
    assert_eq!(
        graph.projects["packages/orders"].expected_output_files,
        vec!["packages/orders/model.cds.json"]
    );
    assert_eq!(
        graph.projects["packages/common"].expected_output_files,
        vec!["packages/common/db/types.cds.json"]
    );
    assert_eq!(
        graph.project_for_file("packages/orders/srv/order-service.cds"),
        Some("packages/orders")
    );
}

#[test]
fn test_standalone_root_files_only() {
    let graph = DependencyGraphBuilder::new(&fixture_path("standalone"))
        .unwrap()
        .build();

    let project = &graph.projects["models"];
    assert!(project.package_json.is_none());
    assert_eq!(project.cds_files, vec!["models/base.cds", "models/main.cds"]);
    assert_eq!(
        project.plan,
        CompilationPlan::PerFile(vec!["models/main.cds".to_string()])
    );
}

#[test]
fn test_graph_serializes_legacy_plan_marker() {
    let graph = DependencyGraphBuilder::new(&fixture_path("bookshop"))
        .unwrap()
        .build();

    let value = serde_json::to_value(&graph).unwrap();
    assert_eq!(
        value["projects"]["."]["cdsFilesToCompile"],
        serde_json::json!(["__PROJECT_LEVEL_COMPILATION__"])
    );
    assert_eq!(value["currentPhase"], "dependency_resolution");
}
