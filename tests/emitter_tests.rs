//! Tests for build-graph emission.
//!
//! Each scenario emits into a temporary tree and asserts on the textual
//! graphs: begin/finish wiring across dependent targets, output-directory
//! deduplication, synthetic phony outputs, auxiliary-file materialization,
//! and byte-for-byte determinism.

use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use rstest::{fixture, rstest};
use tempfile::{TempDir, tempdir};
use test_support::{build_context, build_environment, executable_target};
use xcplan::emitter::{NinjaEmitter, phony_output_path};
use xcplan::formatter::DefaultFormatter;
use xcplan::graph::TargetGraph;
use xcplan::invocation::{AuxiliaryFile, Invocation};
use xcplan::phase::SourcesResolver;
use xcplan::settings::Layer;

#[fixture]
fn root_dir() -> TempDir {
    tempdir().expect("temp dir")
}

fn utf8_root(dir: &TempDir) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf8 temp path")
}

fn emitter() -> NinjaEmitter {
    NinjaEmitter::new(Box::new(DefaultFormatter), false)
}

/// Sources resolution carrying the given invocations for (normal, x86_64).
fn sources_with(invocations: Vec<Invocation>) -> SourcesResolver {
    let mut sources = SourcesResolver::default();
    sources
        .variant_architecture_invocations
        .insert(("normal".to_owned(), "x86_64".to_owned()), invocations);
    sources
}

fn read(path: &Utf8Path) -> String {
    fs::read_to_string(path).unwrap_or_else(|error| panic!("read {path}: {error}"))
}

#[rstest]
fn root_graph_opens_with_header_and_invoke_rule(root_dir: TempDir) {
    let root = utf8_root(&root_dir);
    let build = build_environment(&root);
    let mut graph = TargetGraph::new();
    graph.add_target(executable_target(&root, "App", SourcesResolver::default()));

    let path = emitter().emit(&build, &build_context(), &graph).expect("emit");
    assert_eq!(path, root.join("obj").join("build.ninja"));

    let contents = read(&path);
    let header = format!(
        concat!(
            "# xcplan ninja\n",
            "# Action: build\n",
            "# Project: /src/App.xcodeproj\n",
            "# Configuration: Debug\n",
            "\n",
            "builddir = {objroot}\n",
            "\n",
            "rule invoke\n",
            "  command = cd $dir && $exec\n",
        ),
        objroot = root.join("obj"),
    );
    assert!(contents.starts_with(&header), "unexpected header:\n{contents}");
}

#[rstest]
fn dependent_targets_chain_through_begin_and_finish_nodes(root_dir: TempDir) {
    let root = utf8_root(&root_dir);
    let build = build_environment(&root);
    let mut graph = TargetGraph::new();
    graph.add_target(executable_target(&root, "A", SourcesResolver::default()));
    graph.add_target(executable_target(&root, "B", SourcesResolver::default()));
    graph.add_dependency("B", "A");

    let path = emitter().emit(&build, &build_context(), &graph).expect("emit");
    let contents = read(&path);
    let products = root.join("products");

    assert!(contents.contains("build begin-target-A: phony\n"));
    assert!(contents.contains(&format!("build finish-target-A: phony {products}/A\n")));
    assert!(contents.contains("build begin-target-B: phony finish-target-A\n"));
    assert!(contents.contains(&format!("build finish-target-B: phony {products}/B\n")));
    assert!(contents.contains(&format!("subninja {root}/tmp/A/build.ninja\n")));
    assert!(contents.contains(&format!("subninja {root}/tmp/B/build.ninja\n")));
}

#[rstest]
fn invocation_edges_anchor_to_their_target_begin_node(root_dir: TempDir) {
    let root = utf8_root(&root_dir);
    let build = build_environment(&root);
    let mut graph = TargetGraph::new();
    graph.add_target(executable_target(&root, "App", SourcesResolver::default()));

    emitter().emit(&build, &build_context(), &graph).expect("emit");
    let contents = read(&root.join("tmp").join("App").join("build.ninja"));
    let products = root.join("products");

    assert!(contents.starts_with("# xcplan ninja\n# Target: App\n\n"));
    let edge_line = contents
        .lines()
        .find(|line| line.starts_with(&format!("build {products}/App: invoke")))
        .expect("link edge");
    // The output directory and the begin node are order-only prerequisites.
    let (_, order_only) = edge_line.split_once(" || ").expect("order-only section");
    assert_eq!(order_only, format!("{products} begin-target-App"));
}

#[rstest]
fn shared_output_directories_get_one_creation_edge(root_dir: TempDir) {
    let root = utf8_root(&root_dir);
    let build = build_environment(&root);
    let mut graph = TargetGraph::new();
    graph.add_target(executable_target(&root, "A", SourcesResolver::default()));
    graph.add_target(executable_target(&root, "B", SourcesResolver::default()));

    let path = emitter().emit(&build, &build_context(), &graph).expect("emit");
    let contents = read(&path);
    let products = root.join("products");

    let creation_edges = contents
        .matches(&format!("build {products}: invoke"))
        .count();
    assert_eq!(creation_edges, 1, "directory owned by the first target");
    assert_eq!(
        contents
            .matches(&format!("/bin/mkdir -p {products}"))
            .count(),
        1,
    );
    // The edge belongs to target A, which mentioned the directory first.
    let edge_start = contents
        .find(&format!("build {products}: invoke"))
        .expect("creation edge");
    let edge = &contents[edge_start..];
    assert!(edge.contains("begin-target-A"));
}

#[rstest]
fn colliding_phony_outputs_share_one_synthetic_path(root_dir: TempDir) {
    let root = utf8_root(&root_dir);
    let build = build_environment(&root);
    let rewrite = |tool: &str| Invocation {
        executable: format!("/usr/bin/{tool}"),
        working_directory: "/src".into(),
        phony_outputs: vec!["X".into()],
        ..Invocation::default()
    };
    let mut graph = TargetGraph::new();
    graph.add_target(executable_target(
        &root,
        "App",
        sources_with(vec![rewrite("touch"), rewrite("strip")]),
    ));

    let path = emitter().emit(&build, &build_context(), &graph).expect("emit");
    let synthetic = phony_output_path("X");

    // Both edges claim the same synthetic output; the executor will reject
    // the duplicate producer, and that collision is the documented current
    // behavior.
    let target_contents = read(&root.join("tmp").join("App").join("build.ninja"));
    assert_eq!(
        target_contents
            .matches(&format!("build {synthetic}: invoke"))
            .count(),
        2,
    );

    // The finish node holds both synthetic outputs as order-only inputs.
    let contents = read(&path);
    let finish_line = contents
        .lines()
        .find(|line| line.starts_with("build finish-target-App"))
        .expect("finish edge");
    assert_eq!(finish_line.matches(&synthetic).count(), 2);
}

#[rstest]
fn emission_is_deterministic(root_dir: TempDir) {
    let root = utf8_root(&root_dir);
    let build = build_environment(&root);
    let build_graph = || {
        let mut graph = TargetGraph::new();
        graph.add_target(executable_target(&root, "A", SourcesResolver::default()));
        graph.add_target(executable_target(&root, "B", SourcesResolver::default()));
        graph.add_dependency("B", "A");
        graph
    };

    let path = emitter()
        .emit(&build, &build_context(), &build_graph())
        .expect("emit");
    let first_root = read(&path);
    let first_target = read(&root.join("tmp").join("A").join("build.ninja"));

    let path = emitter()
        .emit(&build, &build_context(), &build_graph())
        .expect("emit");
    assert_eq!(read(&path), first_root);
    assert_eq!(read(&root.join("tmp").join("A").join("build.ninja")), first_target);
}

#[rstest]
fn unresolvable_executables_are_skipped_but_still_finish(root_dir: TempDir) {
    let root = utf8_root(&root_dir);
    let build = build_environment(&root);
    let generated = root.join("gen").join("out.txt");
    let orphan = Invocation {
        executable: "missing-tool".to_owned(),
        working_directory: "/src".into(),
        outputs: vec![generated.clone()],
        ..Invocation::default()
    };
    let mut graph = TargetGraph::new();
    graph.add_target(executable_target(&root, "App", sources_with(vec![orphan])));

    let path = emitter().emit(&build, &build_context(), &graph).expect("emit");

    let target_contents = read(&root.join("tmp").join("App").join("build.ninja"));
    assert!(
        !target_contents.contains("missing-tool"),
        "skipped invocation must not reach the sub-graph",
    );

    // The finish node and the directory edge still reference the output,
    // leaving the graph well-formed but unsuitable for execution.
    let contents = read(&path);
    assert!(contents.contains(&format!("build {}: invoke", generated.parent().expect("parent"))));
    let finish_line = contents
        .lines()
        .find(|line| line.starts_with("build finish-target-App"))
        .expect("finish edge");
    assert!(finish_line.contains(generated.as_str()));
}

#[rstest]
fn builtin_tools_are_skipped_like_missing_ones(root_dir: TempDir) {
    let root = utf8_root(&root_dir);
    let build = build_environment(&root);
    let builtin = Invocation {
        executable: "builtin-copyPlist".to_owned(),
        working_directory: "/src".into(),
        outputs: vec![root.join("gen").join("Info.plist")],
        ..Invocation::default()
    };
    let mut graph = TargetGraph::new();
    graph.add_target(executable_target(&root, "App", sources_with(vec![builtin])));

    emitter().emit(&build, &build_context(), &graph).expect("emit");
    let target_contents = read(&root.join("tmp").join("App").join("build.ninja"));
    assert!(!target_contents.contains("copyPlist"));
}

#[rstest]
fn coordination_stubs_only_feed_the_finish_node(root_dir: TempDir) {
    let root = utf8_root(&root_dir);
    let build = build_environment(&root);
    let stamp = root.join("stamps").join("resources");
    let stub = Invocation {
        outputs: vec![stamp.clone()],
        ..Invocation::default()
    };
    let mut graph = TargetGraph::new();
    graph.add_target(executable_target(&root, "App", sources_with(vec![stub])));

    let path = emitter().emit(&build, &build_context(), &graph).expect("emit");

    let target_contents = read(&root.join("tmp").join("App").join("build.ninja"));
    assert!(!target_contents.contains(stamp.as_str()));

    let contents = read(&path);
    let finish_line = contents
        .lines()
        .find(|line| line.starts_with("build finish-target-App"))
        .expect("finish edge");
    assert!(finish_line.contains(stamp.as_str()));
}

#[rstest]
fn phony_inputs_get_phony_producers(root_dir: TempDir) {
    let root = utf8_root(&root_dir);
    let build = build_environment(&root);
    let maybe_missing = root.join("scripts").join("input.txt");
    let script = Invocation {
        executable: "/bin/sh".to_owned(),
        arguments: vec!["-c".to_owned(), "true".to_owned()],
        working_directory: "/src".into(),
        inputs: vec![maybe_missing.clone()],
        phony_inputs: vec![maybe_missing.clone()],
        outputs: vec![root.join("gen").join("script.out")],
        ..Invocation::default()
    };
    let mut graph = TargetGraph::new();
    graph.add_target(executable_target(&root, "App", sources_with(vec![script])));

    emitter().emit(&build, &build_context(), &graph).expect("emit");
    let target_contents = read(&root.join("tmp").join("App").join("build.ninja"));
    assert!(target_contents.contains(&format!("build {maybe_missing}: phony\n")));
}

#[rstest]
fn auxiliary_files_are_materialized_before_the_build(root_dir: TempDir) {
    let root = utf8_root(&root_dir);
    let build = build_environment(&root);
    let response = root.join("aux").join("link.resp");
    let script = root.join("aux").join("run.sh");
    let invocation = Invocation {
        executable: "/usr/bin/true".to_owned(),
        working_directory: "/src".into(),
        outputs: vec![root.join("gen").join("out")],
        auxiliary_files: vec![
            AuxiliaryFile {
                path: response.clone(),
                contents: b"-filelist objects.txt".to_vec(),
                executable: false,
            },
            AuxiliaryFile {
                path: script.clone(),
                contents: b"#!/bin/sh\nexit 0\n".to_vec(),
                executable: true,
            },
        ],
        ..Invocation::default()
    };
    let mut graph = TargetGraph::new();
    graph.add_target(executable_target(&root, "App", sources_with(vec![invocation])));

    emitter().emit(&build, &build_context(), &graph).expect("emit");

    assert_eq!(fs::read(&response).expect("response file"), b"-filelist objects.txt");
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = fs::metadata(&script).expect("script metadata").permissions().mode();
        assert_ne!(mode & 0o111, 0, "script must be executable");
    }
}

#[rstest]
fn dry_run_skips_auxiliary_files_but_writes_graphs(root_dir: TempDir) {
    let root = utf8_root(&root_dir);
    let build = build_environment(&root);
    let response = root.join("aux").join("link.resp");
    let invocation = Invocation {
        executable: "/usr/bin/true".to_owned(),
        working_directory: "/src".into(),
        outputs: vec![root.join("gen").join("out")],
        auxiliary_files: vec![AuxiliaryFile {
            path: response.clone(),
            contents: b"contents".to_vec(),
            executable: false,
        }],
        ..Invocation::default()
    };
    let mut graph = TargetGraph::new();
    graph.add_target(executable_target(&root, "App", sources_with(vec![invocation])));

    let dry = NinjaEmitter::new(Box::new(DefaultFormatter), true);
    let path = dry.emit(&build, &build_context(), &graph).expect("emit");

    assert!(!response.as_std_path().exists(), "dry run must not write aux files");
    assert!(path.as_std_path().exists(), "graphs are still written");
}

#[rstest]
fn targets_without_an_environment_are_reported_and_skipped(root_dir: TempDir) {
    let root = utf8_root(&root_dir);
    let build = build_environment(&root);
    let mut graph = TargetGraph::new();
    let mut broken = executable_target(&root, "Broken", SourcesResolver::default());
    // No ARCHS: the target environment cannot be created.
    broken.settings = Layer::new("target")
        .with("TARGET_TEMP_DIR", root.join("tmp").join("Broken").as_str());
    graph.add_target(broken);
    graph.add_target(executable_target(&root, "App", SourcesResolver::default()));

    let path = emitter().emit(&build, &build_context(), &graph).expect("emit");
    let contents = read(&path);

    assert!(contents.contains("build begin-target-Broken: phony\n"));
    assert!(
        !contents.contains("build finish-target-Broken"),
        "degenerate target stays at its begin node",
    );
    assert!(!contents.contains(&format!("subninja {root}/tmp/Broken/build.ninja")));
    assert!(contents.contains("build finish-target-App"), "the walk completes");
}

#[rstest]
fn each_output_path_has_at_most_one_producer(root_dir: TempDir) {
    let root = utf8_root(&root_dir);
    let build = build_environment(&root);
    let mut graph = TargetGraph::new();
    graph.add_target(executable_target(&root, "A", SourcesResolver::default()));
    graph.add_target(executable_target(&root, "B", SourcesResolver::default()));
    graph.add_dependency("B", "A");

    let path = emitter().emit(&build, &build_context(), &graph).expect("emit");

    let mut produced = std::collections::HashSet::new();
    for file in [
        path.clone(),
        root.join("tmp").join("A").join("build.ninja"),
        root.join("tmp").join("B").join("build.ninja"),
    ] {
        for line in read(&file).lines() {
            let Some(rest) = line.strip_prefix("build ") else {
                continue;
            };
            let (outputs, _) = rest.split_once(':').expect("build line");
            for output in outputs.split_whitespace() {
                assert!(
                    produced.insert(output.to_owned()),
                    "duplicate producer for {output}",
                );
            }
        }
    }
}
