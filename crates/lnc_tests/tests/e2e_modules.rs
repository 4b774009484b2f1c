//! E2E: module resolution — bundled stdlib, relative paths, pre-staged
//! dependencies, cycles.

mod common;

use std::fs;

use lnc_compile::{compile_path, Artifact};

#[test]
fn relative_imports_compile_across_files() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("greeting.ln"),
        "export const message: string = 'hello from a sibling';\n",
    )
    .unwrap();
    fs::write(
        dir.path().join("main.ln"),
        "from @std/app import start, print\nfrom ./greeting import message\non start { print(message); }\n",
    )
    .unwrap();

    let (artifact, _) = compile_path(&dir.path().join("main.ln"), "aga").unwrap();
    match artifact {
        Artifact::Text(aga) => assert!(aga.contains("\"hello from a sibling\"")),
        other => panic!("expected text, got {:?}", other),
    }
}

#[test]
fn prestaged_dependencies_load_from_a_sibling_directory() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join("mathkit")).unwrap();
    fs::write(
        dir.path().join("mathkit").join("index.ln"),
        "export const seven: int64 = 7;\n",
    )
    .unwrap();
    fs::write(
        dir.path().join("main.ln"),
        "from @std/app import start\nfrom mathkit import seven\nconst doubled: int64 = seven + seven;\non start { }\n",
    )
    .unwrap();

    let (artifact, _) = compile_path(&dir.path().join("main.ln"), "aga").unwrap();
    match artifact {
        Artifact::Text(aga) => {
            assert!(aga.contains("@-8: 7"));
            assert!(aga.contains("@-16: 14"));
        }
        other => panic!("expected text, got {:?}", other),
    }
}

#[test]
fn import_cycles_are_rejected_with_both_endpoints() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("a.ln"),
        "from ./b import bee\nexport const aye: int64 = 1;\n",
    )
    .unwrap();
    fs::write(
        dir.path().join("b.ln"),
        "from ./a import aye\nexport const bee: int64 = 2;\n",
    )
    .unwrap();

    let err = compile_path(&dir.path().join("a.ln"), "amm").unwrap_err();
    assert_eq!(err.exit_code(), 4);
    let text = err.to_string();
    assert!(text.contains("cyclic import"));
    assert!(text.contains("a.ln") && text.contains("b.ln"));
}

#[test]
fn diamond_imports_load_once() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("base.ln"), "export event tick: int64;\n").unwrap();
    fs::write(
        dir.path().join("left.ln"),
        "from ./base import tick\nexport const l: int64 = 1;\n",
    )
    .unwrap();
    fs::write(
        dir.path().join("right.ln"),
        "from ./base import tick\nexport const r: int64 = 2;\n",
    )
    .unwrap();
    fs::write(
        dir.path().join("main.ln"),
        "from @std/app import start\nfrom ./left import l\nfrom ./right import r\nfrom ./base import tick\non tick fn (n: int64) { }\non start { emit tick 9; }\n",
    )
    .unwrap();

    let (artifact, _) = compile_path(&dir.path().join("main.ln"), "amm").unwrap();
    match artifact {
        Artifact::Text(amm) => {
            // One declaration of the diamond's event, not three.
            assert_eq!(amm.matches("event tick: int64;").count(), 1);
        }
        other => panic!("expected text, got {:?}", other),
    }
}

#[test]
fn missing_modules_are_import_errors() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("main.ln"),
        "from ./nowhere import thing\non _start { }\n",
    )
    .unwrap();
    let err = compile_path(&dir.path().join("main.ln"), "amm").unwrap_err();
    assert_eq!(err.exit_code(), 4);
    assert!(err.to_string().contains("cannot read module"));
}
