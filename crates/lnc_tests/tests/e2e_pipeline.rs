//! E2E: pipeline routing and stage composition.

mod common;

use lnc_compile::{compile_text, Artifact, Pipeline};

const SOURCE: &str = "\
from @std/app import start, print, exit
on start { print('Hello, World!'); emit exit 0; }
";

#[test]
fn ln_to_agc_composes_the_three_stages() {
    let composed = match compile_text("main.ln", SOURCE, "ln", "agc").unwrap() {
        Artifact::Bytes(bytes) => bytes,
        other => panic!("expected bytes, got {:?}", other),
    };

    let amm = match compile_text("main.ln", SOURCE, "ln", "amm").unwrap() {
        Artifact::Text(text) => text,
        other => panic!("expected text, got {:?}", other),
    };
    let aga = match compile_text("main.amm", &amm, "amm", "aga").unwrap() {
        Artifact::Text(text) => text,
        other => panic!("expected text, got {:?}", other),
    };
    let manual = match compile_text("main.aga", &aga, "aga", "agc").unwrap() {
        Artifact::Bytes(bytes) => bytes,
        other => panic!("expected bytes, got {:?}", other),
    };

    assert_eq!(composed, manual);
}

#[test]
fn intermediate_stages_are_directly_reachable() {
    assert!(matches!(
        compile_text("main.ln", SOURCE, "ln", "aga").unwrap(),
        Artifact::Text(_)
    ));
}

#[test]
fn hand_written_aga_assembles() {
    let aga = "\
agav1

customEvents
  ping: 0

handler for ping with size 8
  @0 = seti64(7) #0
";
    let bytes = match compile_text("hand.aga", aga, "aga", "agc").unwrap() {
        Artifact::Bytes(bytes) => bytes,
        other => panic!("expected bytes, got {:?}", other),
    };
    assert_eq!(&bytes[0..8], b"agc00001");
}

#[test]
fn unknown_routes_are_rejected() {
    assert!(compile_text("main.ln", SOURCE, "ln", "js").is_err());
    assert!(compile_text("main.agc", "x", "agc", "ln").is_err());
    assert!(Pipeline::standard().route("amm", "amm").is_err());
}
