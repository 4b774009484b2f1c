//! Top-level compilation entry points.
//!
//! Thin wrappers over the [`Pipeline`](crate::pipeline::Pipeline) that the
//! CLI (and tests) drive. Output is written only after the whole chain has
//! succeeded; a failed compile leaves no partial artifact behind.

use std::fs;
use std::path::{Path, PathBuf};

use lnc_base::CompileError;

use crate::pipeline::{Artifact, Pipeline};

/// Compiles in-memory source text between two extensions.
pub fn compile_text(
    name: &str,
    text: &str,
    in_ext: &str,
    out_ext: &str,
) -> lnc_base::Result<Artifact> {
    Pipeline::standard().convert_text(name, text, in_ext, out_ext)
}

/// Compiles a file to the requested extension, returning the artifact and
/// the conventional output path (input path with the new extension).
pub fn compile_path(input: &Path, out_ext: &str) -> lnc_base::Result<(Artifact, PathBuf)> {
    let artifact = Pipeline::standard().convert_file(input, out_ext)?;
    let output = input.with_extension(out_ext);
    Ok((artifact, output))
}

/// Writes an artifact to disk.
pub fn write_artifact(artifact: &Artifact, path: &Path) -> lnc_base::Result<()> {
    let result = match artifact {
        Artifact::Text(text) => fs::write(path, text),
        Artifact::Bytes(bytes) => fs::write(path, bytes),
    };
    result.map_err(|err| CompileError::io(format!("cannot write {}: {}", path.display(), err)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_text_produces_amm() {
        let artifact = compile_text(
            "main.ln",
            "from @std/app import start, print\non start { print('hi'); }\n",
            "ln",
            "amm",
        )
        .unwrap();
        match artifact {
            Artifact::Text(text) => assert!(text.contains("on start fn (): void {")),
            other => panic!("expected text, got {:?}", other),
        }
    }

    #[test]
    fn compile_path_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("prog.ln");
        fs::write(
            &input,
            "from @std/app import start, print\non start { print('hi'); }\n",
        )
        .unwrap();

        let (artifact, output) = compile_path(&input, "agc").unwrap();
        assert_eq!(output, dir.path().join("prog.agc"));
        write_artifact(&artifact, &output).unwrap();

        let bytes = fs::read(&output).unwrap();
        assert_eq!(&bytes[0..8], b"agc00001");
    }

    #[test]
    fn failures_produce_no_artifact() {
        let err = compile_text("main.ln", "on start {", "ln", "agc").unwrap_err();
        assert_eq!(err.exit_code(), 1);
    }
}
