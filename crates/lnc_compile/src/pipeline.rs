//! The stage router: shortest converter chain between two file extensions.
//!
//! Converters form a small directed graph (`ln → amm → aga → agc`). A
//! request names only its endpoints; a breadth-first search picks the
//! minimal chain and composition keeps every intermediate text in memory.

use std::collections::{HashMap, VecDeque};
use std::fs;
use std::path::Path;

use lnc_base::CompileError;
use lnc_parse::ParseArenas;
use lnc_semantic::{load_entry_file, load_entry_text, Resolver};

use crate::aga::emit_aga;
use crate::agc::write_agc;
use crate::amm::emit_amm;

/// The output of one converter stage.
#[derive(Debug, Clone, PartialEq)]
pub enum Artifact {
    Text(String),
    Bytes(Vec<u8>),
}

impl Artifact {
    /// The textual form, required to feed a further stage.
    fn into_text(self) -> lnc_base::Result<String> {
        match self {
            Artifact::Text(text) => Ok(text),
            Artifact::Bytes(_) => Err(CompileError::emission(
                "a binary artifact cannot feed a further pipeline stage".to_string(),
            )),
        }
    }
}

/// One pipeline stage.
pub trait Converter {
    fn in_ext(&self) -> &'static str;
    fn out_ext(&self) -> &'static str;
    fn from_text(&self, name: &str, input: &str) -> lnc_base::Result<Artifact>;

    /// File entry point; the default reads the file and defers to
    /// [`from_text`](Converter::from_text).
    fn from_file(&self, path: &Path) -> lnc_base::Result<Artifact> {
        let text = fs::read_to_string(path)
            .map_err(|err| CompileError::io(format!("cannot read {}: {}", path.display(), err)))?;
        self.from_text(&path.to_string_lossy(), &text)
    }
}

/// `ln → amm`: parse, load imports, resolve, inline, emit.
pub struct LnToAmm;

impl Converter for LnToAmm {
    fn in_ext(&self) -> &'static str {
        "ln"
    }

    fn out_ext(&self) -> &'static str {
        "amm"
    }

    fn from_text(&self, name: &str, input: &str) -> lnc_base::Result<Artifact> {
        let arenas = ParseArenas::new();
        let program = load_entry_text(arenas.ctx(), name, input)?;
        let mut resolver = Resolver::new(program);
        let resolved = resolver.resolve_program()?;
        Ok(Artifact::Text(emit_amm(&resolved, &mut resolver)?))
    }

    // Loading from a file keeps the module directory, so relative imports
    // resolve; the text path cannot offer that.
    fn from_file(&self, path: &Path) -> lnc_base::Result<Artifact> {
        let arenas = ParseArenas::new();
        let program = load_entry_file(arenas.ctx(), path)?;
        let mut resolver = Resolver::new(program);
        let resolved = resolver.resolve_program()?;
        Ok(Artifact::Text(emit_amm(&resolved, &mut resolver)?))
    }
}

/// `amm → aga`: memory layout, closure extraction, dependency graph.
pub struct AmmToAga;

impl Converter for AmmToAga {
    fn in_ext(&self) -> &'static str {
        "amm"
    }

    fn out_ext(&self) -> &'static str {
        "aga"
    }

    fn from_text(&self, _name: &str, input: &str) -> lnc_base::Result<Artifact> {
        Ok(Artifact::Text(emit_aga(input)?))
    }
}

/// `aga → agc`: the packed binary container.
pub struct AgaToAgc;

impl Converter for AgaToAgc {
    fn in_ext(&self) -> &'static str {
        "aga"
    }

    fn out_ext(&self) -> &'static str {
        "agc"
    }

    fn from_text(&self, _name: &str, input: &str) -> lnc_base::Result<Artifact> {
        Ok(Artifact::Bytes(write_agc(input)?))
    }
}

/// The converter registry plus the breadth-first router over it.
pub struct Pipeline {
    converters: Vec<Box<dyn Converter>>,
}

impl Pipeline {
    /// The standard registry: `ln → amm → aga → agc`.
    pub fn standard() -> Self {
        Pipeline {
            converters: vec![Box::new(LnToAmm), Box::new(AmmToAga), Box::new(AgaToAgc)],
        }
    }

    /// Extensions reachable as inputs.
    pub fn known_inputs(&self) -> Vec<&'static str> {
        self.converters.iter().map(|c| c.in_ext()).collect()
    }

    /// The shortest chain of converters between two extensions.
    pub fn route(&self, in_ext: &str, out_ext: &str) -> lnc_base::Result<Vec<&dyn Converter>> {
        if in_ext == out_ext {
            return Err(CompileError::emission(format!(
                "nothing to do: input and output are both .{}",
                in_ext
            )));
        }
        // Breadth-first over extensions; predecessor links rebuild the path.
        let mut predecessor: HashMap<&str, usize> = HashMap::new();
        let mut queue: VecDeque<&str> = VecDeque::new();
        queue.push_back(in_ext);
        let mut seen: Vec<&str> = vec![in_ext];
        while let Some(current) = queue.pop_front() {
            if current == out_ext {
                break;
            }
            for (idx, converter) in self.converters.iter().enumerate() {
                if converter.in_ext() == current && !seen.contains(&converter.out_ext()) {
                    seen.push(converter.out_ext());
                    predecessor.insert(converter.out_ext(), idx);
                    queue.push_back(converter.out_ext());
                }
            }
        }

        let mut chain: Vec<&dyn Converter> = Vec::new();
        let mut current = out_ext;
        while current != in_ext {
            let idx = predecessor.get(current).copied().ok_or_else(|| {
                CompileError::emission(format!(
                    "no conversion path from .{} to .{}",
                    in_ext, out_ext
                ))
            })?;
            let converter = self.converters[idx].as_ref();
            chain.push(converter);
            current = converter.in_ext();
        }
        chain.reverse();
        Ok(chain)
    }

    /// Runs the chain on in-memory text.
    pub fn convert_text(
        &self,
        name: &str,
        input: &str,
        in_ext: &str,
        out_ext: &str,
    ) -> lnc_base::Result<Artifact> {
        let chain = self.route(in_ext, out_ext)?;
        log::debug!(
            "routing {}: {}",
            name,
            chain
                .iter()
                .map(|c| format!("{}→{}", c.in_ext(), c.out_ext()))
                .collect::<Vec<_>>()
                .join(" ")
        );
        let mut stages = chain.into_iter();
        let first = stages.next().expect("route is never empty");
        let mut artifact = first.from_text(name, input)?;
        for stage in stages {
            let text = artifact.into_text()?;
            artifact = stage.from_text(name, &text)?;
        }
        Ok(artifact)
    }

    /// Runs the chain starting from a file on disk.
    pub fn convert_file(&self, path: &Path, out_ext: &str) -> lnc_base::Result<Artifact> {
        let in_ext = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| {
                CompileError::io(format!("{} has no usable extension", path.display()))
            })?
            .to_string();
        let chain = self.route(&in_ext, out_ext)?;
        let mut stages = chain.into_iter();
        let first = stages.next().expect("route is never empty");
        let mut artifact = first.from_file(path)?;
        let name = path.to_string_lossy();
        for stage in stages {
            let text = artifact.into_text()?;
            artifact = stage.from_text(&name, &text)?;
        }
        Ok(artifact)
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routes_ln_to_agc_through_every_stage() {
        let pipeline = Pipeline::standard();
        let chain = pipeline.route("ln", "agc").unwrap();
        let exts: Vec<(&str, &str)> = chain.iter().map(|c| (c.in_ext(), c.out_ext())).collect();
        assert_eq!(exts, vec![("ln", "amm"), ("amm", "aga"), ("aga", "agc")]);
    }

    #[test]
    fn routes_single_stages_directly() {
        let pipeline = Pipeline::standard();
        let chain = pipeline.route("amm", "aga").unwrap();
        assert_eq!(chain.len(), 1);
    }

    #[test]
    fn unreachable_routes_are_rejected() {
        let pipeline = Pipeline::standard();
        assert!(pipeline.route("agc", "ln").is_err());
        assert!(pipeline.route("ln", "js").is_err());
    }

    #[test]
    fn composition_equals_manual_staging() {
        let source = "from @std/app import start, print, exit\non start { print('Hello, World!'); emit exit 0; }\n";
        let pipeline = Pipeline::standard();

        let composed = match pipeline.convert_text("main.ln", source, "ln", "agc").unwrap() {
            Artifact::Bytes(bytes) => bytes,
            other => panic!("expected bytes, got {:?}", other),
        };

        let amm = match LnToAmm.from_text("main.ln", source).unwrap() {
            Artifact::Text(text) => text,
            other => panic!("expected text, got {:?}", other),
        };
        let aga = match AmmToAga.from_text("main.amm", &amm).unwrap() {
            Artifact::Text(text) => text,
            other => panic!("expected text, got {:?}", other),
        };
        let manual = match AgaToAgc.from_text("main.aga", &aga).unwrap() {
            Artifact::Bytes(bytes) => bytes,
            other => panic!("expected bytes, got {:?}", other),
        };

        assert_eq!(composed, manual);
    }
}
