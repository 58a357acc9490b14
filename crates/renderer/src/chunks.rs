//! Shader chunk registry and template composition.
//!
//! Templates pull shared WGSL in with `#include <name>` lines and expose
//! named injection points with `//@inject:<point>` marker lines. The
//! registry is an explicit value handed to material construction; there
//! is no process-wide chunk table.

use std::collections::{BTreeMap, HashMap};

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ShaderError {
    #[error("unknown shader chunk <{0}>")]
    UnknownChunk(String),
    #[error("shader chunk include cycle: {0}")]
    IncludeCycle(String),
    #[error("template has no injection point '{0}'")]
    MissingInjectionPoint(&'static str),
    #[error("unknown injection point '{0}'")]
    UnknownInjectionPoint(String),
}

/// Named locations in a template where extra code may be composed in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum InjectionPoint {
    /// Module scope, before the vertex entry point.
    VertexDeclarations,
    /// Inside the vertex entry point, after `out` is filled.
    VertexBody,
    /// Module scope, before the fragment entry point.
    FragmentDeclarations,
    /// Inside the fragment entry point, after `normal` is initialised.
    FragmentNormal,
    /// Inside the fragment entry point, after the base `color` is set.
    FragmentColor,
}

impl InjectionPoint {
    pub const ALL: [InjectionPoint; 5] = [
        InjectionPoint::VertexDeclarations,
        InjectionPoint::VertexBody,
        InjectionPoint::FragmentDeclarations,
        InjectionPoint::FragmentNormal,
        InjectionPoint::FragmentColor,
    ];

    pub fn name(self) -> &'static str {
        match self {
            InjectionPoint::VertexDeclarations => "vertex_declarations",
            InjectionPoint::VertexBody => "vertex_body",
            InjectionPoint::FragmentDeclarations => "fragment_declarations",
            InjectionPoint::FragmentNormal => "fragment_normal",
            InjectionPoint::FragmentColor => "fragment_color",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.name() == name)
    }
}

const INCLUDE_PREFIX: &str = "#include";
const INJECT_PREFIX: &str = "//@inject:";

/// Named WGSL fragments available to `#include`.
#[derive(Clone, Debug, Default)]
pub struct ShaderChunkRegistry {
    chunks: HashMap<String, String>,
}

impl ShaderChunkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the chunks the built-in templates include.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry
            .register("common", include_str!("shaders/chunks/common.wgsl"))
            .register("lights_pars", include_str!("shaders/chunks/lights_pars.wgsl"))
            .register("layer_pars", include_str!("shaders/chunks/layer_pars.wgsl"))
            .register(
                "normal_fragment_begin",
                include_str!("shaders/chunks/normal_fragment_begin.wgsl"),
            )
            .register("tonemap", include_str!("shaders/chunks/tonemap.wgsl"))
            .register("fullscreen", include_str!("shaders/chunks/fullscreen.wgsl"));
        registry
    }

    /// Add or replace a chunk.
    pub fn register(&mut self, name: impl Into<String>, source: impl Into<String>) -> &mut Self {
        self.chunks.insert(name.into(), source.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.chunks.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.chunks.contains_key(name)
    }

    /// Expand `#include <name>` lines recursively.
    pub fn resolve_includes(&self, source: &str) -> Result<String, ShaderError> {
        let mut out = String::with_capacity(source.len());
        let mut stack = Vec::new();
        self.expand_into(source, &mut stack, &mut out)?;
        Ok(out)
    }

    fn expand_into<'a>(
        &'a self,
        source: &'a str,
        stack: &mut Vec<&'a str>,
        out: &mut String,
    ) -> Result<(), ShaderError> {
        for line in source.lines() {
            let Some(name) = parse_include(line) else {
                out.push_str(line);
                out.push('\n');
                continue;
            };
            if stack.contains(&name) {
                let mut chain: Vec<&str> = stack.clone();
                chain.push(name);
                return Err(ShaderError::IncludeCycle(chain.join(" -> ")));
            }
            let chunk = self
                .get(name)
                .ok_or_else(|| ShaderError::UnknownChunk(name.to_owned()))?;
            stack.push(name);
            self.expand_into(chunk, stack, out)?;
            stack.pop();
        }
        Ok(())
    }
}

fn parse_include(line: &str) -> Option<&str> {
    let rest = line.trim().strip_prefix(INCLUDE_PREFIX)?;
    rest.trim()
        .strip_prefix('<')?
        .strip_suffix('>')
        .map(str::trim)
}

/// Composes a template: includes first, then injection points.
pub struct ShaderComposer<'r> {
    registry: &'r ShaderChunkRegistry,
    injections: BTreeMap<InjectionPoint, Vec<String>>,
}

impl<'r> ShaderComposer<'r> {
    pub fn new(registry: &'r ShaderChunkRegistry) -> Self {
        Self {
            registry,
            injections: BTreeMap::new(),
        }
    }

    /// Append code at `point`. Repeated calls keep insertion order.
    pub fn inject(&mut self, point: InjectionPoint, code: impl Into<String>) -> &mut Self {
        self.injections.entry(point).or_default().push(code.into());
        self
    }

    pub fn compose(&self, template: &str) -> Result<String, ShaderError> {
        let expanded = self.registry.resolve_includes(template)?;
        let mut out = String::with_capacity(expanded.len());
        let mut used: Vec<InjectionPoint> = Vec::new();

        for line in expanded.lines() {
            let trimmed = line.trim_start();
            let Some(name) = trimmed.strip_prefix(INJECT_PREFIX) else {
                out.push_str(line);
                out.push('\n');
                continue;
            };
            let name = name.trim();
            let point = InjectionPoint::from_name(name)
                .ok_or_else(|| ShaderError::UnknownInjectionPoint(name.to_owned()))?;
            used.push(point);

            let indent = &line[..line.len() - trimmed.len()];
            for code in self.injections.get(&point).into_iter().flatten() {
                for code_line in code.lines() {
                    if !code_line.trim().is_empty() {
                        out.push_str(indent);
                    }
                    out.push_str(code_line);
                    out.push('\n');
                }
            }
        }

        if let Some(point) = self
            .injections
            .iter()
            .filter(|(_, code)| !code.is_empty())
            .map(|(p, _)| *p)
            .find(|p| !used.contains(p))
        {
            return Err(ShaderError::MissingInjectionPoint(point.name()));
        }

        Ok(out)
    }
}
