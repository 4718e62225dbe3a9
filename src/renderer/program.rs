//! Program Registry
//!
//! Loads a shader *variant* out of a combined WGSL template, validates both
//! stages with `naga`, checks that they link, and reflects the vertex
//! stage's `@location` inputs.
//!
//! # Variants
//!
//! One template file holds several logical programs. Each stage is rendered
//! separately with `minijinja`; the variant name and the stage name are
//! injected as boolean template variables:
//!
//! ```wgsl
//! {$ if VERTEX $}
//! @vertex
//! fn vs_main(in: VertexInput) -> VertexOutput { ... }
//! {$ endif $}
//! {$ if GEOMETRY_PASS $}
//! ...
//! {$ endif $}
//! ```
//!
//! # Failure policy
//!
//! | Failure                    | Result                                         |
//! |----------------------------|------------------------------------------------|
//! | template/parse/validation  | `Err(Compile)` from `load_program`             |
//! | entry points or interface  | handle returned, `Err(Link)` on first use      |

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use minijinja::{Environment, syntax::SyntaxConfig};

use crate::errors::{Result, ShaderStage, StrataError};
use crate::renderer::backend::{GpuBackend, ProgramDesc, ProgramId};
use crate::renderer::shader_source::ShaderSourceLoader;
use crate::resources::handle::ProgramHandle;

pub const VERTEX_ENTRY: &str = "vs_main";
pub const FRAGMENT_ENTRY: &str = "fs_main";

/// One reflected shader input: location and `f32` component count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderAttribute {
    pub location: u32,
    pub components: u8,
}

/// A validated stage.
#[derive(Debug, Clone)]
pub struct StageSource {
    pub source: String,
    pub module: naga::Module,
}

/// Both stages of a program plus what reflection found.
#[derive(Debug, Clone)]
pub struct CompiledProgram {
    pub name: String,
    pub vertex: StageSource,
    pub fragment: StageSource,
    /// Vertex inputs sorted by location.
    pub inputs: Vec<ShaderAttribute>,
    /// Fragment output locations.
    pub fragment_outputs: Vec<u32>,
}

/// A loaded program.
#[derive(Debug, Clone)]
pub struct Program {
    pub name: String,
    pub source_path: PathBuf,
    /// Zero when linking failed.
    pub id: ProgramId,
    pub inputs: Vec<ShaderAttribute>,
    pub last_write_timestamp: Option<SystemTime>,
    link_error: Option<String>,
}

impl Program {
    /// Backend id, or the deferred link error.
    pub fn linked_id(&self) -> Result<ProgramId> {
        match &self.link_error {
            None => Ok(self.id),
            Some(message) => Err(StrataError::Link {
                program: self.name.clone(),
                message: message.clone(),
            }),
        }
    }

    #[must_use]
    pub fn is_linked(&self) -> bool {
        self.link_error.is_none()
    }

    #[must_use]
    pub fn input(&self, location: u32) -> Option<&ShaderAttribute> {
        self.inputs.iter().find(|a| a.location == location)
    }
}

pub struct ProgramRegistry {
    env: Environment<'static>,
    programs: Vec<Program>,
}

impl std::fmt::Debug for ProgramRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgramRegistry")
            .field("programs", &self.programs)
            .finish_non_exhaustive()
    }
}

impl ProgramRegistry {
    pub fn new() -> Result<Self> {
        let mut env = Environment::new();
        let syntax = SyntaxConfig::builder()
            .block_delimiters("{$", "$}")
            .variable_delimiters("{{", "}}")
            .line_statement_prefix("$$")
            .build()?;
        env.set_syntax(syntax);
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);
        env.set_undefined_behavior(minijinja::UndefinedBehavior::SemiStrict);

        Ok(Self {
            env,
            programs: Vec::new(),
        })
    }

    pub fn load_program(
        &mut self,
        backend: &mut dyn GpuBackend,
        loader: &dyn ShaderSourceLoader,
        path: impl AsRef<Path>,
        variant: &str,
    ) -> Result<ProgramHandle> {
        let program = self.build(backend, loader, path.as_ref(), variant)?;
        let handle = ProgramHandle::from_index(self.programs.len());
        self.programs.push(program);
        Ok(handle)
    }

    pub fn get(&self, handle: ProgramHandle) -> Result<&Program> {
        self.programs
            .get(handle.index())
            .ok_or_else(|| handle.invalid())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.programs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }

    /// Programs whose source changed since they were built.
    pub fn modified_programs(&self, loader: &dyn ShaderSourceLoader) -> Vec<ProgramHandle> {
        self.programs
            .iter()
            .enumerate()
            .filter(|(_, p)| {
                loader
                    .last_modified(&p.source_path)
                    .is_some_and(|t| p.last_write_timestamp.is_none_or(|old| t > old))
            })
            .map(|(i, _)| ProgramHandle::from_index(i))
            .collect()
    }

    /// Rebuilds one program in place. On failure the old program stays.
    pub fn reload(
        &mut self,
        backend: &mut dyn GpuBackend,
        loader: &dyn ShaderSourceLoader,
        handle: ProgramHandle,
    ) -> Result<()> {
        let (path, name) = {
            let old = self.get(handle)?;
            (old.source_path.clone(), old.name.clone())
        };
        let program = self.build(backend, loader, &path, &name)?;
        log::info!("Reloaded program '{}' from {}", name, path.display());
        self.programs[handle.index()] = program;
        Ok(())
    }

    fn build(
        &self,
        backend: &mut dyn GpuBackend,
        loader: &dyn ShaderSourceLoader,
        path: &Path,
        variant: &str,
    ) -> Result<Program> {
        let template = loader.read_source(path)?;
        let timestamp = loader.last_modified(path);

        let vertex = self.compile_stage(&template, variant, ShaderStage::Vertex)?;
        let fragment = self.compile_stage(&template, variant, ShaderStage::Fragment)?;

        let (inputs, fragment_outputs, link) = link_stages(&vertex.module, &fragment.module);
        let compiled = CompiledProgram {
            name: variant.to_owned(),
            vertex,
            fragment,
            inputs,
            fragment_outputs,
        };

        let (id, link_error) = match link {
            Ok(()) => {
                let id = backend.create_program(&ProgramDesc {
                    label: variant,
                    program: &compiled,
                })?;
                log::info!(
                    "Loaded program '{}' from {} ({} vertex inputs)",
                    variant,
                    path.display(),
                    compiled.inputs.len()
                );
                (id, None)
            }
            Err(message) => {
                log::error!("Failed to link program '{variant}': {message}");
                (ProgramId(0), Some(message))
            }
        };

        Ok(Program {
            name: compiled.name,
            source_path: path.to_path_buf(),
            id,
            inputs: compiled.inputs,
            last_write_timestamp: timestamp,
            link_error,
        })
    }

    fn compile_stage(&self, template: &str, variant: &str, stage: ShaderStage) -> Result<StageSource> {
        let compile_error = |message: String| {
            log::error!("Failed to compile {stage} stage of '{variant}': {message}");
            StrataError::Compile {
                program: variant.to_owned(),
                stage,
                message,
            }
        };

        let defines = BTreeMap::from([
            (variant.to_owned(), true),
            (ShaderStage::Vertex.define().to_owned(), stage == ShaderStage::Vertex),
            (ShaderStage::Fragment.define().to_owned(), stage == ShaderStage::Fragment),
        ]);
        let body = self
            .env
            .render_str(template, defines)
            .map_err(|e| compile_error(e.to_string()))?;
        let source = format!("// program: {variant}, stage: {stage}\n{body}");

        let module = naga::front::wgsl::parse_str(&source)
            .map_err(|e| compile_error(e.emit_to_string(&source)))?;
        naga::valid::Validator::new(
            naga::valid::ValidationFlags::all(),
            naga::valid::Capabilities::all(),
        )
        .validate(&module)
        .map_err(|e| compile_error(e.to_string()))?;

        Ok(StageSource { source, module })
    }
}

// ============================================================================
// Reflection
// ============================================================================

fn entry_point<'a>(
    module: &'a naga::Module,
    stage: naga::ShaderStage,
    name: &str,
) -> Option<&'a naga::EntryPoint> {
    module
        .entry_points
        .iter()
        .find(|ep| ep.stage == stage && ep.name == name)
}

/// Checks both entry points exist and every fragment input is fed by a
/// vertex output of the same width. Returns vertex inputs and fragment
/// output locations alongside the verdict.
fn link_stages(
    vertex: &naga::Module,
    fragment: &naga::Module,
) -> (Vec<ShaderAttribute>, Vec<u32>, std::result::Result<(), String>) {
    let vs = entry_point(vertex, naga::ShaderStage::Vertex, VERTEX_ENTRY);
    let fs = entry_point(fragment, naga::ShaderStage::Fragment, FRAGMENT_ENTRY);

    let inputs = vs.map(|ep| entry_inputs(vertex, ep)).unwrap_or_default();
    let outputs = fs
        .map(|ep| entry_outputs(fragment, ep).iter().map(|a| a.location).collect())
        .unwrap_or_default();

    let (Some(vs), Some(fs)) = (vs, fs) else {
        let missing = if vs.is_none() { VERTEX_ENTRY } else { FRAGMENT_ENTRY };
        return (inputs, outputs, Err(format!("entry point `{missing}` not found")));
    };

    let varyings = entry_outputs(vertex, vs);
    for wanted in entry_inputs(fragment, fs) {
        match varyings.iter().find(|v| v.location == wanted.location) {
            Some(v) if v.components == wanted.components => {}
            Some(v) => {
                return (
                    inputs,
                    outputs,
                    Err(format!(
                        "location {} is {} components in the vertex stage but {} in the fragment stage",
                        wanted.location, v.components, wanted.components
                    )),
                );
            }
            None => {
                return (
                    inputs,
                    outputs,
                    Err(format!(
                        "fragment input at location {} is not written by the vertex stage",
                        wanted.location
                    )),
                );
            }
        }
    }

    (inputs, outputs, Ok(()))
}

fn entry_inputs(module: &naga::Module, ep: &naga::EntryPoint) -> Vec<ShaderAttribute> {
    let mut out = Vec::new();
    for arg in &ep.function.arguments {
        collect_locations(module, arg.ty, arg.binding.as_ref(), &mut out);
    }
    out.sort_by_key(|a| a.location);
    out
}

fn entry_outputs(module: &naga::Module, ep: &naga::EntryPoint) -> Vec<ShaderAttribute> {
    let mut out = Vec::new();
    if let Some(result) = &ep.function.result {
        collect_locations(module, result.ty, result.binding.as_ref(), &mut out);
    }
    out.sort_by_key(|a| a.location);
    out
}

fn collect_locations(
    module: &naga::Module,
    ty: naga::Handle<naga::Type>,
    binding: Option<&naga::Binding>,
    out: &mut Vec<ShaderAttribute>,
) {
    match binding {
        Some(naga::Binding::Location { location, .. }) => out.push(ShaderAttribute {
            location: *location,
            components: component_count(&module.types[ty].inner),
        }),
        Some(_) => {}
        None => {
            if let naga::TypeInner::Struct { members, .. } = &module.types[ty].inner {
                for member in members {
                    collect_locations(module, member.ty, member.binding.as_ref(), out);
                }
            }
        }
    }
}

fn component_count(inner: &naga::TypeInner) -> u8 {
    let width = |size: naga::VectorSize| match size {
        naga::VectorSize::Bi => 2,
        naga::VectorSize::Tri => 3,
        naga::VectorSize::Quad => 4,
    };
    match inner {
        naga::TypeInner::Scalar(_) => 1,
        naga::TypeInner::Vector { size, .. } => width(*size),
        naga::TypeInner::Matrix { columns, rows, .. } => width(*columns) * width(*rows),
        _ => 0,
    }
}
