//! WGSL program front-end.
//!
//! "Compiling" a stage parses and validates it with naga; "linking" checks
//! that both stages expose the expected entry points and that every
//! fragment input location is written by the vertex stage. Both contexts
//! consume the [`LinkedProgram`] produced here, so a program that links in
//! tests links on the GPU too.
//!
//! Binding convention (bind group 0):
//! - binding 0: uniform block of the program
//! - binding `1 + 2u` / `2 + 2u`: texture / sampler of texture unit `u`

use std::collections::BTreeSet;

use naga::valid::{Capabilities, ValidationFlags, Validator};

use crate::error::{RenderError, Result, ShaderStage};

pub const VERTEX_ENTRY: &str = "vs_main";
pub const FRAGMENT_ENTRY: &str = "fs_main";

pub const UNIFORM_BINDING: u32 = 0;

#[inline]
pub const fn texture_binding(unit: usize) -> u32 {
    1 + 2 * unit as u32
}

#[inline]
pub const fn sampler_binding(unit: usize) -> u32 {
    2 + 2 * unit as u32
}

/// A parsed and validated shader stage.
#[derive(Debug)]
pub struct CompiledShader {
    pub stage: ShaderStage,
    pub source: String,
    pub module: naga::Module,
}

/// Resources a linked program reads, by the binding convention above.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgramInterface {
    pub uniforms: bool,
    /// Sorted, de-duplicated.
    pub texture_units: Vec<usize>,
}

#[derive(Debug)]
pub struct LinkedProgram {
    pub vertex: CompiledShader,
    pub fragment: CompiledShader,
    pub interface: ProgramInterface,
}

pub fn compile(stage: ShaderStage, source: &str) -> Result<CompiledShader> {
    let module = naga::front::wgsl::parse_str(source).map_err(|e| RenderError::ShaderCompile {
        stage,
        line: e.location(source).map(|l| l.line_number),
        log: e.emit_to_string(source),
    })?;

    Validator::new(ValidationFlags::all(), Capabilities::all())
        .validate(&module)
        .map_err(|e| RenderError::ShaderCompile {
            stage,
            line: e.location(source).map(|l| l.line_number),
            log: e.emit_to_string(source),
        })?;

    Ok(CompiledShader { stage, source: source.to_owned(), module })
}

pub fn link(vertex: CompiledShader, fragment: CompiledShader) -> Result<LinkedProgram> {
    if vertex.stage != ShaderStage::Vertex || fragment.stage != ShaderStage::Fragment {
        return Err(RenderError::ProgramLink(format!(
            "expected a Vertex and a Fragment stage, got {} and {}",
            vertex.stage, fragment.stage
        )));
    }

    let vs = entry_point(&vertex.module, naga::ShaderStage::Vertex, VERTEX_ENTRY)?;
    let fs = entry_point(&fragment.module, naga::ShaderStage::Fragment, FRAGMENT_ENTRY)?;

    let mut written = BTreeSet::new();
    if let Some(result) = &vs.function.result {
        collect_locations(&vertex.module, result.ty, result.binding.as_ref(), &mut written);
    }

    let mut read = BTreeSet::new();
    for arg in &fs.function.arguments {
        collect_locations(&fragment.module, arg.ty, arg.binding.as_ref(), &mut read);
    }

    let missing: Vec<String> = read.difference(&written).map(|l| l.to_string()).collect();
    if !missing.is_empty() {
        return Err(RenderError::ProgramLink(format!(
            "fragment input location(s) {} not written by the vertex stage",
            missing.join(", ")
        )));
    }

    let mut interface = ProgramInterface::default();
    let mut units = BTreeSet::new();
    for module in [&vertex.module, &fragment.module] {
        reflect_bindings(module, &mut interface.uniforms, &mut units);
    }
    interface.texture_units = units.into_iter().collect();

    Ok(LinkedProgram { vertex, fragment, interface })
}

fn entry_point<'m>(
    module: &'m naga::Module,
    stage: naga::ShaderStage,
    name: &str,
) -> Result<&'m naga::EntryPoint> {
    module
        .entry_points
        .iter()
        .find(|ep| ep.stage == stage && ep.name == name)
        .ok_or_else(|| RenderError::ProgramLink(format!("missing {stage:?} entry point `{name}`")))
}

fn collect_locations(
    module: &naga::Module,
    ty: naga::Handle<naga::Type>,
    binding: Option<&naga::Binding>,
    out: &mut BTreeSet<u32>,
) {
    match binding {
        Some(naga::Binding::Location { location, .. }) => {
            out.insert(*location);
        }
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

fn reflect_bindings(module: &naga::Module, uniforms: &mut bool, units: &mut BTreeSet<usize>) {
    for (_, var) in module.global_variables.iter() {
        let Some(binding) = &var.binding else { continue };
        if binding.group != 0 {
            continue;
        }

        if matches!(var.space, naga::AddressSpace::Uniform) && binding.binding == UNIFORM_BINDING {
            *uniforms = true;
        } else if binding.binding > UNIFORM_BINDING
            && matches!(module.types[var.ty].inner, naga::TypeInner::Image { .. })
        {
            units.insert(((binding.binding - 1) / 2) as usize);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VS: &str = r#"
struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@vertex
fn vs_main(@location(0) position: vec2<f32>) -> VertexOutput {
    var result: VertexOutput;
    result.clip_position = vec4<f32>(position, 0.0, 1.0);
    result.uv = position;
    return result;
}
"#;

    const FS: &str = r#"
@group(0) @binding(1) var t_main: texture_2d<f32>;
@group(0) @binding(2) var s_main: sampler;

@fragment
fn fs_main(@location(0) uv: vec2<f32>) -> @location(0) vec4<f32> {
    return textureSample(t_main, s_main, uv);
}
"#;

    #[test]
    fn compiles_and_links_matching_stages() {
        let vs = compile(ShaderStage::Vertex, VS).unwrap();
        let fs = compile(ShaderStage::Fragment, FS).unwrap();
        let program = link(vs, fs).unwrap();
        assert!(!program.interface.uniforms);
        assert_eq!(program.interface.texture_units, vec![0]);
    }

    #[test]
    fn syntax_error_reports_stage_and_line() {
        let src = "@vertex\nfn vs_main() -> @builtin(position) vec4<f32> {\n    return vec4<f32>(0.0, 0.0, 0.0 1.0);\n}\n";
        let err = compile(ShaderStage::Vertex, src).unwrap_err();
        match err {
            RenderError::ShaderCompile { stage, line, ref log } => {
                assert_eq!(stage, ShaderStage::Vertex);
                assert_eq!(line, Some(3));
                assert!(!log.is_empty());
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.to_string().starts_with("Failed to compile Vertex Shader:"));
    }

    #[test]
    fn link_rejects_unwritten_fragment_input() {
        let fs_src = r#"
@fragment
fn fs_main(@location(3) tint: vec4<f32>) -> @location(0) vec4<f32> {
    return tint;
}
"#;
        let vs = compile(ShaderStage::Vertex, VS).unwrap();
        let fs = compile(ShaderStage::Fragment, fs_src).unwrap();
        let err = link(vs, fs).unwrap_err();
        assert!(err.to_string().starts_with("Failed to link program:"));
        assert!(err.to_string().contains('3'));
    }

    #[test]
    fn link_requires_named_entry_points() {
        let fs_src = FS.replace("fs_main", "main");
        let vs = compile(ShaderStage::Vertex, VS).unwrap();
        let fs = compile(ShaderStage::Fragment, &fs_src).unwrap();
        assert!(matches!(link(vs, fs), Err(RenderError::ProgramLink(_))));
    }
}
