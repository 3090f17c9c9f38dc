//! Program source assembly.
//!
//! Materials only provide `vertex_main` and `fragment_main`. The entry points
//! and the uniforms the renderer feeds every frame are appended here.

use crate::engine::assets::{AttributeSemantic, ProgramDefines};
use const_format::concatcp;
use std::fmt::Write;

pub const PROJECTION_MATRIX: &str = "PROJECTION_MATRIX";
pub const VIEW_MATRIX: &str = "VIEW_MATRIX";
pub const MODEL_MATRIX: &str = "MODEL_MATRIX";
pub const CAMERA_POSITION: &str = "CAMERA_POSITION";
pub const EYE_INDEX: &str = "EYE_INDEX";
pub const LIGHT_DIRECTION1: &str = "LIGHT_DIRECTION1";
pub const LIGHT_DIRECTION2: &str = "LIGHT_DIRECTION2";
pub const LIGHT_COLOR: &str = "LIGHT_COLOR";

pub const VERTEX_SHADER_SINGLE_ENTRY: &str = concatcp!(
    "\nuniform mat4 ",
    PROJECTION_MATRIX,
    ", ",
    VIEW_MATRIX,
    ", ",
    MODEL_MATRIX,
    ";\n\nvoid main() {\n  gl_Position = vertex_main(",
    PROJECTION_MATRIX,
    ", ",
    VIEW_MATRIX,
    ", ",
    MODEL_MATRIX,
    ");\n}\n"
);

pub const FRAGMENT_SHADER_ENTRY: &str = "\nvoid main() {\n  gl_FragColor = fragment_main();\n}\n";

/// Attribute locations bound before linking, shared by every program.
pub const ATTRIBUTE_BINDINGS: [(u32, &str); 6] = [
    (AttributeSemantic::Position.location(), AttributeSemantic::Position.name()),
    (AttributeSemantic::Normal.location(), AttributeSemantic::Normal.name()),
    (AttributeSemantic::Tangent.location(), AttributeSemantic::Tangent.name()),
    (AttributeSemantic::TexCoord0.location(), AttributeSemantic::TexCoord0.name()),
    (AttributeSemantic::TexCoord1.location(), AttributeSemantic::TexCoord1.name()),
    (AttributeSemantic::Color0.location(), AttributeSemantic::Color0.name()),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloatPrecision {
    Medium,
    High,
}

impl FloatPrecision {
    pub const fn qualifier(self) -> &'static str {
        match self {
            FloatPrecision::Medium => "mediump",
            FloatPrecision::High => "highp",
        }
    }
}

/// Whether `source` declares `precision (lowp|mediump|highp) float;` anywhere.
pub fn has_float_precision(source: &str) -> bool {
    source.match_indices("precision ").any(|(at, matched)| {
        let rest = &source[at + matched.len()..];
        ["lowp", "mediump", "highp"]
            .iter()
            .filter_map(|q| rest.strip_prefix(q))
            .any(|rest| rest.starts_with(" float;"))
    })
}

fn define_block(defines: &ProgramDefines) -> String {
    let mut block = String::new();
    for (name, value) in defines {
        // writing into a String cannot fail
        let _ = writeln!(block, "#define {name} {value}");
    }
    block
}

/// Places `header` after a leading `#version` line, or at the very start.
fn insert_header(source: &str, header: &str) -> String {
    if header.is_empty() {
        return source.to_string();
    }

    let trimmed = source.trim_start();
    if trimmed.starts_with("#version") {
        let offset = source.len() - trimmed.len();
        let line_end = trimmed.find('\n').map_or(source.len(), |i| offset + i + 1);
        let (version, body) = source.split_at(line_end);
        let separator = if version.ends_with('\n') { "" } else { "\n" };
        return format!("{version}{separator}{header}{body}");
    }

    format!("{header}{source}")
}

pub fn compose_vertex_source(source: &str, defines: &ProgramDefines) -> String {
    let mut full = insert_header(source, &define_block(defines));
    full.push_str(VERTEX_SHADER_SINGLE_ENTRY);
    full
}

pub fn compose_fragment_source(
    source: &str,
    defines: &ProgramDefines,
    precision: FloatPrecision,
) -> String {
    let mut header = String::new();
    if !has_float_precision(source) {
        header = format!("precision {} float;\n", precision.qualifier());
    }
    header.push_str(&define_block(defines));

    let mut full = insert_header(source, &header);
    full.push_str(FRAGMENT_SHADER_ENTRY);
    full
}
