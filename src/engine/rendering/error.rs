use crate::engine::rendering::backend::ShaderStage;
use snafu::Snafu;

pub type Result<T, E = RenderError> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(context(suffix(Err)), visibility(pub))]
pub enum BackendError {
    #[snafu(display("Failed to compile {stage:?} shader: {log}"))]
    ShaderCompile { stage: ShaderStage, log: String },

    #[snafu(display("Failed to link program: {log}"))]
    ProgramLink { log: String },

    #[snafu(display("The graphics API could not allocate a {resource}: {reason}"))]
    Allocation {
        resource: &'static str,
        reason: String,
    },
}

#[derive(Debug, Snafu)]
#[snafu(context(suffix(Err)), visibility(pub(crate)))]
pub enum RenderError {
    #[snafu(display("Material does not have a name"))]
    MissingMaterialName,

    #[snafu(display("Material \"{material}\" does not have a vertex source"))]
    MissingVertexSource { material: String },

    #[snafu(display("Material \"{material}\" does not have a fragment source"))]
    MissingFragmentSource { material: String },

    #[snafu(display("Multiview rendering is not supported (requested for material \"{material}\")"))]
    MultiviewUnsupported { material: String },

    #[snafu(display("Texture does not have a valid key"))]
    MissingTextureKey,

    #[snafu(display("Texture key \"{key}\" is already used by a different texture"))]
    TextureKeyCollision { key: String },

    #[snafu(display("Render primitive does not have a material"))]
    MissingMaterial,

    #[snafu(display("Render primitive does not exist anymore"))]
    UnknownPrimitive,

    #[snafu(display("Render material does not exist anymore"))]
    UnknownMaterial,

    #[snafu(display("Failed to build program for material \"{material}\": {source}"))]
    ProgramBuild {
        material: String,
        source: BackendError,
    },

    #[snafu(display("Graphics API error: {source}"))]
    Backend { source: BackendError },
}
