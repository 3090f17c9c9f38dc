mod program;
mod texture;

pub use self::program::*;
pub use self::texture::*;
