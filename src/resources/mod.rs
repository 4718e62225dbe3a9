//! CPU-side resource definitions
//!
//! Plain data exchanged with the external collaborators. Nothing in here
//! touches the GPU:
//! - [`handle`]: stable index handles into the engine's stores
//! - [`mesh`]: parsed geometry and the model parser contract
//! - [`material`]: parsed and stored materials
//! - [`image`]: decoded pixels and the image decoder contract
//! - [`primitives`]: procedural shapes

pub mod handle;
pub mod image;
pub mod material;
pub mod mesh;
pub mod primitives;

pub use handle::{
    EntityHandle, LightHandle, MaterialHandle, MeshHandle, ModelHandle, ProgramHandle,
    TextureHandle,
};
pub use image::{FileImageDecoder, Image, ImageDecoder};
pub use material::{Material, MaterialData, TextureSlot};
pub use mesh::{MeshData, ModelParser, ParsedModel, SubmeshData, VertexAttribute, VertexLayout};
pub use primitives::{Primitive, PrimitiveParser};
