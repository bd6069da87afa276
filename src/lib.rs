//! Physically-based glTF scene rendering on wgpu.
//!
//! The renderer owns a fixed table of compiled pipeline variants keyed by
//! (alpha mode, double-sided), a placeholder texture set, optional
//! image-based-lighting precompute resources and the per-frame constant
//! arenas. Scene data (models, meshes, materials) and the camera/light
//! constant buffers are supplied by the caller; see [`scene`] for the
//! collaborator contracts.

pub mod config;
pub mod renderer;
pub mod scene;

pub use config::{RendererConfig, ToneMappingMode};
pub use renderer::{
    AlphaModeFlags, BindingSource, CacheBindings, DebugView, MaterialBinding, ModelBindings,
    PbrRenderer, PipelineKey, RenderParams,
};
