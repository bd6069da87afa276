pub(crate) mod bindings;
pub(crate) mod defaults;
pub(crate) mod frame;
pub(crate) mod precompute;
pub(crate) mod variants;
