//! Stable index handles
//!
//! Every store in the engine is append-only (or tombstoned), so a handle is a
//! plain `u32` index that stays valid for the lifetime of its store. Handles
//! are `Copy` and carry no ownership.

macro_rules! define_handle {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub(crate) u32);

        impl $name {
            /// Kind name used in diagnostics.
            pub const KIND: &'static str = $kind;

            #[inline]
            #[must_use]
            pub const fn index(self) -> usize {
                self.0 as usize
            }

            #[inline]
            #[must_use]
            pub const fn raw(self) -> u32 {
                self.0
            }

            #[inline]
            pub(crate) fn from_index(index: usize) -> Self {
                Self(index as u32)
            }

            #[inline]
            pub(crate) fn invalid(self) -> crate::errors::StrataError {
                crate::errors::StrataError::InvalidHandle {
                    kind: Self::KIND,
                    index: self.0,
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}#{}", $kind, self.0)
            }
        }
    };
}

define_handle!(
    /// Index into the texture store.
    TextureHandle, "texture"
);
define_handle!(
    /// Index into the mesh table of the geometry store.
    MeshHandle, "mesh"
);
define_handle!(
    /// Index into the model table of the geometry store.
    ModelHandle, "model"
);
define_handle!(
    /// Index into the material table of the geometry store.
    MaterialHandle, "material"
);
define_handle!(
    /// Index into the program registry.
    ProgramHandle, "program"
);
define_handle!(
    /// Index into the scene's entity list.
    EntityHandle, "entity"
);
define_handle!(
    /// Index into the scene's light list.
    LightHandle, "light"
);
