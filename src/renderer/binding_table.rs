//! Shader Binding Table
//!
//! Maps symbolic shader property names (`"_SourceTex"`, `"_Exposure"`, ...)
//! to compact [`PropertyId`]s. The table is owned by the pipeline and filled
//! once at build time from every pass's declared binding list; afterwards it
//! is sealed and lookups of undeclared names fail with
//! [`PostFxError::MissingBinding`].
//!
//! # Lifecycle
//!
//! ```text
//! PipelineBuilder::build()
//!   ├─ declare_all(pass.bindings())   for every registered pass
//!   ├─ seal()
//!   └─ pass.setup(ctx)                passes resolve ids via `id(name)?`
//! ```
//!
//! Resolution happens once during setup, so a typo in a pass surfaces as a
//! build error instead of a silently unbound parameter at draw time.

use lasso::{Key, Rodeo, Spur};

use crate::errors::{PostFxError, Result};

/// Compact identifier for a shader property, keyword or global constant.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
pub struct PropertyId(u32);

impl PropertyId {
    #[inline]
    #[must_use]
    pub fn index(self) -> u32 {
        self.0
    }

    fn from_spur(spur: Spur) -> Self {
        Self(spur.into_usize() as u32)
    }

    fn to_spur(self) -> Option<Spur> {
        Spur::try_from_usize(self.0 as usize)
    }
}

/// Name → [`PropertyId`] table, built once and validated at startup.
#[derive(Debug, Default)]
pub struct ShaderBindingTable {
    names: Rodeo,
    sealed: bool,
}

impl ShaderBindingTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a single name. Declaring twice returns the same id.
    ///
    /// # Panics
    ///
    /// Panics if the table is already sealed; declarations belong to the
    /// build phase.
    pub fn declare(&mut self, name: &str) -> PropertyId {
        assert!(
            !self.sealed,
            "shader binding '{name}' declared after the table was sealed"
        );
        PropertyId::from_spur(self.names.get_or_intern(name))
    }

    /// Declares every name in `names`.
    pub fn declare_all(&mut self, names: &[&str]) {
        for name in names {
            self.declare(name);
        }
    }

    /// Freezes the table. Subsequent declarations panic.
    pub fn seal(&mut self) {
        self.sealed = true;
    }

    #[inline]
    #[must_use]
    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// Resolves a declared name.
    pub fn id(&self, name: &str) -> Result<PropertyId> {
        self.names
            .get(name)
            .map(PropertyId::from_spur)
            .ok_or_else(|| PostFxError::MissingBinding(name.to_owned()))
    }

    /// Resolves a fixed list of names in order.
    pub fn ids<const N: usize>(&self, names: [&str; N]) -> Result<[PropertyId; N]> {
        let mut out = [PropertyId(0); N];
        for (slot, name) in out.iter_mut().zip(names) {
            *slot = self.id(name)?;
        }
        Ok(out)
    }

    /// Maps an id back to its name (for logging and debug output).
    #[must_use]
    pub fn name(&self, id: PropertyId) -> Option<&str> {
        id.to_spur().and_then(|spur| self.names.try_resolve(&spur))
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
