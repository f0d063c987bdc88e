//! Capability flags
//!
//! Per-backend declaration of which structural features it honors.
//! Flags are fixed for the lifetime of a backend instance.

/// Structural features a backend supports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Capabilities {
    /// `section.key` paths are stored under a named section
    pub sections: bool,

    /// Sections can nest (`a.b.key` lives in section `b` inside `a`)
    pub subsections: bool,

    /// Arrays are stored natively rather than flattened to text
    pub arrays: bool,
}

impl Capabilities {
    /// Sections only; arrays flattened to delimited text
    pub const HIERARCHICAL: Capabilities = Capabilities {
        sections: true,
        subsections: false,
        arrays: false,
    };

    /// Flat keyspace with native arrays
    pub const FLAT: Capabilities = Capabilities {
        sections: false,
        subsections: false,
        arrays: true,
    };

    pub fn supports_sections(&self) -> bool {
        self.sections
    }

    pub fn supports_subsections(&self) -> bool {
        self.subsections
    }

    pub fn supports_arrays(&self) -> bool {
        self.arrays
    }
}
