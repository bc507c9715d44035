use crate::graph_error::SparseGraphError;

/// Trait for validating data structure invariants.
pub trait DebugInvariants {
    /// Assert invariants in debug builds.
    fn debug_assert_invariants(&self) {
        #[cfg(debug_assertions)]
        if let Err(e) = self.validate_invariants() {
            panic!("[invariants] {}", e);
        }
    }
    /// Validate invariants and return the first error encountered.
    fn validate_invariants(&self) -> Result<(), SparseGraphError>;
}

/// Helper macro to run a fallible check and panic on error when invariant
/// checking is enabled.
#[macro_export]
macro_rules! debug_invariants {
    ($expr:expr, $($ctx:tt)*) => {
        #[cfg(debug_assertions)]
        if let Err(e) = $expr {
            panic!(concat!("[invariants] ", $($ctx)*, ": {}"), e);
        }
    };
}
