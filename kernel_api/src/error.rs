//! Kernel error types

use core_types::CapSel;
use thiserror::Error;

/// Errors that can occur when invoking the kernel
#[derive(Debug, Error, PartialEq, Eq)]
pub enum KernelError {
    /// The target selector already holds an object
    #[error("Selector already in use: {0}")]
    SelectorInUse(CapSel),

    /// No object (or an object of the wrong kind) at the selector
    #[error("Invalid capability: {0}")]
    InvalidCapability(CapSel),

    /// Kernel memory or another kernel resource is exhausted
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    /// The referenced CPU does not exist
    #[error("Invalid CPU: {0}")]
    InvalidCpu(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = KernelError::SelectorInUse(CapSel::new(0x10));
        assert_eq!(err.to_string(), "Selector already in use: sel:0x10");

        let err = KernelError::ResourceExhausted("sc".to_string());
        assert_eq!(err.to_string(), "Resource exhausted: sc");
    }
}
