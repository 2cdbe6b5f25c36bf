//! Manager configuration

use core_types::{is_page_aligned, PAGE_SIZE};
use resources::ports::IO_PORT_COUNT;
use resources::ChildQuota;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("cpu_count must be at least 1")]
    NoCpus,

    #[error("{field} ({value:#x}) is not a non-zero multiple of the page size")]
    NotPageAligned { field: &'static str, value: usize },

    #[error("child address window {base:#x}..{limit:#x} is empty")]
    EmptyAddressWindow { base: usize, limit: usize },

    #[error("capability space must not be empty")]
    EmptyCapSpace,

    #[error("io_port_count {0:#x} exceeds the IO port space")]
    TooManyIoPorts(u32),
}

/// Child manager configuration
///
/// All fields have defaults, so a JSON document only needs to name what it
/// changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChildManagerConfig {
    /// Number of CPUs; one portal per CPU is created for every child
    pub cpu_count: usize,
    /// Stack size of every child thread
    pub stack_size: usize,
    /// UTCB size of every child thread
    pub utcb_size: usize,
    /// Lowest virtual address handed out to a child
    pub child_va_base: usize,
    /// End of the child's virtual address window (exclusive)
    pub child_va_limit: usize,
    /// Number of global system interrupts
    pub max_gsis: u32,
    /// First selector of the manager's capability space
    pub cap_space_base: u64,
    /// Number of selectors in the manager's capability space
    pub cap_space_size: u64,
    /// Number of IO ports
    pub io_port_count: u32,
    /// Limits applied to every child
    pub quota: ChildQuota,
}

impl Default for ChildManagerConfig {
    fn default() -> Self {
        Self {
            cpu_count: 4,
            stack_size: 4 * PAGE_SIZE,
            utcb_size: PAGE_SIZE,
            child_va_base: 0x0010_0000,
            child_va_limit: 0xC000_0000,
            max_gsis: 128,
            cap_space_base: 0x1000,
            cap_space_size: 0x10_0000,
            io_port_count: IO_PORT_COUNT,
            quota: ChildQuota::unlimited(),
        }
    }
}

impl ChildManagerConfig {
    /// Parses and validates a JSON configuration document
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that the configuration describes a usable manager
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cpu_count == 0 {
            return Err(ConfigError::NoCpus);
        }
        let page_fields = [
            ("stack_size", self.stack_size),
            ("utcb_size", self.utcb_size),
            ("child_va_base", self.child_va_base),
            ("child_va_limit", self.child_va_limit),
        ];
        for (field, value) in page_fields {
            if value == 0 || !is_page_aligned(value) {
                return Err(ConfigError::NotPageAligned { field, value });
            }
        }
        if self.child_va_base >= self.child_va_limit {
            return Err(ConfigError::EmptyAddressWindow {
                base: self.child_va_base,
                limit: self.child_va_limit,
            });
        }
        if self.cap_space_size == 0 {
            return Err(ConfigError::EmptyCapSpace);
        }
        if self.io_port_count > IO_PORT_COUNT {
            return Err(ConfigError::TooManyIoPorts(self.io_port_count));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(ChildManagerConfig::default().validate().is_ok());
    }

    #[test]
    fn test_from_json_partial() {
        let config = ChildManagerConfig::from_json(
            r#"{"cpu_count": 2, "quota": {"max_sessions": 8}}"#,
        )
        .unwrap();
        assert_eq!(config.cpu_count, 2);
        assert_eq!(config.quota.max_sessions, Some(8));
        assert_eq!(config.stack_size, ChildManagerConfig::default().stack_size);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result = ChildManagerConfig::from_json(r#"{"cpus": 2}"#);
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_zero_cpus_rejected() {
        let result = ChildManagerConfig::from_json(r#"{"cpu_count": 0}"#);
        assert!(matches!(result, Err(ConfigError::NoCpus)));
    }

    #[test]
    fn test_unaligned_stack_rejected() {
        let config = ChildManagerConfig {
            stack_size: 0x1800,
            ..ChildManagerConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NotPageAligned {
                field: "stack_size",
                ..
            })
        ));
    }

    #[test]
    fn test_empty_window_rejected() {
        let config = ChildManagerConfig {
            child_va_base: 0x2000,
            child_va_limit: 0x2000,
            ..ChildManagerConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::EmptyAddressWindow { .. })
        ));
    }

    #[test]
    fn test_too_many_ports_rejected() {
        let config = ChildManagerConfig {
            io_port_count: IO_PORT_COUNT + 1,
            ..ChildManagerConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::TooManyIoPorts(_))
        ));
    }
}
