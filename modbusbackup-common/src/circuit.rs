//! Circuit directory: maps primary-plane circuit identifiers to backup-bus coil
//! indices, and backup-bus coil indices to primary-plane relay outputs.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::config::{MappingConfig, whole_number};
use crate::error::{Error, Result};

/// Number of addressable entries in the backup bus register block.
pub const REGISTER_COUNT: u16 = 64;

/// One configuration record.
///
/// `input` is the circuit identifier reported by the primary event bus,
/// `index` the zero-based coil index on the backup bus and `output` the
/// relay output name on the primary relay API. Either side may be left out
/// when only one direction is bridged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitEntry {
    #[serde(default)]
    pub input: Option<String>,
    #[serde(deserialize_with = "whole_number")]
    pub index: u16,
    #[serde(default)]
    pub output: Option<String>,
}

impl CircuitEntry {
    /// An entry bridged in both directions under the same name.
    pub fn bidirectional(name: impl Into<String>, index: u16) -> Self {
        let name = name.into();
        Self {
            input: Some(name.clone()),
            index,
            output: Some(name),
        }
    }
}

/// Expand group sizes into `<group>_<position>` circuits indexed consecutively.
///
/// `[4, 30, 30]` yields `1_1..1_4`, `2_1..2_30`, `3_1..3_30` at indices 0..63.
pub fn generate_layout(groups: &[u16]) -> Vec<CircuitEntry> {
    let mut entries = Vec::new();
    let mut index = 0u16;

    for (group, size) in groups.iter().enumerate() {
        for position in 0..*size {
            entries.push(CircuitEntry::bidirectional(
                format!("{}_{}", group + 1, position + 1),
                index,
            ));
            index = index.saturating_add(1);
        }
    }

    entries
}

/// Translate a one-based register store address into a zero-based directory index.
pub fn index_for_store_address(address: u16) -> Option<u16> {
    address.checked_sub(1)
}

/// Immutable, bidirectional circuit mapping.
///
/// Built once at startup; lookups never fail, an unmapped key is simply `None`.
#[derive(Debug, Clone, Default)]
pub struct CircuitDirectory {
    coils: HashMap<String, u16>,
    relays: HashMap<u16, String>,
}

impl CircuitDirectory {
    /// Build the directory from configuration records.
    pub fn from_entries<I>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = CircuitEntry>,
    {
        let mut directory = Self::default();

        for entry in entries {
            if entry.index >= REGISTER_COUNT {
                return Err(Error::Directory(format!(
                    "index {} is outside the {}-entry register space",
                    entry.index, REGISTER_COUNT
                )));
            }

            if entry.input.is_none() && entry.output.is_none() {
                return Err(Error::Directory(format!(
                    "index {}: entry needs an input, an output or both",
                    entry.index
                )));
            }

            if let Some(input) = entry.input {
                if input.is_empty() {
                    return Err(Error::Directory(format!(
                        "index {}: input circuit cannot be empty",
                        entry.index
                    )));
                }
                if let Some(existing) = directory.coils.insert(input.clone(), entry.index) {
                    return Err(Error::Directory(format!(
                        "circuit '{}' mapped twice (indices {} and {})",
                        input, existing, entry.index
                    )));
                }
            }

            if let Some(output) = entry.output {
                if output.is_empty() {
                    return Err(Error::Directory(format!(
                        "index {}: output relay cannot be empty",
                        entry.index
                    )));
                }
                if let Some(existing) = directory.relays.insert(entry.index, output.clone()) {
                    return Err(Error::Directory(format!(
                        "index {} mapped to both '{}' and '{}'",
                        entry.index, existing, output
                    )));
                }
            }
        }

        Ok(directory)
    }

    /// Build the directory from the mapping section of the configuration.
    ///
    /// Generated group entries come first, explicit entries are appended.
    pub fn from_config(config: &MappingConfig) -> Result<Self> {
        let entries = generate_layout(&config.circuit_groups)
            .into_iter()
            .chain(config.circuits.iter().cloned());
        Self::from_entries(entries)
    }

    /// Coil index on the backup bus for a primary-plane circuit.
    pub fn coil_for_circuit(&self, circuit: &str) -> Option<u16> {
        self.coils.get(circuit).copied()
    }

    /// Relay output on the primary plane for a zero-based backup-bus coil index.
    pub fn relay_for_coil(&self, index: u16) -> Option<&str> {
        self.relays.get(&index).map(String::as_str)
    }

    /// Number of circuits bridged from the primary plane to the backup bus.
    pub fn inbound_len(&self) -> usize {
        self.coils.len()
    }

    /// Number of coils bridged from the backup bus to the primary plane.
    pub fn outbound_len(&self) -> usize {
        self.relays.len()
    }
}
