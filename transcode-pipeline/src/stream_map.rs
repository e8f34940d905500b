//! Mapping of input streams to output streams.

use crate::error::{PipelineError, Result};
use std::collections::BTreeMap;
use std::fmt;

/// Handle of an output container within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContainerId(usize);

impl ContainerId {
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Position of the container in creation order.
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "output #{}", self.0)
    }
}

/// One output stream: a container handle and a stream index inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OutputTarget {
    pub container: ContainerId,
    pub stream: usize,
}

impl OutputTarget {
    pub const fn new(container: ContainerId, stream: usize) -> Self {
        Self { container, stream }
    }
}

impl fmt::Display for OutputTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.container, self.stream)
    }
}

/// Input stream index to the ordered output streams it feeds.
///
/// Every output stream is fed by exactly one input stream.
#[derive(Debug, Clone, Default)]
pub struct StreamMap {
    entries: BTreeMap<usize, Vec<OutputTarget>>,
}

impl StreamMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed `target` from input stream `input`.
    pub fn add(&mut self, input: usize, target: OutputTarget) -> Result<()> {
        if let Some(owner) = self.source_of(target) {
            return Err(PipelineError::DuplicateTarget {
                input: owner,
                container: target.container,
                stream: target.stream,
            });
        }
        self.entries.entry(input).or_default().push(target);
        Ok(())
    }

    /// Input stream feeding `target`, if mapped.
    pub fn source_of(&self, target: OutputTarget) -> Option<usize> {
        self.entries
            .iter()
            .find(|(_, targets)| targets.contains(&target))
            .map(|(input, _)| *input)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Output streams fed by `input`, in mapping order.
    pub fn targets_for(&self, input: usize) -> &[OutputTarget] {
        self.entries.get(&input).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Mapped input stream indices, ascending.
    pub fn inputs(&self) -> impl Iterator<Item = usize> + '_ {
        self.entries.keys().copied()
    }

    /// Number of mapped input streams.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Number of mapped output streams.
    pub fn target_count(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }
}
