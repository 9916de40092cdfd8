//! Error types for chain and sink setup.
//!
//! Every error here is raised synchronously while a stream or sink is being
//! wired. Dispatch itself never fails: a notification that matches nothing is
//! the common case, and delivery on a disposed registry is silently dropped.

use std::error::Error;
use std::fmt;

/// Why a field selector failed to resolve to exactly one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectorProblem {
    /// The selector was the empty string.
    Empty,
    /// No field with that name is declared on the type.
    Unknown,
    /// More than one field is declared under that name.
    Ambiguous,
    /// The field exists but its value type differs from the requested one.
    TypeMismatch,
}

impl fmt::Display for SelectorProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "selector is empty"),
            Self::Unknown => write!(f, "no such field"),
            Self::Ambiguous => write!(f, "field declared more than once"),
            Self::TypeMismatch => write!(f, "value type does not match"),
        }
    }
}

/// A capability a target type must expose for a sink to be wired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// A setter for the selected field.
    Writer,
    /// Enumeration of the target's registered change listeners.
    ListenerEnumeration,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Writer => write!(f, "field writer"),
            Self::ListenerEnumeration => write!(f, "listener enumeration"),
        }
    }
}

/// Errors from building chains and sinks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    /// A field selector did not resolve to exactly one accessible field.
    SelectorResolution {
        /// Name of the type the selector was resolved against.
        type_name: &'static str,
        /// The selector as given.
        field: String,
        /// What went wrong.
        problem: SelectorProblem,
    },
    /// The target type lacks a capability the sink needs.
    MissingCapability {
        /// Name of the target type.
        type_name: &'static str,
        /// The field the sink was wired to.
        field: String,
        /// The missing capability.
        capability: Capability,
    },
    /// The registry was already disposed.
    Disposed,
    /// The source's change notification capability is no longer available.
    SourceClosed,
}

impl ChainError {
    pub(crate) fn selector(
        type_name: &'static str,
        field: impl Into<String>,
        problem: SelectorProblem,
    ) -> Self {
        Self::SelectorResolution {
            type_name,
            field: field.into(),
            problem,
        }
    }

    pub(crate) fn missing(
        type_name: &'static str,
        field: impl Into<String>,
        capability: Capability,
    ) -> Self {
        Self::MissingCapability {
            type_name,
            field: field.into(),
            capability,
        }
    }
}

impl fmt::Display for ChainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SelectorResolution {
                type_name,
                field,
                problem,
            } => write!(f, "cannot resolve field '{field}' on {type_name}: {problem}"),
            Self::MissingCapability {
                type_name,
                field,
                capability,
            } => write!(f, "{type_name} exposes no {capability} for field '{field}'"),
            Self::Disposed => write!(f, "chain registry is disposed"),
            Self::SourceClosed => write!(f, "change source no longer accepts subscriptions"),
        }
    }
}

impl Error for ChainError {}
