// SPDX-License-Identifier: MPL-2.0

use std::fmt::Debug;

use crate::output::{OutputSnapshot, Transform};
use crate::Error;

/// A compositor interface capable of describing and configuring outputs.
///
/// Adapters keep protocol state to themselves. The core only sees completed
/// snapshots and hands back whole operation lists.
pub trait Backend {
    /// Backend object addressing an output.
    type OutputHandle: Clone + Debug;
    /// Backend object addressing a mode of an output.
    type ModeHandle: Clone + Debug;

    fn kind(&self) -> BackendKind;

    fn is_available(&self) -> bool;

    /// Processes pending backend events and returns the current outputs.
    ///
    /// Every returned output is fully described.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BackendUnavailable`] or a transport error if the
    /// compositor cannot be queried.
    fn refresh_and_snapshot(
        &mut self,
    ) -> Result<OutputSnapshot<Self::OutputHandle, Self::ModeHandle>, Error>;

    /// Submits all operations as one configuration. The outcome is reported
    /// later through [`Backend::poll`].
    ///
    /// # Errors
    ///
    /// Returns error if the configuration could not be sent.
    fn apply(
        &mut self,
        operations: &[OutputOperation<Self::OutputHandle, Self::ModeHandle>],
    ) -> Result<(), Error>;

    /// Runs one round of event processing and returns the outcome of the
    /// submitted configuration once the compositor has answered.
    ///
    /// # Errors
    ///
    /// Returns error if event processing fails.
    fn poll(&mut self) -> Result<Option<Outcome>, Error>;

    /// Releases backend resources. Calling it again does nothing.
    fn destroy(&mut self);
}

/// Desired state of one output within a configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct OutputOperation<O, M> {
    pub output: O,
    pub connector: Option<String>,
    pub enable: bool,
    pub mode: M,
    pub position: (i32, i32),
    pub scale: f64,
    pub transform: Transform,
    pub primary: bool,
}

/// Compositor verdict on a submitted configuration.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Outcome {
    Confirmed,
    Rejected,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum BackendKind {
    Kwin,
    Wlr,
    Mutter,
}

impl BackendKind {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            BackendKind::Kwin => "kwin",
            BackendKind::Wlr => "wlr",
            BackendKind::Mutter => "mutter",
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<&str> for BackendKind {
    type Error = &'static str;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Ok(match value {
            "kwin" => BackendKind::Kwin,
            "wlr" => BackendKind::Wlr,
            "mutter" => BackendKind::Mutter,
            _ => return Err("unknown backend"),
        })
    }
}
