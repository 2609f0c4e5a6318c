// SPDX-License-Identifier: MPL-2.0

use std::fmt;
use std::time::Duration;

use crate::backend::{Backend, Outcome, OutputOperation};
use crate::mapping::ConnectorMapping;
use crate::output::OutputSnapshot;
use crate::output_mode::select_mode;
use crate::Error;

/// Requested geometry for one virtual display.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct LayoutEntry {
    pub display_id: u32,
    pub width: i32,
    pub height: i32,
    pub x: i32,
    pub y: i32,
}

/// How long to wait for the compositor to answer a submitted configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WaitPolicy {
    /// Maximum number of event processing rounds.
    pub iterations: u32,
    /// Pause between rounds that produced no answer.
    pub interval: Duration,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            iterations: 50,
            interval: Duration::from_millis(100),
        }
    }
}

impl WaitPolicy {
    /// Upper bound of the time spent sleeping.
    #[must_use]
    pub fn bound(&self) -> Duration {
        self.interval * self.iterations
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SessionState {
    Building,
    Submitted,
    Confirmed,
    Rejected,
    TimedOut,
}

impl SessionState {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionState::Confirmed | SessionState::Rejected | SessionState::TimedOut
        )
    }
}

/// A layout entry that could not be applied as requested.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Condition {
    /// No mode matches the requested size; the current mode is kept.
    ModeNotFound {
        display_id: u32,
        connector: Option<String>,
        width: i32,
        height: i32,
    },
    /// No mode matches and the output has no current mode. Entry skipped.
    NoUsableMode {
        display_id: u32,
        connector: Option<String>,
    },
    /// No output serves this display. Entry skipped.
    MappingAmbiguous { display_id: u32 },
    /// An earlier entry already targets the same output. Entry skipped.
    DuplicateTarget {
        display_id: u32,
        connector: Option<String>,
    },
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = |connector: &Option<String>| connector.clone().unwrap_or_else(|| "(unknown)".into());

        match self {
            Self::ModeNotFound {
                display_id,
                connector,
                width,
                height,
            } => write!(
                f,
                "display {display_id}: no {width}x{height} mode on {}, keeping current mode",
                name(connector)
            ),
            Self::NoUsableMode {
                display_id,
                connector,
            } => write!(f, "display {display_id}: no usable mode on {}", name(connector)),
            Self::MappingAmbiguous { display_id } => {
                write!(f, "display {display_id}: no output found")
            }
            Self::DuplicateTarget {
                display_id,
                connector,
            } => write!(
                f,
                "display {display_id}: {} is already configured",
                name(connector)
            ),
        }
    }
}

/// Summary of a confirmed configuration.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ApplyReport {
    /// Number of outputs included in the configuration.
    pub applied: usize,
    pub conditions: Vec<Condition>,
}

type Operation<B> = OutputOperation<<B as Backend>::OutputHandle, <B as Backend>::ModeHandle>;

/// One apply-and-confirm transaction against a backend.
///
/// The session borrows the backend mutably, so a backend never has two
/// sessions open at once.
pub struct ConfigurationSession<'a, B: Backend> {
    backend: &'a mut B,
    operations: Vec<Operation<B>>,
    conditions: Vec<Condition>,
    state: SessionState,
}

impl<'a, B: Backend> ConfigurationSession<'a, B> {
    /// Resolves each layout entry to an output and mode of `snapshot`.
    pub fn build(
        backend: &'a mut B,
        snapshot: &OutputSnapshot<B::OutputHandle, B::ModeHandle>,
        mapping: &ConnectorMapping,
        layout: &[LayoutEntry],
    ) -> Self {
        let mut operations: Vec<Operation<B>> = Vec::with_capacity(layout.len());
        let mut targeted = Vec::with_capacity(layout.len());
        let mut conditions = Vec::new();

        for entry in layout {
            let Some((index, output)) = mapping.find_output(snapshot, entry.display_id) else {
                conditions.push(Condition::MappingAmbiguous {
                    display_id: entry.display_id,
                });
                continue;
            };

            if targeted.contains(&index) {
                conditions.push(Condition::DuplicateTarget {
                    display_id: entry.display_id,
                    connector: output.connector.clone(),
                });
                continue;
            }

            let mode = match select_mode(&output.modes, entry.width, entry.height) {
                Some(mode) => mode,

                None => {
                    let Some(current) = output.current_mode() else {
                        conditions.push(Condition::NoUsableMode {
                            display_id: entry.display_id,
                            connector: output.connector.clone(),
                        });
                        continue;
                    };

                    conditions.push(Condition::ModeNotFound {
                        display_id: entry.display_id,
                        connector: output.connector.clone(),
                        width: entry.width,
                        height: entry.height,
                    });

                    current
                }
            };

            tracing::debug!(
                display_id = entry.display_id,
                connector = output.connector.as_deref(),
                "{}x{} @ {}.{:03} Hz at {},{}",
                mode.width,
                mode.height,
                mode.refresh / 1000,
                mode.refresh % 1000,
                entry.x,
                entry.y,
            );

            targeted.push(index);
            operations.push(OutputOperation {
                output: output.handle.clone(),
                connector: output.connector.clone(),
                enable: true,
                mode: mode.handle.clone(),
                position: (entry.x, entry.y),
                scale: output.scale,
                transform: output.transform,
                primary: operations.is_empty(),
            });
        }

        for condition in &conditions {
            tracing::warn!("{condition}");
        }

        Self {
            backend,
            operations,
            conditions,
            state: SessionState::Building,
        }
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    #[must_use]
    pub fn operations(&self) -> &[Operation<B>] {
        &self.operations
    }

    #[must_use]
    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    /// Hands every operation to the backend in one submission.
    ///
    /// # Errors
    ///
    /// - [`Error::SessionSubmitted`] if the session already left `Building`.
    /// - [`Error::NothingToApply`] if no layout entry could be resolved.
    /// - Any error from the backend while sending.
    pub fn submit(&mut self) -> Result<(), Error> {
        if self.state != SessionState::Building {
            return Err(Error::SessionSubmitted);
        }

        if self.operations.is_empty() {
            return Err(Error::NothingToApply);
        }

        tracing::debug!(
            backend = %self.backend.kind(),
            outputs = self.operations.len(),
            "submitting configuration"
        );

        self.backend.apply(&self.operations)?;
        self.state = SessionState::Submitted;

        Ok(())
    }

    /// Blocks until the backend confirms or rejects the configuration, or the
    /// policy runs out.
    ///
    /// # Errors
    ///
    /// Returns error if the backend fails while processing events. The
    /// session then stays `Submitted`.
    pub fn wait(&mut self, policy: &WaitPolicy) -> Result<SessionState, Error> {
        if self.state != SessionState::Submitted {
            return Ok(self.state);
        }

        for _ in 0..policy.iterations {
            if let Some(outcome) = self.backend.poll()? {
                self.state = match outcome {
                    Outcome::Confirmed => SessionState::Confirmed,
                    Outcome::Rejected => SessionState::Rejected,
                };

                return Ok(self.state);
            }

            std::thread::sleep(policy.interval);
        }

        self.state = SessionState::TimedOut;
        Ok(self.state)
    }

    /// Converts a terminal state into the apply result.
    ///
    /// # Errors
    ///
    /// - [`Error::ConfigurationRejected`] if the compositor refused.
    /// - [`Error::ConfigurationTimeout`] if no answer arrived in time.
    pub fn finish(self) -> Result<ApplyReport, Error> {
        match self.state {
            SessionState::Confirmed => Ok(ApplyReport {
                applied: self.operations.len(),
                conditions: self.conditions,
            }),

            SessionState::Rejected => {
                tracing::warn!(backend = %self.backend.kind(), "configuration was rejected");
                Err(Error::ConfigurationRejected)
            }

            SessionState::TimedOut => {
                tracing::warn!(
                    backend = %self.backend.kind(),
                    "configuration timed out, output state is indeterminate"
                );
                Err(Error::ConfigurationTimeout)
            }

            SessionState::Building | SessionState::Submitted => Err(Error::SessionUnresolved),
        }
    }
}
