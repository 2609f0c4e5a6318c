// Copyright 2023 System76 <info@system76.com>
// SPDX-License-Identifier: MPL-2.0

pub mod backend;
pub use backend::{Backend, BackendKind, Outcome, OutputOperation};

pub mod mapping;
pub use mapping::{ConnectorMapping, ResolutionRecord, Resolutions};

pub mod output;
pub use output::{Output, OutputSnapshot, Transform};

pub mod output_mode;
pub use output_mode::{OutputMode, select_mode};

pub mod session;
pub use session::{ApplyReport, Condition, ConfigurationSession, LayoutEntry, SessionState, WaitPolicy};

pub mod kwin;
pub mod mutter;
pub mod wlr;

use wayland_client::backend::WaylandError;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("{0} backend is not available")]
    BackendUnavailable(BackendKind),
    #[error("no display configuration backend available")]
    NoBackend,
    #[error("I/O error")]
    Io(#[from] std::io::Error),
    #[error("wayland client context error")]
    WaylandContext(#[from] WaylandError),
    #[error("wayland client dispatch error")]
    WaylandDispatch(#[from] wayland_client::DispatchError),
    #[error("wayland connection error")]
    WaylandConnection(#[from] wayland_client::ConnectError),
    #[error("wayland object ID invalid")]
    WaylandInvalidId(#[from] wayland_client::backend::InvalidId),
    #[error("D-Bus error")]
    DBus(#[from] zbus::Error),
    #[error("configuration rejected by the compositor")]
    ConfigurationRejected,
    #[error("configuration was not answered in time")]
    ConfigurationTimeout,
    #[error("no layout entry matches an output")]
    NothingToApply,
    #[error("configuration already submitted")]
    SessionSubmitted,
    #[error("configuration has not been answered yet")]
    SessionUnresolved,
}

/// Discovers enabled outputs and the virtual displays they serve.
///
/// # Errors
///
/// Returns error if the backend is unavailable or cannot be queried.
pub fn get_resolutions<B: Backend>(
    backend: &mut B,
    mapping: &ConnectorMapping,
) -> Result<Resolutions, Error> {
    if !backend.is_available() {
        return Err(Error::BackendUnavailable(backend.kind()));
    }

    let snapshot = backend.refresh_and_snapshot()?;
    let resolutions = mapping::resolve(&snapshot, mapping);

    if resolutions.is_empty() {
        tracing::debug!(backend = %backend.kind(), "no enabled outputs");
    }

    Ok(resolutions)
}

/// Applies `layout` and waits up to five seconds for the compositor to answer.
///
/// # Errors
///
/// See [`set_monitor_config_with`].
pub fn set_monitor_config<B: Backend>(
    backend: &mut B,
    mapping: &ConnectorMapping,
    layout: &[LayoutEntry],
) -> Result<ApplyReport, Error> {
    set_monitor_config_with(backend, mapping, layout, &WaitPolicy::default())
}

/// Applies `layout` and waits for the compositor as long as `policy` allows.
///
/// # Errors
///
/// - The backend is unavailable or fails.
/// - [`Error::NothingToApply`] if no entry resolved to an output.
/// - [`Error::ConfigurationRejected`] or [`Error::ConfigurationTimeout`].
pub fn set_monitor_config_with<B: Backend>(
    backend: &mut B,
    mapping: &ConnectorMapping,
    layout: &[LayoutEntry],
    policy: &WaitPolicy,
) -> Result<ApplyReport, Error> {
    if !backend.is_available() {
        return Err(Error::BackendUnavailable(backend.kind()));
    }

    let snapshot = backend.refresh_and_snapshot()?;

    let mut session = ConfigurationSession::build(backend, &snapshot, mapping, layout);
    session.submit()?;
    session.wait(policy)?;
    session.finish()
}

/// The backend found on this system.
#[derive(Debug)]
pub enum AnyBackend {
    Kwin(kwin::KwinBackend),
    Wlr(wlr::WlrBackend),
    Mutter(mutter::MutterBackend),
}

impl AnyBackend {
    /// Connects to one specific backend.
    ///
    /// # Errors
    ///
    /// Returns error if the compositor does not offer that backend.
    pub fn connect(kind: BackendKind) -> Result<Self, Error> {
        Ok(match kind {
            BackendKind::Kwin => AnyBackend::Kwin(kwin::KwinBackend::connect()?),
            BackendKind::Wlr => AnyBackend::Wlr(wlr::WlrBackend::connect()?),
            BackendKind::Mutter => AnyBackend::Mutter(mutter::MutterBackend::connect()?),
        })
    }

    /// Tries KWin, then wlroots, then Mutter.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoBackend`] if none of them is present.
    pub fn probe() -> Result<Self, Error> {
        for kind in [BackendKind::Kwin, BackendKind::Wlr, BackendKind::Mutter] {
            match Self::connect(kind) {
                Ok(backend) if backend.is_available() => {
                    tracing::info!(backend = %kind, "using display backend");
                    return Ok(backend);
                }

                Ok(_) => tracing::debug!(backend = %kind, "backend not available"),

                Err(why) => tracing::debug!(backend = %kind, error = %why, "backend not available"),
            }
        }

        Err(Error::NoBackend)
    }

    #[must_use]
    pub fn kind(&self) -> BackendKind {
        match self {
            AnyBackend::Kwin(backend) => backend.kind(),
            AnyBackend::Wlr(backend) => backend.kind(),
            AnyBackend::Mutter(backend) => backend.kind(),
        }
    }

    #[must_use]
    pub fn is_available(&self) -> bool {
        match self {
            AnyBackend::Kwin(backend) => backend.is_available(),
            AnyBackend::Wlr(backend) => backend.is_available(),
            AnyBackend::Mutter(backend) => backend.is_available(),
        }
    }

    /// # Errors
    ///
    /// See [`get_resolutions`].
    pub fn get_resolutions(&mut self, mapping: &ConnectorMapping) -> Result<Resolutions, Error> {
        match self {
            AnyBackend::Kwin(backend) => get_resolutions(backend, mapping),
            AnyBackend::Wlr(backend) => get_resolutions(backend, mapping),
            AnyBackend::Mutter(backend) => get_resolutions(backend, mapping),
        }
    }

    /// # Errors
    ///
    /// See [`set_monitor_config_with`].
    pub fn set_monitor_config(
        &mut self,
        mapping: &ConnectorMapping,
        layout: &[LayoutEntry],
        policy: &WaitPolicy,
    ) -> Result<ApplyReport, Error> {
        match self {
            AnyBackend::Kwin(backend) => set_monitor_config_with(backend, mapping, layout, policy),
            AnyBackend::Wlr(backend) => set_monitor_config_with(backend, mapping, layout, policy),
            AnyBackend::Mutter(backend) => set_monitor_config_with(backend, mapping, layout, policy),
        }
    }

    pub fn destroy(&mut self) {
        match self {
            AnyBackend::Kwin(backend) => backend.destroy(),
            AnyBackend::Wlr(backend) => backend.destroy(),
            AnyBackend::Mutter(backend) => backend.destroy(),
        }
    }
}
