// Copyright 2023 System76 <info@system76.com>
// SPDX-License-Identifier: MPL-2.0

//! Backend for compositors implementing `wlr-output-management-unstable-v1`.

mod output_configuration;
mod output_head;
mod output_manager;
mod wl_registry;

use std::fmt;

use indexmap::IndexMap;
use wayland_client::backend::ObjectId;
use wayland_client::protocol::wl_output::Transform as WlTransform;
use wayland_client::{Connection, EventQueue, Proxy, QueueHandle};
use wayland_protocols_wlr::output_management::v1::client::zwlr_output_configuration_v1::ZwlrOutputConfigurationV1;
use wayland_protocols_wlr::output_management::v1::client::zwlr_output_head_v1::ZwlrOutputHeadV1;
use wayland_protocols_wlr::output_management::v1::client::zwlr_output_manager_v1::ZwlrOutputManagerV1;
use wayland_protocols_wlr::output_management::v1::client::zwlr_output_mode_v1::ZwlrOutputModeV1;

use crate::backend::{Backend, BackendKind, Outcome, OutputOperation};
use crate::output::{Output, OutputSnapshot, Transform};
use crate::{Error, OutputMode};

use output_head::OutputHead;

/// Wayland event state for the wlr output manager.
#[derive(Debug)]
pub struct Context {
    handle: QueueHandle<Context>,

    output_manager: Option<ZwlrOutputManagerV1>,
    output_manager_serial: u32,
    output_manager_version: u32,
    unsupported: bool,

    output_heads: IndexMap<ObjectId, OutputHead>,

    pending: Option<ZwlrOutputConfigurationV1>,
    outcome: Option<Outcome>,
}

impl Context {
    fn snapshot(&self) -> OutputSnapshot<ZwlrOutputHeadV1, ZwlrOutputModeV1> {
        OutputSnapshot::new(self.output_heads.values().map(OutputHead::to_output))
    }

    fn fully_described(&self) -> bool {
        self.output_heads.values().all(|head| head.ready)
    }
}

pub struct WlrBackend {
    connection: Connection,
    event_queue: EventQueue<Context>,
    context: Context,
}

impl fmt::Debug for WlrBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WlrBackend")
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

impl WlrBackend {
    /// Connects to the wayland display and binds the output manager.
    ///
    /// # Errors
    ///
    /// Returns error if there is no wayland display, or it lacks a supported
    /// `zwlr_output_manager_v1`.
    pub fn connect() -> Result<Self, Error> {
        let connection = Connection::connect_to_env()?;

        let mut event_queue = connection.new_event_queue();
        let handle = event_queue.handle();

        let display = connection.display();
        let _registry = display.get_registry(&handle, ());

        let mut context = Context {
            handle,
            output_manager: None,
            output_manager_serial: 0,
            output_manager_version: 0,
            unsupported: false,
            output_heads: IndexMap::new(),
            pending: None,
            outcome: None,
        };

        event_queue.roundtrip(&mut context)?;
        // second roundtrip for the heads announced by the manager
        event_queue.roundtrip(&mut context)?;

        if context.output_manager.is_none() {
            return Err(Error::BackendUnavailable(BackendKind::Wlr));
        }

        tracing::info!(
            version = context.output_manager_version,
            outputs = context.output_heads.len(),
            "wlr output management initialized"
        );

        Ok(Self {
            connection,
            event_queue,
            context,
        })
    }
}

impl Backend for WlrBackend {
    type OutputHandle = ZwlrOutputHeadV1;
    type ModeHandle = ZwlrOutputModeV1;

    fn kind(&self) -> BackendKind {
        BackendKind::Wlr
    }

    fn is_available(&self) -> bool {
        self.context.output_manager.is_some() && !self.context.unsupported
    }

    fn refresh_and_snapshot(
        &mut self,
    ) -> Result<OutputSnapshot<ZwlrOutputHeadV1, ZwlrOutputModeV1>, Error> {
        self.event_queue.roundtrip(&mut self.context)?;

        if !self.context.fully_described() {
            self.event_queue.roundtrip(&mut self.context)?;
        }

        if !self.is_available() {
            return Err(Error::BackendUnavailable(BackendKind::Wlr));
        }

        Ok(self.context.snapshot())
    }

    fn apply(
        &mut self,
        operations: &[OutputOperation<ZwlrOutputHeadV1, ZwlrOutputModeV1>],
    ) -> Result<(), Error> {
        let context = &mut self.context;

        let Some(manager) = context.output_manager.as_ref() else {
            return Err(Error::BackendUnavailable(BackendKind::Wlr));
        };

        if let Some(stale) = context.pending.take() {
            stale.destroy();
        }

        let configuration =
            manager.create_configuration(context.output_manager_serial, &context.handle, ());

        for operation in operations {
            let head_config = configuration.enable_head(&operation.output, &context.handle, ());
            head_config.set_mode(&operation.mode);
            head_config.set_position(operation.position.0, operation.position.1);
            head_config.set_scale(operation.scale);

            if let Ok(transform) = WlTransform::try_from(u32::from(operation.transform)) {
                head_config.set_transform(transform);
            }
        }

        // Every head must appear in the configuration; the rest keep their state.
        for head in context.output_heads.values() {
            if operations.iter().any(|operation| operation.output == head.wlr_head) {
                continue;
            }

            if head.enabled {
                let _head_config = configuration.enable_head(&head.wlr_head, &context.handle, ());
            } else {
                configuration.disable_head(&head.wlr_head);
            }
        }

        configuration.apply();
        context.pending = Some(configuration);
        context.outcome = None;

        self.connection.flush()?;
        Ok(())
    }

    fn poll(&mut self) -> Result<Option<Outcome>, Error> {
        self.event_queue.roundtrip(&mut self.context)?;
        Ok(self.context.outcome.take())
    }

    fn destroy(&mut self) {
        let context = &mut self.context;

        if let Some(configuration) = context.pending.take() {
            configuration.destroy();
        }

        for (_, head) in context.output_heads.drain(..) {
            if head.wlr_head.version() >= 3 {
                for mode in head.modes.values() {
                    mode.wlr_mode.release();
                }
                head.wlr_head.release();
            }
        }

        if let Some(manager) = context.output_manager.take() {
            manager.stop();
        }

        if let Err(why) = self.connection.flush() {
            tracing::debug!(error = %why, "flush after destroy");
        }
    }
}

impl Drop for WlrBackend {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl OutputHead {
    fn to_output(&self) -> Output<ZwlrOutputHeadV1, ZwlrOutputModeV1> {
        let mut output = Output::new(self.wlr_head.clone());
        output.connector = (!self.name.is_empty()).then(|| self.name.clone());
        output.position = (self.position_x, self.position_y);
        output.enabled = self.enabled;
        output.scale = self.scale;
        output.transform = self
            .transform
            .and_then(|transform| Transform::try_from(u32::from(transform)).ok())
            .unwrap_or_default();
        output.ready = self.ready;

        output.modes = self
            .modes
            .iter()
            .map(|(id, mode)| OutputMode {
                width: mode.width,
                height: mode.height,
                refresh: mode.refresh,
                preferred: mode.preferred,
                current: self.current_mode.as_ref() == Some(id),
                handle: mode.wlr_mode.clone(),
            })
            .collect();

        output.index_modes();
        output
    }
}
