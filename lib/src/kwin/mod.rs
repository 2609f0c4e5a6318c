// SPDX-License-Identifier: MPL-2.0

//! Backend for KWin's `kde_output_device_v2` and `kde_output_management_v2`.

mod output_configuration;
mod output_device;
mod wl_registry;

use std::collections::HashMap;
use std::fmt;

use indexmap::IndexMap;
use wayland_client::backend::ObjectId;
use wayland_client::{Connection, EventQueue, QueueHandle};
use wayland_protocols_plasma::output_device::v2::client::kde_output_device_mode_v2::KdeOutputDeviceModeV2;
use wayland_protocols_plasma::output_device::v2::client::kde_output_device_v2::KdeOutputDeviceV2;
use wayland_protocols_plasma::output_management::v2::client::kde_output_configuration_v2::KdeOutputConfigurationV2;
use wayland_protocols_plasma::output_management::v2::client::kde_output_management_v2::KdeOutputManagementV2;

use crate::backend::{Backend, BackendKind, Outcome, OutputOperation};
use crate::output::{Output, OutputSnapshot};
use crate::{Error, OutputMode};

use output_device::OutputDevice;

/// Oldest protocol version of either global that is accepted.
const MIN_VERSION: u32 = 2;

/// Wayland event state for KWin output devices.
#[derive(Debug)]
pub struct Context {
    handle: QueueHandle<Context>,

    output_management: Option<KdeOutputManagementV2>,
    output_management_version: u32,

    output_devices: IndexMap<ObjectId, OutputDevice>,
    /// Registry name of each bound device global.
    globals: HashMap<u32, ObjectId>,

    pending: Option<KdeOutputConfigurationV2>,
    outcome: Option<Outcome>,
}

impl Context {
    fn snapshot(&self) -> OutputSnapshot<KdeOutputDeviceV2, KdeOutputDeviceModeV2> {
        OutputSnapshot::new(self.output_devices.values().map(OutputDevice::to_output))
    }

    fn fully_described(&self) -> bool {
        self.output_devices.values().all(|device| device.done)
    }
}

pub struct KwinBackend {
    connection: Connection,
    event_queue: EventQueue<Context>,
    context: Context,
}

impl fmt::Debug for KwinBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KwinBackend")
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

impl KwinBackend {
    /// Connects to the wayland display and binds KWin's output globals.
    ///
    /// # Errors
    ///
    /// Returns error if there is no wayland display, or it does not offer
    /// `kde_output_management_v2`.
    pub fn connect() -> Result<Self, Error> {
        let connection = Connection::connect_to_env()?;

        let mut event_queue = connection.new_event_queue();
        let handle = event_queue.handle();

        let display = connection.display();
        let _registry = display.get_registry(&handle, ());

        let mut context = Context {
            handle,
            output_management: None,
            output_management_version: 0,
            output_devices: IndexMap::new(),
            globals: HashMap::new(),
            pending: None,
            outcome: None,
        };

        event_queue.roundtrip(&mut context)?;
        // second roundtrip for the device descriptions
        event_queue.roundtrip(&mut context)?;

        if context.output_management.is_none() {
            tracing::debug!("kde_output_management_v2 not available");
            return Err(Error::BackendUnavailable(BackendKind::Kwin));
        }

        tracing::info!(
            version = context.output_management_version,
            outputs = context.output_devices.len(),
            "kde output management initialized"
        );

        Ok(Self {
            connection,
            event_queue,
            context,
        })
    }
}

impl Backend for KwinBackend {
    type OutputHandle = KdeOutputDeviceV2;
    type ModeHandle = KdeOutputDeviceModeV2;

    fn kind(&self) -> BackendKind {
        BackendKind::Kwin
    }

    fn is_available(&self) -> bool {
        self.context.output_management.is_some()
    }

    fn refresh_and_snapshot(
        &mut self,
    ) -> Result<OutputSnapshot<KdeOutputDeviceV2, KdeOutputDeviceModeV2>, Error> {
        if !self.is_available() {
            return Err(Error::BackendUnavailable(BackendKind::Kwin));
        }

        self.event_queue.roundtrip(&mut self.context)?;

        if !self.context.fully_described() {
            self.event_queue.roundtrip(&mut self.context)?;
        }

        Ok(self.context.snapshot())
    }

    fn apply(
        &mut self,
        operations: &[OutputOperation<KdeOutputDeviceV2, KdeOutputDeviceModeV2>],
    ) -> Result<(), Error> {
        let context = &mut self.context;

        let Some(management) = context.output_management.as_ref() else {
            return Err(Error::BackendUnavailable(BackendKind::Kwin));
        };

        if let Some(stale) = context.pending.take() {
            stale.destroy();
        }

        let configuration = management.create_configuration(&context.handle, ());

        for operation in operations {
            let device = &operation.output;

            configuration.enable(device, i32::from(operation.enable));
            configuration.mode(device, &operation.mode);
            configuration.position(device, operation.position.0, operation.position.1);
            configuration.scale(device, operation.scale);

            if let Some(transform) = output_device::transform_to_wire(operation.transform) {
                configuration.transform(device, transform);
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

        context.output_devices.clear();
        context.globals.clear();
        context.output_management = None;

        if let Err(why) = self.connection.flush() {
            tracing::debug!(error = %why, "flush after destroy");
        }
    }
}

impl Drop for KwinBackend {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl OutputDevice {
    fn to_output(&self) -> Output<KdeOutputDeviceV2, KdeOutputDeviceModeV2> {
        let mut output = Output::new(self.device.clone());
        output.connector = self.name.clone();
        output.position = (self.x, self.y);
        output.enabled = self.enabled;
        output.scale = self.scale;
        output.transform = self.transform;
        output.ready = self.done;

        output.modes = self
            .modes
            .iter()
            .map(|(id, mode)| OutputMode {
                width: mode.width,
                height: mode.height,
                refresh: mode.refresh,
                preferred: mode.preferred,
                current: self.current_mode.as_ref() == Some(id),
                handle: mode.mode.clone(),
            })
            .collect();

        output.index_modes();
        output
    }
}
