// SPDX-License-Identifier: MPL-2.0

use std::sync::Mutex;

use super::Context;

use indexmap::IndexMap;
use wayland_client::backend::ObjectId;
use wayland_client::event_created_child;
use wayland_client::{Connection, Dispatch, Proxy, QueueHandle};
use wayland_protocols_plasma::output_device::v2::client::kde_output_device_mode_v2::Event as ModeEvent;
use wayland_protocols_plasma::output_device::v2::client::kde_output_device_mode_v2::KdeOutputDeviceModeV2;
use wayland_protocols_plasma::output_device::v2::client::kde_output_device_v2::Event as DeviceEvent;
use wayland_protocols_plasma::output_device::v2::client::kde_output_device_v2::{
    KdeOutputDeviceV2, EVT_MODE_OPCODE,
};

use crate::output::Transform;

/// An output as described by `kde_output_device_v2` events.
#[derive(Clone, Debug, PartialEq)]
pub struct OutputDevice {
    pub device: KdeOutputDeviceV2,
    /// Connector name, such as `Virtual-1`.
    pub name: Option<String>,
    pub x: i32,
    pub y: i32,
    /// Same numbering as `wl_output.transform`.
    pub transform: Transform,
    pub scale: f64,
    pub enabled: bool,
    /// Modes in announcement order.
    pub modes: IndexMap<ObjectId, DeviceMode>,
    pub current_mode: Option<ObjectId>,
    /// The `done` event has been received.
    pub done: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceMode {
    pub mode: KdeOutputDeviceModeV2,
    pub width: i32,
    pub height: i32,
    pub refresh: i32,
    pub preferred: bool,
}

impl Dispatch<KdeOutputDeviceV2, ()> for Context {
    fn event(
        state: &mut Self,
        proxy: &KdeOutputDeviceV2,
        event: <KdeOutputDeviceV2 as Proxy>::Event,
        _data: &(),
        _conn: &Connection,
        _handle: &QueueHandle<Self>,
    ) {
        let Some(output) = state.output_devices.get_mut(&proxy.id()) else {
            return;
        };

        match event {
            DeviceEvent::Geometry { x, y, transform, .. } => {
                (output.x, output.y) = (x, y);
                output.transform = transform_from_wire(transform);
            }

            DeviceEvent::CurrentMode { mode } => {
                output.current_mode = Some(mode.id());
            }

            DeviceEvent::Mode { mode } => {
                if let Some(parent) = mode.data::<Mutex<Option<ObjectId>>>() {
                    if let Ok(mut parent) = parent.lock() {
                        *parent = Some(proxy.id());
                    }
                }
                output.modes.insert(mode.id(), DeviceMode::new(mode));
            }

            DeviceEvent::Done => {
                output.done = true;

                tracing::debug!(
                    name = output.name.as_deref(),
                    enabled = output.enabled,
                    modes = output.modes.len(),
                    "output described at {},{}",
                    output.x,
                    output.y
                );
            }

            DeviceEvent::Scale { factor } => {
                output.scale = factor;
            }

            DeviceEvent::Enabled { enabled } => {
                output.enabled = enabled != 0;
            }

            DeviceEvent::Name { name } => {
                output.name = Some(name);
            }

            _ => (),
        }
    }

    event_created_child!(Context, KdeOutputDeviceV2, [
        EVT_MODE_OPCODE => (KdeOutputDeviceModeV2, Mutex::new(None)),
    ]);
}

impl Dispatch<KdeOutputDeviceModeV2, Mutex<Option<ObjectId>>> for Context {
    fn event(
        state: &mut Self,
        proxy: &KdeOutputDeviceModeV2,
        event: <KdeOutputDeviceModeV2 as Proxy>::Event,
        data: &Mutex<Option<ObjectId>>,
        _conn: &Connection,
        _handle: &QueueHandle<Self>,
    ) {
        let Some(device_id) = data.lock().ok().and_then(|parent| parent.clone()) else {
            return;
        };
        let Some(output) = state.output_devices.get_mut(&device_id) else {
            return;
        };
        let mode = output
            .modes
            .entry(proxy.id())
            .or_insert_with(|| DeviceMode::new(proxy.clone()));

        match event {
            ModeEvent::Size { width, height } => {
                (mode.width, mode.height) = (width, height);
            }

            ModeEvent::Refresh { refresh } => {
                mode.refresh = refresh;
            }

            ModeEvent::Preferred => {
                mode.preferred = true;
            }

            ModeEvent::Removed => {
                if output.current_mode.as_ref() == Some(&proxy.id()) {
                    output.current_mode = None;
                }
                output.modes.shift_remove(&proxy.id());
            }

            _ => tracing::debug!(?event, "unknown event"),
        }
    }
}

/// `kde_output_device_v2` sends transforms as plain integers.
pub(super) fn transform_from_wire(value: i32) -> Transform {
    u32::try_from(value)
        .ok()
        .and_then(|value| Transform::try_from(value).ok())
        .unwrap_or_default()
}

pub(super) fn transform_to_wire(transform: Transform) -> Option<i32> {
    i32::try_from(u32::from(transform)).ok()
}

impl OutputDevice {
    #[must_use]
    pub fn new(device: KdeOutputDeviceV2) -> Self {
        Self {
            device,
            name: None,
            x: 0,
            y: 0,
            transform: Transform::Normal,
            scale: 1.0,
            enabled: true,
            modes: IndexMap::new(),
            current_mode: None,
            done: false,
        }
    }
}

impl DeviceMode {
    #[must_use]
    pub fn new(mode: KdeOutputDeviceModeV2) -> Self {
        Self {
            mode,
            width: 0,
            height: 0,
            refresh: 0,
            preferred: false,
        }
    }
}
