// SPDX-License-Identifier: MPL-2.0

use super::output_device::OutputDevice;
use super::{Context, MIN_VERSION};

use wayland_client::{protocol::wl_registry, Connection, Dispatch, Proxy, QueueHandle};
use wayland_protocols_plasma::output_device::v2::client::kde_output_device_v2::KdeOutputDeviceV2;
use wayland_protocols_plasma::output_management::v2::client::kde_output_management_v2::KdeOutputManagementV2;

impl Dispatch<wl_registry::WlRegistry, ()> for Context {
    fn event(
        state: &mut Self,
        registry: &wl_registry::WlRegistry,
        event: wl_registry::Event,
        _data: &(),
        _conn: &Connection,
        handle: &QueueHandle<Self>,
    ) {
        match event {
            wl_registry::Event::Global {
                name,
                interface,
                version,
            } => match &interface[..] {
                "kde_output_device_v2" => {
                    if version < MIN_VERSION {
                        tracing::warn!("kde_output_device_v2 version {version} < {MIN_VERSION} is not supported");
                        return;
                    }

                    let device = registry.bind::<KdeOutputDeviceV2, _, _>(
                        name,
                        version.min(KdeOutputDeviceV2::interface().version),
                        handle,
                        (),
                    );

                    tracing::debug!(name, version, "bound kde_output_device_v2");
                    state.globals.insert(name, device.id());
                    state.output_devices.insert(device.id(), OutputDevice::new(device));
                }

                "kde_output_management_v2" => {
                    if version < MIN_VERSION {
                        tracing::warn!(
                            "kde_output_management_v2 version {version} < {MIN_VERSION} is not supported"
                        );
                        return;
                    }

                    let version = version.min(KdeOutputManagementV2::interface().version);
                    state.output_management_version = version;
                    state.output_management = Some(registry.bind::<KdeOutputManagementV2, _, _>(
                        name, version, handle, (),
                    ));
                }

                _ => (),
            },

            wl_registry::Event::GlobalRemove { name } => {
                if let Some(id) = state.globals.remove(&name) {
                    if let Some(device) = state.output_devices.shift_remove(&id) {
                        tracing::debug!(name = device.name.as_deref(), "output device removed");
                    }
                }
            }

            _ => (),
        }
    }
}
