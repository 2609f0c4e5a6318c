// SPDX-License-Identifier: MPL-2.0

use super::Context;
use crate::backend::Outcome;

use wayland_client::{Connection, Dispatch, Proxy, QueueHandle};
use wayland_protocols_plasma::output_management::v2::client::kde_output_configuration_v2::Event;
use wayland_protocols_plasma::output_management::v2::client::kde_output_configuration_v2::KdeOutputConfigurationV2;
use wayland_protocols_plasma::output_management::v2::client::kde_output_management_v2::KdeOutputManagementV2;

impl Dispatch<KdeOutputConfigurationV2, ()> for Context {
    fn event(
        state: &mut Self,
        proxy: &KdeOutputConfigurationV2,
        event: <KdeOutputConfigurationV2 as Proxy>::Event,
        _data: &(),
        _conn: &Connection,
        _handle: &QueueHandle<Self>,
    ) {
        let outcome = match event {
            Event::Applied => Outcome::Confirmed,

            Event::Failed => Outcome::Rejected,

            _ => {
                tracing::debug!(?event, "configuration event");
                return;
            }
        };

        if state.pending.as_ref() == Some(proxy) {
            state.pending = None;
            state.outcome = Some(outcome);
        }

        proxy.destroy();
    }
}

impl Dispatch<KdeOutputManagementV2, ()> for Context {
    fn event(
        _state: &mut Self,
        _proxy: &KdeOutputManagementV2,
        _event: <KdeOutputManagementV2 as Proxy>::Event,
        _data: &(),
        _conn: &Connection,
        _handle: &QueueHandle<Self>,
    ) {
    }
}
