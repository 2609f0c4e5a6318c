// Copyright 2023 System76 <info@system76.com>
// SPDX-License-Identifier: MPL-2.0

use super::Context;
use crate::backend::Outcome;

use wayland_client::{Connection, Dispatch, Proxy, QueueHandle};
use wayland_protocols_wlr::output_management::v1::client::zwlr_output_configuration_head_v1::ZwlrOutputConfigurationHeadV1;
use wayland_protocols_wlr::output_management::v1::client::zwlr_output_configuration_v1::Event;
use wayland_protocols_wlr::output_management::v1::client::zwlr_output_configuration_v1::ZwlrOutputConfigurationV1;

impl Dispatch<ZwlrOutputConfigurationV1, ()> for Context {
    fn event(
        state: &mut Self,
        proxy: &ZwlrOutputConfigurationV1,
        event: <ZwlrOutputConfigurationV1 as Proxy>::Event,
        _data: &(),
        _conn: &Connection,
        _handle: &QueueHandle<Self>,
    ) {
        let outcome = match event {
            Event::Succeeded => Outcome::Confirmed,

            Event::Failed => Outcome::Rejected,

            // The output state changed after the configuration was created.
            Event::Cancelled => {
                tracing::debug!("configuration cancelled by compositor");
                Outcome::Rejected
            }

            _ => {
                tracing::debug!(?event, "unknown event");
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

impl Dispatch<ZwlrOutputConfigurationHeadV1, ()> for Context {
    fn event(
        _state: &mut Self,
        _proxy: &ZwlrOutputConfigurationHeadV1,
        _event: <ZwlrOutputConfigurationHeadV1 as Proxy>::Event,
        _data: &(),
        _conn: &Connection,
        _handle: &QueueHandle<Self>,
    ) {
    }
}
