// Copyright 2023 System76 <info@system76.com>
// SPDX-License-Identifier: MPL-2.0

use super::output_head::OutputHead;
use super::Context;

use wayland_client::event_created_child;
use wayland_client::{Connection, Dispatch, Proxy, QueueHandle};
use wayland_protocols_wlr::output_management::v1::client::zwlr_output_head_v1::ZwlrOutputHeadV1;
use wayland_protocols_wlr::output_management::v1::client::zwlr_output_manager_v1::Event as ZwlrOutputManagerEvent;
use wayland_protocols_wlr::output_management::v1::client::zwlr_output_manager_v1::ZwlrOutputManagerV1;
use wayland_protocols_wlr::output_management::v1::client::zwlr_output_manager_v1::EVT_HEAD_OPCODE;

impl Dispatch<ZwlrOutputManagerV1, ()> for Context {
    fn event(
        state: &mut Self,
        _proxy: &ZwlrOutputManagerV1,
        event: <ZwlrOutputManagerV1 as Proxy>::Event,
        _data: &(),
        _conn: &Connection,
        _handle: &QueueHandle<Self>,
    ) {
        match event {
            ZwlrOutputManagerEvent::Head { head } => {
                state.output_heads.insert(head.id(), OutputHead::new(head));
            }

            // All heads are fully described once the manager sends `done`.
            ZwlrOutputManagerEvent::Done { serial } => {
                state.output_manager_serial = serial;

                for head in state.output_heads.values_mut() {
                    if !head.ready {
                        tracing::debug!(
                            name = %head.name,
                            enabled = head.enabled,
                            "head described at {},{}",
                            head.position_x,
                            head.position_y
                        );
                    }
                    head.ready = true;
                }
            }

            ZwlrOutputManagerEvent::Finished => {
                tracing::debug!("output manager finished");
                state.output_manager = None;
                state.output_manager_serial = 0;
            }

            _ => tracing::debug!(?event, "unknown event"),
        }
    }

    event_created_child!(Context, ZwlrOutputManagerV1, [
        EVT_HEAD_OPCODE => (ZwlrOutputHeadV1, ()),
    ]);
}
