// Copyright 2023 System76 <info@system76.com>
// SPDX-License-Identifier: MPL-2.0

use std::sync::Mutex;

use super::Context;

use indexmap::IndexMap;
use wayland_client::backend::ObjectId;
use wayland_client::event_created_child;
use wayland_client::protocol::wl_output::Transform;
use wayland_client::{Connection, Dispatch, Proxy, QueueHandle};
use wayland_protocols_wlr::output_management::v1::client::zwlr_output_head_v1::Event as ZwlrOutputHeadEvent;
use wayland_protocols_wlr::output_management::v1::client::zwlr_output_head_v1::ZwlrOutputHeadV1;
use wayland_protocols_wlr::output_management::v1::client::zwlr_output_head_v1::EVT_MODE_OPCODE;
use wayland_protocols_wlr::output_management::v1::client::zwlr_output_mode_v1::Event as ZwlrOutputModeEvent;
use wayland_protocols_wlr::output_management::v1::client::zwlr_output_mode_v1::ZwlrOutputModeV1;

/// A head as described by `zwlr_output_head_v1` events.
#[derive(Clone, Debug, PartialEq)]
pub struct OutputHead {
    pub current_mode: Option<ObjectId>,
    pub enabled: bool,
    /// Modes in announcement order.
    pub modes: IndexMap<ObjectId, HeadMode>,
    pub name: String,
    pub position_x: i32,
    pub position_y: i32,
    pub scale: f64,
    pub transform: Option<Transform>,
    /// Set by the manager's `done` event.
    pub ready: bool,
    pub wlr_head: ZwlrOutputHeadV1,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HeadMode {
    pub width: i32,
    pub height: i32,
    pub refresh: i32,
    pub preferred: bool,
    pub wlr_mode: ZwlrOutputModeV1,
}

impl Dispatch<ZwlrOutputHeadV1, ()> for Context {
    fn event(
        state: &mut Self,
        proxy: &ZwlrOutputHeadV1,
        event: <ZwlrOutputHeadV1 as Proxy>::Event,
        _: &(),
        _: &Connection,
        _handle: &QueueHandle<Self>,
    ) {
        let head = state
            .output_heads
            .entry(proxy.id())
            .or_insert_with(|| OutputHead::new(proxy.clone()));

        match event {
            ZwlrOutputHeadEvent::Name { name } => {
                head.name = name;
            }

            ZwlrOutputHeadEvent::Mode { mode } => {
                if let Some(parent) = mode.data::<Mutex<Option<ObjectId>>>() {
                    if let Ok(mut parent) = parent.lock() {
                        *parent = Some(proxy.id());
                    }
                }
                head.modes.insert(mode.id(), HeadMode::new(mode));
            }

            ZwlrOutputHeadEvent::Enabled { enabled } => {
                head.enabled = !matches!(enabled, 0);
            }

            ZwlrOutputHeadEvent::CurrentMode { mode } => {
                head.current_mode = Some(mode.id());
            }

            ZwlrOutputHeadEvent::Position { x, y } => {
                (head.position_x, head.position_y) = (x, y);
            }

            ZwlrOutputHeadEvent::Transform { transform } => {
                head.transform = transform.into_result().ok();
            }

            ZwlrOutputHeadEvent::Scale { scale } => {
                head.scale = scale;
            }

            ZwlrOutputHeadEvent::Finished => {
                if proxy.version() >= 3 {
                    proxy.release();
                }
                tracing::debug!(name = %head.name, "head removed");
                state.output_heads.shift_remove(&proxy.id());
            }

            ZwlrOutputHeadEvent::Description { .. }
            | ZwlrOutputHeadEvent::PhysicalSize { .. }
            | ZwlrOutputHeadEvent::Make { .. }
            | ZwlrOutputHeadEvent::Model { .. }
            | ZwlrOutputHeadEvent::SerialNumber { .. }
            | ZwlrOutputHeadEvent::AdaptiveSync { .. } => (),

            _ => tracing::debug!(?event, "unknown event"),
        }
    }

    event_created_child!(Context, ZwlrOutputHeadV1, [
        EVT_MODE_OPCODE => (ZwlrOutputModeV1, Mutex::new(None)),
    ]);
}

impl Dispatch<ZwlrOutputModeV1, Mutex<Option<ObjectId>>> for Context {
    fn event(
        state: &mut Self,
        proxy: &ZwlrOutputModeV1,
        event: <ZwlrOutputModeV1 as Proxy>::Event,
        data: &Mutex<Option<ObjectId>>,
        _conn: &Connection,
        _handle: &QueueHandle<Self>,
    ) {
        let Some(head_id) = data.lock().ok().and_then(|parent| parent.clone()) else {
            return;
        };
        let Some(head) = state.output_heads.get_mut(&head_id) else {
            return;
        };
        let mode = head
            .modes
            .entry(proxy.id())
            .or_insert_with(|| HeadMode::new(proxy.clone()));

        match event {
            ZwlrOutputModeEvent::Size { width, height } => {
                (mode.width, mode.height) = (width, height);
            }

            ZwlrOutputModeEvent::Refresh { refresh } => {
                mode.refresh = refresh;
            }

            ZwlrOutputModeEvent::Preferred => {
                mode.preferred = true;
            }

            ZwlrOutputModeEvent::Finished => {
                if proxy.version() >= 3 {
                    proxy.release();
                }

                head.modes.shift_remove(&proxy.id());
            }

            _ => tracing::debug!(?event, "unknown event"),
        }
    }
}

impl OutputHead {
    #[must_use]
    pub fn new(wlr_head: ZwlrOutputHeadV1) -> Self {
        Self {
            current_mode: None,
            enabled: false,
            modes: IndexMap::new(),
            name: String::new(),
            position_x: 0,
            position_y: 0,
            scale: 1.0,
            transform: None,
            ready: false,
            wlr_head,
        }
    }
}

impl HeadMode {
    #[must_use]
    pub fn new(wlr_mode: ZwlrOutputModeV1) -> Self {
        Self {
            width: 0,
            height: 0,
            refresh: 0,
            preferred: false,
            wlr_mode,
        }
    }
}
