// SPDX-License-Identifier: MPL-2.0

use std::fmt::{self, Display};

use crate::OutputMode;

/// One monitor as described by the compositor.
#[derive(Clone, Debug, PartialEq)]
pub struct Output<O, M> {
    /// Backend object used to address this output in a configuration.
    pub handle: O,
    /// Connector name such as `Virtual-1`, if the backend reported one.
    pub connector: Option<String>,
    pub position: (i32, i32),
    pub enabled: bool,
    pub scale: f64,
    pub transform: Transform,
    /// Modes in the order the backend announced them.
    pub modes: Vec<OutputMode<M>>,
    /// Index into `modes`.
    pub current_mode: Option<usize>,
    /// Index into `modes`.
    pub preferred_mode: Option<usize>,
    /// The backend finished describing this output.
    pub ready: bool,
}

impl<O, M> Output<O, M> {
    #[must_use]
    pub fn new(handle: O) -> Self {
        Self {
            handle,
            connector: None,
            position: (0, 0),
            enabled: false,
            scale: 1.0,
            transform: Transform::Normal,
            modes: Vec::new(),
            current_mode: None,
            preferred_mode: None,
            ready: false,
        }
    }

    #[must_use]
    pub fn current_mode(&self) -> Option<&OutputMode<M>> {
        self.current_mode.and_then(|index| self.modes.get(index))
    }

    #[must_use]
    pub fn preferred_mode(&self) -> Option<&OutputMode<M>> {
        self.preferred_mode.and_then(|index| self.modes.get(index))
    }

    /// Pixel size of the current mode, or zero when no mode is active.
    #[must_use]
    pub fn size(&self) -> (i32, i32) {
        self.current_mode().map_or((0, 0), OutputMode::size)
    }

    /// Enabled and fully described.
    #[must_use]
    pub fn is_usable(&self) -> bool {
        self.enabled && self.ready
    }

    /// Derives `current_mode` and `preferred_mode` from the per-mode flags.
    pub fn index_modes(&mut self) {
        self.current_mode = self.modes.iter().position(|mode| mode.current);
        self.preferred_mode = self.modes.iter().position(|mode| mode.preferred);
    }
}

/// Point-in-time list of outputs reported by a backend.
#[derive(Clone, Debug, PartialEq)]
pub struct OutputSnapshot<O, M> {
    outputs: Vec<Output<O, M>>,
    desktop_width: i32,
    desktop_height: i32,
}

impl<O, M> OutputSnapshot<O, M> {
    /// Builds a snapshot, dropping outputs the backend has not finished describing.
    #[must_use]
    pub fn new(outputs: impl IntoIterator<Item = Output<O, M>>) -> Self {
        let outputs: Vec<_> = outputs
            .into_iter()
            .filter(|output| {
                if !output.ready {
                    tracing::debug!(connector = ?output.connector, "skipping partially described output");
                }
                output.ready
            })
            .collect();

        let (mut desktop_width, mut desktop_height) = (0, 0);

        for output in outputs.iter().filter(|output| output.is_usable()) {
            let (width, height) = output.size();
            desktop_width = desktop_width.max(output.position.0 + width);
            desktop_height = desktop_height.max(output.position.1 + height);
        }

        Self {
            outputs,
            desktop_width,
            desktop_height,
        }
    }

    #[must_use]
    pub fn outputs(&self) -> &[Output<O, M>] {
        &self.outputs
    }

    /// Enabled outputs, in discovery order.
    pub fn usable(&self) -> impl Iterator<Item = &Output<O, M>> {
        self.outputs.iter().filter(|output| output.is_usable())
    }

    /// Width and height of the rectangle covering every enabled output.
    #[must_use]
    pub fn desktop_bounds(&self) -> (i32, i32) {
        (self.desktop_width, self.desktop_height)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, PartialOrd, Ord)]
pub enum Transform {
    #[default]
    Normal,
    Rotate90,
    Rotate180,
    Rotate270,
    Flipped,
    Flipped90,
    Flipped180,
    Flipped270,
}

impl Display for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Transform::Normal => "normal",
            Transform::Rotate90 => "rotate90",
            Transform::Rotate180 => "rotate180",
            Transform::Rotate270 => "rotate270",
            Transform::Flipped => "flipped",
            Transform::Flipped90 => "flipped90",
            Transform::Flipped180 => "flipped180",
            Transform::Flipped270 => "flipped270",
        })
    }
}

/// Numbering shared by `wl_output.transform` and Mutter's DisplayConfig.
impl TryFrom<u32> for Transform {
    type Error = &'static str;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => Transform::Normal,
            1 => Transform::Rotate90,
            2 => Transform::Rotate180,
            3 => Transform::Rotate270,
            4 => Transform::Flipped,
            5 => Transform::Flipped90,
            6 => Transform::Flipped180,
            7 => Transform::Flipped270,
            _ => return Err("unknown transform variant"),
        })
    }
}

impl From<Transform> for u32 {
    fn from(transform: Transform) -> Self {
        match transform {
            Transform::Normal => 0,
            Transform::Rotate90 => 1,
            Transform::Rotate180 => 2,
            Transform::Rotate270 => 3,
            Transform::Flipped => 4,
            Transform::Flipped90 => 5,
            Transform::Flipped180 => 6,
            Transform::Flipped270 => 7,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn output(
        handle: usize,
        connector: Option<&str>,
        (width, height): (i32, i32),
        position: (i32, i32),
    ) -> Output<usize, usize> {
        let mut mode = OutputMode::new(handle * 100);
        (mode.width, mode.height, mode.refresh) = (width, height, 60000);
        mode.current = true;

        let mut output = Output::new(handle);
        output.connector = connector.map(String::from);
        output.position = position;
        output.enabled = true;
        output.ready = true;
        output.modes.push(mode);
        output.index_modes();
        output
    }

    #[test]
    fn desktop_bounds_cover_enabled_outputs() {
        let snapshot = OutputSnapshot::new([
            output(0, Some("Virtual-1"), (1920, 1080), (0, 0)),
            output(1, Some("Virtual-2"), (1280, 1024), (1920, 0)),
        ]);

        assert_eq!(snapshot.desktop_bounds(), (3200, 1080));
    }

    #[test]
    fn disabled_outputs_do_not_extend_bounds() {
        let mut disabled = output(1, Some("Virtual-2"), (1280, 1024), (1920, 0));
        disabled.enabled = false;

        let snapshot = OutputSnapshot::new([
            output(0, Some("Virtual-1"), (1920, 1080), (0, 0)),
            disabled,
        ]);

        assert_eq!(snapshot.desktop_bounds(), (1920, 1080));
        assert_eq!(snapshot.outputs().len(), 2);
        assert_eq!(snapshot.usable().count(), 1);
    }

    #[test]
    fn partial_outputs_are_dropped() {
        let mut partial = output(1, None, (800, 600), (0, 1080));
        partial.ready = false;

        let snapshot = OutputSnapshot::new([output(0, Some("Virtual-1"), (1920, 1080), (0, 0)), partial]);

        assert_eq!(snapshot.outputs().len(), 1);
        assert_eq!(snapshot.desktop_bounds(), (1920, 1080));
    }

    #[test]
    fn empty_snapshot() {
        let snapshot = OutputSnapshot::<usize, usize>::new([]);

        assert!(snapshot.is_empty());
        assert_eq!(snapshot.desktop_bounds(), (0, 0));
    }

    #[test]
    fn index_modes_finds_flags() {
        let mut output = output(0, None, (1024, 768), (0, 0));
        let mut preferred = OutputMode::new(5);
        (preferred.width, preferred.height, preferred.preferred) = (1920, 1080, true);
        output.modes.push(preferred);
        output.index_modes();

        assert_eq!(output.current_mode, Some(0));
        assert_eq!(output.preferred_mode().map(OutputMode::size), Some((1920, 1080)));
        assert_eq!(output.size(), (1024, 768));
    }

    #[test]
    fn transform_numbering() {
        for value in 0..8 {
            let transform = Transform::try_from(value).unwrap();
            assert_eq!(u32::from(transform), value);
        }
        assert!(Transform::try_from(8).is_err());
    }
}
