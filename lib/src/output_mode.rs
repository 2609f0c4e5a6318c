// Copyright 2023 System76 <info@system76.com>
// SPDX-License-Identifier: MPL-2.0

/// One supported resolution and refresh rate of an output.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputMode<M> {
    /// Backend object used to request this mode.
    pub handle: M,
    pub width: i32,
    pub height: i32,
    /// Refresh rate in milli-Hertz.
    pub refresh: i32,
    pub preferred: bool,
    pub current: bool,
}

impl<M> OutputMode<M> {
    #[must_use]
    pub fn new(handle: M) -> Self {
        Self {
            handle,
            width: 0,
            height: 0,
            refresh: 0,
            preferred: false,
            current: false,
        }
    }

    #[must_use]
    pub fn size(&self) -> (i32, i32) {
        (self.width, self.height)
    }
}

/// Picks the mode matching `width` x `height` exactly with the highest refresh
/// rate. Among equal refresh rates the first one discovered wins.
pub fn select_mode<M>(modes: &[OutputMode<M>], width: i32, height: i32) -> Option<&OutputMode<M>> {
    let mut best: Option<&OutputMode<M>> = None;

    for mode in modes.iter().filter(|mode| mode.size() == (width, height)) {
        if best.is_none_or(|best| mode.refresh > best.refresh) {
            best = Some(mode);
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mode(handle: u32, width: i32, height: i32, refresh: i32) -> OutputMode<u32> {
        OutputMode {
            width,
            height,
            refresh,
            ..OutputMode::new(handle)
        }
    }

    #[test]
    fn highest_refresh_wins() {
        let modes = [
            mode(0, 1920, 1080, 60000),
            mode(1, 1920, 1080, 75000),
            mode(2, 1280, 720, 60000),
        ];

        let selected = select_mode(&modes, 1920, 1080).unwrap();
        assert_eq!(selected.handle, 1);
        assert_eq!(selected.refresh, 75000);
    }

    #[test]
    fn ties_keep_discovery_order() {
        let modes = [
            mode(7, 1024, 768, 60000),
            mode(3, 1024, 768, 60000),
        ];

        assert_eq!(select_mode(&modes, 1024, 768).unwrap().handle, 7);
    }

    #[test]
    fn no_exact_match() {
        let modes = [mode(0, 1920, 1080, 60000), mode(1, 1920, 1200, 60000)];

        assert!(select_mode(&modes, 2560, 1440).is_none());
        assert!(select_mode::<u32>(&[], 1920, 1080).is_none());
    }
}
