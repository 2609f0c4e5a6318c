// SPDX-License-Identifier: MPL-2.0

//! Assignment of compositor outputs to virtual display identifiers.
//!
//! When the connector mapping matches none of the enabled outputs, virtual
//! display `N` is taken to be the `N`th enabled output in discovery order.
//! That fallback depends on the compositor enumerating outputs in a stable
//! order across calls.
//!
//! Applying a layout resolves the index over every ready output, disabled
//! ones included, so a disabled output listed first shifts apply's index
//! away from discovery's.
//!
//! Connectors mapped to the same display are served by the first output in
//! discovery order.

use std::collections::HashMap;

use crate::output::{Output, OutputSnapshot};

/// Read-only table from connector name to virtual display identifier.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConnectorMapping(HashMap<String, u32>);

impl ConnectorMapping {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, connector: impl Into<String>, display_id: u32) -> Option<u32> {
        self.0.insert(connector.into(), display_id)
    }

    #[must_use]
    pub fn get(&self, connector: &str) -> Option<u32> {
        self.0.get(connector).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.0.iter().map(|(connector, id)| (connector.as_str(), *id))
    }

    /// Display identifier of an output, if its connector is mapped.
    #[must_use]
    pub fn display_id<O, M>(&self, output: &Output<O, M>) -> Option<u32> {
        output.connector.as_deref().and_then(|connector| self.get(connector))
    }

    /// Finds the output serving `display_id`.
    ///
    /// The first output whose connector maps to `display_id` wins. Otherwise
    /// the output at position `display_id` in the snapshot is used.
    #[must_use]
    pub fn find_output<'a, O, M>(
        &self,
        snapshot: &'a OutputSnapshot<O, M>,
        display_id: u32,
    ) -> Option<(usize, &'a Output<O, M>)> {
        let outputs = snapshot.outputs();

        outputs
            .iter()
            .enumerate()
            .find(|(_, output)| self.display_id(*output) == Some(display_id))
            .or_else(|| {
                let index = usize::try_from(display_id).ok()?;
                outputs.get(index).map(|output| (index, output))
            })
    }
}

impl<S: Into<String>> FromIterator<(S, u32)> for ConnectorMapping {
    fn from_iter<T: IntoIterator<Item = (S, u32)>>(iter: T) -> Self {
        Self(iter.into_iter().map(|(connector, id)| (connector.into(), id)).collect())
    }
}

/// Geometry of one enabled output and the virtual display it serves.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ResolutionRecord {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub display_id: u32,
}

/// Result of output discovery.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Resolutions {
    pub records: Vec<ResolutionRecord>,
    pub desktop_width: i32,
    pub desktop_height: i32,
    /// Enabled outputs, mapped or not.
    pub screen_count: usize,
}

impl Resolutions {
    /// Discovery succeeded but no output is usable.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Assigns display identifiers to the enabled outputs of a snapshot.
#[must_use]
pub fn resolve<O, M>(snapshot: &OutputSnapshot<O, M>, mapping: &ConnectorMapping) -> Resolutions {
    let mut mapped: Vec<ResolutionRecord> = Vec::new();
    let mut unmapped = Vec::new();
    let mut screen_count = 0;

    for output in snapshot.usable() {
        screen_count += 1;

        let (width, height) = output.size();
        let mut record = ResolutionRecord {
            x: output.position.0,
            y: output.position.1,
            width,
            height,
            display_id: 0,
        };

        match mapping.display_id(output) {
            Some(display_id) if mapped.iter().any(|other| other.display_id == display_id) => {
                tracing::warn!(
                    connector = output.connector.as_deref(),
                    display_id,
                    "display already served by an earlier output"
                );
            }

            Some(display_id) => {
                record.display_id = display_id;
                tracing::debug!(
                    connector = output.connector.as_deref(),
                    display_id,
                    "{width}x{height}+{}+{}",
                    record.x,
                    record.y
                );
                mapped.push(record);
            }

            None => {
                tracing::debug!(connector = output.connector.as_deref(), "no display mapped to connector");
                unmapped.push(record);
            }
        }
    }

    let records = if mapped.is_empty() {
        if !unmapped.is_empty() {
            tracing::debug!("no display mapping matched, using output index");
        }

        for (display_id, record) in (0..).zip(unmapped.iter_mut()) {
            record.display_id = display_id;
        }

        unmapped
    } else {
        mapped
    };

    let (desktop_width, desktop_height) = snapshot.desktop_bounds();

    Resolutions {
        records,
        desktop_width,
        desktop_height,
        screen_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::tests::output;

    fn snapshot() -> OutputSnapshot<usize, usize> {
        OutputSnapshot::new([
            output(0, Some("Virtual-1"), (1920, 1080), (0, 0)),
            output(1, Some("Virtual-2"), (1280, 1024), (1920, 0)),
        ])
    }

    #[test]
    fn mapped_identifiers() {
        let mapping: ConnectorMapping = [("Virtual-1", 0), ("Virtual-2", 1)].into_iter().collect();
        let resolutions = resolve(&snapshot(), &mapping);

        assert_eq!(
            resolutions.records,
            [
                ResolutionRecord { x: 0, y: 0, width: 1920, height: 1080, display_id: 0 },
                ResolutionRecord { x: 1920, y: 0, width: 1280, height: 1024, display_id: 1 },
            ]
        );
        assert_eq!((resolutions.desktop_width, resolutions.desktop_height), (3200, 1080));
        assert_eq!(resolutions.screen_count, 2);
    }

    #[test]
    fn empty_mapping_uses_discovery_order() {
        let resolutions = resolve(&snapshot(), &ConnectorMapping::new());

        let ids: Vec<u32> = resolutions.records.iter().map(|record| record.display_id).collect();
        assert_eq!(ids, [0, 1]);
        assert_eq!(resolutions.records[1].x, 1920);
    }

    #[test]
    fn partial_mapping_drops_unmapped_outputs() {
        let snapshot = OutputSnapshot::new([
            output(0, Some("Virtual-1"), (1920, 1080), (0, 0)),
            output(1, None, (800, 600), (0, 1080)),
            output(2, Some("Virtual-3"), (1024, 768), (1920, 0)),
        ]);
        let mapping: ConnectorMapping = [("Virtual-3", 4)].into_iter().collect();

        let resolutions = resolve(&snapshot, &mapping);

        assert_eq!(resolutions.records.len(), 1);
        assert_eq!(resolutions.records[0].display_id, 4);
        assert_eq!(resolutions.screen_count, 3);
        assert_eq!((resolutions.desktop_width, resolutions.desktop_height), (2944, 1680));
    }

    #[test]
    fn shared_display_id_keeps_first_output() {
        let mapping: ConnectorMapping = [("Virtual-1", 0), ("Virtual-2", 0)].into_iter().collect();
        let snapshot = snapshot();

        let resolutions = resolve(&snapshot, &mapping);

        assert_eq!(
            resolutions.records,
            [ResolutionRecord { x: 0, y: 0, width: 1920, height: 1080, display_id: 0 }]
        );
        assert_eq!(resolutions.screen_count, 2);
        assert_eq!((resolutions.desktop_width, resolutions.desktop_height), (3200, 1080));
        assert_eq!(mapping.find_output(&snapshot, 0).map(|(index, _)| index), Some(0));
    }

    #[test]
    fn display_ids_are_unique() {
        let snapshot = OutputSnapshot::new([
            output(0, Some("Virtual-1"), (1920, 1080), (0, 0)),
            output(1, Some("Virtual-2"), (1280, 1024), (1920, 0)),
            output(2, Some("Virtual-3"), (1024, 768), (3200, 0)),
            output(3, Some("Virtual-4"), (800, 600), (4224, 0)),
        ]);
        let mapping: ConnectorMapping =
            [("Virtual-1", 2), ("Virtual-2", 5), ("Virtual-3", 2), ("Virtual-4", 5), ("Virtual-9", 0)]
                .into_iter()
                .collect();

        let resolutions = resolve(&snapshot, &mapping);

        let ids: Vec<u32> = resolutions.records.iter().map(|record| record.display_id).collect();
        assert_eq!(ids, [2, 5]);
        assert_eq!(resolutions.screen_count, 4);
    }

    #[test]
    fn unmatched_mapping_falls_back_to_unique_indices() {
        let mapping: ConnectorMapping = [("HDMI-1", 0), ("DP-1", 0)].into_iter().collect();

        let resolutions = resolve(&snapshot(), &mapping);

        let ids: Vec<u32> = resolutions.records.iter().map(|record| record.display_id).collect();
        assert_eq!(ids, [0, 1]);
    }

    #[test]
    fn disabled_outputs_are_not_counted() {
        let mut disabled = output(1, Some("Virtual-2"), (1280, 1024), (1920, 0));
        disabled.enabled = false;
        let snapshot = OutputSnapshot::new([output(0, Some("Virtual-1"), (1920, 1080), (0, 0)), disabled]);

        let resolutions = resolve(&snapshot, &ConnectorMapping::new());

        assert_eq!(resolutions.screen_count, 1);
        assert_eq!(resolutions.records.len(), 1);
    }

    #[test]
    fn nothing_enabled() {
        let resolutions = resolve(&OutputSnapshot::<usize, usize>::new([]), &ConnectorMapping::new());

        assert!(resolutions.is_empty());
        assert_eq!(resolutions.screen_count, 0);
    }

    #[test]
    fn find_output_prefers_mapping_then_index() {
        let snapshot = snapshot();
        let mapping: ConnectorMapping = [("Virtual-2", 0)].into_iter().collect();

        assert_eq!(mapping.find_output(&snapshot, 0).map(|(index, _)| index), Some(1));
        assert_eq!(mapping.find_output(&snapshot, 1).map(|(index, _)| index), Some(1));
        assert!(mapping.find_output(&snapshot, 2).is_none());
    }
}
