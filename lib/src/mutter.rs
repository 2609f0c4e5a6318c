// SPDX-License-Identifier: MPL-2.0

//! Backend for GNOME's `org.gnome.Mutter.DisplayConfig` D-Bus interface.
//!
//! Mutter answers `ApplyMonitorsConfig` synchronously, so the reply to the
//! method call is the confirmation signal.

use std::collections::HashMap;
use std::fmt;

use zbus::blocking::{Connection, Proxy};
use zbus::names::BusName;
use zbus::zvariant::{OwnedValue, Value};

use crate::backend::{Backend, BackendKind, Outcome, OutputOperation};
use crate::output::{Output, OutputSnapshot, Transform};
use crate::{Error, OutputMode};

const DESTINATION: &str = "org.gnome.Mutter.DisplayConfig";
const PATH: &str = "/org/gnome/Mutter/DisplayConfig";
const INTERFACE: &str = "org.gnome.Mutter.DisplayConfig";

/// `ApplyMonitorsConfig` method that does not persist across sessions.
const APPLY_TEMPORARY: u32 = 1;

type Properties = HashMap<String, OwnedValue>;
/// Connector, vendor, product, serial.
type MonitorSpec = (String, String, String, String);
/// Id, width, height, refresh rate, preferred scale, supported scales, properties.
type ModeState = (String, i32, i32, f64, f64, Vec<f64>, Properties);
type MonitorState = (MonitorSpec, Vec<ModeState>, Properties);
/// X, y, scale, transform, primary, monitors, properties.
type LogicalMonitorState = (i32, i32, f64, u32, bool, Vec<MonitorSpec>, Properties);
pub(crate) type CurrentState = (u32, Vec<MonitorState>, Vec<LogicalMonitorState>, Properties);

type ApplyMonitor<'a> = (&'a str, &'a str, HashMap<&'a str, Value<'a>>);
type ApplyLogicalMonitor<'a> = (i32, i32, f64, u32, bool, Vec<ApplyMonitor<'a>>);

pub struct MutterBackend {
    connection: Connection,
    proxy: Proxy<'static>,
    /// Serial of the last state read, required to apply a configuration.
    serial: Option<u32>,
    outcome: Option<Outcome>,
    destroyed: bool,
}

impl fmt::Debug for MutterBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MutterBackend")
            .field("serial", &self.serial)
            .field("outcome", &self.outcome)
            .field("destroyed", &self.destroyed)
            .finish_non_exhaustive()
    }
}

impl MutterBackend {
    /// Connects to the session bus and checks that Mutter owns its name.
    ///
    /// # Errors
    ///
    /// Returns error if the session bus is unreachable or Mutter is not running.
    pub fn connect() -> Result<Self, Error> {
        let connection = Connection::session()?;
        let proxy = Proxy::new(&connection, DESTINATION, PATH, INTERFACE)?;

        let backend = Self {
            connection,
            proxy,
            serial: None,
            outcome: None,
            destroyed: false,
        };

        if !backend.has_owner() {
            tracing::debug!("{DESTINATION} has no owner");
            return Err(Error::BackendUnavailable(BackendKind::Mutter));
        }

        Ok(backend)
    }

    fn has_owner(&self) -> bool {
        let Ok(dbus) = zbus::blocking::fdo::DBusProxy::new(&self.connection) else {
            return false;
        };

        let Ok(name) = BusName::try_from(DESTINATION) else {
            return false;
        };

        dbus.name_has_owner(name).unwrap_or(false)
    }
}

impl Backend for MutterBackend {
    type OutputHandle = String;
    type ModeHandle = String;

    fn kind(&self) -> BackendKind {
        BackendKind::Mutter
    }

    fn is_available(&self) -> bool {
        !self.destroyed && self.has_owner()
    }

    fn refresh_and_snapshot(&mut self) -> Result<OutputSnapshot<String, String>, Error> {
        if self.destroyed {
            return Err(Error::BackendUnavailable(BackendKind::Mutter));
        }

        let state: CurrentState = self.proxy.call("GetCurrentState", &()).map_err(|why| {
            tracing::warn!(error = %why, "failed to call GetCurrentState");
            why
        })?;

        let (serial, outputs) = parse_state(state);
        self.serial = Some(serial);

        Ok(OutputSnapshot::new(outputs))
    }

    fn apply(&mut self, operations: &[OutputOperation<String, String>]) -> Result<(), Error> {
        let Some(serial) = self.serial.filter(|_| !self.destroyed) else {
            return Err(Error::BackendUnavailable(BackendKind::Mutter));
        };

        let logical_monitors: Vec<ApplyLogicalMonitor<'_>> = operations
            .iter()
            .map(|operation| {
                (
                    operation.position.0,
                    operation.position.1,
                    if operation.scale > 0.0 { operation.scale } else { 1.0 },
                    u32::from(operation.transform),
                    operation.primary,
                    vec![(operation.output.as_str(), operation.mode.as_str(), HashMap::new())],
                )
            })
            .collect();

        let properties: HashMap<&str, Value<'_>> = HashMap::new();

        let reply = self.proxy.call::<_, _, ()>(
            "ApplyMonitorsConfig",
            &(serial, APPLY_TEMPORARY, logical_monitors, properties),
        );

        self.outcome = Some(match reply {
            Ok(()) => Outcome::Confirmed,

            Err(zbus::Error::MethodError(name, detail, _)) => {
                tracing::warn!(%name, detail = detail.as_deref(), "ApplyMonitorsConfig failed");
                Outcome::Rejected
            }

            Err(zbus::Error::FDO(why)) => {
                tracing::warn!(error = %why, "ApplyMonitorsConfig failed");
                Outcome::Rejected
            }

            Err(why) => return Err(why.into()),
        });

        Ok(())
    }

    fn poll(&mut self) -> Result<Option<Outcome>, Error> {
        Ok(self.outcome.take())
    }

    fn destroy(&mut self) {
        self.destroyed = true;
        self.serial = None;
        self.outcome = None;
    }
}

/// Normalizes a `GetCurrentState` reply into outputs keyed by connector.
pub(crate) fn parse_state((serial, monitors, logical_monitors, _): CurrentState) -> (u32, Vec<Output<String, String>>) {
    let outputs = monitors
        .into_iter()
        .map(|((connector, ..), modes, _)| {
            let mut output = Output::new(connector.clone());

            output.modes = modes
                .into_iter()
                .map(|(id, width, height, refresh, _, _, properties)| {
                    #[allow(clippy::cast_possible_truncation)]
                    let refresh = (refresh * 1000.0).round() as i32;

                    OutputMode {
                        width,
                        height,
                        refresh,
                        preferred: flag(&properties, "is-preferred"),
                        current: flag(&properties, "is-current"),
                        handle: id,
                    }
                })
                .collect();
            output.index_modes();

            let logical = logical_monitors.iter().find(|(.., specs, _)| {
                specs.iter().any(|(spec_connector, ..)| *spec_connector == connector)
            });

            if let Some((x, y, scale, transform, ..)) = logical {
                output.position = (*x, *y);
                output.scale = *scale;
                output.transform = Transform::try_from(*transform).unwrap_or_default();
            }

            output.enabled = output.current_mode.is_some();
            output.ready = true;

            tracing::debug!(
                connector = %connector,
                enabled = output.enabled,
                current = output.current_mode().map(|mode| mode.handle.as_str()),
                "parsed monitor"
            );

            output.connector = Some(connector);
            output
        })
        .collect();

    (serial, outputs)
}

fn flag(properties: &Properties, key: &str) -> bool {
    properties
        .get(key)
        .is_some_and(|value| matches!(&**value, Value::Bool(true)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flags(current: bool, preferred: bool) -> Properties {
        let mut properties = Properties::new();
        if current {
            properties.insert("is-current".into(), OwnedValue::try_from(Value::from(true)).unwrap());
        }
        if preferred {
            properties.insert("is-preferred".into(), OwnedValue::try_from(Value::from(true)).unwrap());
        }
        properties
    }

    fn spec(connector: &str) -> MonitorSpec {
        (connector.into(), "RHT".into(), "QEMU".into(), "0x00000000".into())
    }

    fn mode(id: &str, width: i32, height: i32, refresh: f64, properties: Properties) -> ModeState {
        (id.into(), width, height, refresh, 1.0, vec![1.0, 2.0], properties)
    }

    #[test]
    fn parses_monitors_and_logical_monitors() {
        let state: CurrentState = (
            42,
            vec![
                (
                    spec("Virtual-1"),
                    vec![
                        mode("1920x1080@60", 1920, 1080, 60.0, flags(false, true)),
                        mode("1280x720@59.94", 1280, 720, 59.94, flags(true, false)),
                    ],
                    Properties::new(),
                ),
                (
                    spec("Virtual-2"),
                    vec![mode("1024x768@60", 1024, 768, 60.0, flags(false, false))],
                    Properties::new(),
                ),
            ],
            vec![(1280, 0, 2.0, 1, true, vec![spec("Virtual-1")], Properties::new())],
            Properties::new(),
        );

        let (serial, outputs) = parse_state(state);
        assert_eq!(serial, 42);
        assert_eq!(outputs.len(), 2);

        let first = &outputs[0];
        assert_eq!(first.handle, "Virtual-1");
        assert_eq!(first.connector.as_deref(), Some("Virtual-1"));
        assert!(first.enabled && first.ready);
        assert_eq!(first.position, (1280, 0));
        assert_eq!(first.scale, 2.0);
        assert_eq!(first.transform, Transform::Rotate90);
        assert_eq!(first.size(), (1280, 720));
        assert_eq!(first.current_mode().map(|mode| mode.refresh), Some(59940));
        assert_eq!(first.preferred_mode().map(|mode| mode.handle.as_str()), Some("1920x1080@60"));

        let second = &outputs[1];
        assert!(!second.enabled);
        assert_eq!(second.position, (0, 0));
        assert_eq!(second.scale, 1.0);
    }
}
