// SPDX-License-Identifier: MPL-2.0

use std::time::{Duration, Instant};

use vdagent_display::{
    Backend, BackendKind, ConnectorMapping, Error, LayoutEntry, Outcome, Output, OutputMode,
    OutputOperation, OutputSnapshot, ResolutionRecord, WaitPolicy, get_resolutions,
    set_monitor_config_with,
};

/// In-memory compositor answering configurations after a number of polls.
struct FakeCompositor {
    outputs: Vec<Output<&'static str, u32>>,
    available: bool,
    answer: Option<(u32, Outcome)>,
    polls: u32,
    submitted: Vec<Vec<OutputOperation<&'static str, u32>>>,
}

impl FakeCompositor {
    fn new() -> Self {
        Self {
            outputs: vec![
                output("Virtual-1", &[(1920, 1080, 60000), (1920, 1080, 75000), (1280, 720, 60000)], (0, 0)),
                output("Virtual-2", &[(1280, 1024, 60000)], (1920, 0)),
            ],
            available: true,
            answer: Some((2, Outcome::Confirmed)),
            polls: 0,
            submitted: Vec::new(),
        }
    }
}

fn output(connector: &'static str, modes: &[(i32, i32, i32)], position: (i32, i32)) -> Output<&'static str, u32> {
    let mut output = Output::new(connector);
    output.connector = Some(connector.to_owned());
    output.position = position;
    output.enabled = true;
    output.ready = true;

    for (handle, &(width, height, refresh)) in (0..).zip(modes) {
        let mut mode = OutputMode::new(handle);
        (mode.width, mode.height, mode.refresh) = (width, height, refresh);
        mode.current = handle == 0;
        output.modes.push(mode);
    }

    output.index_modes();
    output
}

impl Backend for FakeCompositor {
    type OutputHandle = &'static str;
    type ModeHandle = u32;

    fn kind(&self) -> BackendKind {
        BackendKind::Kwin
    }

    fn is_available(&self) -> bool {
        self.available
    }

    fn refresh_and_snapshot(&mut self) -> Result<OutputSnapshot<&'static str, u32>, Error> {
        Ok(OutputSnapshot::new(self.outputs.clone()))
    }

    fn apply(&mut self, operations: &[OutputOperation<&'static str, u32>]) -> Result<(), Error> {
        self.polls = 0;
        self.submitted.push(operations.to_vec());
        Ok(())
    }

    fn poll(&mut self) -> Result<Option<Outcome>, Error> {
        self.polls += 1;
        Ok(self
            .answer
            .filter(|(after, _)| self.polls >= *after)
            .map(|(_, outcome)| outcome))
    }

    fn destroy(&mut self) {
        self.available = false;
    }
}

fn policy() -> WaitPolicy {
    WaitPolicy {
        iterations: 50,
        interval: Duration::from_millis(1),
    }
}

fn layout() -> [LayoutEntry; 2] {
    [
        LayoutEntry { display_id: 0, width: 1920, height: 1080, x: 0, y: 0 },
        LayoutEntry { display_id: 1, width: 1280, height: 1024, x: 1920, y: 0 },
    ]
}

#[test]
fn discovery_with_mapping() {
    let mut compositor = FakeCompositor::new();
    let mapping: ConnectorMapping = [("Virtual-1", 1), ("Virtual-2", 0)].into_iter().collect();

    let resolutions = get_resolutions(&mut compositor, &mapping).unwrap();

    assert_eq!(
        resolutions.records,
        [
            ResolutionRecord { x: 0, y: 0, width: 1920, height: 1080, display_id: 1 },
            ResolutionRecord { x: 1920, y: 0, width: 1280, height: 1024, display_id: 0 },
        ]
    );
    assert_eq!((resolutions.desktop_width, resolutions.desktop_height), (3200, 1080));
    assert_eq!(resolutions.screen_count, 2);
}

#[test]
fn discovery_is_repeatable() {
    let mut compositor = FakeCompositor::new();
    let mapping = ConnectorMapping::new();

    let first = get_resolutions(&mut compositor, &mapping).unwrap();
    let second = get_resolutions(&mut compositor, &mapping).unwrap();

    assert_eq!(first, second);
    let ids: Vec<u32> = first.records.iter().map(|record| record.display_id).collect();
    assert_eq!(ids, [0, 1]);
}

#[test]
fn unavailable_backend() {
    let mut compositor = FakeCompositor::new();
    compositor.destroy();
    compositor.destroy();

    assert!(matches!(
        get_resolutions(&mut compositor, &ConnectorMapping::new()),
        Err(Error::BackendUnavailable(BackendKind::Kwin))
    ));
    assert!(matches!(
        set_monitor_config_with(&mut compositor, &ConnectorMapping::new(), &layout(), &policy()),
        Err(Error::BackendUnavailable(_))
    ));
}

#[test]
fn confirmed_configuration() {
    let mut compositor = FakeCompositor::new();

    let report = set_monitor_config_with(&mut compositor, &ConnectorMapping::new(), &layout(), &policy()).unwrap();

    assert_eq!(report.applied, 2);
    assert!(report.conditions.is_empty());
    assert_eq!(compositor.polls, 2);

    let operations = &compositor.submitted[0];
    assert_eq!(operations[0].output, "Virtual-1");
    assert_eq!(operations[0].mode, 1);
    assert_eq!(operations[1].output, "Virtual-2");
    assert_eq!(operations[1].position, (1920, 0));
}

#[test]
fn rejection_is_reported_without_waiting() {
    let mut compositor = FakeCompositor::new();
    compositor.answer = Some((1, Outcome::Rejected));
    let slow = WaitPolicy {
        iterations: 50,
        interval: Duration::from_secs(1),
    };

    let started = Instant::now();
    let result = set_monitor_config_with(&mut compositor, &ConnectorMapping::new(), &layout(), &slow);

    assert!(matches!(result, Err(Error::ConfigurationRejected)));
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(compositor.polls, 1);
}

#[test]
fn silence_times_out() {
    let mut compositor = FakeCompositor::new();
    compositor.answer = None;

    let result = set_monitor_config_with(&mut compositor, &ConnectorMapping::new(), &layout(), &policy());

    assert!(matches!(result, Err(Error::ConfigurationTimeout)));
    assert_eq!(compositor.polls, 50);
}

#[test]
fn unknown_resolution_keeps_current_mode() {
    let mut compositor = FakeCompositor::new();
    let layout = [LayoutEntry { display_id: 0, width: 2560, height: 1440, x: 0, y: 0 }];

    let report = set_monitor_config_with(&mut compositor, &ConnectorMapping::new(), &layout, &policy()).unwrap();

    assert_eq!(report.conditions.len(), 1);
    assert_eq!(compositor.submitted[0][0].mode, 0);
}

#[test]
fn unmatched_layout_is_not_submitted() {
    let mut compositor = FakeCompositor::new();
    let layout = [LayoutEntry { display_id: 7, width: 800, height: 600, x: 0, y: 0 }];

    let result = set_monitor_config_with(&mut compositor, &ConnectorMapping::new(), &layout, &policy());

    assert!(matches!(result, Err(Error::NothingToApply)));
    assert!(compositor.submitted.is_empty());
}

#[test]
fn shared_display_id_serves_first_output() {
    let mut compositor = FakeCompositor::new();
    let mapping: ConnectorMapping = [("Virtual-1", 0), ("Virtual-2", 0)].into_iter().collect();

    let resolutions = get_resolutions(&mut compositor, &mapping).unwrap();

    let ids: Vec<u32> = resolutions.records.iter().map(|record| record.display_id).collect();
    assert_eq!(ids, [0]);
    assert_eq!(resolutions.records[0].width, 1920);
    assert_eq!(resolutions.screen_count, 2);

    let layout = [LayoutEntry { display_id: 0, width: 1280, height: 720, x: 0, y: 0 }];
    set_monitor_config_with(&mut compositor, &mapping, &layout, &policy()).unwrap();

    assert_eq!(compositor.submitted[0].len(), 1);
    assert_eq!(compositor.submitted[0][0].output, "Virtual-1");
}
